//! Entity table: the read-only input every category is derived from.
//!
//! Ingestion and cleaning happen elsewhere. By the time a table reaches this
//! crate each entity has a stable identifier and a bag of named attributes.
//! An attribute named `<attr>_alt` holds alternate (alias) values for `<attr>`
//! and switches on alternate-set computation for categories reading `<attr>`.

use std::collections::BTreeMap;
use std::fmt;

/// Suffix marking the alternate-values attribute of a source attribute.
pub const ALT_SUFFIX: &str = "_alt";

/// Name of the alternate attribute for `attribute`.
pub fn alt_attribute(attribute: &str) -> String {
    let mut name = String::with_capacity(attribute.len() + ALT_SUFFIX.len());
    name.push_str(attribute);
    name.push_str(ALT_SUFFIX);
    name
}

// ─── EntityId ───────────────────────────────────────────────────────────────

/// Opaque, stable entity identifier (e.g. an ISO country code).
///
/// Ordering is plain string ordering; every entity list this crate produces
/// is sorted by it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EntityId(pub String);

impl EntityId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// ─── AttrValue ──────────────────────────────────────────────────────────────

/// One attribute value of an entity.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum AttrValue {
    /// Single text value (names, capitals, continents).
    Text(String),
    /// Set-valued text attribute (flag colors, alternate names).
    List(Vec<String>),
    /// Numeric attribute (population, area, elevation).
    Number(f64),
    /// Several numeric values; used for alternate numbers.
    Numbers(Vec<f64>),
    /// Boolean attribute (landlocked, island).
    Bool(bool),
}

impl AttrValue {
    /// Text value.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// List of text values.
    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    /// Short type name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::List(_) => "a text list",
            Self::Number(_) => "a number",
            Self::Numbers(_) => "a number list",
            Self::Bool(_) => "a boolean",
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<&str>> for AttrValue {
    fn from(values: Vec<&str>) -> Self {
        Self::list(values)
    }
}

// ─── Entity ─────────────────────────────────────────────────────────────────

/// An entity: identifier plus named attributes.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Entity {
    /// Stable identifier.
    pub id: EntityId,
    /// Attributes by name. A missing key means "no value".
    pub attributes: BTreeMap<String, AttrValue>,
}

impl Entity {
    /// Entity with no attributes yet.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(id),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Attribute lookup.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.get(name)
    }
}

// ─── EntityTable ────────────────────────────────────────────────────────────

/// The fixed collection of entities, in ingestion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityTable {
    entities: Vec<Entity>,
}

impl EntityTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entity.
    pub fn push(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// `true` when the table holds no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterate entities in ingestion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Look up an entity by id.
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| &e.id == id)
    }

    /// `true` if at least one entity carries `attribute`.
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.entities.iter().any(|e| e.attributes.contains_key(attribute))
    }
}

impl FromIterator<Entity> for EntityTable {
    fn from_iter<T: IntoIterator<Item = Entity>>(iter: T) -> Self {
        Self {
            entities: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alt_attribute_name() {
        assert_eq!(alt_attribute("capital"), "capital_alt");
    }

    #[test]
    fn test_table_lookup_and_attribute_presence() {
        let table: EntityTable = [
            Entity::new("ZA")
                .with("capital", "Pretoria")
                .with("capital_alt", vec!["Tshwane", "Cape Town"]),
            Entity::new("FR").with("capital", "Paris").with("landlocked", false),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.len(), 2);
        assert!(table.has_attribute("capital_alt"));
        assert!(!table.has_attribute("population"));

        let za = table.get(&EntityId::from("ZA")).expect("ZA present");
        assert_eq!(za.get("capital"), Some(&AttrValue::text("Pretoria")));
        assert_eq!(
            za.get("capital_alt"),
            Some(&AttrValue::list(["Tshwane", "Cape Town"]))
        );
        assert!(table.get(&EntityId::from("DE")).is_none());
    }
}
