/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Categories: one attribute (or derived attribute) of the entity table
//! viewed as a mapping value → entities.
//!
//! A [`CategoryDef`] declares an axis; [`Category::derive`] reads the entity
//! table and records, per entity, the primary values and (when the table has
//! a `<attr>_alt` attribute) the alternate values. Grouping those into
//! `sets` / `alt_sets` and pruning them is the job of [`crate::universe`].
//!
//! # Variants
//!
//! | Kind | Value rule | Header values |
//! |------|-----------|---------------|
//! | Nominal | `extractor(attr)` (identity if none) | one per entity |
//! | MultiNominal | each member of a set-valued attr | zero or more per entity |
//! | Boolean | attr is `true` | `true` only |
//! | Comparison | `attr <op> bound` (fixed, Top-N or Bottom-N) | `true` only |
//!
//! The false branch of a predicate category is never exposed as a guessable
//! value.
//!
//! # Invariants
//!
//! - An alternate value equal to one of the entity's primary values is
//!   discarded (no self-alternates).
//! - Top-N / Bottom-N bounds are inclusive: the Nth largest (smallest) value
//!   itself satisfies the predicate, so ties may admit more than N entities.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::entity::{alt_attribute, AttrValue, Entity, EntityId, EntityTable};
use crate::error::ConfigError;
use crate::header::Value;

// ─── Extractor ──────────────────────────────────────────────────────────────

/// Derives a nominal value from a raw text attribute.
///
/// Returning `None` means the entity has no value for the category (e.g. an
/// empty name has no first letter).
#[derive(Clone, Copy, Debug)]
pub enum Extractor {
    /// Upper-cased first character.
    FirstLetter,
    /// Upper-cased last character.
    LastLetter,
    /// Any other derivation.
    Custom(fn(&str) -> Option<String>),
}

impl Extractor {
    /// Apply the extractor to one raw value.
    pub fn extract(&self, raw: &str) -> Option<String> {
        match self {
            Self::FirstLetter => raw.chars().next().map(|c| c.to_uppercase().collect()),
            Self::LastLetter => raw.chars().next_back().map(|c| c.to_uppercase().collect()),
            Self::Custom(f) => f(raw),
        }
    }
}

// ─── ComparisonOp / Bound ───────────────────────────────────────────────────

/// Numeric comparison used by predicate categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComparisonOp {
    /// `>`
    Greater,
    /// `>=`
    GreaterEq,
    /// `<`
    Less,
    /// `<=`
    LessEq,
}

impl ComparisonOp {
    /// Evaluate `value <op> bound`.
    pub fn holds(self, value: f64, bound: f64) -> bool {
        match self {
            Self::Greater => value > bound,
            Self::GreaterEq => value >= bound,
            Self::Less => value < bound,
            Self::LessEq => value <= bound,
        }
    }

    /// Operator text.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Greater => ">",
            Self::GreaterEq => ">=",
            Self::Less => "<",
            Self::LessEq => "<=",
        }
    }
}

impl FromStr for ComparisonOp {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" => Ok(Self::Greater),
            ">=" => Ok(Self::GreaterEq),
            "<" => Ok(Self::Less),
            "<=" => Ok(Self::LessEq),
            other => Err(ConfigError::UnknownComparison(other.to_string())),
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Right-hand side of a comparison category.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bound {
    /// A fixed number.
    Fixed(f64),
    /// The Nth largest value in the table (requires `>=`).
    TopN(usize),
    /// The Nth smallest value in the table (requires `<=`).
    BottomN(usize),
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(x) => write!(f, "{x}"),
            Self::TopN(n) => write!(f, "top {n}"),
            Self::BottomN(n) => write!(f, "bottom {n}"),
        }
    }
}

// ─── CategoryKind / CategoryDef ─────────────────────────────────────────────

/// Value-derivation rule of a category.
#[derive(Clone, Debug)]
pub enum CategoryKind {
    /// Single value per entity, optionally derived through an extractor.
    Nominal {
        /// Source attribute.
        attribute: String,
        /// Derivation; `None` uses the raw text.
        extractor: Option<Extractor>,
    },
    /// Set-valued source attribute; each member is a value.
    MultiNominal {
        /// Source attribute.
        attribute: String,
    },
    /// `true` branch of a boolean attribute.
    Boolean {
        /// Source attribute.
        attribute: String,
    },
    /// `true` branch of a numeric comparison.
    Comparison {
        /// Source attribute.
        attribute: String,
        /// Comparison operator.
        op: ComparisonOp,
        /// Bound, fixed or computed from the table.
        bound: Bound,
    },
}

impl CategoryKind {
    /// Source attribute read from the entity table.
    pub fn attribute(&self) -> &str {
        match self {
            Self::Nominal { attribute, .. }
            | Self::MultiNominal { attribute }
            | Self::Boolean { attribute }
            | Self::Comparison { attribute, .. } => attribute,
        }
    }

    /// Whether one entity may hold several values at once.
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, Self::MultiNominal { .. })
    }

    /// Whether the category is a predicate whose only header is `true`.
    pub fn is_predicate(&self) -> bool {
        matches!(self, Self::Boolean { .. } | Self::Comparison { .. })
    }

    /// Extractor of a nominal category, if it applies one.
    pub fn extractor(&self) -> Option<&Extractor> {
        match self {
            Self::Nominal { extractor, .. } => extractor.as_ref(),
            _ => None,
        }
    }
}

/// Declaration of one category axis.
#[derive(Clone, Debug)]
pub struct CategoryDef {
    /// Unique key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Scalar difficulty weight, passed through to scoring.
    pub difficulty: f64,
    /// Value-derivation rule.
    pub kind: CategoryKind,
}

impl CategoryDef {
    fn with_kind(key: &str, name: &str, difficulty: f64, kind: CategoryKind) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            difficulty,
            kind,
        }
    }

    /// Nominal category over the raw text of `attribute`.
    pub fn nominal(key: &str, name: &str, difficulty: f64, attribute: &str) -> Self {
        Self::with_kind(
            key,
            name,
            difficulty,
            CategoryKind::Nominal {
                attribute: attribute.to_string(),
                extractor: None,
            },
        )
    }

    /// Nominal category over `extractor(attribute)`.
    pub fn extracted(
        key: &str,
        name: &str,
        difficulty: f64,
        attribute: &str,
        extractor: Extractor,
    ) -> Self {
        Self::with_kind(
            key,
            name,
            difficulty,
            CategoryKind::Nominal {
                attribute: attribute.to_string(),
                extractor: Some(extractor),
            },
        )
    }

    /// Multi-nominal category over a set-valued attribute.
    pub fn multi_nominal(key: &str, name: &str, difficulty: f64, attribute: &str) -> Self {
        Self::with_kind(
            key,
            name,
            difficulty,
            CategoryKind::MultiNominal {
                attribute: attribute.to_string(),
            },
        )
    }

    /// Boolean category: entities whose `attribute` is `true`.
    pub fn boolean(key: &str, name: &str, difficulty: f64, attribute: &str) -> Self {
        Self::with_kind(
            key,
            name,
            difficulty,
            CategoryKind::Boolean {
                attribute: attribute.to_string(),
            },
        )
    }

    /// Comparison category with the operator given as text (`>`, `>=`, `<`, `<=`).
    pub fn comparison(
        key: &str,
        name: &str,
        difficulty: f64,
        attribute: &str,
        op: &str,
        bound: Bound,
    ) -> Result<Self, ConfigError> {
        let op = op.parse()?;
        Ok(Self::with_kind(
            key,
            name,
            difficulty,
            CategoryKind::Comparison {
                attribute: attribute.to_string(),
                op,
                bound,
            },
        ))
    }

    /// `attribute > bound` (or `>=` with `or_equal`).
    pub fn greater_than(
        key: &str,
        name: &str,
        difficulty: f64,
        attribute: &str,
        bound: f64,
        or_equal: bool,
    ) -> Self {
        let op = if or_equal { ComparisonOp::GreaterEq } else { ComparisonOp::Greater };
        Self::with_kind(
            key,
            name,
            difficulty,
            CategoryKind::Comparison {
                attribute: attribute.to_string(),
                op,
                bound: Bound::Fixed(bound),
            },
        )
    }

    /// `attribute < bound` (or `<=` with `or_equal`).
    pub fn less_than(
        key: &str,
        name: &str,
        difficulty: f64,
        attribute: &str,
        bound: f64,
        or_equal: bool,
    ) -> Self {
        let op = if or_equal { ComparisonOp::LessEq } else { ComparisonOp::Less };
        Self::with_kind(
            key,
            name,
            difficulty,
            CategoryKind::Comparison {
                attribute: attribute.to_string(),
                op,
                bound: Bound::Fixed(bound),
            },
        )
    }

    /// The `n` entities with the largest `attribute` (ties included).
    pub fn top_n(key: &str, name: &str, difficulty: f64, attribute: &str, n: usize) -> Self {
        Self::with_kind(
            key,
            name,
            difficulty,
            CategoryKind::Comparison {
                attribute: attribute.to_string(),
                op: ComparisonOp::GreaterEq,
                bound: Bound::TopN(n),
            },
        )
    }

    /// The `n` entities with the smallest `attribute` (ties included).
    pub fn bottom_n(key: &str, name: &str, difficulty: f64, attribute: &str, n: usize) -> Self {
        Self::with_kind(
            key,
            name,
            difficulty,
            CategoryKind::Comparison {
                attribute: attribute.to_string(),
                op: ComparisonOp::LessEq,
                bound: Bound::BottomN(n),
            },
        )
    }
}

// ─── Category ───────────────────────────────────────────────────────────────

/// A derived category: per-entity values plus the grouped value → entity sets.
#[derive(Clone, Debug)]
pub struct Category {
    /// Unique key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Scalar difficulty weight.
    pub difficulty: f64,
    kind: CategoryKind,
    /// Resolved comparison bound (predicate categories over numbers).
    threshold: Option<f64>,
    /// Primary values per entity.
    pub(crate) values: BTreeMap<EntityId, Vec<Value>>,
    /// Alternate values per entity; `None` when the table has no alt attribute.
    pub(crate) alt_values: Option<BTreeMap<EntityId, Vec<Value>>>,
    /// Raw text (primary first, then alternates) for extractor categories.
    raw: BTreeMap<EntityId, Vec<String>>,
    /// value → sorted entity ids.
    pub(crate) sets: BTreeMap<Value, Vec<EntityId>>,
    /// value → sorted entity ids reachable only through alternates.
    pub(crate) alt_sets: BTreeMap<Value, Vec<EntityId>>,
}

impl Category {
    /// Derive a category from the entity table.
    ///
    /// Fails immediately on configuration mistakes: unknown attribute, wrong
    /// attribute type, or an impossible bound. Sets stay empty until the
    /// value universe groups them.
    pub fn derive(def: &CategoryDef, table: &EntityTable) -> Result<Self, ConfigError> {
        let attribute = def.kind.attribute();
        if !table.has_attribute(attribute) {
            return Err(ConfigError::MissingAttribute {
                category: def.key.clone(),
                attribute: attribute.to_string(),
            });
        }
        let alt_attr = alt_attribute(attribute);
        let has_alt = table.has_attribute(&alt_attr);
        let deriver = Deriver {
            def,
            attribute,
            alt_attr: &alt_attr,
        };

        let threshold = match &def.kind {
            CategoryKind::Comparison { op, bound, .. } => Some(deriver.resolve_bound(table, *op, *bound)?),
            _ => None,
        };

        let mut values = BTreeMap::new();
        let mut alt_values = has_alt.then(BTreeMap::new);
        let mut raw = BTreeMap::new();

        for entity in table.iter() {
            let primary = deriver.primary(entity, threshold)?;
            if let Some(alt_map) = alt_values.as_mut() {
                let alternates: Vec<Value> = deriver
                    .alternates(entity, threshold)?
                    .into_iter()
                    .filter(|v| !primary.contains(v))
                    .collect();
                if !alternates.is_empty() {
                    alt_map.insert(entity.id.clone(), alternates);
                }
            }
            if def.kind.extractor().is_some() {
                let texts = deriver.raw_texts(entity, has_alt)?;
                if !texts.is_empty() {
                    raw.insert(entity.id.clone(), texts);
                }
            }
            if !primary.is_empty() {
                values.insert(entity.id.clone(), primary);
            }
        }

        Ok(Self {
            key: def.key.clone(),
            name: def.name.clone(),
            difficulty: def.difficulty,
            kind: def.kind.clone(),
            threshold,
            values,
            alt_values,
            raw,
            sets: BTreeMap::new(),
            alt_sets: BTreeMap::new(),
        })
    }

    /// Value-derivation rule.
    pub fn kind(&self) -> &CategoryKind {
        &self.kind
    }

    /// Whether one entity may hold several values (multi-nominal).
    pub fn is_multi_valued(&self) -> bool {
        self.kind.is_multi_valued()
    }

    /// Resolved comparison bound, for comparison categories.
    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    /// Entities supporting `value` through their primary values.
    pub fn entities(&self, value: &Value) -> &[EntityId] {
        self.sets.get(value).map_or(&[], Vec::as_slice)
    }

    /// Entities supporting `value` only through alternates.
    pub fn alt_entities(&self, value: &Value) -> &[EntityId] {
        self.alt_sets.get(value).map_or(&[], Vec::as_slice)
    }

    /// All header values currently in the category, sorted.
    pub fn header_values(&self) -> impl Iterator<Item = &Value> {
        self.sets.keys()
    }

    /// Number of header values.
    pub fn value_count(&self) -> usize {
        self.sets.len()
    }

    /// Whether the table carried alternates for this category.
    pub fn has_alternates(&self) -> bool {
        self.alt_values.is_some()
    }

    /// Raw text values (primary first) of an entity, for extractor categories.
    pub fn raw_texts(&self, entity: &EntityId) -> &[String] {
        self.raw.get(entity).map_or(&[], Vec::as_slice)
    }

    /// Whether `raw` yields `value` under this category's extractor.
    pub fn extracts_to(&self, raw: &str, value: &Value) -> bool {
        match (self.kind.extractor(), value.as_text()) {
            (Some(ex), Some(text)) => ex.extract(raw).as_deref() == Some(text),
            _ => false,
        }
    }

    /// Display label of a header of this category.
    ///
    /// Predicate categories are labelled by their name alone.
    pub fn label(&self, value: &Value) -> String {
        if self.kind.is_predicate() {
            self.name.clone()
        } else {
            format!("{}: {}", self.name, value)
        }
    }
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Category {}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            CategoryKind::Nominal { .. } => "NominalCategory",
            CategoryKind::MultiNominal { .. } => "MultiNominalCategory",
            CategoryKind::Boolean { .. } => "BooleanCategory",
            CategoryKind::Comparison { .. } => "ComparisonCategory",
        };
        write!(f, "{}('{}', {} values)", kind, self.key, self.sets.len())
    }
}

// ─── derivation helpers ─────────────────────────────────────────────────────

struct Deriver<'a> {
    def: &'a CategoryDef,
    attribute: &'a str,
    alt_attr: &'a str,
}

impl Deriver<'_> {
    fn type_error(&self, entity: &Entity, attribute: &str, expected: &'static str, found: &AttrValue) -> ConfigError {
        ConfigError::AttributeType {
            category: self.def.key.clone(),
            attribute: attribute.to_string(),
            entity: entity.id.to_string(),
            expected,
            found: found.kind_name(),
        }
    }

    fn resolve_bound(&self, table: &EntityTable, op: ComparisonOp, bound: Bound) -> Result<f64, ConfigError> {
        let mismatch = || ConfigError::BoundMismatch {
            category: self.def.key.clone(),
            op: op.symbol().to_string(),
            bound: bound.to_string(),
        };
        let (n, descending) = match bound {
            Bound::Fixed(x) if x.is_finite() => return Ok(x),
            Bound::Fixed(_) => return Err(mismatch()),
            Bound::TopN(n) if op == ComparisonOp::GreaterEq => (n, true),
            Bound::BottomN(n) if op == ComparisonOp::LessEq => (n, false),
            Bound::TopN(_) | Bound::BottomN(_) => return Err(mismatch()),
        };

        // A number list ranks by its best member, matching the any-member
        // test in `values_of`.
        let best = |xs: &[f64]| {
            let finite = xs.iter().copied().filter(|x| !x.is_nan());
            if descending {
                finite.max_by(f64::total_cmp)
            } else {
                finite.min_by(f64::total_cmp)
            }
        };
        let mut numbers = Vec::new();
        for entity in table.iter() {
            match entity.get(self.attribute) {
                Some(AttrValue::Number(x)) if !x.is_nan() => numbers.push(*x),
                Some(AttrValue::Numbers(xs)) => numbers.extend(best(xs.as_slice())),
                Some(AttrValue::Number(_)) | None => {}
                Some(other) => return Err(self.type_error(entity, self.attribute, "a number", other)),
            }
        }
        if n == 0 || n > numbers.len() {
            return Err(ConfigError::BoundOutOfRange {
                category: self.def.key.clone(),
                n,
                available: numbers.len(),
            });
        }
        numbers.sort_by(|a, b| a.total_cmp(b));
        if descending {
            numbers.reverse();
        }
        Ok(numbers[n - 1])
    }

    /// Values derived from one attribute value.
    fn values_of(&self, entity: &Entity, attribute: &str, attr: &AttrValue, threshold: Option<f64>) -> Result<Vec<Value>, ConfigError> {
        let values = match (&self.def.kind, attr) {
            (CategoryKind::Nominal { extractor, .. }, AttrValue::Text(s)) => {
                let derived = match extractor {
                    Some(ex) => ex.extract(s),
                    None => Some(s.clone()),
                };
                derived.into_iter().map(Value::Text).collect()
            }
            // Alternates of a nominal attribute come as a list.
            (CategoryKind::Nominal { extractor, .. }, AttrValue::List(items)) if attribute == self.alt_attr => {
                let set: BTreeSet<String> = items
                    .iter()
                    .filter_map(|s| match extractor {
                        Some(ex) => ex.extract(s),
                        None => Some(s.clone()),
                    })
                    .collect();
                set.into_iter().map(Value::Text).collect()
            }
            (CategoryKind::Nominal { .. }, other) => {
                return Err(self.type_error(entity, attribute, "text", other));
            }
            (CategoryKind::MultiNominal { .. }, AttrValue::List(items)) => {
                let set: BTreeSet<&String> = items.iter().collect();
                set.into_iter().map(|s| Value::Text(s.clone())).collect()
            }
            (CategoryKind::MultiNominal { .. }, AttrValue::Text(s)) => vec![Value::Text(s.clone())],
            (CategoryKind::MultiNominal { .. }, other) => {
                return Err(self.type_error(entity, attribute, "a text list", other));
            }
            (CategoryKind::Boolean { .. }, AttrValue::Bool(b)) => {
                if *b { vec![Value::Bool(true)] } else { Vec::new() }
            }
            (CategoryKind::Boolean { .. }, other) => {
                return Err(self.type_error(entity, attribute, "a boolean", other));
            }
            (CategoryKind::Comparison { op, .. }, AttrValue::Number(x)) => {
                let bound = threshold.unwrap_or(f64::NAN);
                if op.holds(*x, bound) { vec![Value::Bool(true)] } else { Vec::new() }
            }
            (CategoryKind::Comparison { op, .. }, AttrValue::Numbers(xs)) => {
                let bound = threshold.unwrap_or(f64::NAN);
                if xs.iter().any(|x| op.holds(*x, bound)) { vec![Value::Bool(true)] } else { Vec::new() }
            }
            (CategoryKind::Comparison { .. }, other) => {
                return Err(self.type_error(entity, attribute, "a number", other));
            }
        };
        Ok(values)
    }

    fn primary(&self, entity: &Entity, threshold: Option<f64>) -> Result<Vec<Value>, ConfigError> {
        match entity.get(self.attribute) {
            Some(attr) => self.values_of(entity, self.attribute, attr, threshold),
            None => Ok(Vec::new()),
        }
    }

    fn alternates(&self, entity: &Entity, threshold: Option<f64>) -> Result<Vec<Value>, ConfigError> {
        match entity.get(self.alt_attr) {
            Some(attr) => self.values_of(entity, self.alt_attr, attr, threshold),
            None => Ok(Vec::new()),
        }
    }

    fn raw_texts(&self, entity: &Entity, has_alt: bool) -> Result<Vec<String>, ConfigError> {
        let mut texts = Vec::new();
        if let Some(AttrValue::Text(s)) = entity.get(self.attribute) {
            texts.push(s.clone());
        }
        if has_alt {
            match entity.get(self.alt_attr) {
                Some(AttrValue::List(items)) => texts.extend(items.iter().cloned()),
                Some(AttrValue::Text(s)) => texts.push(s.clone()),
                Some(other) => return Err(self.type_error(entity, self.alt_attr, "a text list", other)),
                None => {}
            }
        }
        Ok(texts)
    }
}
