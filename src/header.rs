//! Headers (setkeys): the `(category key, value)` pairs used as row and
//! column labels.

use std::fmt;

/// A guessable category value.
///
/// Text for nominal categories, `Bool(true)` for boolean and comparison
/// categories (the false branch never becomes a header).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// Predicate category value.
    Bool(bool),
    /// Nominal / multi-nominal value.
    Text(String),
}

impl Value {
    /// Text value.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A `(category key, value)` pair.
///
/// Equal iff both components are equal. Ordering is lexicographic over
/// `(category, value)`; the cell table relies on it to canonicalize
/// unordered header pairs.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    /// Category key.
    pub category: String,
    /// Category value.
    pub value: Value,
}

impl Header {
    /// Build a header.
    pub fn new(category: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            category: category.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.category, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_equality_needs_both_components() {
        assert_eq!(Header::new("region", "X"), Header::new("region", "X"));
        assert_ne!(Header::new("region", "X"), Header::new("region", "Y"));
        assert_ne!(Header::new("region", "X"), Header::new("color", "X"));
    }

    #[test]
    fn test_ordering_is_category_then_value() {
        let mut headers = vec![
            Header::new("region", "Y"),
            Header::new("color", "Red"),
            Header::new("region", "X"),
            Header::new("island", true),
        ];
        headers.sort();
        assert_eq!(
            headers,
            vec![
                Header::new("color", "Red"),
                Header::new("island", true),
                Header::new("region", "X"),
                Header::new("region", "Y"),
            ]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Header::new("island", true).to_string(), "island=true");
        assert_eq!(Header::new("continent", "EU").to_string(), "continent=EU");
    }
}
