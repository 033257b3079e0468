//! Construction-time errors.
//!
//! Everything in here is fatal and immediate: a category that cannot be
//! derived, or a grid configuration that cannot describe a playable board.
//! Assembly dead-ends during sampling are *not* errors and never surface
//! through this type; see [`crate::generator`].

use thiserror::Error;

/// A configuration mistake detected while building categories, the grid
/// context, or a generator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The comparison operator text is not one of `>`, `>=`, `<`, `<=`.
    #[error("unknown comparison operator '{0}'")]
    UnknownComparison(String),

    /// The selection mode text is not `shuffle_setkeys` or `shuffle_categories`.
    #[error("unknown selection mode '{0}'")]
    UnknownSelectionMode(String),

    /// No entity in the table carries the category's source attribute.
    #[error("category '{category}': attribute '{attribute}' not found in entity table")]
    MissingAttribute {
        /// Key of the category being built.
        category: String,
        /// Source attribute that was looked up.
        attribute: String,
    },

    /// The source attribute holds a value the category kind cannot read.
    #[error("category '{category}': entity '{entity}' has {found} in '{attribute}', expected {expected}")]
    AttributeType {
        /// Key of the category being built.
        category: String,
        /// Source attribute that was read.
        attribute: String,
        /// Entity carrying the offending value.
        entity: String,
        /// What the category kind needs.
        expected: &'static str,
        /// What the table actually holds.
        found: &'static str,
    },

    /// A Top-N / Bottom-N rank that no entity set can satisfy.
    #[error("category '{category}': rank {n} out of range (1..={available})")]
    BoundOutOfRange {
        /// Key of the category being built.
        category: String,
        /// Requested rank.
        n: usize,
        /// Number of entities holding a numeric value.
        available: usize,
    },

    /// A comparison bound that contradicts the declared operator, e.g. a
    /// Top-N rank paired with `<`.
    #[error("category '{category}': bound {bound} cannot be used with operator '{op}'")]
    BoundMismatch {
        /// Key of the category being built.
        category: String,
        /// Declared operator.
        op: String,
        /// Declared bound.
        bound: String,
    },

    /// Two categories were declared with the same key.
    #[error("duplicate category key '{0}'")]
    DuplicateCategory(String),

    /// Field size or cell size bounds cannot describe a board.
    #[error("invalid grid configuration: {0}")]
    InvalidGrid(String),

    /// A category probability is negative or not finite.
    #[error("category '{category}': invalid selection probability {prob}")]
    InvalidProbability {
        /// Category the weight was configured for.
        category: String,
        /// The rejected weight.
        prob: f64,
    },
}
