//! The grid context: pruned categories, surviving headers and the cell
//! table, built once and shared by reference with every sampler.

use std::collections::BTreeMap;

use log::info;

use crate::category::{Category, CategoryDef};
use crate::cell::{CellBuilder, CellTable};
use crate::entity::{EntityId, EntityTable};
use crate::error::ConfigError;
use crate::header::Header;
use crate::universe::{PruneReport, ValueUniverse};

// ─── Config ─────────────────────────────────────────────────────────────────

/// Board and cell size configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridConfig {
    /// Grid dimension N; also the minimum entity-set size of a header.
    /// Default: 3.
    pub field_size: usize,

    /// Minimum number of primary solutions per cell. Clamped to at least 1.
    /// Default: 1.
    pub min_cell_size: usize,

    /// Maximum number of primary solutions per cell. Default: unbounded.
    pub max_cell_size: Option<usize>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            field_size: 3,
            min_cell_size: 1,
            max_cell_size: None,
        }
    }
}

impl GridConfig {
    /// Check the configuration and clamp `min_cell_size` to at least 1.
    pub fn validated(&self) -> Result<Self, ConfigError> {
        if self.field_size == 0 {
            return Err(ConfigError::InvalidGrid("field_size must be at least 1".into()));
        }
        let min_cell_size = self.min_cell_size.max(1);
        if let Some(max) = self.max_cell_size {
            if max < min_cell_size {
                return Err(ConfigError::InvalidGrid(format!(
                    "max_cell_size {max} is below min_cell_size {min_cell_size}"
                )));
            }
        }
        Ok(Self {
            min_cell_size,
            ..self.clone()
        })
    }
}

// ─── GridContext ────────────────────────────────────────────────────────────

/// Immutable category and cell tables for one entity table and grid size.
#[derive(Clone, Debug)]
pub struct GridContext {
    config: GridConfig,
    categories: BTreeMap<String, Category>,
    cells: CellTable,
    prune_report: PruneReport,
}

impl GridContext {
    /// Derive categories, prune the value universe and build the cell table.
    pub fn build(table: &EntityTable, defs: &[CategoryDef], config: GridConfig) -> Result<Self, ConfigError> {
        let config = config.validated()?;
        let universe = ValueUniverse::build(table, defs, config.field_size)?;
        let headers = universe.headers();
        let (categories, prune_report) = universe.into_parts();
        let cells = CellTable::build(&categories, &headers, config.min_cell_size, config.max_cell_size);
        info!(
            "grid context ready: {} categories, {} headers, {} cells",
            categories.len(),
            cells.headers().len(),
            cells.len()
        );
        Ok(Self {
            config,
            categories,
            cells,
            prune_report,
        })
    }

    /// Effective configuration (after clamping).
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// Grid dimension N.
    pub fn field_size(&self) -> usize {
        self.config.field_size
    }

    /// Categories by key.
    pub fn categories(&self) -> &BTreeMap<String, Category> {
        &self.categories
    }

    /// One category.
    pub fn category(&self, key: &str) -> Option<&Category> {
        self.categories.get(key)
    }

    /// Whether `key` names a multi-nominal category.
    pub fn is_multi_valued(&self, key: &str) -> bool {
        self.categories.get(key).map_or(false, Category::is_multi_valued)
    }

    /// Header universe: every header with at least one surviving cell, sorted.
    pub fn headers(&self) -> &[Header] {
        self.cells.headers()
    }

    /// Number of surviving headers.
    pub fn header_count(&self) -> usize {
        self.cells.headers().len()
    }

    /// Number of stored cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// The cell table.
    pub fn cells(&self) -> &CellTable {
        &self.cells
    }

    /// A cell builder over the pruned categories.
    pub fn cell_builder(&self) -> CellBuilder<'_> {
        CellBuilder::new(&self.categories)
    }

    /// Primary solutions of a header pair, in either order.
    pub fn solutions(&self, a: &Header, b: &Header) -> Option<&[EntityId]> {
        self.cells.contents(a, b)
    }

    /// Alternate solutions of a header pair, in either order.
    pub fn alt_solutions(&self, a: &Header, b: &Header) -> Option<&[EntityId]> {
        self.cells.alt_contents(a, b)
    }

    /// Display label of a header.
    pub fn label(&self, header: &Header) -> String {
        match self.categories.get(&header.category) {
            Some(cat) => cat.label(&header.value),
            None => header.to_string(),
        }
    }

    /// What the pruning fixpoint removed.
    pub fn prune_report(&self) -> &PruneReport {
        &self.prune_report
    }
}
