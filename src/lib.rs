//! # gridmatch
//!
//! Category and cell precomputation plus constrained stochastic sampling of
//! N × N categorical-matching grids.
//!
//! ---
//!
//! ## The puzzle
//!
//! Every row and every column of the grid is labelled with a *header*: a
//! `(category, value)` pair such as `continent = EU` or `flag colors ∋ Red`.
//! A cell is solved by naming an entity that satisfies both its row and its
//! column header. A grid is playable only if every one of its N² cells has
//! at least one solution.
//!
//! ## The pipeline
//!
//! ```text
//! EntityTable ──▶ Category ──▶ ValueUniverse ──▶ CellTable ──▶ GameGenerator ──▶ Game
//!                  (derive)     (group, prune)    (intersect,     (assemble,
//!                                                   filter)        check, retry)
//!                              └──────────── GridContext ───────┘
//! ```
//!
//! The [`GridContext`] is built once per entity table and grid size and is
//! read-only afterwards; any number of generators may borrow it.
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`entity`] | [`EntityTable`], [`Entity`], [`EntityId`] | Read-only input rows with typed attributes |
//! | [`header`] | [`Header`], [`Value`] | Row/column labels |
//! | [`category`] | [`Category`], [`CategoryDef`], [`CategoryKind`] | Per-entity value derivation for every category variant |
//! | [`universe`] | [`ValueUniverse`], [`PruneReport`] | Value → entity sets, pruned to a fixpoint |
//! | [`cell`] | [`CellBuilder`], [`CellTable`] | Header pair intersections with contamination-safe alternates |
//! | [`context`] | [`GridContext`], [`GridConfig`] | The immutable shared context |
//! | [`constraint`] | [`Constraint`], [`Mode`] | Category- and cell-level occurrence constraints |
//! | [`generator`] | [`GameGenerator`], [`GeneratorConfig`] | Seeded generate-and-test grid sampler |
//! | [`game`] | [`Game`] | Immutable output, text rendering and JSON export shape |
//!
//! ## Example
//!
//! ```
//! use gridmatch::{CategoryDef, Entity, EntityTable, GameGenerator, GeneratorConfig, GridConfig, GridContext};
//!
//! let table: EntityTable = [("A", "X", "Red"), ("B", "X", "Blue"), ("C", "Y", "Red"), ("D", "Y", "Blue")]
//!     .into_iter()
//!     .map(|(id, region, color)| Entity::new(id).with("region", region).with("color", color))
//!     .collect();
//! let defs = [
//!     CategoryDef::nominal("region", "Region", 1.0, "region"),
//!     CategoryDef::nominal("color", "Color", 1.0, "color"),
//! ];
//! let ctx = GridContext::build(&table, &defs, GridConfig { field_size: 2, ..GridConfig::default() }).unwrap();
//!
//! let config = GeneratorConfig { seed: Some(7), uniform: true, ..GeneratorConfig::default() };
//! let mut generator = GameGenerator::new(&ctx, config, Vec::new()).unwrap();
//! let game = generator.sample_game().unwrap();
//! assert_eq!(game.size(), 2);
//! ```
//!
//! ## Features
//!
//! - `serde`: `Serialize`/`Deserialize` for configuration, headers and the
//!   `game::GameRecord` export shape.
//!
//! ## License
//!
//! Business Source License 1.1.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod category;
pub mod cell;
pub mod constraint;
pub mod context;
pub mod entity;
pub mod error;
pub mod game;
pub mod generator;
pub mod header;
pub mod universe;

pub use category::{Bound, Category, CategoryDef, CategoryKind, ComparisonOp, Extractor};
pub use cell::{Cell, CellBuilder, CellReport, CellTable};
pub use constraint::{Assignment, Balance, CellView, Constraint, Mode};
pub use context::{GridConfig, GridContext};
pub use entity::{AttrValue, Entity, EntityId, EntityTable};
pub use error::ConfigError;
pub use game::{DataValue, Game};
pub use generator::{GameGenerator, GeneratorConfig, GeneratorStats, SampleGames, SelectionMode};
pub use header::{Header, Value};
pub use universe::{PruneReport, ValueUniverse};
