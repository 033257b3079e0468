/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Value universe: per-value entity sets for every category, pruned to a
//! fixpoint.
//!
//! # Pruning
//!
//! Repeat until nothing changes:
//!
//! 1. drop every `(category, value)` whose entity set has fewer than
//!    `field_size` members; such a header can never fill a whole axis;
//! 2. count, per entity, how many distinct categories still reference it
//!    and drop entities referenced by fewer than two categories from every
//!    remaining set; such an entity can never be the joint solution of a
//!    row and a column.
//!
//! Alternate sets are grouped once and left untouched by pruning. An entity
//! pruned from the primary sets can still be an accepted alternate answer.

use std::collections::{BTreeMap, BTreeSet};

use log::info;

use crate::category::{Category, CategoryDef};
use crate::entity::{EntityId, EntityTable};
use crate::error::ConfigError;
use crate::header::Header;

/// What the pruning fixpoint removed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Number of passes until the fixpoint was reached.
    pub rounds: usize,
    /// `(category, value)` sets dropped for being smaller than `field_size`.
    pub removed_sets: usize,
    /// Entities dropped for being referenced by fewer than two categories.
    pub removed_entities: BTreeSet<EntityId>,
}

/// All categories of a puzzle with grouped and pruned value sets.
#[derive(Clone, Debug)]
pub struct ValueUniverse {
    categories: BTreeMap<String, Category>,
    report: PruneReport,
}

impl ValueUniverse {
    /// Derive, group and prune every declared category.
    pub fn build(table: &EntityTable, defs: &[CategoryDef], field_size: usize) -> Result<Self, ConfigError> {
        let mut categories = BTreeMap::new();
        for def in defs {
            if categories.contains_key(&def.key) {
                return Err(ConfigError::DuplicateCategory(def.key.clone()));
            }
            let mut category = Category::derive(def, table)?;
            group(&mut category);
            categories.insert(def.key.clone(), category);
        }
        let report = prune(&mut categories, field_size);
        Ok(Self { categories, report })
    }

    /// Categories by key.
    pub fn categories(&self) -> &BTreeMap<String, Category> {
        &self.categories
    }

    /// Pruning summary.
    pub fn report(&self) -> &PruneReport {
        &self.report
    }

    /// Every surviving header, sorted.
    pub fn headers(&self) -> Vec<Header> {
        self.categories
            .values()
            .flat_map(|cat| cat.header_values().map(move |v| Header::new(cat.key.clone(), v.clone())))
            .collect()
    }

    pub(crate) fn into_parts(self) -> (BTreeMap<String, Category>, PruneReport) {
        (self.categories, self.report)
    }
}

/// Group per-entity values into `sets` and `alt_sets`.
///
/// Entity lists come out sorted because the per-entity maps are ordered by
/// id. An entity already in `sets[v]` is never listed in `alt_sets[v]`.
pub fn group(category: &mut Category) {
    let mut sets: BTreeMap<_, Vec<EntityId>> = BTreeMap::new();
    for (id, values) in &category.values {
        for value in values {
            sets.entry(value.clone()).or_default().push(id.clone());
        }
    }

    let mut alt_sets: BTreeMap<_, Vec<EntityId>> = BTreeMap::new();
    if let Some(alt_values) = &category.alt_values {
        for (id, values) in alt_values {
            for value in values {
                let primary = sets.get(value).map_or(&[][..], Vec::as_slice);
                if primary.binary_search(id).is_err() {
                    alt_sets.entry(value.clone()).or_default().push(id.clone());
                }
            }
        }
    }

    category.sets = sets;
    category.alt_sets = alt_sets;
}

/// Run the pruning fixpoint over `categories`.
pub fn prune(categories: &mut BTreeMap<String, Category>, field_size: usize) -> PruneReport {
    let mut report = PruneReport::default();
    loop {
        report.rounds += 1;

        let before: usize = categories.values().map(Category::value_count).sum();
        for cat in categories.values_mut() {
            cat.sets.retain(|_, ids| ids.len() >= field_size);
        }
        let after: usize = categories.values().map(Category::value_count).sum();
        if before != after {
            info!("removed {} category sets", before - after);
            report.removed_sets += before - after;
        }

        // Distinct categories referencing each entity.
        let mut support: BTreeMap<&EntityId, usize> = BTreeMap::new();
        for cat in categories.values() {
            let members: BTreeSet<&EntityId> = cat.sets.values().flatten().collect();
            for id in members {
                *support.entry(id).or_default() += 1;
            }
        }
        let remove: BTreeSet<EntityId> = support
            .into_iter()
            .filter(|&(_, n)| n < 2)
            .map(|(id, _)| id.clone())
            .collect();

        if remove.is_empty() {
            break;
        }
        info!("removed {} entities, repeating", remove.len());
        for cat in categories.values_mut() {
            for ids in cat.sets.values_mut() {
                ids.retain(|id| !remove.contains(id));
            }
        }
        report.removed_entities.extend(remove);
    }
    report
}
