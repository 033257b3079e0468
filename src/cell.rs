/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Cells: the realized intersection of two headers.
//!
//! [`CellBuilder`] decides which header pairs may meet and computes their
//! primary and alternate solution sets. [`CellTable`] holds every surviving
//! cell under one canonical key per unordered pair and is read-only once
//! built, so any number of samplers may share it.
//!
//! # Alternate contamination
//!
//! Two categories reading the same text attribute through different
//! extractors (starting letter and ending letter of the capital, say) could
//! be satisfied by *two different* alternate spellings of one entity:
//! "capital starts with P and ends with N" would list South Africa because
//! of **P**retoria and Cape Tow**n**. An alternate solution of such a pair is
//! kept only if a single raw value satisfies both extractors.
//!
//! # Invariants
//!
//! - `contents` and `alt_contents` are disjoint and sorted by entity id.
//! - `min_cell_size <= contents.len() <= max_cell_size` for every stored cell.
//! - Every header of the table has at least one stored cell.

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashMap;
use log::info;

use crate::category::Category;
use crate::entity::EntityId;
use crate::header::Header;

// ─── Cell ───────────────────────────────────────────────────────────────────

/// One stored cell. `row` is the lexicographically larger header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    /// Larger header of the pair.
    pub row: Header,
    /// Smaller header of the pair.
    pub col: Header,
    /// Entities satisfying both headers through primary values, sorted.
    pub contents: Vec<EntityId>,
    /// Entities satisfying both only through alternates, sorted.
    pub alt_contents: Vec<EntityId>,
}

// ─── CellBuilder ────────────────────────────────────────────────────────────

/// Computes cells from the pruned categories.
#[derive(Clone, Copy, Debug)]
pub struct CellBuilder<'a> {
    categories: &'a BTreeMap<String, Category>,
}

impl<'a> CellBuilder<'a> {
    /// Builder over a set of pruned categories.
    pub fn new(categories: &'a BTreeMap<String, Category>) -> Self {
        Self { categories }
    }

    /// Whether `h1` and `h2` may form a cell.
    ///
    /// Headers of different categories always may. Within one category only
    /// different values of a multi-nominal category may, since one entity
    /// can hold both.
    pub fn admissible(&self, h1: &Header, h2: &Header) -> bool {
        if h1.category != h2.category {
            return true;
        }
        if h1.value == h2.value {
            return false;
        }
        self.categories
            .get(&h1.category)
            .map_or(false, Category::is_multi_valued)
    }

    /// Primary solutions: `entities(h1) ∩ entities(h2)`, sorted.
    pub fn build(&self, h1: &Header, h2: &Header) -> Vec<EntityId> {
        let (Some(a), Some(b)) = (self.entities(h1), self.entities(h2)) else {
            return Vec::new();
        };
        // Both inputs are sorted; merge-intersect.
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    out.push(a[i].clone());
                    i += 1;
                    j += 1;
                }
            }
        }
        out
    }

    /// Alternate solutions of the pair, given its primary `contents`.
    ///
    /// `(entities ∪ alt_entities)(h1) ∩ (entities ∪ alt_entities)(h2) − contents`,
    /// filtered against contamination when both headers derive from the same
    /// text attribute through extractors.
    pub fn build_alt(&self, h1: &Header, h2: &Header, contents: &[EntityId]) -> Vec<EntityId> {
        let (Some(cat1), Some(cat2)) = (self.categories.get(&h1.category), self.categories.get(&h2.category)) else {
            return Vec::new();
        };

        let all1: BTreeSet<&EntityId> = cat1
            .entities(&h1.value)
            .iter()
            .chain(cat1.alt_entities(&h1.value))
            .collect();
        let all2: BTreeSet<&EntityId> = cat2
            .entities(&h2.value)
            .iter()
            .chain(cat2.alt_entities(&h2.value))
            .collect();
        let candidates: Vec<&EntityId> = all1
            .intersection(&all2)
            .copied()
            .filter(|id| contents.binary_search(*id).is_err())
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }

        let shared_text = cat1.kind().attribute() == cat2.kind().attribute()
            && cat1.kind().extractor().is_some()
            && cat2.kind().extractor().is_some();
        if !shared_text {
            return candidates.into_iter().cloned().collect();
        }

        candidates
            .into_iter()
            .filter(|id| {
                let raw = cat1.raw_texts(id);
                let src1: BTreeSet<&str> = raw
                    .iter()
                    .filter(|x| cat1.extracts_to(x, &h1.value))
                    .map(String::as_str)
                    .collect();
                raw.iter()
                    .filter(|x| cat2.extracts_to(x, &h2.value))
                    .any(|x| src1.contains(x.as_str()))
            })
            .cloned()
            .collect()
    }

    fn entities(&self, header: &Header) -> Option<&'a [EntityId]> {
        self.categories
            .get(&header.category)
            .map(|cat| cat.entities(&header.value))
    }
}

// ─── CellTable ──────────────────────────────────────────────────────────────

/// Summary of a cell table build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellReport {
    /// Admissible pairs with a computed cell, before size filtering.
    pub generated: usize,
    /// Cells kept by the size filter.
    pub retained: usize,
    /// Headers dropped because none of their cells survived.
    pub removed_headers: usize,
}

/// Canonical, read-only lookup of every surviving cell.
///
/// Headers are interned in sorted order, so the larger index of a pair is
/// also the lexicographically larger header; that index goes first in the key.
#[derive(Clone, Debug, Default)]
pub struct CellTable {
    headers: Vec<Header>,
    index: HashMap<Header, usize>,
    cells: HashMap<(usize, usize), Cell>,
    report: CellReport,
}

impl CellTable {
    /// Compute, filter and index the cells over `headers`.
    ///
    /// Cells whose primary contents fall outside `[min_cell_size,
    /// max_cell_size]` are dropped; headers left without any cell are then
    /// removed from the table's header universe.
    pub fn build(
        categories: &BTreeMap<String, Category>,
        headers: &[Header],
        min_cell_size: usize,
        max_cell_size: Option<usize>,
    ) -> Self {
        let builder = CellBuilder::new(categories);
        let mut sorted = headers.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut generated = 0;
        let mut kept: Vec<Cell> = Vec::new();
        for (i, h1) in sorted.iter().enumerate() {
            for h2 in &sorted[i + 1..] {
                if !builder.admissible(h1, h2) {
                    continue;
                }
                generated += 1;
                let contents = builder.build(h1, h2);
                let size = contents.len();
                if size < min_cell_size || max_cell_size.map_or(false, |max| size > max) {
                    continue;
                }
                let alt_contents = builder.build_alt(h1, h2, &contents);
                kept.push(Cell {
                    row: h2.clone(),
                    col: h1.clone(),
                    contents,
                    alt_contents,
                });
            }
        }
        info!("generated {} sets and {} cells", sorted.len(), generated);

        let surviving: BTreeSet<&Header> = kept.iter().flat_map(|c| [&c.row, &c.col]).collect();
        let table_headers: Vec<Header> = surviving.into_iter().cloned().collect();
        let removed_headers = sorted.len() - table_headers.len();
        let max_label = max_cell_size.map_or_else(|| "any".to_string(), |m| m.to_string());
        info!("retained {} cells (of size {}-{})", kept.len(), min_cell_size, max_label);
        if removed_headers > 0 {
            info!("cell filtering removed {removed_headers} key/value sets");
        }

        let index: HashMap<Header, usize> = table_headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), i))
            .collect();
        let report = CellReport {
            generated,
            retained: kept.len(),
            removed_headers,
        };
        let cells = kept
            .into_iter()
            .filter_map(|cell| {
                let key = (*index.get(&cell.row)?, *index.get(&cell.col)?);
                Some((key, cell))
            })
            .collect();

        Self {
            headers: table_headers,
            index,
            cells,
            report,
        }
    }

    /// Surviving headers, sorted.
    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Number of stored cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// `true` when no cell survived.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Build summary.
    pub fn report(&self) -> &CellReport {
        &self.report
    }

    /// Canonical key of an unordered pair, if both headers are known.
    fn key(&self, a: &Header, b: &Header) -> Option<(usize, usize)> {
        let i = *self.index.get(a)?;
        let j = *self.index.get(b)?;
        Some(if i >= j { (i, j) } else { (j, i) })
    }

    /// The cell of `a` and `b`, in either order.
    pub fn get(&self, a: &Header, b: &Header) -> Option<&Cell> {
        self.key(a, b).and_then(|k| self.cells.get(&k))
    }

    /// Whether the pair has a stored cell.
    pub fn contains(&self, a: &Header, b: &Header) -> bool {
        self.get(a, b).is_some()
    }

    /// Primary solutions of the pair, in either order.
    pub fn contents(&self, a: &Header, b: &Header) -> Option<&[EntityId]> {
        self.get(a, b).map(|c| c.contents.as_slice())
    }

    /// Alternate solutions of the pair, in either order.
    pub fn alt_contents(&self, a: &Header, b: &Header) -> Option<&[EntityId]> {
        self.get(a, b).map(|c| c.alt_contents.as_slice())
    }

    /// Every stored cell, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{CategoryDef, Extractor};
    use crate::entity::{Entity, EntityTable};
    use crate::header::Value;
    use crate::universe::ValueUniverse;

    fn ids(list: &[&str]) -> Vec<EntityId> {
        list.iter().map(|s| EntityId::from(*s)).collect()
    }

    fn capital_categories(table: &EntityTable) -> BTreeMap<String, Category> {
        let defs = [
            CategoryDef::extracted("cap_start", "Capital starting letter", 1.5, "capital", Extractor::FirstLetter),
            CategoryDef::extracted("cap_end", "Capital ending letter", 3.0, "capital", Extractor::LastLetter),
        ];
        ValueUniverse::build(table, &defs, 1).expect("builds").into_parts().0
    }

    #[test]
    fn test_admissible() {
        let table: EntityTable = [Entity::new("A")
            .with("continent", "EU")
            .with("flag_colors", vec!["Red", "White"])]
        .into_iter()
        .collect();
        let defs = [
            CategoryDef::nominal("continent", "Continent", 1.0, "continent"),
            CategoryDef::multi_nominal("flag_colors", "Flag color", 1.5, "flag_colors"),
        ];
        let (categories, _) = ValueUniverse::build(&table, &defs, 1).expect("builds").into_parts();
        let builder = CellBuilder::new(&categories);

        let eu = Header::new("continent", "EU");
        let af = Header::new("continent", "AF");
        let red = Header::new("flag_colors", "Red");
        let white = Header::new("flag_colors", "White");

        assert!(!builder.admissible(&eu, &eu));
        assert!(!builder.admissible(&eu, &af));
        assert!(builder.admissible(&eu, &red));
        assert!(builder.admissible(&red, &white));
        assert!(!builder.admissible(&red, &red));
        assert_eq!(builder.build(&red, &white), ids(&["A"]));
    }

    #[test]
    fn test_alt_contents_reject_cross_value_contamination() {
        // Pretoria starts with P; Cape Town ends with N. No single capital
        // of ZA does both, so ZA is not an alternate solution of (P, N).
        // Bern and "Pern" are the same-value case: Pern starts with P and
        // ends with N, so CH stays.
        let table: EntityTable = [
            Entity::new("ZA")
                .with("capital", "Pretoria")
                .with("capital_alt", vec!["Tshwane", "Cape Town"]),
            Entity::new("CH").with("capital", "Bern").with("capital_alt", vec!["Pern"]),
            Entity::new("XX").with("capital", "Cape Town").with("capital_alt", Vec::<&str>::new()),
        ]
        .into_iter()
        .collect();
        let categories = capital_categories(&table);
        let builder = CellBuilder::new(&categories);

        let p = Header::new("cap_start", "P");
        let n = Header::new("cap_end", "N");
        let contents = builder.build(&p, &n);
        assert!(contents.is_empty());
        assert_eq!(builder.build_alt(&p, &n, &contents), ids(&["CH"]));
    }

    #[test]
    fn test_alt_contents_without_shared_attribute_are_unfiltered() {
        let table: EntityTable = [
            Entity::new("ZA")
                .with("capital", "Pretoria")
                .with("name", "South Africa")
                .with("name_alt", vec!["Azania"]),
            Entity::new("PL").with("capital", "Warsaw").with("name", "Poland"),
        ]
        .into_iter()
        .collect();
        let defs = [
            CategoryDef::extracted("cap_start", "Capital starting letter", 1.5, "capital", Extractor::FirstLetter),
            CategoryDef::extracted("start", "Starting letter", 1.0, "name", Extractor::FirstLetter),
        ];
        let (categories, _) = ValueUniverse::build(&table, &defs, 1).expect("builds").into_parts();
        let builder = CellBuilder::new(&categories);

        let p = Header::new("cap_start", "P");
        let a = Header::new("start", "A");
        assert!(builder.build(&p, &a).is_empty());
        assert_eq!(builder.build_alt(&p, &a, &[]), ids(&["ZA"]));
    }

    #[test]
    fn test_table_is_canonical_and_size_filtered() {
        let table: EntityTable = [
            ("A", "X", "Red"),
            ("B", "X", "Blue"),
            ("C", "Y", "Red"),
            ("D", "Y", "Blue"),
            ("E", "X", "Red"),
        ]
        .into_iter()
        .map(|(id, r, c)| Entity::new(id).with("region", r).with("color", c))
        .collect();
        let defs = [
            CategoryDef::nominal("region", "Region", 1.0, "region"),
            CategoryDef::nominal("color", "Color", 1.0, "color"),
        ];
        let universe = ValueUniverse::build(&table, &defs, 1).expect("builds");
        let headers = universe.headers();
        let (categories, _) = universe.into_parts();

        let x = Header::new("region", "X");
        let red = Header::new("color", "Red");
        let blue = Header::new("color", "Blue");

        let all = CellTable::build(&categories, &headers, 1, None);
        assert_eq!(all.len(), 4);
        assert_eq!(all.contents(&x, &red), Some(&ids(&["A", "E"])[..]));
        assert_eq!(all.contents(&red, &x), Some(&ids(&["A", "E"])[..]));
        let cell = all.get(&red, &x).expect("stored");
        assert_eq!(cell.row, x);
        assert_eq!(cell.col, red);

        // A max size of 1 drops (X, Red); every header still has a cell.
        let capped = CellTable::build(&categories, &headers, 1, Some(1));
        assert_eq!(capped.len(), 3);
        assert!(!capped.contains(&x, &red));
        assert_eq!(capped.headers().len(), 4);
        assert_eq!(capped.contents(&x, &blue), Some(&ids(&["B"])[..]));

        // A min size of 2 keeps only (X, Red); Y and Blue lose every cell.
        let strict = CellTable::build(&categories, &headers, 2, None);
        assert_eq!(strict.len(), 1);
        assert_eq!(strict.headers(), &[red.clone(), x.clone()]);
        assert_eq!(strict.report().removed_headers, 2);
        assert!(strict.contents(&blue, &x).is_none());

        for cell in all.iter() {
            assert!(cell.row > cell.col);
            assert!(cell.contents.iter().all(|id| !cell.alt_contents.contains(id)));
        }
        assert_eq!(Value::text("X"), x.value);
    }
}
