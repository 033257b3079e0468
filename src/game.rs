//! Immutable game output.
//!
//! A [`Game`] is created by the sampler and never changes its solutions
//! afterwards. Scoring collaborators may attach auxiliary metadata through
//! [`Game::insert_data`].

use std::collections::BTreeMap;
use std::fmt;

use crate::context::GridContext;
use crate::entity::EntityId;
use crate::header::Header;

/// Auxiliary metadata value attached to a game.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum DataValue {
    /// Flag.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Text.
    Text(String),
}

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for DataValue {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// `snake_case` to `camelCase`: `"sample_tries"` becomes `"sampleTries"`.
pub fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for (i, part) in key.split('_').filter(|p| !p.is_empty()).enumerate() {
        if i == 0 {
            out.push_str(part);
            continue;
        }
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

type Matrix = Vec<Vec<Vec<EntityId>>>;

/// One accepted N × N grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Game {
    size: usize,
    rows: Vec<Header>,
    cols: Vec<Header>,
    solutions: Matrix,
    alt_solutions: Matrix,
    data: BTreeMap<String, DataValue>,
    sample_tries: usize,
}

impl Game {
    /// Resolve every `(row, col)` cell of the grid against the context.
    pub(crate) fn from_grid(ctx: &GridContext, rows: Vec<Header>, cols: Vec<Header>, sample_tries: usize) -> Self {
        let lookup = |alt: bool| -> Matrix {
            rows.iter()
                .map(|r| {
                    cols.iter()
                        .map(|c| {
                            let found = if alt { ctx.alt_solutions(r, c) } else { ctx.solutions(r, c) };
                            found.map(<[EntityId]>::to_vec).unwrap_or_default()
                        })
                        .collect()
                })
                .collect()
        };
        let solutions = lookup(false);
        let alt_solutions = lookup(true);
        Self {
            size: rows.len(),
            rows,
            cols,
            solutions,
            alt_solutions,
            data: BTreeMap::new(),
            sample_tries,
        }
    }

    /// Grid dimension N.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Row headers, top to bottom.
    pub fn rows(&self) -> &[Header] {
        &self.rows
    }

    /// Column headers, left to right.
    pub fn cols(&self) -> &[Header] {
        &self.cols
    }

    /// N × N primary solutions, indexed `[row][col]`.
    pub fn solutions(&self) -> &[Vec<Vec<EntityId>>] {
        &self.solutions
    }

    /// N × N alternate solutions, indexed `[row][col]`.
    pub fn alt_solutions(&self) -> &[Vec<Vec<EntityId>>] {
        &self.alt_solutions
    }

    /// Primary solutions of one cell.
    pub fn solution(&self, row: usize, col: usize) -> Option<&[EntityId]> {
        self.solutions.get(row)?.get(col).map(Vec::as_slice)
    }

    /// Alternate solutions of one cell.
    pub fn alt_solution(&self, row: usize, col: usize) -> Option<&[EntityId]> {
        self.alt_solutions.get(row)?.get(col).map(Vec::as_slice)
    }

    /// 0-based index of the attempt that produced this game.
    pub fn sample_tries(&self) -> usize {
        self.sample_tries
    }

    /// Auxiliary metadata.
    pub fn data(&self) -> &BTreeMap<String, DataValue> {
        &self.data
    }

    /// Attach metadata, replacing any previous value under `key`.
    pub fn insert_data(&mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Option<DataValue> {
        self.data.insert(key.into(), value.into())
    }

    /// Text table with header labels; cells list their solutions as
    /// `"A,B,(C)"` (alternates parenthesised) when `with_solutions` is set.
    pub fn render(&self, ctx: &GridContext, with_solutions: bool) -> String {
        let col_labels: Vec<String> = self.cols.iter().map(|h| ctx.label(h)).collect();
        let row_labels: Vec<String> = self.rows.iter().map(|h| ctx.label(h)).collect();

        let body: Vec<Vec<String>> = (0..self.rows.len())
            .map(|r| {
                (0..self.cols.len())
                    .map(|c| {
                        if with_solutions {
                            cell_text(&self.solutions[r][c], &self.alt_solutions[r][c])
                        } else {
                            String::new()
                        }
                    })
                    .collect()
            })
            .collect();

        let label_width = row_labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let widths: Vec<usize> = col_labels
            .iter()
            .enumerate()
            .map(|(c, label)| {
                body.iter()
                    .map(|row| row[c].chars().count())
                    .chain(std::iter::once(label.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        let line = |first: &str, cells: &[String]| -> String {
            let mut s = format!("{first:<label_width$}");
            for (cell, &w) in cells.iter().zip(&widths) {
                s.push_str(" | ");
                s.push_str(&format!("{cell:<w$}"));
            }
            s.trim_end().to_string()
        };
        out.push_str(&line("", &col_labels));
        out.push('\n');
        for (label, row) in row_labels.iter().zip(&body) {
            out.push_str(&line(label, row));
            out.push('\n');
        }
        out
    }
}

fn cell_text(primary: &[EntityId], alt: &[EntityId]) -> String {
    let join = |ids: &[EntityId]| ids.iter().map(EntityId::as_str).collect::<Vec<_>>().join(",");
    if alt.is_empty() {
        join(primary)
    } else {
        format!("{},({})", join(primary), join(alt))
    }
}

// ─── Export ─────────────────────────────────────────────────────────────────

#[cfg(feature = "serde")]
mod record {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use super::{camel_case, DataValue, Game};
    use crate::entity::EntityId;
    use crate::header::{Header, Value};

    /// `{"category": key, "value": value}`.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct HeaderRecord {
        /// Category key.
        pub category: String,
        /// Header value; `true` for boolean headers.
        pub value: Value,
    }

    impl From<&Header> for HeaderRecord {
        fn from(h: &Header) -> Self {
            Self {
                category: h.category.clone(),
                value: h.value.clone(),
            }
        }
    }

    /// The JSON export shape of a game.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct GameRecord {
        /// Grid dimension N.
        pub size: usize,
        /// N × N primary solutions.
        pub solutions: Vec<Vec<Vec<EntityId>>>,
        /// N × N alternate solutions.
        #[serde(rename = "alternativeSolutions")]
        pub alt_solutions: Vec<Vec<Vec<EntityId>>>,
        /// Row headers.
        pub rows: Vec<HeaderRecord>,
        /// Column headers.
        pub cols: Vec<HeaderRecord>,
        /// Auxiliary metadata with camelCase keys.
        pub data: BTreeMap<String, DataValue>,
    }

    impl From<&Game> for GameRecord {
        fn from(game: &Game) -> Self {
            Self {
                size: game.size,
                solutions: game.solutions.clone(),
                alt_solutions: game.alt_solutions.clone(),
                rows: game.rows.iter().map(HeaderRecord::from).collect(),
                cols: game.cols.iter().map(HeaderRecord::from).collect(),
                data: game
                    .data
                    .iter()
                    .map(|(k, v)| (camel_case(k), v.clone()))
                    .collect(),
            }
        }
    }

    impl Game {
        /// Export shape of this game.
        pub fn to_record(&self) -> GameRecord {
            GameRecord::from(self)
        }
    }
}

#[cfg(feature = "serde")]
pub use record::{GameRecord, HeaderRecord};
