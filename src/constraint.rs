/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Declarative occurrence constraints over a (partial) grid.
//!
//! A constraint counts how many items of an [`Assignment`] match its
//! predicate and compares the count against a target:
//!
//! - **category-level** constraints match headers (`(key, value)` pairs of
//!   rows and columns);
//! - **cell-level** constraints match realized cells `(row, col, contents)`,
//!   which allows rules such as "no entity solves more than two cells".
//!
//! [`Constraint::balance`] drives candidate filtering during assembly;
//! [`Constraint::holds`] is the final acceptance gate.

use std::fmt;
use std::sync::Arc;

use crate::entity::EntityId;
use crate::header::Header;

/// Comparison of the match count against the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// `count <= target`
    AtMost,
    /// `count == target`
    Exactly,
    /// `count >= target`
    AtLeast,
}

/// `(needs, room)` of a constraint against an assignment.
///
/// `needs` is reported for `Exactly`/`AtLeast`, `room` for
/// `Exactly`/`AtMost`; both are `target - count`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Balance {
    /// How many more matches the minimum still requires.
    pub needs: Option<i64>,
    /// How many more matches the maximum still allows.
    pub room: Option<i64>,
}

impl Balance {
    /// The minimum is not met yet.
    pub fn is_underfed(&self) -> bool {
        self.needs.map_or(false, |n| n > 0)
    }

    /// The maximum is reached: any further match violates the constraint.
    pub fn is_overfed(&self) -> bool {
        self.room.map_or(false, |r| r <= 0)
    }
}

/// A realized cell as seen by cell-level constraints.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellView<'a> {
    /// Row header.
    pub row: &'a Header,
    /// Column header.
    pub col: &'a Header,
    /// Primary solutions of the cell.
    pub contents: &'a [EntityId],
}

/// Headers and realized cells a constraint is evaluated against.
#[derive(Clone, Debug, Default)]
pub struct Assignment<'a> {
    /// Every placed header (rows and columns).
    pub headers: Vec<&'a Header>,
    /// Every realized row × column cell.
    pub cells: Vec<CellView<'a>>,
}

impl<'a> Assignment<'a> {
    /// Assignment of the given headers and cells.
    pub fn new(headers: impl IntoIterator<Item = &'a Header>, cells: Vec<CellView<'a>>) -> Self {
        Self {
            headers: headers.into_iter().collect(),
            cells,
        }
    }
}

type HeaderPredicate = Arc<dyn Fn(&Header) -> bool + Send + Sync>;
type CellPredicate = Arc<dyn Fn(&CellView<'_>) -> bool + Send + Sync>;

#[derive(Clone)]
enum Predicate {
    Header(HeaderPredicate),
    Cell(CellPredicate),
}

/// A counted predicate with a target and a [`Mode`].
#[derive(Clone)]
pub struct Constraint {
    predicate: Predicate,
    num: usize,
    mode: Mode,
    label: String,
}

impl Constraint {
    // ── construction ───────────────────────────────────────────────────────

    /// Category-level constraint over an arbitrary header predicate.
    pub fn headers<F>(prop: F, num: usize, mode: Mode) -> Self
    where
        F: Fn(&Header) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Predicate::Header(Arc::new(prop)),
            num,
            mode,
            label: "headers".to_string(),
        }
    }

    /// Cell-level constraint over an arbitrary cell predicate.
    pub fn cells<F>(prop: F, num: usize, mode: Mode) -> Self
    where
        F: Fn(&CellView<'_>) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Predicate::Cell(Arc::new(prop)),
            num,
            mode,
            label: "cells".to_string(),
        }
    }

    /// Headers of category `key`.
    pub fn category(key: &str, num: usize, mode: Mode) -> Self {
        let owned = key.to_string();
        Self::headers(move |h| h.category == owned, num, mode).with_label(format!("category '{key}'"))
    }

    /// Exactly `num` headers of category `key`.
    pub fn category_exactly(key: &str, num: usize) -> Self {
        Self::category(key, num, Mode::Exactly)
    }

    /// At most `num` headers of category `key`.
    pub fn category_at_most(key: &str, num: usize) -> Self {
        Self::category(key, num, Mode::AtMost)
    }

    /// At least `num` headers of category `key`.
    pub fn category_at_least(key: &str, num: usize) -> Self {
        Self::category(key, num, Mode::AtLeast)
    }

    /// Exactly one matching header.
    pub fn once<F>(prop: F) -> Self
    where
        F: Fn(&Header) -> bool + Send + Sync + 'static,
    {
        Self::headers(prop, 1, Mode::Exactly)
    }

    /// No matching header.
    pub fn never<F>(prop: F) -> Self
    where
        F: Fn(&Header) -> bool + Send + Sync + 'static,
    {
        Self::headers(prop, 0, Mode::Exactly)
    }

    /// At most one matching header.
    pub fn at_most_once<F>(prop: F) -> Self
    where
        F: Fn(&Header) -> bool + Send + Sync + 'static,
    {
        Self::headers(prop, 1, Mode::AtMost)
    }

    /// One cell constraint per entity: each may solve at most `num` cells.
    pub fn solutions_at_most<I>(entities: I, num: usize) -> impl Iterator<Item = Self>
    where
        I: IntoIterator<Item = EntityId>,
    {
        entities.into_iter().map(move |id| {
            let label = format!("solutions of '{id}'");
            Self::cells(move |cell| cell.contents.contains(&id), num, Mode::AtMost).with_label(label)
        })
    }

    /// Replace the label shown in diagnostics.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    // ── introspection ──────────────────────────────────────────────────────

    /// `true` for category-level constraints, `false` for cell-level ones.
    pub fn applies_to_category(&self) -> bool {
        matches!(self.predicate, Predicate::Header(_))
    }

    /// Target count.
    pub fn num(&self) -> usize {
        self.num
    }

    /// Comparison mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Diagnostic label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Exactly one.
    pub fn is_once(&self) -> bool {
        self.num == 1 && self.mode == Mode::Exactly
    }

    /// Exactly zero.
    pub fn is_never(&self) -> bool {
        self.num == 0 && self.mode == Mode::Exactly
    }

    // ── evaluation ─────────────────────────────────────────────────────────

    /// Whether a header matches. Always `false` for cell-level constraints.
    pub fn matches_header(&self, header: &Header) -> bool {
        match &self.predicate {
            Predicate::Header(p) => p(header),
            Predicate::Cell(_) => false,
        }
    }

    /// Whether a cell matches. Always `false` for category-level constraints.
    pub fn matches_cell(&self, cell: &CellView<'_>) -> bool {
        match &self.predicate {
            Predicate::Cell(p) => p(cell),
            Predicate::Header(_) => false,
        }
    }

    /// Number of matching items of the assignment.
    pub fn count(&self, assignment: &Assignment<'_>) -> usize {
        match &self.predicate {
            Predicate::Header(p) => assignment.headers.iter().filter(|h| p(h)).count(),
            Predicate::Cell(p) => assignment.cells.iter().filter(|c| p(c)).count(),
        }
    }

    /// Remaining deficit and headroom against the assignment.
    pub fn balance(&self, assignment: &Assignment<'_>) -> Balance {
        let diff = self.num as i64 - self.count(assignment) as i64;
        Balance {
            needs: matches!(self.mode, Mode::Exactly | Mode::AtLeast).then_some(diff),
            room: matches!(self.mode, Mode::Exactly | Mode::AtMost).then_some(diff),
        }
    }

    /// Whether the assignment satisfies the constraint.
    pub fn holds(&self, assignment: &Assignment<'_>) -> bool {
        let n = self.count(assignment);
        match self.mode {
            Mode::AtMost => n <= self.num,
            Mode::Exactly => n == self.num,
            Mode::AtLeast => n >= self.num,
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("label", &self.label)
            .field("level", &if self.applies_to_category() { "category" } else { "cell" })
            .field("num", &self.num)
            .field("mode", &self.mode)
            .finish()
    }
}
