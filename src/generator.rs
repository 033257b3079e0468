/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Constrained stochastic grid sampler.
//!
//! A grid is assembled in N rounds. Each round first samples a new column
//! against the placed rows (the *cross* axis) and columns (the *parallel*
//! axis), then a new row against the placed columns and rows.
//!
//! ```text
//! EMPTY ──col──▶ PARTIAL(0) ──row──▶ PARTIAL(1) ── … ──▶ FULL ──▶ ACCEPTED
//!                   │                    │                 │
//!                   └──── slot fails ────┴─────────────────┴──▶ REJECTED (retry)
//! ```
//!
//! A slot failure or a final-acceptance rejection discards the whole
//! attempt; there is no backtracking. After `max_tries` rejected attempts
//! [`GameGenerator::sample_game`] returns `None`.
//!
//! All randomness flows through one seeded [`StdRng`], so a generator built
//! with the same seed, context and configuration yields the same sequence of
//! games, including their `sample_tries`.

use std::collections::BTreeMap;
use std::fmt;
use std::iter::FusedIterator;
use std::str::FromStr;

use hashbrown::HashMap;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::constraint::{Assignment, CellView, Constraint};
use crate::context::GridContext;
use crate::entity::EntityId;
use crate::error::ConfigError;
use crate::game::Game;
use crate::header::Header;

// ─── Configuration ──────────────────────────────────────────────────────────

/// How candidate headers are ordered before the fitting scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SelectionMode {
    /// Weighted permutation of headers, each weighted by its category's
    /// probability divided by the category's header count.
    ShuffleSetkeys,
    /// Weighted permutation of categories; headers of one category are
    /// ordered uniformly at random and kept together.
    #[default]
    ShuffleCategories,
}

impl FromStr for SelectionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shuffle_setkeys" => Ok(Self::ShuffleSetkeys),
            "shuffle_categories" => Ok(Self::ShuffleCategories),
            other => Err(ConfigError::UnknownSelectionMode(other.to_string())),
        }
    }
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ShuffleSetkeys => "shuffle_setkeys",
            Self::ShuffleCategories => "shuffle_categories",
        })
    }
}

/// Sampler configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeneratorConfig {
    /// Relative probability per category key. Categories without an entry
    /// (or with probability 0) are only tried after all others.
    pub category_probs: BTreeMap<String, f64>,

    /// RNG seed. `None` seeds from the operating system.
    pub seed: Option<u64>,

    /// Candidate ordering strategy. Default: [`SelectionMode::ShuffleCategories`].
    pub selection_mode: SelectionMode,

    /// Ignore `category_probs` and weight every header (or category) equally.
    pub uniform: bool,

    /// Shuffle rows and columns of accepted grids and transpose with
    /// probability 1/2. Default: true.
    pub shuffle: bool,

    /// Attempts per game before giving up. Default: 100.
    pub max_tries: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            category_probs: BTreeMap::new(),
            seed: None,
            selection_mode: SelectionMode::default(),
            uniform: false,
            shuffle: true,
            max_tries: 100,
        }
    }
}

impl GeneratorConfig {
    /// Reject negative or non-finite category probabilities.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.category_probs.iter().find(|(_, p)| !p.is_finite() || **p < 0.0) {
            Some((category, &prob)) => Err(ConfigError::InvalidProbability {
                category: category.clone(),
                prob,
            }),
            None => Ok(()),
        }
    }
}

/// Diagnostic counters of one generator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeneratorStats {
    /// Grid attempts started.
    pub attempts: usize,
    /// Attempts aborted because a slot had no fitting header.
    pub slot_failures: usize,
    /// Full grids rejected by the final constraint check.
    pub rejected_by_constraints: usize,
    /// Games produced.
    pub games: usize,
    /// Calls that ran out of attempts.
    pub exhausted: usize,
}

// ─── Sampler ────────────────────────────────────────────────────────────────

/// Which axis the slot being filled belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Axis {
    Row,
    Col,
}

impl Axis {
    /// Cell of a candidate and a placed cross header, in grid orientation.
    fn view<'a>(self, candidate: &'a Header, cross: &'a Header, contents: &'a [EntityId]) -> CellView<'a> {
        match self {
            Self::Col => CellView {
                row: cross,
                col: candidate,
                contents,
            },
            Self::Row => CellView {
                row: candidate,
                col: cross,
                contents,
            },
        }
    }
}

/// A candidate header with the cells it would open against the cross axis.
struct Candidate<'a> {
    header: &'a Header,
    cells: Vec<CellView<'a>>,
}

/// Samples games from a shared [`GridContext`].
pub struct GameGenerator<'a> {
    ctx: &'a GridContext,
    config: GeneratorConfig,
    constraints: Vec<Constraint>,
    category_sizes: BTreeMap<&'a str, usize>,
    rng: StdRng,
    stats: GeneratorStats,
}

impl<'a> GameGenerator<'a> {
    /// Generator over `ctx` with the given configuration and constraints.
    pub fn new(ctx: &'a GridContext, config: GeneratorConfig, constraints: Vec<Constraint>) -> Result<Self, ConfigError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut category_sizes: BTreeMap<&'a str, usize> = BTreeMap::new();
        for h in ctx.headers() {
            *category_sizes.entry(h.category.as_str()).or_default() += 1;
        }
        Ok(Self {
            ctx,
            config,
            constraints,
            category_sizes,
            rng,
            stats: GeneratorStats::default(),
        })
    }

    /// The shared context.
    pub fn context(&self) -> &'a GridContext {
        self.ctx
    }

    /// Active configuration.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Declared constraints.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    /// Sample one game, retrying whole attempts up to `max_tries` times.
    pub fn sample_game(&mut self) -> Option<Game> {
        let max_tries = self.config.max_tries;
        let mut accepted = None;
        for attempt in 0..max_tries {
            self.stats.attempts += 1;
            if let Some(grid) = self.sample_setup() {
                accepted = Some((attempt, grid));
                break;
            }
        }

        let Some((tries, (mut rows, mut cols))) = accepted else {
            warn!("could not create game setup ({max_tries} tries)");
            self.stats.exhausted += 1;
            return None;
        };

        if self.config.shuffle {
            rows.shuffle(&mut self.rng);
            cols.shuffle(&mut self.rng);
            if self.rng.gen::<f64>() > 0.5 {
                std::mem::swap(&mut rows, &mut cols);
            }
        }

        self.stats.games += 1;
        Some(Game::from_grid(
            self.ctx,
            rows.into_iter().cloned().collect(),
            cols.into_iter().cloned().collect(),
            tries,
        ))
    }

    /// Lazily sample up to `n` games, stopping at the first failure.
    pub fn sample_games(&mut self, n: usize) -> SampleGames<'_, 'a> {
        info!("generate {n} games...");
        SampleGames {
            generator: self,
            remaining: n,
        }
    }

    /// Alias of [`sample_game`](Self::sample_game).
    pub fn generate_game(&mut self) -> Option<Game> {
        self.sample_game()
    }

    /// Alias of [`sample_games`](Self::sample_games).
    pub fn generate_games(&mut self, n: usize) -> SampleGames<'_, 'a> {
        self.sample_games(n)
    }

    /// One full attempt: N column/row rounds, then the acceptance check.
    fn sample_setup(&mut self) -> Option<(Vec<&'a Header>, Vec<&'a Header>)> {
        let n = self.ctx.field_size();
        let mut rows: Vec<&'a Header> = Vec::with_capacity(n);
        let mut cols: Vec<&'a Header> = Vec::with_capacity(n);

        for round in 0..n {
            let Some(col) = self.sample_fitting(&rows, &cols, Axis::Col) else {
                debug!("attempt aborted: no column fits in round {round}");
                self.stats.slot_failures += 1;
                return None;
            };
            cols.push(col);

            let Some(row) = self.sample_fitting(&cols, &rows, Axis::Row) else {
                debug!("attempt aborted: no row fits in round {round}");
                self.stats.slot_failures += 1;
                return None;
            };
            rows.push(row);
        }

        let full = Assignment::new(rows.iter().chain(&cols).copied(), self.grid_cells(&rows, &cols));
        if let Some(failed) = self.constraints.iter().find(|c| !c.holds(&full)) {
            debug!("grid rejected by constraint {failed:?}");
            self.stats.rejected_by_constraints += 1;
            return None;
        }
        Some((rows, cols))
    }

    /// Pick the header for one slot, or `None` if nothing fits.
    fn sample_fitting(&mut self, cross: &[&'a Header], parallel: &[&'a Header], axis: Axis) -> Option<&'a Header> {
        let allowed = self.allowed(cross, parallel, axis);
        if allowed.is_empty() {
            return None;
        }
        let ordered = self.order(allowed);
        let ctx = self.ctx;
        ordered.into_iter().find(|h| {
            cross
                .iter()
                .all(|c| ctx.solutions(h, c).map_or(false, |s| !s.is_empty()))
        })
    }

    /// Candidate filtering: uniqueness, category repetition, non-empty
    /// cells against the cross axis, then constraint balance.
    fn allowed(&self, cross: &[&'a Header], parallel: &[&'a Header], axis: Axis) -> Vec<&'a Header> {
        let ctx = self.ctx;
        let cross_cats = category_counts(cross);
        let parallel_cats = category_counts(parallel);

        let mut pool: Vec<Candidate<'a>> = ctx
            .headers()
            .iter()
            .filter(|h| !cross.contains(h) && !parallel.contains(h))
            .filter(|h| self.category_allowed(&h.category, &cross_cats, &parallel_cats))
            .filter_map(|h| {
                let cells = cross
                    .iter()
                    .map(|&c| {
                        let contents = ctx.solutions(h, c)?;
                        (!contents.is_empty()).then(|| axis.view(h, c, contents))
                    })
                    .collect::<Option<Vec<_>>>()?;
                Some(Candidate { header: h, cells })
            })
            .collect();

        if self.constraints.is_empty() {
            return pool.into_iter().map(|c| c.header).collect();
        }

        let (rows, cols) = match axis {
            Axis::Col => (cross, parallel),
            Axis::Row => (parallel, cross),
        };
        let placed = Assignment::new(cross.iter().chain(parallel).copied(), self.grid_cells(rows, cols));

        let mut overfed = Vec::new();
        let mut underfed_category = Vec::new();
        let mut underfed_cell = Vec::new();
        for c in &self.constraints {
            let balance = c.balance(&placed);
            if balance.is_overfed() {
                overfed.push(c);
            }
            if balance.is_underfed() {
                if c.applies_to_category() {
                    underfed_category.push(c);
                } else {
                    underfed_cell.push(c);
                }
            }
        }

        pool.retain(|cand| !overfed.iter().any(|c| feeds(c, cand)));

        let satisfies = |cand: &Candidate<'a>| {
            (underfed_category.is_empty() || underfed_category.iter().any(|c| feeds(c, cand)))
                && (underfed_cell.is_empty() || underfed_cell.iter().any(|c| feeds(c, cand)))
        };
        let restricted: Vec<&'a Header> = pool.iter().filter(|c| satisfies(*c)).map(|c| c.header).collect();
        if !restricted.is_empty() {
            return restricted;
        }
        pool.into_iter().map(|c| c.header).collect()
    }

    /// Category repetition rule.
    ///
    /// A category on the cross axis may not cross itself; on the parallel
    /// axis it may appear at most twice. A multi-nominal category on the
    /// cross axis exactly once may cross itself once more, provided it is
    /// not on the parallel axis.
    fn category_allowed(
        &self,
        key: &str,
        cross: &BTreeMap<&str, usize>,
        parallel: &BTreeMap<&str, usize>,
    ) -> bool {
        let in_cross = cross.get(key).copied().unwrap_or(0);
        let in_parallel = parallel.get(key).copied().unwrap_or(0);
        (in_cross == 0 && in_parallel <= 1) || (self.ctx.is_multi_valued(key) && in_cross == 1 && in_parallel == 0)
    }

    /// Every realized `rows × cols` cell of a (partial) grid.
    fn grid_cells(&self, rows: &[&'a Header], cols: &[&'a Header]) -> Vec<CellView<'a>> {
        let ctx = self.ctx;
        rows.iter()
            .flat_map(|&row| {
                cols.iter().map(move |&col| CellView {
                    row,
                    col,
                    contents: ctx.solutions(row, col).unwrap_or(&[]),
                })
            })
            .collect()
    }

    /// Random scan order of the candidates.
    fn order(&mut self, candidates: Vec<&'a Header>) -> Vec<&'a Header> {
        match self.config.selection_mode {
            SelectionMode::ShuffleSetkeys => {
                let weighted = candidates
                    .into_iter()
                    .map(|h| {
                        let w = if self.config.uniform {
                            1.0
                        } else {
                            let size = self.category_sizes.get(h.category.as_str()).copied().unwrap_or(1);
                            self.category_prob(&h.category) / size as f64
                        };
                        (h, w)
                    })
                    .collect();
                weighted_permutation(&mut self.rng, weighted)
            }
            SelectionMode::ShuffleCategories => {
                // Categories lacking a probability sort after every ranked one.
                let ranked: Vec<&'a str> = self
                    .category_sizes
                    .keys()
                    .copied()
                    .filter(|k| self.config.category_probs.contains_key(*k))
                    .collect();
                let cat_index: HashMap<&'a str, f64> = if self.config.uniform {
                    ranked.into_iter().map(|k| (k, self.rng.gen::<f64>())).collect()
                } else {
                    let weighted = ranked.into_iter().map(|k| (k, self.category_prob(k))).collect();
                    weighted_permutation(&mut self.rng, weighted)
                        .into_iter()
                        .enumerate()
                        .map(|(i, k)| (k, i as f64))
                        .collect()
                };

                // One draw per header of the universe, before filtering.
                let ctx = self.ctx;
                let rnd: HashMap<&'a Header, f64> = ctx.headers().iter().map(|h| (h, self.rng.gen::<f64>())).collect();

                let key = |h: &Header| {
                    (
                        cat_index.get(h.category.as_str()).copied().unwrap_or(f64::INFINITY),
                        rnd.get(h).copied().unwrap_or(0.0),
                    )
                };
                let mut sorted = candidates;
                sorted.sort_by(|a, b| {
                    let (ka, kb) = (key(*a), key(*b));
                    ka.0.total_cmp(&kb.0).then(ka.1.total_cmp(&kb.1))
                });
                sorted
            }
        }
    }

    fn category_prob(&self, key: &str) -> f64 {
        self.config.category_probs.get(key).copied().unwrap_or(0.0)
    }
}

impl fmt::Debug for GameGenerator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameGenerator")
            .field("config", &self.config)
            .field("constraints", &self.constraints)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Whether adding the candidate counts toward the constraint.
fn feeds(constraint: &Constraint, candidate: &Candidate<'_>) -> bool {
    if constraint.applies_to_category() {
        constraint.matches_header(candidate.header)
    } else {
        candidate.cells.iter().any(|cell| constraint.matches_cell(cell))
    }
}

fn category_counts<'h>(headers: &[&'h Header]) -> BTreeMap<&'h str, usize> {
    let mut counts = BTreeMap::new();
    for h in headers {
        *counts.entry(h.category.as_str()).or_default() += 1;
    }
    counts
}

/// Weighted permutation without replacement.
///
/// Items are drawn one at a time with probability proportional to their
/// weight among those left. Items with zero weight follow in input order.
/// `SliceRandom::choose_multiple_weighted` leaves its output order
/// unspecified, so the draw order is kept explicit here.
fn weighted_permutation<T, R: Rng>(rng: &mut R, items: Vec<(T, f64)>) -> Vec<T> {
    let mut out = Vec::with_capacity(items.len());
    let (mut live, dead): (Vec<_>, Vec<_>) = items.into_iter().partition(|(_, w)| *w > 0.0);
    while !live.is_empty() {
        let total: f64 = live.iter().map(|(_, w)| w).sum();
        let mut r = rng.gen::<f64>() * total;
        let mut pick = live.len() - 1;
        for (i, (_, w)) in live.iter().enumerate() {
            r -= w;
            if r <= 0.0 {
                pick = i;
                break;
            }
        }
        out.push(live.remove(pick).0);
    }
    out.extend(dead.into_iter().map(|(item, _)| item));
    out
}

// ─── Batch iterator ─────────────────────────────────────────────────────────

/// Lazy batch of games; ends early at the first game that cannot be built.
pub struct SampleGames<'g, 'a> {
    generator: &'g mut GameGenerator<'a>,
    remaining: usize,
}

impl Iterator for SampleGames<'_, '_> {
    type Item = Game;

    fn next(&mut self) -> Option<Game> {
        if self.remaining == 0 {
            return None;
        }
        match self.generator.sample_game() {
            Some(game) => {
                self.remaining -= 1;
                Some(game)
            }
            None => {
                self.remaining = 0;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl FusedIterator for SampleGames<'_, '_> {}
