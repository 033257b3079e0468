//! Integration tests for grid assembly: end-to-end scenarios, determinism,
//! retry exhaustion and the invariants every accepted game must satisfy.

use std::collections::BTreeMap;

use gridmatch::{
    Assignment, CategoryDef, CellView, Constraint, Entity, EntityId, EntityTable, Extractor, Game,
    GameGenerator, GeneratorConfig, GridConfig, GridContext, Header, SelectionMode,
};
use proptest::prelude::*;

// ─── helpers ─────────────────────────────────────────────────────────────────

fn grid(field_size: usize) -> GridConfig {
    GridConfig {
        field_size,
        ..GridConfig::default()
    }
}

fn seeded(seed: u64) -> GeneratorConfig {
    GeneratorConfig {
        seed: Some(seed),
        uniform: true,
        ..GeneratorConfig::default()
    }
}

/// 4 entities, 2 regions × 2 colors: exactly one entity per cell.
fn square_context() -> GridContext {
    let table: EntityTable = [("A", "X", "Red"), ("B", "X", "Blue"), ("C", "Y", "Red"), ("D", "Y", "Blue")]
        .into_iter()
        .map(|(id, region, color)| Entity::new(id).with("region", region).with("color", color))
        .collect();
    let defs = [
        CategoryDef::nominal("region", "Region", 1.0, "region"),
        CategoryDef::nominal("color", "Color", 1.0, "color"),
    ];
    GridContext::build(&table, &defs, grid(2)).expect("square context")
}

/// A small country table with nominal, multi-nominal, boolean and top-N axes.
fn country_context() -> GridContext {
    let rows: [(&str, &str, &str, &[&str], bool, f64); 13] = [
        ("AT", "Austria", "EU", &["Red", "White"], false, 9.1),
        ("DK", "Denmark", "EU", &["Red", "White"], false, 5.9),
        ("PL", "Poland", "EU", &["Red", "White"], false, 36.7),
        ("FR", "France", "EU", &["Red", "White", "Blue"], false, 68.2),
        ("IE", "Ireland", "EU", &["Green", "White"], true, 5.2),
        ("IT", "Italy", "EU", &["Green", "White", "Red"], false, 58.9),
        ("NG", "Nigeria", "AF", &["Green", "White"], false, 223.8),
        ("GH", "Ghana", "AF", &["Red", "Yellow", "Green"], false, 34.1),
        ("MG", "Madagascar", "AF", &["Red", "White", "Green"], true, 30.3),
        ("JP", "Japan", "AS", &["Red", "White"], true, 124.5),
        ("ID", "Indonesia", "AS", &["Red", "White"], true, 277.5),
        ("IN", "India", "AS", &["Green", "White"], false, 1428.6),
        ("LK", "Sri Lanka", "AS", &["Yellow", "Red", "Green"], true, 22.0),
    ];
    let table: EntityTable = rows
        .into_iter()
        .map(|(id, name, continent, colors, island, population)| {
            Entity::new(id)
                .with("name", name)
                .with("continent", continent)
                .with("flag_colors", colors.to_vec())
                .with("island", island)
                .with("population", population)
        })
        .collect();
    let defs = [
        CategoryDef::nominal("continent", "Continent", 1.0, "continent"),
        CategoryDef::multi_nominal("flag_colors", "Flag color", 1.5, "flag_colors"),
        CategoryDef::boolean("island", "Island nation", 2.0, "island"),
        CategoryDef::extracted("start", "Starting letter", 2.0, "name", Extractor::FirstLetter),
        CategoryDef::top_n("populous", "Top 6 by population", 2.5, "population", 6),
    ];
    GridContext::build(&table, &defs, grid(3)).expect("country context")
}

fn assignment<'a>(ctx: &'a GridContext, game: &'a Game) -> Assignment<'a> {
    let cells = game
        .rows()
        .iter()
        .flat_map(|row| {
            game.cols().iter().map(move |col| CellView {
                row,
                col,
                contents: ctx.solutions(row, col).unwrap_or(&[]),
            })
        })
        .collect();
    Assignment::new(game.rows().iter().chain(game.cols()), cells)
}

fn category_counts(headers: &[Header]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for h in headers {
        *counts.entry(h.category.as_str()).or_insert(0) += 1;
    }
    counts
}

// ─── end-to-end ──────────────────────────────────────────────────────────────

#[test]
fn test_square_scenario_can_produce_canonical_grid() {
    let ctx = square_context();
    let mut generator = GameGenerator::new(&ctx, seeded(2024), Vec::new()).expect("valid config");

    let rows = vec![Header::new("region", "X"), Header::new("region", "Y")];
    let cols = vec![Header::new("color", "Red"), Header::new("color", "Blue")];

    let found = generator
        .sample_games(500)
        .find(|g| g.rows() == rows.as_slice() && g.cols() == cols.as_slice())
        .expect("canonical arrangement is reachable");

    let expected: Vec<Vec<Vec<EntityId>>> = vec![
        vec![vec!["A".into()], vec!["B".into()]],
        vec![vec!["C".into()], vec!["D".into()]],
    ];
    assert_eq!(found.solutions(), expected.as_slice());
}

#[test]
fn test_square_scenario_without_shuffle_keeps_axes_apart() {
    let ctx = square_context();
    let config = GeneratorConfig {
        shuffle: false,
        ..seeded(9)
    };
    let mut generator = GameGenerator::new(&ctx, config, Vec::new()).expect("valid config");
    for game in generator.sample_games(20) {
        let row_cat = &game.rows()[0].category;
        assert!(game.rows().iter().all(|h| &h.category == row_cat));
        assert!(game.cols().iter().all(|h| &h.category != row_cat));
        assert_eq!(game.sample_tries(), 0);
    }
}

#[test]
fn test_selection_modes_both_produce_games() {
    let ctx = country_context();
    for mode in [SelectionMode::ShuffleSetkeys, SelectionMode::ShuffleCategories] {
        let config = GeneratorConfig {
            seed: Some(17),
            selection_mode: mode,
            category_probs: [
                ("continent".to_string(), 1.0),
                ("flag_colors".to_string(), 1.0),
                ("island".to_string(), 0.5),
                ("start".to_string(), 0.5),
                ("populous".to_string(), 0.5),
            ]
            .into(),
            ..GeneratorConfig::default()
        };
        let mut generator = GameGenerator::new(&ctx, config, Vec::new()).expect("valid config");
        let game = generator.sample_game().expect("country grid");
        assert_eq!(game.size(), 3);
    }
}

// ─── determinism ─────────────────────────────────────────────────────────────

#[test]
fn test_same_seed_same_games() {
    let ctx = country_context();
    let constraints = || vec![Constraint::category_at_most("continent", 2)];

    let mut first = GameGenerator::new(&ctx, seeded(77), constraints()).expect("valid config");
    let mut second = GameGenerator::new(&ctx, seeded(77), constraints()).expect("valid config");

    let a: Vec<Game> = first.sample_games(10).collect();
    let b: Vec<Game> = second.sample_games(10).collect();
    assert!(!a.is_empty());
    assert_eq!(a, b);
    assert_eq!(
        a.iter().map(Game::sample_tries).collect::<Vec<_>>(),
        b.iter().map(Game::sample_tries).collect::<Vec<_>>()
    );
    assert_eq!(first.stats(), second.stats());
}

#[test]
fn test_shared_context_serves_independent_generators() {
    let ctx = country_context();
    let mut left = GameGenerator::new(&ctx, seeded(1), Vec::new()).expect("valid config");
    let mut right = GameGenerator::new(&ctx, seeded(2), Vec::new()).expect("valid config");
    assert!(left.sample_game().is_some());
    assert!(right.sample_game().is_some());
    assert!(std::ptr::eq(left.context(), right.context()));
}

// ─── failure policy ──────────────────────────────────────────────────────────

#[test]
fn test_unsatisfiable_constraints_exhaust_retries() {
    let ctx = square_context();
    let constraints = vec![
        Constraint::category_exactly("region", 0),
        Constraint::category_at_least("region", 1),
    ];
    let mut generator = GameGenerator::new(&ctx, seeded(5), constraints).expect("valid config");

    assert!(generator.sample_game().is_none());
    assert_eq!(generator.stats().attempts, 100);
    assert_eq!(generator.stats().exhausted, 1);

    // Fail-fast batch: the first failure ends it.
    assert_eq!(generator.sample_games(5).count(), 0);
    assert_eq!(generator.stats().exhausted, 2);
}

#[test]
fn test_final_gate_rejects_cell_constraint_violations() {
    let ctx = square_context();
    // Every entity solves exactly one cell of the 2×2 grid, so a cap of
    // zero solutions for A can never hold.
    let constraints: Vec<Constraint> = Constraint::solutions_at_most([EntityId::from("A")], 0).collect();
    let config = GeneratorConfig {
        max_tries: 20,
        ..seeded(3)
    };
    let mut generator = GameGenerator::new(&ctx, config, constraints).expect("valid config");
    assert!(generator.sample_game().is_none());
    let stats = generator.stats();
    assert_eq!(stats.attempts, 20);
    assert_eq!(stats.slot_failures + stats.rejected_by_constraints, 20);
}

// ─── alternates ──────────────────────────────────────────────────────────────

#[test]
fn test_alternate_spellings_do_not_combine_across_values() {
    let table: EntityTable = [
        Entity::new("ZA")
            .with("capital", "Pretoria")
            .with("capital_alt", vec!["Tshwane", "Cape Town"]),
        Entity::new("CV").with("capital", "Cape Town").with("capital_alt", Vec::<&str>::new()),
        Entity::new("CH").with("capital", "Bern").with("capital_alt", vec!["Pern"]),
    ]
    .into_iter()
    .collect();
    let defs = [
        CategoryDef::extracted("cap_start", "Capital starting letter", 1.5, "capital", Extractor::FirstLetter),
        CategoryDef::extracted("cap_end", "Capital ending letter", 3.0, "capital", Extractor::LastLetter),
    ];
    let ctx = GridContext::build(&table, &defs, grid(1)).expect("capital context");
    let builder = ctx.cell_builder();

    let p = Header::new("cap_start", "P");
    let n = Header::new("cap_end", "N");
    let contents = builder.build(&p, &n);
    assert!(contents.is_empty());
    let alt = builder.build_alt(&p, &n, &contents);
    assert!(!alt.contains(&EntityId::from("ZA")));
    assert!(!alt.contains(&EntityId::from("CV")));
    assert_eq!(alt, vec![EntityId::from("CH")]);
}

// ─── invariants ──────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_accepted_games_are_playable(seed in any::<u64>(), setkeys in any::<bool>()) {
        let ctx = country_context();
        let mut constraints = vec![
            Constraint::category_at_most("continent", 2),
            Constraint::category_at_most("island", 1),
        ];
        let ids: Vec<EntityId> = ["AT", "DK", "PL", "FR", "IE", "IT", "NG", "GH", "MG", "JP", "ID", "IN", "LK"]
            .into_iter()
            .map(EntityId::from)
            .collect();
        constraints.extend(Constraint::solutions_at_most(ids, 4));

        let config = GeneratorConfig {
            seed: Some(seed),
            selection_mode: if setkeys { SelectionMode::ShuffleSetkeys } else { SelectionMode::ShuffleCategories },
            ..GeneratorConfig::default()
        };
        let mut generator = GameGenerator::new(&ctx, config, constraints.clone()).expect("valid config");

        for game in generator.sample_games(3) {
            let n = game.size();
            prop_assert_eq!(n, 3);
            prop_assert_eq!(game.rows().len(), n);
            prop_assert_eq!(game.cols().len(), n);

            // Distinct headers, no header on both axes.
            let mut all: Vec<&Header> = game.rows().iter().chain(game.cols()).collect();
            all.sort();
            all.dedup();
            prop_assert_eq!(all.len(), 2 * n);

            // Every cell solvable, primary and alternate disjoint.
            for r in 0..n {
                for c in 0..n {
                    let primary = game.solution(r, c).expect("cell");
                    prop_assert!(!primary.is_empty());
                    let alt = game.alt_solution(r, c).expect("cell");
                    prop_assert!(alt.iter().all(|id| !primary.contains(id)));
                }
            }

            // Category repetition.
            let in_rows = category_counts(game.rows());
            let in_cols = category_counts(game.cols());
            for (key, &count) in in_rows.iter().chain(in_cols.iter()) {
                prop_assert!(count <= 2, "category {} used {} times on one axis", key, count);
            }
            for (key, &r) in &in_rows {
                if let Some(&c) = in_cols.get(key) {
                    prop_assert!(ctx.is_multi_valued(key), "category {} crosses itself", key);
                    prop_assert_eq!((r, c), (1, 1));
                }
            }

            // Constraints hold over the final grid.
            let full = assignment(&ctx, &game);
            for constraint in &constraints {
                prop_assert!(constraint.holds(&full), "{:?} violated", constraint);
            }
        }
    }
}
