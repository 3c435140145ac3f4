/// Property-based tests for the pairing engine using proptest
///
/// These tests verify that every plan seats each entrant exactly once,
/// only ever builds full 2v2 tables, and that seeded pairing is repeatable.
use proptest::prelude::*;
use std::collections::HashSet;
use swiss_pairing::pairing::{self, Pairer, PairingPlan, TABLE_SIZE};
use swiss_pairing::tournament::PlayerId;

// Strategy to generate a list of distinct player ids
fn players_strategy(max: usize) -> impl Strategy<Value = Vec<PlayerId>> {
    prop::collection::hash_set(1i64..10_000, 0..=max)
        .prop_map(|ids| ids.into_iter().map(PlayerId).collect())
}

// Strategy to generate distinct players with points
fn standings_strategy(max: usize) -> impl Strategy<Value = Vec<(PlayerId, i64)>> {
    players_strategy(max).prop_flat_map(|players| {
        let len = players.len();
        prop::collection::vec(0i64..30, len)
            .prop_map(move |points| players.iter().copied().zip(points).collect())
    })
}

fn assert_well_formed(plan: &PairingPlan, players: &[PlayerId]) {
    assert_eq!(plan.tables.len(), players.len() / TABLE_SIZE);
    assert_eq!(plan.byes.len(), players.len() % TABLE_SIZE);
    assert_eq!(plan.total_players(), players.len());

    let mut seen = HashSet::new();
    for (idx, table) in plan.tables.iter().enumerate() {
        assert_eq!(table.number, idx as i32 + 1, "tables are numbered from 1");
        for player in table.players() {
            assert!(seen.insert(player), "{player} seated twice");
        }
    }
    for &player in &plan.byes {
        assert!(seen.insert(player), "{player} both seated and on a bye");
    }

    let expected: HashSet<_> = players.iter().copied().collect();
    assert_eq!(seen, expected);
}

proptest! {
    #[test]
    fn prop_random_pairing_places_everyone_once(players in players_strategy(40), seed in any::<u64>()) {
        let plan = Pairer::seeded(seed).random(&players);
        assert_well_formed(&plan, &players);
    }

    #[test]
    fn prop_swiss_pairing_places_everyone_once(standings in standings_strategy(40)) {
        let players: Vec<PlayerId> = standings.iter().map(|(player, _)| *player).collect();
        let plan = pairing::swiss(&standings);
        assert_well_formed(&plan, &players);
    }

    #[test]
    fn prop_same_seed_same_plan(players in players_strategy(24), seed in any::<u64>()) {
        let first = Pairer::seeded(seed).random(&players);
        let second = Pairer::seeded(seed).random(&players);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_swiss_tables_follow_standings(standings in standings_strategy(40)) {
        let points: std::collections::HashMap<_, _> = standings.iter().copied().collect();
        let plan = pairing::swiss(&standings);

        // Nobody at a later table outscores anyone at an earlier one
        let mut previous_min = i64::MAX;
        for table in &plan.tables {
            let table_points: Vec<i64> = table.players().map(|p| points[&p]).collect();
            let max = *table_points.iter().max().unwrap();
            let min = *table_points.iter().min().unwrap();
            prop_assert!(max <= previous_min);
            previous_min = min;

            // Top seed partners the bottom seed of the group
            let [top, bottom] = table.team_one;
            let [middle_a, middle_b] = table.team_two;
            prop_assert!(points[&top] >= points[&middle_a].max(points[&middle_b]));
            prop_assert!(points[&bottom] <= points[&middle_a].min(points[&middle_b]));
        }

        // Byes go to the lowest scores
        for bye in &plan.byes {
            prop_assert!(points[bye] <= previous_min);
        }
    }
}

#[test]
fn test_swiss_keeps_input_order_on_ties() {
    let standings: Vec<_> = (1..=8).map(|id| (PlayerId(id), 3)).collect();
    let plan = pairing::swiss(&standings);

    assert_eq!(plan.tables[0].team_one, [PlayerId(1), PlayerId(4)]);
    assert_eq!(plan.tables[0].team_two, [PlayerId(2), PlayerId(3)]);
    assert_eq!(plan.tables[1].team_one, [PlayerId(5), PlayerId(8)]);
    assert_eq!(plan.tables[1].team_two, [PlayerId(6), PlayerId(7)]);
}

#[test]
fn test_fewer_than_four_players_all_byes() {
    let players: Vec<_> = (1..=3).map(PlayerId).collect();
    let plan = Pairer::seeded(1).random(&players);

    assert!(plan.tables.is_empty());
    assert_eq!(plan.byes.len(), 3);
}
