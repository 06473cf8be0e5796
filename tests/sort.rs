mod common;

use common::arb_records;
use proptest::prelude::*;
use statboard::{
    metrics::Evaluator,
    record::{PlayerSeasonRecord, Position},
    sort::{self, SortDirection, SortState},
};

fn scored(points: &[f64]) -> Vec<PlayerSeasonRecord> {
    points
        .iter()
        .enumerate()
        .map(|(i, fp)| {
            PlayerSeasonRecord::new(format!("p{i}"), format!("Player {i}"), "LV", Position::Te)
                .with_stat("fp", *fp)
        })
        .collect()
}

#[test]
fn tied_values_keep_input_order_descending() {
    let records = scored(&[20.0, 20.0, 15.0]);
    let state = SortState::new("fp", SortDirection::Desc);
    assert_eq!(
        sort::sort(&[0, 1, 2], &records, &state, &Evaluator::new()),
        vec![0, 1, 2]
    );
}

#[test]
fn sorting_an_already_sorted_view_changes_nothing() {
    let records = scored(&[3.0, 9.0, 3.0, 1.0, 9.0, 4.0]);
    let state = SortState::new("fp", SortDirection::Desc);
    let evaluator = Evaluator::new();
    let once = sort::sort(&[0, 1, 2, 3, 4, 5], &records, &state, &evaluator);
    assert_eq!(once, vec![1, 4, 5, 0, 2, 3]);
    assert_eq!(sort::sort(&once, &records, &state, &evaluator), once);
}

#[test]
fn derived_column_sorts_by_computed_value() {
    let records = vec![
        common::rusher("a", 100.0, 350.0),
        common::rusher("b", 50.0, 300.0),
        common::rusher("c", 0.0, 0.0),
    ];
    let state = SortState::new("yards_per_carry", SortDirection::Desc);
    assert_eq!(
        sort::sort(&[0, 1, 2], &records, &state, &Evaluator::new()),
        vec![1, 0, 2]
    );
}

proptest! {
    #[test]
    fn direct_keys_order_like_evaluated_keys(
        records in arb_records(40),
        column in prop::sample::select(vec!["carries", "targets", "routes", "ngs_avg_separation"]),
        ascending in any::<bool>(),
    ) {
        let evaluator = Evaluator::new();
        let rows = (0..records.len()).collect::<Vec<_>>();
        let direction = if ascending { SortDirection::Asc } else { SortDirection::Desc };
        let direct = sort::order_by_keys(
            &rows,
            sort::direct_keys(&rows, &records, column, &evaluator),
            direction,
        );
        let evaluated = sort::order_by_keys(
            &rows,
            sort::evaluated_keys(&rows, &records, column, &evaluator),
            direction,
        );
        prop_assert_eq!(direct, evaluated);
    }

    #[test]
    fn flipping_direction_reverses_distinct_values(
        values in prop::collection::hash_set(0u32..10_000, 0..50),
    ) {
        let points = values.into_iter().map(f64::from).collect::<Vec<_>>();
        let records = scored(&points);
        let rows = (0..records.len()).collect::<Vec<_>>();
        let evaluator = Evaluator::new();
        let desc = sort::sort(&rows, &records, &SortState::new("fp", SortDirection::Desc), &evaluator);
        let mut asc = sort::sort(&rows, &records, &SortState::new("fp", SortDirection::Asc), &evaluator);
        asc.reverse();
        prop_assert_eq!(desc, asc);
    }

    #[test]
    fn sort_is_a_permutation_in_key_order(records in arb_records(40)) {
        let evaluator = Evaluator::new();
        let rows = (0..records.len()).collect::<Vec<_>>();
        let state = SortState::new("yards_per_carry", SortDirection::Desc);
        let sorted = sort::sort(&rows, &records, &state, &evaluator);

        let mut seen = sorted.clone();
        seen.sort_unstable();
        prop_assert_eq!(seen, rows);
        let values = sorted
            .iter()
            .map(|&idx| evaluator.numeric(&records[idx], "yards_per_carry"))
            .collect::<Vec<_>>();
        prop_assert!(values.windows(2).all(|pair| pair[0] >= pair[1]));
    }
}
