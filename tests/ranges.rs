mod common;

use common::arb_records;
use proptest::prelude::*;
use statboard::{
    config::EngineSettings,
    metrics::{self, Evaluator, Polarity},
    ranges::{self, ColumnRange},
    record::PositionGroup,
    schema::{FeatureFlags, columns_for},
};

#[test]
fn heat_scale_runs_red_to_green() {
    let range = ColumnRange {
        min: 2.0,
        max: 6.0,
    };
    let low = ranges::heat_color(2.0, Some(&range), Polarity::HigherIsBetter).expect("color");
    let high = ranges::heat_color(6.0, Some(&range), Polarity::HigherIsBetter).expect("color");
    assert_eq!(low.hex(), "#632626");
    assert_eq!(high.hex(), "#225e34");
    assert!(high.ansi_background().starts_with("\u{1b}[48;2;34;94;52"));
    assert_eq!(
        ranges::heat_color(4.0, Some(&range), metrics::polarity("team")),
        None
    );
}

proptest! {
    #[test]
    fn scanned_values_fall_inside_their_column_range(records in arb_records(80)) {
        let evaluator = Evaluator::new();
        let settings = EngineSettings::default();
        let rows = (0..records.len()).collect::<Vec<_>>();
        let columns = columns_for(
            PositionGroup::All,
            FeatureFlags {
                has_next_gen_stats: true,
                ..FeatureFlags::default()
            },
        );
        let ranges = ranges::compute_ranges(&rows, &records, &columns, &evaluator, &settings);
        for (id, range) in &ranges {
            prop_assert!(range.min < range.max);
            for &row in ranges::sample_rows(&rows, &settings) {
                if let Some(value) = evaluator.evaluate(&records[row], id).as_f64() {
                    prop_assert!(range.contains(value), "{} = {} outside {:?}", id, value, range);
                }
            }
        }
        prop_assert!(!ranges.contains_key("player"));
        prop_assert!(!ranges.contains_key("team"));
    }
}
