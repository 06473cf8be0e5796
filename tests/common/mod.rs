#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use proptest::prelude::*;
use statboard::record::{PlayerSeasonRecord, Position};
use tempfile::{TempDir, tempdir};

pub const SAMPLE_STATS: &str = "player_stats_2023.json";

/// Counters the generated records carry, in a fixed order.
pub const COUNTERS: &[&str] = &[
    "games",
    "completions",
    "attempts",
    "passing_yards",
    "passing_tds",
    "interceptions",
    "sacks",
    "carries",
    "rushing_yards",
    "rushing_tds",
    "targets",
    "receptions",
    "receiving_yards",
    "receiving_tds",
    "receiving_air_yards",
    "routes",
    "team_targets",
    "team_air_yards",
];

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

pub fn rusher(id: &str, carries: f64, yards: f64) -> PlayerSeasonRecord {
    PlayerSeasonRecord::new(id, id.to_uppercase(), "DET", Position::Rb)
        .with_stat("carries", carries)
        .with_stat("rushing_yards", yards)
}

/// `count` records cycling through QB/RB/WR/TE with varied volume.
pub fn league(count: usize) -> Vec<PlayerSeasonRecord> {
    let positions = [Position::Qb, Position::Rb, Position::Wr, Position::Te];
    (0..count)
        .map(|i| {
            let position = positions[i % positions.len()].clone();
            let volume = ((i * 37) % 120) as f64;
            PlayerSeasonRecord::new(format!("p{i}"), format!("Player {i}"), "KC", position)
                .with_stat("games", (i % 17 + 1) as f64)
                .with_stat("attempts", volume * 4.0)
                .with_stat("completions", volume * 2.5)
                .with_stat("carries", volume)
                .with_stat("rushing_yards", volume * 4.3)
                .with_stat("targets", volume / 2.0)
                .with_stat("receptions", volume / 3.0)
                .with_stat("receiving_yards", volume * 3.1)
                .with_stat("routes", volume * 3.0)
        })
        .collect()
}

pub fn arb_position() -> impl Strategy<Value = Position> {
    prop::sample::select(vec![Position::Qb, Position::Rb, Position::Wr, Position::Te])
}

/// Records with small integer counters (zeros included) and an optional
/// NextGen field.
pub fn arb_record() -> impl Strategy<Value = PlayerSeasonRecord> {
    (
        arb_position(),
        prop::collection::vec(0u32..300, COUNTERS.len()),
        prop::option::of(0.0f64..8.0),
        "[A-Z][a-z]{1,8}",
    )
        .prop_map(|(position, values, separation, name)| {
            let mut record = PlayerSeasonRecord::new(name.to_lowercase(), name, "KC", position);
            for (key, value) in COUNTERS.iter().zip(values) {
                record = record.with_stat(key, f64::from(value));
            }
            if let Some(separation) = separation {
                record = record.with_stat("ngs_avg_separation", separation);
            }
            record
        })
}

pub fn arb_records(max: usize) -> impl Strategy<Value = Vec<PlayerSeasonRecord>> {
    prop::collection::vec(arb_record(), 0..max)
}
