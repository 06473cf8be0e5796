//! Row grouping ahead of the filter pipeline.
//!
//! Grouping folds several source rows (weeks, seasons, teammates) into one
//! record. Counters and derived totals sum; rates and NextGen fields average
//! over the rows that carry them, following [`metrics::aggregation`]. The
//! output is an ordinary [`Dataset`], so every later stage is unchanged.

use std::collections::HashMap;

use clap::ValueEnum;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    dataset::Dataset,
    metrics::{self, Aggregation},
    record::{PlayerSeasonRecord, Position},
};

/// Source fields that locate a row rather than measure it.
const DIMENSION_FIELDS: &[&str] = &["week"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum Grouping {
    /// One row per player across all selected seasons
    Player,
    /// One row per player and season
    PlayerSeason,
    /// One row per team and position
    Team,
    /// One row per team, position and season
    TeamSeason,
    /// One row per position
    Position,
    /// One row per position and season
    PositionSeason,
}

impl Grouping {
    pub fn per_season(self) -> bool {
        matches!(
            self,
            Grouping::PlayerSeason | Grouping::TeamSeason | Grouping::PositionSeason
        )
    }

    fn key(self, record: &PlayerSeasonRecord) -> GroupKey {
        let season = if self.per_season() { record.season } else { None };
        match self {
            Grouping::Player | Grouping::PlayerSeason => GroupKey {
                label: record.player_id.clone(),
                position: None,
                season,
            },
            Grouping::Team | Grouping::TeamSeason => GroupKey {
                label: record.team.clone(),
                position: Some(record.position.clone()),
                season,
            },
            Grouping::Position | Grouping::PositionSeason => GroupKey {
                label: String::new(),
                position: Some(record.position.clone()),
                season,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    label: String,
    position: Option<Position>,
    season: Option<i32>,
}

/// Groups `dataset` into one record per key, in order of first appearance.
pub fn aggregate(dataset: &Dataset, grouping: Grouping) -> Dataset {
    let mut order = Vec::new();
    let mut groups: HashMap<GroupKey, Vec<&PlayerSeasonRecord>> = HashMap::new();
    for record in dataset.records() {
        let key = grouping.key(record);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(record);
    }

    let records = order
        .iter()
        .filter_map(|key| {
            let members = groups.get(key)?;
            Some(combine(grouping, key, members))
        })
        .collect::<Vec<_>>();
    debug!(
        "Grouped {} record(s) by {grouping:?} into {} row(s)",
        dataset.len(),
        records.len()
    );
    Dataset::new(dataset.name(), records)
}

fn combine(
    grouping: Grouping,
    key: &GroupKey,
    members: &[&PlayerSeasonRecord],
) -> PlayerSeasonRecord {
    let Some(last) = members.last().copied() else {
        return PlayerSeasonRecord::new(
            key.label.clone(),
            key.label.clone(),
            "",
            Position::Other(String::new()),
        );
    };
    let mut record = match grouping {
        Grouping::Player | Grouping::PlayerSeason => {
            let mut record = PlayerSeasonRecord::new(
                last.player_id.clone(),
                last.display_name.clone(),
                last.team.clone(),
                last.position.clone(),
            );
            for (field, text) in last.extras() {
                record = record.with_text(field, text);
            }
            record
        }
        Grouping::Team | Grouping::TeamSeason => PlayerSeasonRecord::new(
            format!("{}-{}", last.team, last.position).to_ascii_lowercase(),
            format!("{} {}", last.team, last.position),
            last.team.clone(),
            last.position.clone(),
        ),
        Grouping::Position | Grouping::PositionSeason => PlayerSeasonRecord::new(
            last.position.as_str().to_ascii_lowercase(),
            last.position.to_string(),
            "-",
            last.position.clone(),
        ),
    };
    record.season = key.season.or_else(|| shared_season(members));

    let fields = members
        .iter()
        .copied()
        .flat_map(|member| member.stat_keys())
        .filter(|field| !DIMENSION_FIELDS.contains(field))
        .sorted_unstable()
        .dedup()
        .collect::<Vec<_>>();
    for field in fields {
        let values = members.iter().filter_map(|member| member.stat(field));
        let value = match metrics::aggregation(field) {
            Aggregation::Sum => values.sum::<f64>(),
            Aggregation::Mean => {
                let (total, count) = values.fold((0.0, 0usize), |(total, count), value| {
                    (total + value, count + 1)
                });
                total / count.max(1) as f64
            }
        };
        record = record.with_stat(field, value);
    }

    // Weekly rows: each distinct week is a game played.
    if record.stat("games").is_none() {
        let weeks = members
            .iter()
            .filter_map(|member| member.stat("week").map(|week| (member.season, week as i64)))
            .unique()
            .count();
        if weeks > 0 {
            record = record.with_stat("games", weeks as f64);
        }
    }
    record
}

fn shared_season(members: &[&PlayerSeasonRecord]) -> Option<i32> {
    let season = members.first()?.season?;
    members
        .iter()
        .all(|member| member.season == Some(season))
        .then_some(season)
}
