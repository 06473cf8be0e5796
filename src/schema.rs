//! Column schema registry.
//!
//! Column sets differ by position group because the meaningful metrics
//! differ: completion percentage only matters for passers, routes only for
//! receivers. Every set starts with the same essential prefix, which can
//! never be hidden.

use clap::ValueEnum;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    format::FormatClass,
    metrics::{self, Evaluator},
    record::PositionGroup,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    NextGenStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ScoringFormat {
    #[default]
    Ppr,
    HalfPpr,
    Standard,
}

impl ScoringFormat {
    pub fn total_column(self) -> &'static str {
        match self {
            ScoringFormat::Ppr => "fantasy_points_ppr",
            ScoringFormat::HalfPpr => "fantasy_points_half_ppr",
            ScoringFormat::Standard => "fantasy_points",
        }
    }

    pub fn per_game_column(self) -> &'static str {
        match self {
            ScoringFormat::Ppr => "fantasy_points_pg",
            ScoringFormat::HalfPpr => "fantasy_points_half_ppr_pg",
            ScoringFormat::Standard => "fantasy_points_std_pg",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    pub has_next_gen_stats: bool,
    pub scoring: ScoringFormat,
}

impl FeatureFlags {
    /// Resolves the NextGen flag for a view. Position views trust the request;
    /// the ALL view additionally needs at least one record carrying NextGen
    /// fields, which the dataset determines once at load.
    pub fn for_view(
        include_next_gen: bool,
        scoring: ScoringFormat,
        position: PositionGroup,
        dataset_has_next_gen: bool,
    ) -> Self {
        let has_next_gen_stats = match position {
            PositionGroup::All => include_next_gen && dataset_has_next_gen,
            _ => include_next_gen,
        };
        Self {
            has_next_gen_stats,
            scoring,
        }
    }

    fn enables(self, feature: Feature) -> bool {
        match feature {
            Feature::NextGenStats => self.has_next_gen_stats,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub id: String,
    pub label: String,
    pub alignment: Alignment,
    pub format: FormatClass,
    pub visible_by_default: bool,
    pub essential: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_feature: Option<Feature>,
}

impl ColumnDescriptor {
    fn from_metric(id: &str, visible_by_default: bool) -> Self {
        match metrics::metric(id) {
            Some(def) => Self {
                id: def.id.to_string(),
                label: def.label.to_string(),
                alignment: if def.is_identity() {
                    if def.id == "player" {
                        Alignment::Left
                    } else {
                        Alignment::Center
                    }
                } else {
                    Alignment::Right
                },
                format: def.format,
                visible_by_default,
                essential: false,
                requires_feature: None,
            },
            None => Self::raw(id, FormatClass::Decimal),
        }
    }

    /// Descriptor for a column the metric table does not declare.
    pub fn raw(id: &str, format: FormatClass) -> Self {
        Self {
            id: id.to_string(),
            label: id.to_string(),
            alignment: if format.is_numeric() {
                Alignment::Right
            } else {
                Alignment::Left
            },
            format,
            visible_by_default: false,
            essential: false,
            requires_feature: None,
        }
    }

    /// Identity columns are excluded from heat coloring.
    pub fn is_identity(&self) -> bool {
        metrics::metric(&self.id).is_some_and(|def| def.is_identity())
    }

    fn essential(mut self) -> Self {
        self.essential = true;
        self.visible_by_default = true;
        self
    }

    fn requires(mut self, feature: Feature) -> Self {
        self.requires_feature = Some(feature);
        self
    }
}

// (id, visible by default)
type Block = &'static [(&'static str, bool)];

const QB_COUNTING: Block = &[
    ("completions", true),
    ("attempts", true),
    ("passing_yards", true),
    ("passing_tds", true),
    ("interceptions", true),
    ("sacks", true),
    ("sack_yards", false),
    ("passing_first_downs", false),
    ("carries", true),
    ("rushing_yards", true),
    ("rushing_tds", true),
    ("fumbles_lost", false),
];

const QB_EFFICIENCY: Block = &[
    ("completion_pct", true),
    ("yards_per_attempt", true),
    ("td_percentage", false),
    ("int_percentage", false),
    ("sack_percentage", false),
    ("any_a", true),
    ("passer_rating", true),
    ("air_yards_per_attempt", false),
    ("passing_epa", true),
    ("epa_per_dropback", true),
    ("dropbacks", false),
    ("fantasy_points_per_dropback", false),
    ("pacr", false),
    ("passing_yards_pg", false),
    ("passing_tds_pg", false),
];

const QB_NEXT_GEN: Block = &[
    ("ngs_avg_time_to_throw", true),
    ("ngs_completion_percentage_above_expectation", true),
    ("ngs_expected_completion_percentage", false),
    ("ngs_aggressiveness", true),
    ("ngs_avg_intended_air_yards", false),
    ("ngs_avg_completed_air_yards", false),
    ("ngs_avg_air_yards_differential", false),
    ("ngs_avg_air_yards_to_sticks", false),
    ("ngs_max_completed_air_distance", false),
];

const RB_COUNTING: Block = &[
    ("carries", true),
    ("rushing_yards", true),
    ("rushing_tds", true),
    ("rushing_first_downs", false),
    ("targets", true),
    ("receptions", true),
    ("receiving_yards", true),
    ("receiving_tds", true),
    ("touches", true),
    ("scrimmage_yards", false),
    ("fumbles_lost", false),
];

const RB_EFFICIENCY: Block = &[
    ("yards_per_carry", true),
    ("rushing_td_rate", false),
    ("rushing_epa", false),
    ("rushing_epa_per_carry", true),
    ("yards_per_touch", true),
    ("catch_percentage", false),
    ("yards_per_target", false),
    ("receiving_epa_per_target", false),
    ("target_share", true),
    ("rushing_yards_pg", false),
    ("carries_pg", false),
];

const RB_NEXT_GEN: Block = &[
    ("ngs_efficiency", true),
    ("ngs_percent_attempts_gte_eight_defenders", true),
    ("ngs_avg_time_to_los", false),
    ("ngs_expected_rush_yards", false),
    ("ngs_rush_yards_over_expected", true),
    ("ngs_rush_yards_over_expected_per_att", true),
    ("ngs_rush_pct_over_expected", false),
];

const RECEIVER_COUNTING: Block = &[
    ("targets", true),
    ("receptions", true),
    ("receiving_yards", true),
    ("receiving_tds", true),
    ("receiving_air_yards", false),
    ("receiving_yards_after_catch", false),
    ("receiving_first_downs", false),
    ("routes", true),
    ("fumbles_lost", false),
];

const RECEIVER_EFFICIENCY: Block = &[
    ("catch_percentage", true),
    ("yards_per_target", false),
    ("yards_per_reception", true),
    ("adot", true),
    ("yprr", true),
    ("tprr", true),
    ("target_share", true),
    ("air_yards_share", false),
    ("wopr", true),
    ("racr", false),
    ("first_down_rate", false),
    ("receiving_epa", false),
    ("epa_per_route", false),
    ("receiving_yards_pg", false),
    ("targets_pg", false),
    ("receptions_pg", false),
    ("epa_per_game", false),
];

const RECEIVER_NEXT_GEN: Block = &[
    ("ngs_avg_separation", true),
    ("ngs_avg_cushion", false),
    ("ngs_avg_intended_air_yards", false),
    ("ngs_percent_share_of_intended_air_yards", true),
    ("ngs_catch_percentage", false),
    ("ngs_avg_yac", false),
    ("ngs_avg_expected_yac", false),
    ("ngs_avg_yac_above_expectation", true),
];

const ALL_COUNTING: Block = &[
    ("passing_yards", true),
    ("passing_tds", true),
    ("interceptions", false),
    ("rushing_yards", true),
    ("rushing_tds", true),
    ("receptions", true),
    ("receiving_yards", true),
    ("receiving_tds", true),
    ("total_tds", true),
    ("scrimmage_yards", false),
    ("fumbles_lost", false),
];

const ALL_EFFICIENCY: Block = &[
    ("touches", false),
    ("yards_per_touch", false),
    ("target_share", false),
];

/// The full, ordered column set for a view.
pub fn columns_for(position: PositionGroup, flags: FeatureFlags) -> Vec<ColumnDescriptor> {
    let mut columns = essential_columns(flags.scoring);
    let (counting, efficiency, next_gen): (Block, Block, &[Block]) = match position {
        PositionGroup::Qb => (QB_COUNTING, QB_EFFICIENCY, &[QB_NEXT_GEN]),
        PositionGroup::Rb => (RB_COUNTING, RB_EFFICIENCY, &[RB_NEXT_GEN]),
        PositionGroup::Wr | PositionGroup::Te => {
            (RECEIVER_COUNTING, RECEIVER_EFFICIENCY, &[RECEIVER_NEXT_GEN])
        }
        PositionGroup::All => (
            ALL_COUNTING,
            ALL_EFFICIENCY,
            &[QB_NEXT_GEN, RB_NEXT_GEN, RECEIVER_NEXT_GEN],
        ),
    };
    let block_columns = counting
        .iter()
        .chain(efficiency.iter())
        .map(|(id, visible)| ColumnDescriptor::from_metric(id, *visible))
        .chain(next_gen.iter().flat_map(|block| block.iter()).map(|(id, visible)| {
            ColumnDescriptor::from_metric(id, *visible).requires(Feature::NextGenStats)
        }));
    columns.extend(block_columns);
    columns
        .into_iter()
        .unique_by(|column| column.id.clone())
        .filter(|column| {
            column
                .requires_feature
                .is_none_or(|feature| flags.enables(feature))
        })
        .collect()
}

fn essential_columns(scoring: ScoringFormat) -> Vec<ColumnDescriptor> {
    [
        "player",
        "team",
        "position",
        "games",
        scoring.total_column(),
        scoring.per_game_column(),
    ]
    .into_iter()
    .map(|id| ColumnDescriptor::from_metric(id, true).essential())
    .collect()
}

/// Descriptor for any id: registry metrics, user-defined columns, or raw
/// record properties.
pub fn descriptor(id: &str, evaluator: &Evaluator) -> ColumnDescriptor {
    if metrics::metric(id).is_some() {
        return ColumnDescriptor::from_metric(id, false);
    }
    let format = evaluator.format_class(id);
    ColumnDescriptor::raw(id, format)
}

/// Picks the visible columns for a view.
///
/// Without a request the defaults are shown. With one, the essential prefix
/// stays, requested registry columns follow in registry order, and requested
/// ids outside the registry (expression columns, raw fields) are appended in
/// request order.
pub fn resolve_visible(
    available: &[ColumnDescriptor],
    requested: Option<&[String]>,
    evaluator: &Evaluator,
) -> Vec<ColumnDescriptor> {
    let Some(requested) = requested else {
        let mut visible = available
            .iter()
            .filter(|column| column.visible_by_default)
            .cloned()
            .collect::<Vec<_>>();
        visible.extend(
            evaluator
                .derived_columns()
                .iter()
                .map(|column| descriptor(&column.name, evaluator)),
        );
        return visible;
    };
    let wanted = requested
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect::<Vec<_>>();
    let mut visible = available
        .iter()
        .filter(|column| column.essential || wanted.contains(&column.id.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    for id in wanted {
        if visible.iter().any(|column| column.id == id) {
            continue;
        }
        if available.iter().any(|column| column.id == id) {
            continue;
        }
        debug!("Column '{id}' is outside the registry for this view; showing it as-is");
        visible.push(descriptor(id, evaluator));
    }
    visible
}
