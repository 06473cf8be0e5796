use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    aggregate::Grouping,
    derive::DerivedColumn,
    error::{StatError, StatResult},
    format::FormatClass,
    record::PositionGroup,
    schema::ScoringFormat,
};

/// Tunables for the bounded parts of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// Views with more rows than this sample their ranges.
    pub range_sample_threshold: usize,
    /// Prefix length used when sampling.
    pub range_sample_size: usize,
    /// Cell count above which the value cache is not built.
    pub cache_cell_ceiling: usize,
    pub cache_batch_size: usize,
    pub slow_operation_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            range_sample_threshold: 500,
            range_sample_size: 100,
            cache_cell_ceiling: 1000,
            cache_batch_size: 25,
            slow_operation_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivedColumnConfig {
    pub name: String,
    pub expression: String,
    #[serde(default)]
    pub format: Option<FormatClass>,
}

impl DerivedColumnConfig {
    pub fn build(&self) -> StatResult<DerivedColumn> {
        let column = DerivedColumn::new(&self.name, &self.expression, FormatClass::Decimal)?;
        Ok(match self.format {
            Some(format) => column.with_format(format),
            None => column,
        })
    }
}

/// A saved view: everything the command line can set, plus engine tunables.
/// Command-line flags take precedence over values read from here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewConfig {
    pub position: Option<PositionGroup>,
    pub season: Option<i32>,
    pub seasons: Vec<i32>,
    pub group_by: Option<Grouping>,
    pub next_gen: Option<bool>,
    pub scoring: Option<ScoringFormat>,
    pub columns: Option<Vec<String>>,
    pub sort: Option<String>,
    pub threshold: Option<f64>,
    pub teams: Vec<String>,
    pub filters: Vec<String>,
    pub derive: Vec<DerivedColumnConfig>,
    pub limit: Option<usize>,
    pub engine: EngineSettings,
}

impl ViewConfig {
    /// `season` and `seasons` combined.
    pub fn selected_seasons(&self) -> Vec<i32> {
        let mut seasons = self.seasons.clone();
        seasons.extend(self.season);
        seasons.sort_unstable();
        seasons.dedup();
        seasons
    }

    pub fn load(path: &Path) -> StatResult<Self> {
        let contents = fs::read_to_string(path).map_err(|source| StatError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents).map_err(|source| StatError::View {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents)
    }
}
