use std::{fmt, io::Read, path::Path};

use log::debug;
use sha2::{Digest, Sha256};

use crate::{
    error::{StatError, StatResult},
    io_utils::{self, InputFormat},
    record::{PlayerSeasonRecord, RawField},
};

/// Short content fingerprint of a loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable batch of records plus the facts derived from it once at load.
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    records: Vec<PlayerSeasonRecord>,
    id: DatasetId,
    has_next_gen_stats: bool,
}

impl Dataset {
    pub fn new(name: impl Into<String>, records: Vec<PlayerSeasonRecord>) -> Self {
        let id = fingerprint(&records);
        let has_next_gen_stats = records.iter().any(PlayerSeasonRecord::has_next_gen_stats);
        let name = name.into();
        debug!(
            "Loaded dataset '{name}' ({} records, id {id}, next gen: {has_next_gen_stats})",
            records.len()
        );
        Self {
            name,
            records,
            id,
            has_next_gen_stats,
        }
    }

    pub fn load(path: &Path) -> StatResult<Self> {
        let format = io_utils::detect_input_format(path)?;
        let reader = io_utils::open_input(path)?;
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| *stem != "-")
            .unwrap_or("player_stats");
        match format {
            InputFormat::Json => Self::from_json_reader(name, reader),
            InputFormat::Csv { delimiter } => Self::from_csv_reader(name, reader, delimiter),
        }
    }

    /// Accepts either a bare array of record objects or an API envelope of the
    /// form `{"dataset": "...", "data": [...]}`.
    pub fn from_json_reader<R: Read>(name: &str, reader: R) -> StatResult<Self> {
        let document: serde_json::Value = serde_json::from_reader(reader)?;
        let (name, rows) = match document {
            serde_json::Value::Array(rows) => (name.to_string(), rows),
            serde_json::Value::Object(mut envelope) => {
                let dataset = envelope
                    .get("dataset")
                    .and_then(|v| v.as_str())
                    .unwrap_or(name)
                    .to_string();
                match envelope.remove("data") {
                    Some(serde_json::Value::Array(rows)) => (dataset, rows),
                    _ => return Err(StatError::NotAnArray { found: "object" }),
                }
            }
            other => {
                return Err(StatError::NotAnArray {
                    found: json_kind(&other),
                });
            }
        };

        let records = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| match row {
                serde_json::Value::Object(map) => PlayerSeasonRecord::from_fields(
                    index,
                    map.into_iter()
                        .map(|(key, value)| {
                            let field = RawField::from_json(&value);
                            (key, field)
                        }),
                ),
                other => Err(StatError::InvalidRecord {
                    index,
                    reason: format!("expected an object, found {}", json_kind(&other)),
                }),
            })
            .collect::<StatResult<Vec<_>>>()?;
        Ok(Self::new(name, records))
    }

    pub fn from_csv_reader<R: Read>(name: &str, reader: R, delimiter: u8) -> StatResult<Self> {
        let mut reader = io_utils::open_csv_reader(reader, delimiter);
        let headers = reader
            .headers()?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row?;
            let fields = headers
                .iter()
                .zip(row.iter())
                .map(|(header, cell)| (header.clone(), RawField::from_cell(cell)));
            records.push(PlayerSeasonRecord::from_fields(index, fields)?);
        }
        Ok(Self::new(name, records))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &DatasetId {
        &self.id
    }

    pub fn records(&self) -> &[PlayerSeasonRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&PlayerSeasonRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_next_gen_stats(&self) -> bool {
        self.has_next_gen_stats
    }

    /// Records of the given seasons; an empty selection keeps everything.
    /// Records without a season are kept only when the dataset carries no
    /// seasons at all.
    pub fn for_seasons(&self, seasons: &[i32]) -> Dataset {
        if seasons.is_empty() {
            return self.clone();
        }
        let seasoned = self.records.iter().any(|record| record.season.is_some());
        let records = self
            .records
            .iter()
            .filter(|record| {
                !seasoned || record.season.is_some_and(|season| seasons.contains(&season))
            })
            .cloned()
            .collect();
        Dataset::new(self.name.clone(), records)
    }

    /// Distinct seasons present, ascending.
    pub fn seasons(&self) -> Vec<i32> {
        let mut seasons = self
            .records
            .iter()
            .filter_map(|record| record.season)
            .collect::<Vec<_>>();
        seasons.sort_unstable();
        seasons.dedup();
        seasons
    }
}

fn fingerprint(records: &[PlayerSeasonRecord]) -> DatasetId {
    let mut hasher = Sha256::new();
    hasher.update((records.len() as u64).to_le_bytes());
    for record in records {
        hasher.update(record.player_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(record.display_name.as_bytes());
        hasher.update([0u8]);
        hasher.update(record.team.as_bytes());
        hasher.update([0u8]);
        hasher.update(record.position.as_str().as_bytes());
        hasher.update(record.season.unwrap_or_default().to_le_bytes());
        let mut keys = record.stat_keys().collect::<Vec<_>>();
        keys.sort_unstable();
        for key in keys {
            hasher.update(key.as_bytes());
            hasher.update(record.counter(key).to_le_bytes());
        }
        let mut extras = record.extras().collect::<Vec<_>>();
        extras.sort_unstable();
        for (key, value) in extras {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }
    }
    let digest = hasher.finalize();
    let hex = digest
        .iter()
        .take(8)
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>();
    DatasetId(hex)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_envelope_uses_embedded_dataset_name() {
        let body = r#"{"dataset": "player_stats", "count": 1, "data": [
            {"player_id": "a", "player_display_name": "A", "position": "WR", "routes": 300}
        ]}"#;
        let dataset = Dataset::from_json_reader("fallback", body.as_bytes()).expect("load");
        assert_eq!(dataset.name(), "player_stats");
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.records()[0].counter("routes"), 300.0);
    }

    #[test]
    fn next_gen_presence_is_computed_once_at_load() {
        let body = r#"[
            {"player_id": "a", "position": "WR"},
            {"player_id": "b", "position": "WR", "ngs_avg_separation": 3.1}
        ]"#;
        let dataset = Dataset::from_json_reader("x", body.as_bytes()).expect("load");
        assert!(dataset.has_next_gen_stats());
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let a = Dataset::from_json_reader("x", r#"[{"player_id": "a", "carries": 1}]"#.as_bytes())
            .expect("load");
        let b = Dataset::from_json_reader("x", r#"[{"player_id": "a", "carries": 2}]"#.as_bytes())
            .expect("load");
        let a_again =
            Dataset::from_json_reader("x", r#"[{"player_id": "a", "carries": 1}]"#.as_bytes())
                .expect("load");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), &a_again.id().clone());
    }

    #[test]
    fn fingerprint_covers_text_fields() {
        let load = |body: &str| Dataset::from_json_reader("x", body.as_bytes()).expect("load");
        let rookie = load(r#"[{"player_id": "a", "college": "Ohio State"}]"#);
        let transfer = load(r#"[{"player_id": "a", "college": "Alabama"}]"#);
        assert_eq!(rookie.records()[0].extra("college"), Some("Ohio State"));
        assert_ne!(rookie.id(), transfer.id());
    }

    #[test]
    fn csv_rows_become_records() {
        let body = "player_id,player_display_name,position,carries,rushing_yards\n\
                    r1,Runner One,RB,10,47\n\
                    r2,Runner Two,RB,,12\n";
        let dataset = Dataset::from_csv_reader("rb", body.as_bytes(), b',').expect("load");
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.records()[1].stat("carries"), None);
        assert_eq!(dataset.records()[1].counter("rushing_yards"), 12.0);
    }

    #[test]
    fn for_season_keeps_matching_records() {
        let body = r#"[
            {"player_id": "a", "season": 2022},
            {"player_id": "a", "season": 2023},
            {"player_id": "b", "season": 2023}
        ]"#;
        let dataset = Dataset::from_json_reader("x", body.as_bytes()).expect("load");
        assert_eq!(dataset.seasons(), vec![2022, 2023]);
        let latest = dataset.for_seasons(&[2023]);
        assert_eq!(latest.len(), 2);
        assert_ne!(latest.id(), dataset.id());
        assert_eq!(dataset.for_seasons(&[2022, 2023]).len(), 3);
        assert_eq!(dataset.for_seasons(&[2021]).len(), 0);
        assert_eq!(dataset.for_seasons(&[]).id(), dataset.id());
    }

    #[test]
    fn non_array_documents_are_rejected() {
        let err = Dataset::from_json_reader("x", "42".as_bytes()).unwrap_err();
        assert!(matches!(err, StatError::NotAnArray { found: "number" }));
    }
}
