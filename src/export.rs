use std::io::Write;

use clap::ValueEnum;
use itertools::Itertools;

use crate::{
    cache::ValueCache,
    error::{StatError, StatResult},
    format::format_value,
    io_utils,
    metrics::Evaluator,
    record::{PlayerSeasonRecord, PositionGroup},
    schema::ColumnDescriptor,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ExportMode {
    /// Display strings with labels as headers.
    #[default]
    Formatted,
    /// Unformatted numbers with column ids as headers.
    Raw,
}

/// Everything one export needs to read cells.
pub struct ExportSource<'a> {
    pub records: &'a [PlayerSeasonRecord],
    pub rows: &'a [usize],
    pub columns: &'a [ColumnDescriptor],
    pub cache: &'a ValueCache,
    pub evaluator: &'a Evaluator,
    pub view: PositionGroup,
}

pub fn write_csv<W: Write>(writer: W, source: &ExportSource<'_>, mode: ExportMode) -> StatResult<()> {
    let mut csv = io_utils::csv_writer(writer, io_utils::DEFAULT_CSV_DELIMITER);
    let headers = source.columns.iter().map(|column| match mode {
        ExportMode::Formatted => column.label.as_str(),
        ExportMode::Raw => column.id.as_str(),
    });
    csv.write_record(headers)?;
    for &row in source.rows {
        let cells = source.columns.iter().map(|column| {
            let value = source
                .cache
                .value(source.records, row, &column.id, source.evaluator);
            match mode {
                ExportMode::Formatted => format_value(&value, column.format, source.view),
                ExportMode::Raw => value.as_display(),
            }
        });
        csv.write_record(cells)?;
    }
    csv.flush().map_err(|err| StatError::Csv(err.into()))?;
    Ok(())
}

pub fn to_csv(source: &ExportSource<'_>, mode: ExportMode) -> StatResult<String> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, source, mode)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// `<dataset>-<season>-<position>.csv`, lowercase position. Several seasons
/// join with `_`; `all` stands in for no season selection.
pub fn export_file_name(dataset: &str, seasons: &[i32], position: PositionGroup) -> String {
    let season = if seasons.is_empty() {
        "all".to_string()
    } else {
        seasons.iter().sorted().dedup().join("_")
    };
    format!(
        "{dataset}-{season}-{}.csv",
        position.as_str().to_ascii_lowercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Position;

    #[test]
    fn file_name_follows_convention() {
        assert_eq!(
            export_file_name("player_stats", &[2023], PositionGroup::Wr),
            "player_stats-2023-wr.csv"
        );
        assert_eq!(
            export_file_name("player_stats", &[], PositionGroup::All),
            "player_stats-all-all.csv"
        );
        assert_eq!(
            export_file_name("player_stats", &[2023, 2022], PositionGroup::Rb),
            "player_stats-2022_2023-rb.csv"
        );
    }

    #[test]
    fn values_with_commas_and_quotes_are_quoted() {
        let records = vec![
            PlayerSeasonRecord::new("a", "Smith, \"Big\" Al", "KC", Position::Rb)
                .with_stat("carries", 1204.0),
        ];
        let columns = vec![
            crate::schema::descriptor("player", &Evaluator::new()),
            crate::schema::descriptor("carries", &Evaluator::new()),
        ];
        let cache = ValueCache::new();
        let evaluator = Evaluator::new();
        let source = ExportSource {
            records: &records,
            rows: &[0],
            columns: &columns,
            cache: &cache,
            evaluator: &evaluator,
            view: PositionGroup::Rb,
        };
        let formatted = to_csv(&source, ExportMode::Formatted).expect("export");
        assert_eq!(formatted, "Player,Car\n\"Smith, \"\"Big\"\" Al\",\"1,204\"\n");
        let raw = to_csv(&source, ExportMode::Raw).expect("export");
        assert_eq!(raw, "player,carries\n\"Smith, \"\"Big\"\" Al\",1204\n");
    }
}
