//! Column listing for a position view.
//!
//! Renders the registry's ordered column set (ids, labels, formats, and
//! whether each is essential or shown by default) as an ASCII table.

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::ColumnsArgs,
    dataset::Dataset,
    schema::{Alignment, FeatureFlags, columns_for},
    table,
};

pub fn execute(args: &ColumnsArgs) -> Result<()> {
    let dataset_has_next_gen = match &args.input {
        Some(path) => Dataset::load(path)
            .with_context(|| format!("Loading records from {path:?}"))?
            .has_next_gen_stats(),
        None => true,
    };
    let flags = FeatureFlags::for_view(
        args.next_gen,
        args.scoring,
        args.position,
        dataset_has_next_gen,
    );
    let columns = columns_for(args.position, flags);

    let mut rows = Vec::with_capacity(columns.len());
    for (idx, column) in columns.iter().enumerate() {
        let marker = if column.essential {
            "essential"
        } else if column.visible_by_default {
            "default"
        } else {
            ""
        };
        rows.push(vec![
            (idx + 1).to_string(),
            column.id.clone(),
            column.label.clone(),
            column.format.as_str().to_string(),
            marker.to_string(),
        ]);
    }

    let headers = vec![
        "#".to_string(),
        "id".to_string(),
        "label".to_string(),
        "format".to_string(),
        "shown".to_string(),
    ];
    let alignments = [
        Alignment::Right,
        Alignment::Left,
        Alignment::Left,
        Alignment::Left,
        Alignment::Left,
    ];
    table::print_table(&headers, &alignments, &rows);
    info!(
        "Listed {} column(s) for the {} view",
        columns.len(),
        args.position
    );
    Ok(())
}
