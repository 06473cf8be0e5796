use std::{fs, io::Write};

use anyhow::{Context, Result};
use log::info;

use crate::{cli::ExportArgs, io_utils, leaderboard};

pub fn execute(args: &ExportArgs) -> Result<()> {
    let mut stat_table = leaderboard::open_table(&args.view)?;
    stat_table.drain_cache();

    let target = match (&args.output, &args.output_dir) {
        (Some(path), _) => Some(path.clone()),
        (None, Some(dir)) => {
            fs::create_dir_all(dir).with_context(|| format!("Creating directory {dir:?}"))?;
            Some(dir.join(stat_table.export_file_name()))
        }
        (None, None) => None,
    };

    let csv = stat_table.export(args.mode).context("Serializing CSV export")?;
    let mut writer = io_utils::open_output(target.as_deref())
        .with_context(|| format!("Opening export destination {target:?}"))?;
    writer
        .write_all(csv.as_bytes())
        .and_then(|_| writer.flush())
        .context("Writing CSV export")?;

    match &target {
        Some(path) => info!(
            "Exported {} row(s) x {} column(s) to {path:?}",
            stat_table.visible_rows().len(),
            stat_table.visible_columns().len()
        ),
        None => info!(
            "Exported {} row(s) x {} column(s)",
            stat_table.visible_rows().len(),
            stat_table.visible_columns().len()
        ),
    }
    Ok(())
}
