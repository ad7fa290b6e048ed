//! Terminal tables

use bsr_runner::{CheckpointSummary, RunConfig, RunSummary};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

fn key_value_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Field", "Value"]);
    table
}

pub fn summary_table(config: &RunConfig, summary: &RunSummary, checkpoints: Option<&CheckpointSummary>) -> Table {
    let mut table = key_value_table();
    table.add_row(vec!["Script".to_string(), config.script_path().display().to_string()]);
    table.add_row(vec!["State".to_string(), summary.state.to_string()]);
    table.add_row(vec!["Units read".to_string(), summary.units_read.to_string()]);
    table.add_row(vec!["Units executed".to_string(), summary.units_executed.to_string()]);
    table.add_row(vec!["Units skipped".to_string(), summary.units_skipped.to_string()]);
    table.add_row(vec!["Batches executed".to_string(), summary.batches_executed.to_string()]);
    table.add_row(vec!["Rows affected".to_string(), summary.affected_rows.to_string()]);
    if let Some(checkpoints) = checkpoints {
        table.add_row(vec!["Units checkpointed".to_string(), checkpoints.executed.to_string()]);
    }
    table.add_row(vec![
        "Checkpoint directory".to_string(),
        config.checkpoint_dir().display().to_string(),
    ]);
    table
}

pub fn config_table(config: &RunConfig) -> Table {
    let log_file = config
        .log_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut table = key_value_table();
    table.add_row(vec!["Connection".to_string(), config.connection_target().to_string()]);
    table.add_row(vec!["Script".to_string(), config.script_path().display().to_string()]);
    table.add_row(vec!["Batch size".to_string(), config.batch_size().to_string()]);
    table.add_row(vec!["Delimiter".to_string(), config.unit_delimiter().to_string()]);
    table.add_row(vec!["Addressing".to_string(), config.addressing_mode().to_string()]);
    table.add_row(vec![
        "Resume".to_string(),
        config.continue_from_last_session().to_string(),
    ]);
    table.add_row(vec![
        "Retries".to_string(),
        format!(
            "{} every {}s{}",
            config.retry_count(),
            config.retry_interval().as_secs(),
            if config.retry_backoff() { " (backoff)" } else { "" }
        ),
    ]);
    table.add_row(vec!["Logging".to_string(), config.enable_logging().to_string()]);
    table.add_row(vec!["Log file".to_string(), log_file]);
    table.add_row(vec![
        "Log entries".to_string(),
        format!(
            "{}{}",
            config.max_log_entries(),
            if config.compact_log() { " (compacted)" } else { "" }
        ),
    ]);
    table
}
