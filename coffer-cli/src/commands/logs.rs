//! Logs command - view and prune the application event log

use anyhow::Result;
use colored::Colorize;
use dialoguer::Confirm;
use serde_json::json;

use coffer_core::services::LoggingService;

use super::{get_data_dir, print_json};
use crate::output::{create_table, format_timestamp_ms};

pub struct LogsArgs {
    pub errors: bool,
    pub limit: usize,
    pub prune_days: Option<u32>,
    pub force: bool,
}

fn get_logging_service() -> Result<LoggingService> {
    LoggingService::new(&get_data_dir()?, "cli", env!("CARGO_PKG_VERSION"))
}

pub fn run(args: LogsArgs, json: bool) -> Result<()> {
    let service = get_logging_service()?;

    if let Some(days) = args.prune_days {
        if !args.force && !json {
            let confirmed = Confirm::new()
                .with_prompt(format!("Delete log entries older than {} days?", days))
                .default(false)
                .interact()?;
            if !confirmed {
                println!("Cancelled.");
                return Ok(());
            }
        }

        let deleted = service.prune_older_than_days(days)?;
        if json {
            return print_json(json!({ "deleted": deleted }));
        }
        println!("Deleted {} log entries", deleted);
        return Ok(());
    }

    let entries = if args.errors {
        service.get_errors(args.limit)?
    } else {
        service.get_recent(args.limit)?
    };

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No log entries found.");
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Time", "Event", "Command", "Error"]);
    for entry in &entries {
        table.add_row(vec![
            format_timestamp_ms(entry.timestamp),
            entry.event.clone(),
            entry.command.clone().unwrap_or_default(),
            entry.error_message.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", table);

    let total = service.count()?;
    println!(
        "{}",
        format!(
            "Showing {} of {} entries ({})",
            entries.len(),
            total,
            service.db_path().display()
        )
        .dimmed()
    );
    Ok(())
}
