//! Status command - ledger summary and storage health

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use serde::Serialize;

use coffer_core::config::StorageBackend;
use coffer_core::services::{LedgerSummary, PersistenceStats};

use super::{get_context, print_json};
use crate::output::format_money;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Status {
    data_dir: String,
    storage: StorageBackend,
    pin_set: bool,
    #[serde(flatten)]
    summary: LedgerSummary,
    persistence: PersistenceStats,
}

pub async fn run(json: bool) -> Result<()> {
    let ctx = get_context().await?;
    let status = Status {
        data_dir: ctx.data_dir.display().to_string(),
        storage: ctx.config.storage.backend,
        pin_set: ctx.pins.has_pin().await,
        summary: ctx.ledger.summary(),
        persistence: ctx.ledger.persistence_stats(),
    };

    if json {
        return print_json(&status);
    }

    println!("{}", "Ledger Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Accounts".to_string(), status.summary.total_accounts.to_string()]);
    table.add_row(vec![
        "Savings accounts".to_string(),
        status.summary.savings_accounts.to_string(),
    ]);
    table.add_row(vec![
        "Transactions".to_string(),
        status.summary.total_transactions.to_string(),
    ]);
    table.add_row(vec![
        "PIN".to_string(),
        if status.pin_set { "set" } else { "not set" }.to_string(),
    ]);
    table.add_row(vec![
        "Storage".to_string(),
        format!("{:?} in {}", status.storage, status.data_dir),
    ]);
    println!("{}", table);

    if !status.summary.totals.is_empty() {
        println!();
        println!("{}", "Totals".bold());
        for (valuta, total) in &status.summary.totals {
            println!("  {}", format_money(*total, valuta));
        }
    }

    Ok(())
}
