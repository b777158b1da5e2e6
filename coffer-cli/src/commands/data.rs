//! Export and import of the whole ledger

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use dialoguer::Confirm;
use serde_json::json;

use super::{get_context, print_json, require_pin};
use crate::output;

pub async fn export(output_path: Option<PathBuf>, json: bool) -> Result<()> {
    let ctx = get_context().await?;
    let document = ctx.ledger.export_data()?;

    let Some(path) = output_path else {
        println!("{}", document);
        return Ok(());
    };

    std::fs::write(&path, &document)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    let summary = ctx.ledger.summary();

    if json {
        return print_json(json!({
            "path": path,
            "accounts": summary.total_accounts,
            "transactions": summary.total_transactions,
        }));
    }
    output::success(&format!(
        "Exported {} accounts and {} transactions to {}",
        summary.total_accounts,
        summary.total_transactions,
        path.display()
    ));
    Ok(())
}

pub async fn import(file: &Path, force: bool, json: bool, pin: Option<&str>) -> Result<()> {
    let ctx = get_context().await?;
    require_pin(&ctx, pin).await?;

    let document = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let existing = ctx.ledger.summary();
    if existing.total_accounts > 0 && !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Replace {} accounts and {} transactions with the contents of {}?",
                existing.total_accounts,
                existing.total_transactions,
                file.display()
            ))
            .default(false)
            .interact()
            .context("Confirmation needed; pass --force to skip it")?;
        if !confirmed {
            bail!("Import cancelled");
        }
    }

    ctx.ledger.import_data(&document).await?;
    ctx.ledger.flush().await;
    let summary = ctx.ledger.summary();

    if json {
        return print_json(json!({
            "accounts": summary.total_accounts,
            "transactions": summary.total_transactions,
        }));
    }
    output::success(&format!(
        "Imported {} accounts and {} transactions",
        summary.total_accounts, summary.total_transactions
    ));
    Ok(())
}
