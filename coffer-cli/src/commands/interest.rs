//! Interest command - accrue interest on savings accounts

use anyhow::{bail, Result};
use serde::Serialize;

use coffer_core::{AccountId, Transaction};

use super::{get_context, print_json, require_pin, resolve_account};
use crate::output::{self, format_money};

#[derive(Serialize)]
struct Preview {
    account_id: AccountId,
    accrued: rust_decimal::Decimal,
}

pub async fn run(
    account: Option<String>,
    all: bool,
    preview: bool,
    json: bool,
    pin: Option<&str>,
) -> Result<()> {
    let ctx = get_context().await?;

    let targets = match (&account, all) {
        (Some(reference), false) => vec![resolve_account(&ctx, reference)?],
        (None, true) => ctx
            .ledger
            .get_accounts()
            .into_iter()
            .filter(|a| a.is_savings())
            .collect(),
        _ => bail!("Pass either --account or --all"),
    };

    if preview {
        let mut previews = Vec::new();
        for target in &targets {
            previews.push(Preview {
                account_id: target.id,
                accrued: ctx.ledger.preview_interest(target.id)?,
            });
        }
        if json {
            return print_json(&previews);
        }
        for (target, preview) in targets.iter().zip(&previews) {
            println!(
                "{}: {} accrued",
                target.name,
                format_money(preview.accrued, &target.valuta)
            );
        }
        return Ok(());
    }

    require_pin(&ctx, pin).await?;
    let credited: Vec<Transaction> = match targets.as_slice() {
        [single] if !all => ctx.ledger.apply_interest(single.id).await?.into_iter().collect(),
        _ => ctx.ledger.apply_interest_to_all_savings_accounts().await?,
    };
    ctx.ledger.flush().await;

    if json {
        return print_json(&credited);
    }
    if credited.is_empty() {
        output::info("No interest has accrued yet.");
        return Ok(());
    }
    for tx in &credited {
        let Some(target) = targets.iter().find(|a| a.id == tx.account_id) else {
            continue;
        };
        output::success(&format!(
            "Credited {} to {} (balance {})",
            format_money(tx.amount, &target.valuta),
            target.name,
            format_money(tx.balance_after, &target.valuta)
        ));
    }
    Ok(())
}
