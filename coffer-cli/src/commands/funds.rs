//! Deposit, withdraw and transfer commands

use anyhow::Result;

use super::{get_context, parse_amount, print_json, require_pin, resolve_account};
use crate::output::{self, format_money};

pub async fn deposit(account: &str, amount: &str, json: bool, pin: Option<&str>) -> Result<()> {
    let ctx = get_context().await?;
    require_pin(&ctx, pin).await?;
    let account = resolve_account(&ctx, account)?;

    let tx = ctx.ledger.deposit(account.id, parse_amount(amount)?).await?;
    ctx.ledger.flush().await;

    if json {
        return print_json(&tx);
    }
    output::success(&format!(
        "Deposited {} to {}",
        format_money(tx.amount, &account.valuta),
        account.name
    ));
    println!("  New balance: {}", format_money(tx.balance_after, &account.valuta));
    Ok(())
}

pub async fn withdraw(account: &str, amount: &str, json: bool, pin: Option<&str>) -> Result<()> {
    let ctx = get_context().await?;
    require_pin(&ctx, pin).await?;
    let account = resolve_account(&ctx, account)?;

    let tx = ctx.ledger.withdraw(account.id, parse_amount(amount)?).await?;
    ctx.ledger.flush().await;

    if json {
        return print_json(&tx);
    }
    output::success(&format!(
        "Withdrew {} from {}",
        format_money(tx.amount, &account.valuta),
        account.name
    ));
    println!("  New balance: {}", format_money(tx.balance_after, &account.valuta));
    Ok(())
}

pub async fn transfer(
    from: &str,
    to: &str,
    amount: &str,
    json: bool,
    pin: Option<&str>,
) -> Result<()> {
    let ctx = get_context().await?;
    require_pin(&ctx, pin).await?;
    let source = resolve_account(&ctx, from)?;
    let target = resolve_account(&ctx, to)?;

    if source.valuta != target.valuta {
        output::warning(&format!(
            "Accounts use different currencies ({} and {}); no conversion is applied",
            source.valuta, target.valuta
        ));
    }

    let result = ctx
        .ledger
        .transfer_funds(source.id, target.id, parse_amount(amount)?)
        .await;
    // A failed transfer may still have debited the source
    ctx.ledger.flush().await;
    let records = result?;

    if json {
        return print_json(&records);
    }
    output::success(&format!(
        "Transferred {} from {} to {}",
        format_money(records[0].amount, &source.valuta),
        source.name,
        target.name
    ));
    println!(
        "  {}: {}",
        source.name,
        format_money(records[0].balance_after, &source.valuta)
    );
    println!(
        "  {}: {}",
        target.name,
        format_money(records[1].balance_after, &target.valuta)
    );
    Ok(())
}
