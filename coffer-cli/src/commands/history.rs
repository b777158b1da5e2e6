//! History and record commands

use std::collections::HashSet;
use std::io;

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use coffer_core::services::SortKey;

use super::{get_context, parse_amount, print_json, require_pin, resolve_account};
use crate::output;

pub struct HistoryArgs {
    pub account: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub kind: Option<String>,
    pub sort: Option<String>,
    pub desc: bool,
    pub csv: bool,
}

/// Accept `YYYY-MM-DD` or a full RFC 3339 timestamp
///
/// A bare date means the start of that day for `from` and its last
/// nanosecond for `to`, so both bounds include the whole day.
fn parse_bound(value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid date '{}'. Use YYYY-MM-DD or RFC 3339", value))?;
    let time = if end_of_day {
        NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
    } else {
        Some(NaiveTime::MIN)
    };
    let time = time.ok_or_else(|| anyhow!("Invalid time of day"))?;
    Ok(date.and_time(time).and_utc())
}

pub async fn run(args: HistoryArgs, json: bool) -> Result<()> {
    let ctx = get_context().await?;
    let account = resolve_account(&ctx, &args.account)?;

    if args.csv {
        let stdout = io::stdout();
        ctx.ledger.export_history_csv(account.id, stdout.lock())?;
        return Ok(());
    }

    let from = args.from.as_deref().map(|v| parse_bound(v, false)).transpose()?;
    let to = args.to.as_deref().map(|v| parse_bound(v, true)).transpose()?;
    let filtered = ctx
        .ledger
        .filter_history(account.id, from, to, args.kind.as_deref());

    let transactions = match args.sort.as_deref() {
        Some(key) => {
            if SortKey::parse(key).is_none() {
                bail!("Unknown sort key '{}'. Use amount or date", key);
            }
            let keep: HashSet<u64> = filtered.iter().map(|t| t.id).collect();
            ctx.ledger
                .sort_history(account.id, key, !args.desc)
                .into_iter()
                .filter(|t| keep.contains(&t.id))
                .collect()
        }
        None if args.desc => filtered.into_iter().rev().collect(),
        None => filtered,
    };

    if json {
        return print_json(&transactions);
    }
    if transactions.is_empty() {
        output::info("No matching transactions.");
        return Ok(());
    }
    println!("{}", output::transactions_table(&transactions, &account.valuta));
    Ok(())
}

/// Append a free-form record; balances are not touched
pub async fn record(
    account: &str,
    amount: &str,
    kind: &str,
    description: Option<String>,
    json: bool,
    pin: Option<&str>,
) -> Result<()> {
    let ctx = get_context().await?;
    require_pin(&ctx, pin).await?;
    let account = resolve_account(&ctx, account)?;

    let tx = ctx
        .ledger
        .create_transaction(
            account.id,
            parse_amount(amount)?,
            kind,
            description.as_deref().unwrap_or_default(),
        )
        .await?;
    ctx.ledger.flush().await;

    if json {
        return print_json(&tx);
    }
    output::success(&format!("Recorded {} #{} on {}", tx.kind, tx.id, account.name));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_bound() {
        assert_eq!(
            parse_bound("2024-03-01", false).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        let end = parse_bound("2024-03-01", true).unwrap();
        assert_eq!(end.format("%H:%M:%S%.9f").to_string(), "23:59:59.999999999");
        let last_instant = Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 59).unwrap()
            + chrono::Duration::nanoseconds(999_999_500);
        assert!(last_instant <= end);
        assert!(end < Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap());
        assert_eq!(
            parse_bound("2024-03-01T10:00:00+02:00", false).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
        );
        assert!(parse_bound("01/03/2024", false).is_err());
    }
}
