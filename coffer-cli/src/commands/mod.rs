//! CLI command implementations

pub mod account;
pub mod data;
pub mod funds;
pub mod history;
pub mod interest;
pub mod logs;
pub mod pin;
pub mod status;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use dialoguer::Password;
use rust_decimal::Decimal;
use serde::Serialize;

use coffer_core::services::{LogEvent, LoggingService};
use coffer_core::{Account, AccountId, CofferContext, OperationResult};

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    LoggingService::new(&data_dir, "cli", env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Data directory from `COFFER_DIR`, or `~/.coffer`
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("COFFER_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".coffer"))
        .ok_or_else(|| anyhow!("Could not find home directory; set COFFER_DIR"))
}

/// Open the data directory and load the ledger
pub async fn get_context() -> Result<CofferContext> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    CofferContext::open(&data_dir)
        .await
        .context("Failed to open the ledger")
}

/// Unlock the access gate when a PIN is set
///
/// The PIN comes from `--pin` / `COFFER_PIN`, or an interactive prompt.
pub async fn require_pin(ctx: &CofferContext, pin: Option<&str>) -> Result<()> {
    if ctx.access.needs_setup().await {
        return Ok(());
    }

    let pin = match pin {
        Some(pin) => pin.to_string(),
        None => Password::new()
            .with_prompt("PIN")
            .interact()
            .context("A PIN is set; pass --pin or COFFER_PIN")?,
    };

    if !ctx.access.unlock(&pin).await {
        log_event(&get_logger(), LogEvent::new("pin_rejected"));
        bail!("Incorrect PIN");
    }
    Ok(())
}

/// Resolve an account by numeric id or by account number
pub fn resolve_account(ctx: &CofferContext, reference: &str) -> Result<Account> {
    if let Ok(id) = reference.trim().parse::<u32>() {
        if let Ok(account) = ctx.ledger.get_account(AccountId(id)) {
            return Ok(account);
        }
    }
    ctx.ledger
        .find_by_number(reference.trim())
        .ok_or_else(|| anyhow!("Account not found: {}", reference))
}

pub fn parse_amount(value: &str) -> Result<Decimal> {
    Decimal::from_str(value.trim()).map_err(|_| anyhow!("Invalid amount: {}", value))
}

/// Print `data` wrapped in a successful `OperationResult`
pub fn print_json<T: Serialize>(data: T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&OperationResult::ok(data))?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 12.50 ").unwrap(), Decimal::new(1250, 2));
        assert!(parse_amount("12,50").is_err());
        assert!(parse_amount("").is_err());
    }
}
