//! PIN command - manage the PIN that guards mutating commands

use anyhow::{bail, Result};
use clap::Subcommand;
use dialoguer::Password;
use serde_json::json;

use coffer_core::services::LogEvent;

use super::{get_context, get_logger, log_event, print_json, require_pin};
use crate::output;

#[derive(Subcommand)]
pub enum PinCommands {
    /// Set or change the PIN (the current one is required to change it)
    Set {
        /// New 4-digit PIN (prompted if omitted)
        #[arg(long)]
        new: Option<String>,
    },
    /// Check a PIN without changing anything
    Check {
        /// PIN to check (prompted if omitted)
        candidate: Option<String>,
    },
    /// Remove the PIN
    Clear,
    /// Show whether a PIN is set
    Status,
}

pub async fn run(command: PinCommands, json: bool, pin: Option<&str>) -> Result<()> {
    let ctx = get_context().await?;

    match command {
        PinCommands::Set { new } => {
            require_pin(&ctx, pin).await?;
            let new = match new {
                Some(new) => new,
                None => Password::new()
                    .with_prompt("New PIN")
                    .with_confirmation("Repeat PIN", "PINs do not match")
                    .interact()?,
            };
            ctx.access.set_up(&new).await?;
            if !ctx.pins.validate_pin(&new).await {
                bail!("The PIN could not be stored");
            }
            if json {
                return print_json(json!({ "pinSet": true }));
            }
            output::success("PIN set");
        }
        PinCommands::Check { candidate } => {
            let candidate = match candidate {
                Some(candidate) => candidate,
                None => Password::new().with_prompt("PIN").interact()?,
            };
            if !ctx.pins.validate_pin(&candidate).await {
                log_event(&get_logger(), LogEvent::new("pin_rejected").with_command("pin check"));
                bail!("Incorrect PIN");
            }
            if json {
                return print_json(json!({ "valid": true }));
            }
            output::success("PIN is correct");
        }
        PinCommands::Clear => {
            require_pin(&ctx, pin).await?;
            ctx.pins.clear_pin().await;
            ctx.access.lock();
            if json {
                return print_json(json!({ "pinSet": false }));
            }
            output::success("PIN removed");
        }
        PinCommands::Status => {
            let scheme = ctx.pins.stored_scheme().await;
            if json {
                return print_json(json!({
                    "pinSet": scheme.is_some(),
                    "scheme": scheme,
                    "newPinScheme": ctx.config.pin.scheme,
                }));
            }
            match scheme {
                Some(scheme) => output::info(&format!("A PIN is set ({:?} hash)", scheme)),
                None => output::warning("No PIN is set; anyone with access to this machine can change the ledger"),
            }
        }
    }

    Ok(())
}
