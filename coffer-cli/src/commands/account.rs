//! Account command - open, list and inspect accounts

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Input;
use serde::Serialize;

use coffer_core::Account;

use super::{get_context, print_json, require_pin, resolve_account};
use crate::output::{self, format_money, format_time};

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new zero-balance account
    New {
        /// Account name (prompted if omitted)
        name: Option<String>,
        /// Account type; "savings" accounts earn interest
        #[arg(long = "type", default_value = "checking")]
        account_type: String,
        /// Currency code
        #[arg(long, default_value = "SEK")]
        valuta: String,
    },
    /// List all accounts
    List,
    /// Show one account with its accrued interest
    Show {
        /// Account id or account number
        account: String,
    },
}

#[derive(Serialize)]
struct AccountDetails {
    #[serde(flatten)]
    account: Account,
    accrued_interest: rust_decimal::Decimal,
    transactions: usize,
}

pub async fn run(command: AccountCommands, json: bool, pin: Option<&str>) -> Result<()> {
    let ctx = get_context().await?;

    match command {
        AccountCommands::New {
            name,
            account_type,
            valuta,
        } => {
            require_pin(&ctx, pin).await?;
            let name = match name {
                Some(name) => name,
                None => Input::new().with_prompt("Account name").interact_text()?,
            };
            let account = ctx
                .ledger
                .create_account(&name, &account_type, &valuta.to_uppercase())
                .await?;
            ctx.ledger.flush().await;

            if json {
                return print_json(&account);
            }
            output::success(&format!("Opened account {} ({})", account.id, account.name));
            println!("  Number: {}", account.account_number);
            if account.is_savings() {
                println!("  Interest rate: {}% annual", account.interest_rate);
            }
        }
        AccountCommands::List => {
            let accounts = ctx.ledger.get_accounts();
            if json {
                return print_json(&accounts);
            }
            if accounts.is_empty() {
                output::info("No accounts yet. Create one with `coffer account new`.");
                return Ok(());
            }
            println!("{}", output::accounts_table(&accounts));
        }
        AccountCommands::Show { account } => {
            let account = resolve_account(&ctx, &account)?;
            let accrued_interest = ctx.ledger.preview_interest(account.id)?;
            let transactions = ctx.ledger.get_transaction_history(account.id).len();

            if json {
                return print_json(AccountDetails {
                    account,
                    accrued_interest,
                    transactions,
                });
            }

            println!("{}", account.name.bold());
            println!("  ID:           {}", account.id);
            println!("  Number:       {}", account.account_number);
            println!("  Type:         {}", account.account_type);
            println!(
                "  Balance:      {}",
                format_money(account.balance(), &account.valuta).bold()
            );
            println!("  Opened:       {}", format_time(account.created_at));
            println!("  Transactions: {}", transactions);
            if account.is_savings() {
                println!("  Rate:         {}% annual", account.interest_rate);
                println!("  Last accrual: {}", format_time(account.last_interest_at));
                println!(
                    "  Accrued now:  {}",
                    format_money(accrued_interest, &account.valuta)
                );
            }
        }
    }

    Ok(())
}
