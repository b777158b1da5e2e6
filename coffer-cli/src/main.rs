//! Coffer CLI - personal banking ledger in your terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use coffer_core::services::LogEvent;
use coffer_core::OperationResult;
use commands::{account, data, funds, history, interest, logs, pin, status};

/// Coffer - personal banking ledger in your terminal
#[derive(Parser)]
#[command(name = "coffer", version, about, long_about = None)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// PIN for commands that change the ledger
    #[arg(long, global = true, env = "COFFER_PIN", hide_env_values = true)]
    pin: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Deposit money into an account
    Deposit {
        /// Account id or account number
        account: String,
        /// Amount, e.g. 125.50
        amount: String,
    },

    /// Withdraw money from an account
    Withdraw {
        /// Account id or account number
        account: String,
        /// Amount, e.g. 40
        amount: String,
    },

    /// Move money between two accounts
    Transfer {
        /// Source account id or number
        from: String,
        /// Destination account id or number
        to: String,
        /// Amount to move
        amount: String,
    },

    /// Show an account's transaction history
    History {
        /// Account id or account number
        account: String,
        /// Earliest date (YYYY-MM-DD or RFC 3339), inclusive
        #[arg(long)]
        from: Option<String>,
        /// Latest date (YYYY-MM-DD or RFC 3339), inclusive
        #[arg(long)]
        to: Option<String>,
        /// Only this transaction type, e.g. Deposit or "Transfer Out"
        #[arg(long = "type")]
        kind: Option<String>,
        /// Sort by amount or date
        #[arg(long)]
        sort: Option<String>,
        /// Largest or newest first
        #[arg(long)]
        desc: bool,
        /// Write the full statement as CSV
        #[arg(long, conflicts_with_all = ["from", "to", "kind", "sort", "desc"])]
        csv: bool,
    },

    /// Record a transaction without changing the balance
    Record {
        /// Account id or account number
        account: String,
        /// Amount shown on the record
        amount: String,
        /// Transaction type
        #[arg(long = "type")]
        kind: String,
        /// Free-text description
        #[arg(long)]
        description: Option<String>,
    },

    /// Apply accrued interest to savings accounts
    Interest {
        /// Account id or account number
        #[arg(long, conflicts_with = "all")]
        account: Option<String>,
        /// Every savings account
        #[arg(long)]
        all: bool,
        /// Show what would be credited without applying it
        #[arg(long)]
        preview: bool,
    },

    /// Manage the PIN
    Pin {
        #[command(subcommand)]
        command: pin::PinCommands,
    },

    /// Export the whole ledger as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace the ledger with an exported JSON document
    Import {
        /// Exported JSON file
        file: PathBuf,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Show ledger summary
    Status,

    /// View or prune the event log
    Logs {
        /// Show only errors
        #[arg(long)]
        errors: bool,
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Delete entries older than N days
        #[arg(long)]
        prune_days: Option<u32>,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Account { .. } => "account",
            Commands::Deposit { .. } => "deposit",
            Commands::Withdraw { .. } => "withdraw",
            Commands::Transfer { .. } => "transfer",
            Commands::History { .. } => "history",
            Commands::Record { .. } => "record",
            Commands::Interest { .. } => "interest",
            Commands::Pin { .. } => "pin",
            Commands::Export { .. } => "export",
            Commands::Import { .. } => "import",
            Commands::Status => "status",
            Commands::Logs { .. } => "logs",
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("COFFER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let json = cli.json;
    let name = cli.command.name();

    let logger = commands::get_logger();
    commands::log_event(&logger, LogEvent::new("command_executed").with_command(name));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            commands::log_event(
                &logger,
                LogEvent::new(format!("{name}_failed"))
                    .with_command(name)
                    .with_error(e.to_string()),
            );
            if json {
                let failed = OperationResult::<()>::fail(format!("{e:#}"));
                match serde_json::to_string_pretty(&failed) {
                    Ok(text) => println!("{}", text),
                    Err(_) => output::error(&format!("{e:#}")),
                }
            } else {
                output::error(&format!("{e:#}"));
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    let pin = cli.pin.as_deref();

    match cli.command {
        Commands::Account { command } => account::run(command, json, pin).await,
        Commands::Deposit { account, amount } => funds::deposit(&account, &amount, json, pin).await,
        Commands::Withdraw { account, amount } => {
            funds::withdraw(&account, &amount, json, pin).await
        }
        Commands::Transfer { from, to, amount } => {
            funds::transfer(&from, &to, &amount, json, pin).await
        }
        Commands::History { account, from, to, kind, sort, desc, csv } => {
            let args = history::HistoryArgs { account, from, to, kind, sort, desc, csv };
            history::run(args, json).await
        }
        Commands::Record { account, amount, kind, description } => {
            history::record(&account, &amount, &kind, description, json, pin).await
        }
        Commands::Interest { account, all, preview } => {
            interest::run(account, all, preview, json, pin).await
        }
        Commands::Pin { command } => pin::run(command, json, pin).await,
        Commands::Export { output } => data::export(output, json).await,
        Commands::Import { file, force } => data::import(&file, force, json, pin).await,
        Commands::Status => status::run(json).await,
        Commands::Logs { errors, limit, prune_days, force } => {
            logs::run(logs::LogsArgs { errors, limit, prune_days, force }, json)
        }
    }
}
