//! Output formatting utilities

use chrono::{DateTime, Local, TimeZone, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, CellAlignment, ContentArrangement, Table};
use rust_decimal::Decimal;

use coffer_core::{Account, Transaction};

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Amount with two decimals and its currency, e.g. `1 250.00 SEK`
pub fn format_money(amount: Decimal, valuta: &str) -> String {
    let rounded = amount.round_dp(2);
    let text = format!("{:.2}", rounded);
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (int_part, frac) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    format!("{sign}{grouped}.{frac} {valuta}")
}

pub fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub fn format_timestamp_ms(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

fn right(text: String) -> Cell {
    Cell::new(text).set_alignment(CellAlignment::Right)
}

pub fn accounts_table(accounts: &[Account]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["ID", "Number", "Name", "Type", "Balance", "Rate"]);
    for account in accounts {
        let rate = if account.is_savings() {
            format!("{}%", account.interest_rate)
        } else {
            "-".to_string()
        };
        table.add_row(vec![
            Cell::new(account.id),
            Cell::new(&account.account_number),
            Cell::new(&account.name),
            Cell::new(&account.account_type),
            right(format_money(account.balance(), &account.valuta)),
            right(rate),
        ]);
    }
    table
}

pub fn transactions_table(transactions: &[Transaction], valuta: &str) -> Table {
    let mut table = create_table();
    table.set_header(vec!["#", "Date", "Type", "Amount", "Balance", "Description"]);
    for tx in transactions {
        table.add_row(vec![
            Cell::new(tx.id),
            Cell::new(format_time(tx.date)),
            Cell::new(tx.kind.as_str()),
            right(format_money(tx.amount, valuta)),
            right(format_money(tx.balance_after, valuta)),
            Cell::new(&tx.description),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(Decimal::new(125000, 2), "SEK"), "1 250.00 SEK");
        assert_eq!(format_money(Decimal::new(5, 1), "EUR"), "0.50 EUR");
        assert_eq!(format_money(Decimal::new(-1234567, 0), "USD"), "-1 234 567.00 USD");
        assert_eq!(format_money(Decimal::new(100, 0), "SEK"), "100.00 SEK");
    }
}
