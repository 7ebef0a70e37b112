use super::ui;
use crate::core::error::RateError;
use crate::core::rate::{RateProvider, RateQuote};
use crate::core::settings::{STANDARD_CURRENCIES, normalize_currency_code};
use crate::message::{acquisition_failed_message, format_rate_message};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment, Table};

/// Fetches each currency in turn and prints the outcome. A single currency is
/// printed as the notification text a subscriber would receive.
pub async fn run(provider: &dyn RateProvider, currencies: &[String]) -> Result<()> {
    let codes = requested_codes(currencies)?;

    let pb = ui::new_progress_bar(codes.len() as u64);
    let mut results = Vec::with_capacity(codes.len());
    for code in codes {
        pb.set_message(code.clone());
        let outcome = provider.fetch(&code).await;
        pb.inc(1);
        results.push((code, outcome));
    }
    pb.finish_and_clear();

    if let [(code, outcome)] = results.as_slice() {
        match outcome {
            Ok(quote) => println!("{}", format_rate_message(quote)),
            Err(_) => println!(
                "{}",
                ui::style_text(&acquisition_failed_message(code), ui::StyleType::Error)
            ),
        }
        return Ok(());
    }

    println!("{}", ui::style_text("Central bank rates", ui::StyleType::Title));
    println!("{}", quote_table(&results));
    Ok(())
}

fn requested_codes(currencies: &[String]) -> Result<Vec<String>> {
    if currencies.is_empty() {
        return Ok(STANDARD_CURRENCIES.iter().map(|c| c.to_string()).collect());
    }
    let mut codes = Vec::with_capacity(currencies.len());
    for currency in currencies {
        let code = normalize_currency_code(currency)?;
        if !codes.contains(&code) {
            codes.push(code);
        }
    }
    Ok(codes)
}

fn quote_table(results: &[(String, Result<RateQuote, RateError>)]) -> Table {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Rate (₽)"),
        ui::header_cell("Trend"),
        ui::header_cell("Date"),
        ui::header_cell("Source"),
    ]);

    for (code, outcome) in results {
        match outcome {
            Ok(quote) => {
                let date = if quote.stale {
                    format!("{} (archived)", quote.as_of_date)
                } else {
                    quote.as_of_date.to_string()
                };
                table.add_row(vec![
                    Cell::new(code),
                    Cell::new(format!("{:.4}", quote.rate.round_dp(4)))
                        .set_alignment(CellAlignment::Right),
                    ui::trend_cell(quote.trend),
                    Cell::new(date),
                    Cell::new(&quote.source),
                ]);
            }
            Err(e) => {
                table.add_row(vec![
                    Cell::new(code),
                    ui::na_cell(true),
                    ui::na_cell(false),
                    ui::na_cell(false),
                    Cell::new(ui::style_text(&e.to_string(), ui::StyleType::Subtle)),
                ]);
            }
        }
    }
    table
}
