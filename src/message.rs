//! User-facing message texts.

use crate::core::rate::RateQuote;

/// `USD → 92.51 ₽ ▲` followed by the as-of date.
pub fn format_rate_message(quote: &RateQuote) -> String {
    let mut date_line = format!("Date: {}", quote.as_of_date.format("%Y-%m-%d"));
    if quote.stale {
        date_line.push_str(" (archived, today's rate is not published yet)");
    }
    format!(
        "{} → {:.2} ₽ {}\n{}",
        quote.currency_code,
        quote.rate.round_dp(2),
        quote.trend.arrow(),
        date_line
    )
}

pub fn acquisition_failed_message(currency_code: &str) -> String {
    format!(
        "Could not get the {} rate right now. Please try again later.",
        currency_code.to_ascii_uppercase()
    )
}

pub fn resolution_failed_message(city: &str) -> String {
    format!("Could not find \"{}\". Try a different city.", city.trim())
}
