use super::ui;
use crate::core::error::ResolveError;
use crate::core::geo::GeoLocation;
use crate::core::settings::format_utc_offset;
use crate::message::resolution_failed_message;
use crate::resolver::GeoResolver;
use anyhow::Result;

pub async fn run(resolver: &GeoResolver, city: &str) -> Result<()> {
    let spinner = ui::new_spinner(&format!("Looking up {}", city.trim()));
    let outcome = resolver.resolve(city).await;
    spinner.finish_and_clear();

    println!("{}", describe(city, &outcome));
    Ok(())
}

fn describe(city: &str, outcome: &Result<GeoLocation, ResolveError>) -> String {
    match outcome {
        Ok(location) => [
            ("City", city.trim().to_string()),
            ("Latitude", format!("{:.4}", location.latitude)),
            ("Longitude", format!("{:.4}", location.longitude)),
            ("Timezone", format_utc_offset(location.utc_offset_minutes)),
        ]
        .iter()
        .map(|(label, value)| {
            format!(
                "{} {}",
                ui::style_text(&format!("{label}:"), ui::StyleType::Label),
                ui::style_text(value, ui::StyleType::Value)
            )
        })
        .collect::<Vec<_>>()
        .join("\n"),
        Err(_) => ui::style_text(&resolution_failed_message(city), ui::StyleType::Error),
    }
}
