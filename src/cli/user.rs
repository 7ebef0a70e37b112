use super::ui;
use crate::core::settings::{UserId, UserSettings, parse_utc_offset};
use crate::message::resolution_failed_message;
use crate::{App, UserAction};
use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::{debug, info};

#[derive(Subcommand)]
pub enum UserCommand {
    /// Print the current settings
    Show,
    /// Set the timezone from a city name
    City {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Set the timezone from an offset such as UTC+3
    Timezone { offset: String },
    /// Set the notification currency
    Currency { code: String },
    /// Set the local notification time as HH:MM
    Time { time: String },
    /// Turn notifications on
    Enable,
    /// Turn notifications off
    Disable,
}

impl From<UserCommand> for UserAction {
    fn from(cmd: UserCommand) -> UserAction {
        match cmd {
            UserCommand::Show => UserAction::Show,
            UserCommand::City { name } => UserAction::City(name.join(" ")),
            UserCommand::Timezone { offset } => UserAction::Timezone(offset),
            UserCommand::Currency { code } => UserAction::Currency(code),
            UserCommand::Time { time } => UserAction::Time(time),
            UserCommand::Enable => UserAction::Enable,
            UserCommand::Disable => UserAction::Disable,
        }
    }
}

pub async fn run(app: &App, user_id: UserId, action: UserAction) -> Result<()> {
    match apply(app, user_id, action).await? {
        Some(settings) => {
            println!("{}", ui::style_text(&format!("User {user_id}"), ui::StyleType::Title));
            println!("{}", settings.summary());
            if settings.notifications_enabled && !settings.is_schedulable() {
                println!(
                    "{}",
                    ui::style_text(
                        "Notifications start once timezone, currency and time are all set.",
                        ui::StyleType::Subtle
                    )
                );
            }
            if let Some(fire_at) = app.scheduler().next_fire_for(user_id) {
                println!("Next notification: {}", fire_at.format("%Y-%m-%d %H:%M UTC"));
            }
        }
        None => println!("No settings stored for user {user_id}"),
    }
    Ok(())
}

/// Applies one change to the user's stored settings, re-arms their trigger
/// and returns the result. `Show` only reads.
pub async fn apply(app: &App, user_id: UserId, action: UserAction) -> Result<Option<UserSettings>> {
    let stored = app
        .storage
        .get_user_settings(user_id)
        .await
        .with_context(|| format!("Failed to load settings for user {user_id}"))?;
    if matches!(action, UserAction::Show) {
        return Ok(stored);
    }

    let mut settings = stored.unwrap_or_else(|| UserSettings::new(user_id));
    match action {
        UserAction::Show => {}
        UserAction::City(city) => {
            let spinner = ui::new_spinner(&format!("Looking up {}", city.trim()));
            let outcome = app.resolver().resolve(&city).await;
            spinner.finish_and_clear();
            let location = outcome.context(resolution_failed_message(&city))?;
            settings.set_timezone(location.utc_offset_minutes);
        }
        UserAction::Timezone(text) => settings.set_timezone(parse_utc_offset(&text)?),
        UserAction::Currency(code) => settings.set_currency(&code)?,
        UserAction::Time(text) => {
            let (hour, minute) = parse_local_time(&text)?;
            settings.set_notification_time(hour, minute)?;
        }
        UserAction::Enable => settings.set_notifications_enabled(true),
        UserAction::Disable => settings.set_notifications_enabled(false),
    }

    app.storage
        .save_user_settings(&settings)
        .await
        .with_context(|| format!("Failed to save settings for user {user_id}"))?;
    info!(user_id, schedulable = settings.is_schedulable(), "Saved user settings");

    let scheduled = app.scheduler().reschedule(user_id).await?;
    debug!(user_id, scheduled, "Trigger updated");
    Ok(Some(settings))
}

/// `HH:MM` in 24-hour form; range checks happen when the time is applied.
fn parse_local_time(text: &str) -> Result<(u32, u32)> {
    let (hour, minute) = text
        .trim()
        .split_once(':')
        .with_context(|| format!("Invalid time '{text}', expected HH:MM"))?;
    let hour = hour
        .parse()
        .with_context(|| format!("Invalid hour in '{text}'"))?;
    let minute = minute
        .parse()
        .with_context(|| format!("Invalid minute in '{text}'"))?;
    Ok((hour, minute))
}
