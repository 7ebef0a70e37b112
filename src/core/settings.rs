//! Per-user notification settings and the rules for mutating them.

use crate::core::error::SettingsError;
use serde::{Deserialize, Serialize};

/// Chat identifier of a subscriber.
pub type UserId = i64;

pub const STANDARD_CURRENCIES: [&str; 5] = ["USD", "EUR", "CNY", "KZT", "TRY"];

const MINUTES_PER_DAY: i32 = 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: UserId,
    pub utc_offset_minutes: Option<i32>,
    pub currency_code: Option<String>,
    pub local_hour: Option<u32>,
    pub local_minute: Option<u32>,
    pub utc_hour: Option<u32>,
    pub utc_minute: Option<u32>,
    #[serde(default)]
    pub notifications_enabled: bool,
}

impl UserSettings {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            utc_offset_minutes: None,
            currency_code: None,
            local_hour: None,
            local_minute: None,
            utc_hour: None,
            utc_minute: None,
            notifications_enabled: false,
        }
    }

    /// Updates the offset and keeps the derived UTC time consistent with it.
    pub fn set_timezone(&mut self, offset_minutes: i32) {
        self.utc_offset_minutes = Some(offset_minutes);
        if let (Some(hour), Some(minute)) = (self.local_hour, self.local_minute) {
            let (utc_hour, utc_minute) = local_to_utc(hour, minute, offset_minutes);
            self.utc_hour = Some(utc_hour);
            self.utc_minute = Some(utc_minute);
        }
    }

    pub fn set_currency(&mut self, code: &str) -> Result<(), SettingsError> {
        self.currency_code = Some(normalize_currency_code(code)?);
        Ok(())
    }

    /// Stores the local notification time, derives its UTC equivalent and
    /// switches notifications on.
    pub fn set_notification_time(&mut self, hour: u32, minute: u32) -> Result<(), SettingsError> {
        if hour > 23 || minute > 59 {
            return Err(SettingsError::InvalidTime { hour, minute });
        }
        let offset = self
            .utc_offset_minutes
            .ok_or(SettingsError::MissingTimezone)?;
        let (utc_hour, utc_minute) = local_to_utc(hour, minute, offset);
        self.local_hour = Some(hour);
        self.local_minute = Some(minute);
        self.utc_hour = Some(utc_hour);
        self.utc_minute = Some(utc_minute);
        self.notifications_enabled = true;
        Ok(())
    }

    pub fn set_notifications_enabled(&mut self, enabled: bool) {
        self.notifications_enabled = enabled;
    }

    /// Enabled and complete enough to run a daily notification.
    pub fn is_schedulable(&self) -> bool {
        self.notifications_enabled
            && self.currency_code.is_some()
            && self.utc_hour.is_some()
            && self.utc_minute.is_some()
    }

    pub fn summary(&self) -> String {
        let mut lines = vec!["Settings:".to_string()];
        lines.push(format!(
            "• Notifications: {}",
            if self.notifications_enabled {
                "enabled ✅"
            } else {
                "disabled ❌"
            }
        ));
        if let Some(offset) = self.utc_offset_minutes {
            lines.push(format!("• Timezone: {}", format_utc_offset(offset)));
        }
        if let Some(currency) = &self.currency_code {
            lines.push(format!("• Currency: {currency}"));
        }
        if let (Some(hour), Some(minute)) = (self.local_hour, self.local_minute) {
            lines.push(format!("• Notification time (local): {hour:02}:{minute:02}"));
        }
        lines.join("\n")
    }
}

/// Shifts a local wall-clock time by `-offset_minutes`, wrapping around midnight.
pub fn local_to_utc(hour: u32, minute: u32, offset_minutes: i32) -> (u32, u32) {
    let local_total = (hour * 60 + minute) as i32;
    let utc_total = (local_total - offset_minutes).rem_euclid(MINUTES_PER_DAY) as u32;
    (utc_total / 60, utc_total % 60)
}

/// Parses `UTC+3`, `GMT-5`, `UTC+4:30` or a bare `+3` into minutes east of UTC.
pub fn parse_utc_offset(text: &str) -> Result<i32, SettingsError> {
    let invalid = || SettingsError::InvalidOffset(text.to_string());

    let trimmed = text.trim().to_uppercase();
    let rest = trimmed
        .strip_prefix("UTC")
        .or_else(|| trimmed.strip_prefix("GMT"))
        .unwrap_or(&trimmed)
        .trim();

    if rest.is_empty() {
        return Ok(0);
    }

    let (sign, body) = match rest.chars().next() {
        Some('+') => (1, &rest[1..]),
        Some('-') => (-1, &rest[1..]),
        _ => return Err(invalid()),
    };

    let (hours, minutes) = match body.split_once(':') {
        Some((h, m)) => (h, m),
        None => (body, "0"),
    };
    let hours: i32 = hours.trim().parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.trim().parse().map_err(|_| invalid())?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return Err(invalid());
    }

    Ok(sign * (hours * 60 + minutes))
}

pub fn format_utc_offset(offset_minutes: i32) -> String {
    let sign = if offset_minutes >= 0 { '+' } else { '-' };
    let abs = offset_minutes.abs();
    let (hours, minutes) = (abs / 60, abs % 60);
    if minutes == 0 {
        format!("UTC{sign}{hours}")
    } else {
        format!("UTC{sign}{hours}:{minutes:02}")
    }
}

pub fn normalize_currency_code(code: &str) -> Result<String, SettingsError> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(SettingsError::InvalidCurrency(code.to_string()))
    }
}
