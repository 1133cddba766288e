use chrono::{FixedOffset, Offset, Utc};

use crate::error::OrderError;

/// Paris winter time. Summer time is not applied automatically.
pub const DEFAULT_TIMEZONE_OFFSET_MINUTES: i32 = 60;

#[derive(Debug, Clone)]
pub struct OrderConfig {
    /// Offset used to read restaurant opening hours.
    pub timezone: FixedOffset,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            timezone: offset_from_minutes(DEFAULT_TIMEZONE_OFFSET_MINUTES)
                .unwrap_or_else(|_| Utc.fix()),
        }
    }
}

impl OrderConfig {
    pub fn from_env() -> Result<Self, OrderError> {
        let minutes = match std::env::var("TIMEZONE_OFFSET_MINUTES") {
            Ok(raw) if !raw.trim().is_empty() => raw.trim().parse::<i32>().map_err(|_| {
                OrderError::Config(format!("TIMEZONE_OFFSET_MINUTES is not a number: {raw}"))
            })?,
            _ => DEFAULT_TIMEZONE_OFFSET_MINUTES,
        };

        Ok(Self {
            timezone: offset_from_minutes(minutes)?,
        })
    }
}

pub fn offset_from_minutes(minutes: i32) -> Result<FixedOffset, OrderError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| OrderError::Config(format!("timezone offset out of range: {minutes} minutes")))
}
