//! Weekly opening hours as stored on restaurants.
//!
//! Stored shape: `{ "lundi": { "ouvert": true, "ouverture": "11:30", "fermeture": "22:00" }, ... }`.
//! English weekday keys are accepted as well.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DaySchedule {
    #[serde(default, alias = "open", alias = "isOpen")]
    pub ouvert: bool,
    #[serde(default, alias = "opens")]
    pub ouverture: Option<String>,
    #[serde(default, alias = "closes")]
    pub fermeture: Option<String>,
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

impl DaySchedule {
    fn opens_at(&self) -> Option<NaiveTime> {
        self.ouverture.as_deref().and_then(parse_time)
    }

    fn closes_at(&self) -> Option<NaiveTime> {
        self.fermeture.as_deref().and_then(parse_time)
    }

    /// A day marked open without readable times is open all day.
    /// Closing before opening means the service runs past midnight.
    pub fn is_open_at(&self, time: NaiveTime) -> bool {
        if !self.ouvert {
            return false;
        }
        match (self.opens_at(), self.closes_at()) {
            (Some(open), Some(close)) if open <= close => time >= open && time <= close,
            (Some(open), Some(close)) => time >= open || time <= close,
            (Some(open), None) => time >= open,
            (None, Some(close)) => time <= close,
            (None, None) => true,
        }
    }
}

pub fn french_day(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "lundi",
        Weekday::Tue => "mardi",
        Weekday::Wed => "mercredi",
        Weekday::Thu => "jeudi",
        Weekday::Fri => "vendredi",
        Weekday::Sat => "samedi",
        Weekday::Sun => "dimanche",
    }
}

fn parse_day(key: &str) -> Option<Weekday> {
    let day = match key.trim().to_lowercase().as_str() {
        "lundi" | "monday" => Weekday::Mon,
        "mardi" | "tuesday" => Weekday::Tue,
        "mercredi" | "wednesday" => Weekday::Wed,
        "jeudi" | "thursday" => Weekday::Thu,
        "vendredi" | "friday" => Weekday::Fri,
        "samedi" | "saturday" => Weekday::Sat,
        "dimanche" | "sunday" => Weekday::Sun,
        _ => return None,
    };
    Some(day)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextOpening {
    pub day: &'static str,
    pub time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpeningHours {
    days: HashMap<Weekday, DaySchedule>,
}

impl OpeningHours {
    /// Unknown keys and malformed days are skipped; a missing day is closed.
    /// `None` when no weekday could be read, meaning no schedule is set.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let days: HashMap<Weekday, DaySchedule> = value
            .as_object()?
            .iter()
            .filter_map(|(key, day)| {
                let weekday = parse_day(key)?;
                let schedule = serde_json::from_value::<DaySchedule>(day.clone()).ok()?;
                Some((weekday, schedule))
            })
            .collect();
        (!days.is_empty()).then_some(Self { days })
    }

    pub fn is_open_at(&self, local: NaiveDateTime) -> bool {
        self.days
            .get(&local.weekday())
            .is_some_and(|day| day.is_open_at(local.time()))
    }

    /// Earliest opening after `local`, looking at most a week ahead.
    pub fn next_opening(&self, local: NaiveDateTime) -> Option<NextOpening> {
        if let Some(today) = self.days.get(&local.weekday())
            && today.ouvert
            && let Some(open) = today.opens_at()
            && local.time() < open
        {
            return Some(NextOpening {
                day: french_day(local.weekday()),
                time: today.ouverture.clone(),
            });
        }

        (1..=7).find_map(|offset| {
            let weekday = (local + Duration::days(offset)).weekday();
            self.days
                .get(&weekday)
                .filter(|day| day.ouvert)
                .map(|day| NextOpening {
                    day: french_day(weekday),
                    time: day.ouverture.clone(),
                })
        })
    }
}
