use crate::config::ScheduleConfig;
use crate::ConfigError;
use chrono::{DateTime, Datelike, Days, NaiveTime, TimeZone, Weekday};

/// A weekly trigger: a wall-clock time on a set of weekdays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub time: NaiveTime,
    /// Sorted and deduplicated, Monday first
    pub days: Vec<Weekday>,
}

impl ScheduleEntry {
    /// Parses an `HH:MM` time and day numbers where 0 is Monday and 6 is Sunday
    pub fn parse(time: &str, days: &[i64]) -> Result<Self, ConfigError> {
        let time = NaiveTime::parse_from_str(time.trim(), "%H:%M").map_err(|_| {
            ConfigError::InvalidSchedule(format!("'{}' is not a valid HH:MM time", time))
        })?;

        if days.is_empty() {
            return Err(ConfigError::InvalidSchedule(
                "schedule entry needs at least one day".to_string(),
            ));
        }

        let mut weekdays = Vec::with_capacity(days.len());
        for &day in days {
            let weekday = u8::try_from(day)
                .ok()
                .filter(|d| *d < 7)
                .and_then(|d| Weekday::try_from(d).ok())
                .ok_or_else(|| {
                    ConfigError::InvalidSchedule(format!("day {} is outside 0-6", day))
                })?;
            weekdays.push(weekday);
        }
        weekdays.sort_by_key(|d| d.num_days_from_monday());
        weekdays.dedup();

        Ok(Self {
            time,
            days: weekdays,
        })
    }

    /// Whether the entry fires on the given weekday
    pub fn runs_on(&self, day: Weekday) -> bool {
        self.days.contains(&day)
    }
}

/// The recurring run schedule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    pub enabled: bool,
    pub entries: Vec<ScheduleEntry>,
}

impl Schedule {
    pub fn new(enabled: bool, entries: Vec<ScheduleEntry>) -> Self {
        Self { enabled, entries }
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ConfigError> {
        let entries = config
            .entries
            .iter()
            .map(|entry| ScheduleEntry::parse(&entry.time, &entry.days))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(config.enabled, entries))
    }

    /// Whether the schedule can ever fire
    pub fn is_active(&self) -> bool {
        self.enabled && !self.entries.is_empty()
    }

    /// The earliest trigger strictly after `now`
    ///
    /// Scans today and the following seven days so every weekday is covered
    /// at least once. Local times that do not exist (DST gaps) are skipped.
    pub fn next_trigger_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        if !self.is_active() {
            return None;
        }

        let tz = now.timezone();
        let today = now.date_naive();
        let mut next: Option<DateTime<Tz>> = None;

        for offset in 0..=7 {
            let Some(date) = today.checked_add_days(Days::new(offset)) else {
                break;
            };
            for entry in self.entries.iter().filter(|e| e.runs_on(date.weekday())) {
                let Some(candidate) = tz.from_local_datetime(&date.and_time(entry.time)).earliest()
                else {
                    continue;
                };
                if candidate > *now && next.as_ref().map_or(true, |n| candidate < *n) {
                    next = Some(candidate);
                }
            }
        }

        next
    }
}
