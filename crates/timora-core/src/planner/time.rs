use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Minutes in a day. `24:00` is a valid end-of-day boundary.
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// A wall-clock time of day with minute resolution, `00:00..=24:00`.
///
/// `chrono::NaiveTime` wraps at midnight, which would make a slot ending at
/// 24:00 sort before one starting at 23:00, so the planner keeps its own type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(MINUTES_PER_DAY);

    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes <= MINUTES_PER_DAY).then_some(TimeOfDay(minutes))
    }

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        if minute >= 60 {
            return None;
        }
        Self::from_minutes(hour.checked_mul(60)?.checked_add(minute)?)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    /// Advance by `minutes`, or `None` when the result would pass 24:00.
    pub fn checked_add(self, minutes: u16) -> Option<Self> {
        self.0.checked_add(minutes).and_then(Self::from_minutes)
    }

    /// Minutes from `self` until `later` (zero when `later` is earlier).
    pub fn minutes_until(self, later: TimeOfDay) -> u16 {
        later.0.saturating_sub(self.0)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (h, m) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("expected HH:MM, got '{s}'"))?;
        let hour: u16 = h.trim().parse().map_err(|_| format!("bad hour in '{s}'"))?;
        let minute: u16 = m.trim().parse().map_err(|_| format!("bad minute in '{s}'"))?;
        TimeOfDay::from_hm(hour, minute).ok_or_else(|| format!("time out of range: '{s}'"))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_with_leading_zeros() {
        assert_eq!(TimeOfDay::from_hm(9, 5).unwrap().to_string(), "09:05");
        assert_eq!(TimeOfDay::END_OF_DAY.to_string(), "24:00");
    }

    #[test]
    fn parses_hh_mm() {
        assert_eq!("13:30".parse::<TimeOfDay>().unwrap().minutes(), 13 * 60 + 30);
        assert!("24:01".parse::<TimeOfDay>().is_err());
        assert!("9h".parse::<TimeOfDay>().is_err());
        assert!("10:75".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn checked_add_stops_at_midnight() {
        let late = TimeOfDay::from_hm(23, 30).unwrap();
        assert_eq!(late.checked_add(30), Some(TimeOfDay::END_OF_DAY));
        assert_eq!(late.checked_add(31), None);
    }
}
