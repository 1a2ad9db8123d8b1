use serde::{Deserialize, Serialize};

/// Which countdown the timer is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    Focus,
    ShortBreak,
    LongBreak,
}

impl std::str::FromStr for TimerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "focus" => Ok(TimerMode::Focus),
            "short" | "short_break" | "shortbreak" => Ok(TimerMode::ShortBreak),
            "long" | "long_break" | "longbreak" => Ok(TimerMode::LongBreak),
            other => Err(format!("unknown timer mode '{other}'")),
        }
    }
}

/// User-tunable timer durations, as stored in the user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSettings {
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,
    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,
    #[serde(default = "default_sessions_before_long_break")]
    pub sessions_before_long_break: u32,
}

fn default_focus_minutes() -> u32 {
    25
}
fn default_short_break_minutes() -> u32 {
    5
}
fn default_long_break_minutes() -> u32 {
    15
}
fn default_sessions_before_long_break() -> u32 {
    4
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            short_break_minutes: default_short_break_minutes(),
            long_break_minutes: default_long_break_minutes(),
            sessions_before_long_break: default_sessions_before_long_break(),
        }
    }
}

impl TimerSettings {
    pub fn minutes_for(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Focus => self.focus_minutes,
            TimerMode::ShortBreak => self.short_break_minutes,
            TimerMode::LongBreak => self.long_break_minutes,
        }
    }

    pub fn seconds_for(&self, mode: TimerMode) -> u64 {
        u64::from(self.minutes_for(mode)) * 60
    }

    /// Raise every zero field to 1, returning the names of the fields that
    /// had to be corrected.
    pub fn clamped(mut self) -> (Self, Vec<&'static str>) {
        let mut corrected = Vec::new();
        for (name, value) in [
            ("focusMinutes", &mut self.focus_minutes),
            ("shortBreakMinutes", &mut self.short_break_minutes),
            ("longBreakMinutes", &mut self.long_break_minutes),
            ("sessionsBeforeLongBreak", &mut self.sessions_before_long_break),
        ] {
            if *value == 0 {
                *value = 1;
                corrected.push(name);
            }
        }
        (self, corrected)
    }
}
