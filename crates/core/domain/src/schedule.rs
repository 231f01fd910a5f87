use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 时段解析错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time of day: {0}")]
pub struct TimeOfDayError(pub String);

/// "HH:MM" 形式的本地时段，start > end 表示跨午夜。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeOfDayError> {
        Ok(Self {
            start: parse_hhmm(start)?,
            end: parse_hhmm(end)?,
        })
    }

    /// 按分钟比较，两端都包含；start > end 时跨午夜。
    pub fn contains(&self, time: NaiveTime) -> bool {
        let minute = truncate_to_minute(time);
        if self.start <= self.end {
            minute >= self.start && minute <= self.end
        } else {
            minute >= self.start || minute <= self.end
        }
    }
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

pub fn parse_hhmm(raw: &str) -> Result<NaiveTime, TimeOfDayError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|_| TimeOfDayError(raw.to_string()))
}

/// 配置中的时段（原始字符串形式）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    pub start: String,
    pub end: String,
}

impl ScheduleWindow {
    pub fn window(&self) -> Result<TimeWindow, TimeOfDayError> {
        TimeWindow::parse(&self.start, &self.end)
    }

    /// 时段格式非法时不匹配。
    pub fn matches(&self, time: NaiveTime) -> bool {
        self.window().map(|w| w.contains(time)).unwrap_or(false)
    }
}
