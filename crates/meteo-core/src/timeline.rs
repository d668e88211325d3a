//! Discrete timeline selection and its resolution to absolute query windows
//!
//! The timeline covers [`TIMELINE_DAYS`] days starting at a base date,
//! midnight (UTC) [`BASE_OFFSET_DAYS`] days before "now". A selection
//! picks a step range on that timeline in units of hours, days or weeks.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Days between the base date and "now"
pub const BASE_OFFSET_DAYS: i64 = 15;

/// Length of the timeline in days
pub const TIMELINE_DAYS: u32 = 30;

/// Timeline selection error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimelineError {
    #[error("Step {step} is outside the {unit} timeline (0..{total})")]
    StepOutOfRange { step: u32, total: u32, unit: TimeUnit },

    #[error("Range start {0} is after range end {1}")]
    InvertedRange(u32, u32),

    #[error("Unknown time unit: {0}")]
    UnknownUnit(String),

    #[error("Unknown timeline mode: {0}")]
    UnknownMode(String),
}

/// Granularity of one timeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Hour,
    Day,
    Week,
}

impl TimeUnit {
    pub fn step_hours(self) -> i64 {
        match self {
            TimeUnit::Hour => 1,
            TimeUnit::Day => 24,
            TimeUnit::Week => 24 * 7,
        }
    }

    /// Number of steps on the timeline (partial weeks are dropped)
    pub fn total_steps(self) -> u32 {
        match self {
            TimeUnit::Hour => TIMELINE_DAYS * 24,
            TimeUnit::Day => TIMELINE_DAYS,
            TimeUnit::Week => TIMELINE_DAYS / 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Hour => "hour",
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeUnit {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(TimeUnit::Hour),
            "day" => Ok(TimeUnit::Day),
            "week" => Ok(TimeUnit::Week),
            other => Err(TimelineError::UnknownUnit(other.to_string())),
        }
    }
}

/// Whether a selection is a single step or a span of steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineMode {
    Point,
    #[default]
    Range,
}

impl FromStr for TimelineMode {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "point" => Ok(TimelineMode::Point),
            "range" => Ok(TimelineMode::Range),
            other => Err(TimelineError::UnknownMode(other.to_string())),
        }
    }
}

/// Playback direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

/// Unvalidated selection as it travels over the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionParts {
    pub time_unit: TimeUnit,
    pub mode: TimelineMode,
    pub step_range: [u32; 2],
}

/// Validated step selection on the timeline
///
/// Both steps are below `total_steps(unit)`, the range is ordered, and
/// in point mode both ends are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SelectionParts", into = "SelectionParts")]
pub struct TimeSelection {
    unit: TimeUnit,
    mode: TimelineMode,
    range: [u32; 2],
}

impl TimeSelection {
    /// Validate a selection; point mode collapses the range to its start
    pub fn new(unit: TimeUnit, mode: TimelineMode, range: [u32; 2]) -> Result<Self, TimelineError> {
        let total = unit.total_steps();
        let range = match mode {
            TimelineMode::Point => [range[0], range[0]],
            TimelineMode::Range => range,
        };

        for step in range {
            if step >= total {
                return Err(TimelineError::StepOutOfRange { step, total, unit });
            }
        }
        if range[0] > range[1] {
            return Err(TimelineError::InvertedRange(range[0], range[1]));
        }

        Ok(Self { unit, mode, range })
    }

    pub fn point(unit: TimeUnit, step: u32) -> Result<Self, TimelineError> {
        Self::new(unit, TimelineMode::Point, [step, step])
    }

    pub fn range(unit: TimeUnit, start: u32, end: u32) -> Result<Self, TimelineError> {
        Self::new(unit, TimelineMode::Range, [start, end])
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn mode(&self) -> TimelineMode {
        self.mode
    }

    pub fn step_range(&self) -> [u32; 2] {
        self.range
    }

    /// Last step covered by the selection
    pub fn end_step(&self) -> u32 {
        match self.mode {
            TimelineMode::Point => self.range[0],
            TimelineMode::Range => self.range[1],
        }
    }

    /// Same steps in another mode; point mode keeps the start step
    pub fn with_mode(self, mode: TimelineMode) -> Self {
        let range = match mode {
            TimelineMode::Point => [self.range[0], self.range[0]],
            TimelineMode::Range => self.range,
        };
        Self { mode, range, ..self }
    }

    /// Switch time unit, restarting the range at step 0 within bounds
    pub fn with_unit(self, unit: TimeUnit) -> Self {
        let last = unit.total_steps() - 1;
        let range = match self.mode {
            TimelineMode::Point => [0, 0],
            TimelineMode::Range => [0, self.range[1].min(last)],
        };
        Self { unit, range, ..self }
    }

    /// Move the selection one step, wrapping around the timeline
    ///
    /// The range keeps its width; when its leading edge would leave the
    /// timeline the whole range wraps to the opposite end.
    pub fn step(self, direction: Direction) -> Self {
        let total = self.unit.total_steps();
        let width = self.range[1] - self.range[0];
        let range = match direction {
            Direction::Forward if self.range[1] + 1 >= total => [0, width],
            Direction::Forward => [self.range[0] + 1, self.range[1] + 1],
            Direction::Backward if self.range[0] == 0 => [total - 1 - width, total - 1],
            Direction::Backward => [self.range[0] - 1, self.range[1] - 1],
        };
        Self { range, ..self }
    }
}

impl Default for TimeSelection {
    fn default() -> Self {
        Self {
            unit: TimeUnit::Hour,
            mode: TimelineMode::Range,
            range: [0, 24],
        }
    }
}

impl TryFrom<SelectionParts> for TimeSelection {
    type Error = TimelineError;

    fn try_from(parts: SelectionParts) -> Result<Self, Self::Error> {
        TimeSelection::new(parts.time_unit, parts.mode, parts.step_range)
    }
}

impl From<TimeSelection> for SelectionParts {
    fn from(selection: TimeSelection) -> Self {
        SelectionParts {
            time_unit: selection.unit,
            mode: selection.mode,
            step_range: selection.range,
        }
    }
}

/// Absolute, inclusive query window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Outcome of resolving a selection against "now"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Window(TimeWindow),
    /// The whole window lies after "now"; nothing to show yet
    Future,
}

/// Timeline origin: midnight UTC, [`BASE_OFFSET_DAYS`] before `now`
pub fn base_date(now: DateTime<Utc>) -> DateTime<Utc> {
    let day = (now - Duration::days(BASE_OFFSET_DAYS)).date_naive();
    DateTime::<Utc>::from_naive_utc_and_offset(day.and_time(NaiveTime::default()), Utc)
}

/// Resolve a selection to the absolute window to query
pub fn resolve(selection: &TimeSelection, now: DateTime<Utc>) -> Resolution {
    let step_hours = selection.unit().step_hours();
    let start_offset = i64::from(selection.step_range()[0]) * step_hours;
    // Day and week buckets run through their last constituent hour
    let end_offset = i64::from(selection.end_step()) * step_hours
        + if step_hours > 1 { step_hours - 1 } else { 0 };

    let base = base_date(now);
    let start = base + Duration::hours(start_offset);
    if start > now {
        return Resolution::Future;
    }
    let end = (base + Duration::hours(end_offset)).min(now);

    Resolution::Window(TimeWindow { start, end })
}

/// Source of "now" for callers that resolve against the wall clock
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Start instant of a step
pub fn step_start(step: u32, unit: TimeUnit, now: DateTime<Utc>) -> DateTime<Utc> {
    base_date(now) + Duration::hours(i64::from(step) * unit.step_hours())
}

/// Slider label for a single step
pub fn format_label(step: u32, unit: TimeUnit, now: DateTime<Utc>) -> String {
    let date = step_start(step, unit, now);
    match unit {
        TimeUnit::Hour => date.format("%b %-d, %H:00").to_string(),
        TimeUnit::Day | TimeUnit::Week => date.format("%b %-d").to_string(),
    }
}

/// Label for the whole selection
pub fn format_range_label(selection: &TimeSelection, now: DateTime<Utc>) -> String {
    let [first, last] = selection.step_range();
    let start = format_label(first, selection.unit(), now);

    if selection.unit() == TimeUnit::Week {
        let week_end = step_start(last, TimeUnit::Week, now) + Duration::days(6);
        return format!("{} - {}", start, week_end.format("%b %-d"));
    }
    if first == last {
        return start;
    }
    format!("{} → {}", start, format_label(last, selection.unit(), now))
}
