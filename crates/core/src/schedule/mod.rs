//! Data model for course occurrences and the final schedule entries.

use serde::{Deserialize, Serialize};

/// Delimiter used when several concurrent courses share one slot and their
/// names/teachers/rooms are serialized as flat joined strings.
pub const JOIN_DELIMITER: char = '&';

/// Full-width stand-in for the delimiter when it appears inside a scraped
/// field value. Escaping keeps the joined strings parseable; rejecting the
/// record would lose information.
const JOIN_DELIMITER_ESCAPE: &str = "＆";

/// Weeks assumed when extraction cannot determine the recurrence.
pub const DEFAULT_TERM_WEEKS: u32 = 16;

/// Course name of the synthetic entry produced on unrecoverable failure.
pub const ERROR_BANNER: &str = "获取课表数据出错";

const ERROR_HINT: &str = "请重新登录后再试";
const ERROR_MESSAGE_LIMIT: usize = 50;

/// One raw extracted fact about a course meeting, before conflation.
/// `sections` is the contiguous period run recovered by extraction
/// (`start..start+step`); `weeks` the term weeks the meeting recurs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOccurrence {
    pub name: String,
    pub teacher: String,
    pub room: String,
    /// Weekday, 1 = Monday .. 7 = Sunday.
    pub day: u8,
    pub sections: Vec<u32>,
    pub weeks: Vec<u32>,
}

impl RawOccurrence {
    /// Apply the model invariants: empty `weeks` falls back to the full
    /// term (partial information beats silent loss), and the join delimiter
    /// is escaped out of every field value.
    pub fn normalized(mut self) -> Self {
        if self.weeks.is_empty() {
            self.weeks = (1..=DEFAULT_TERM_WEEKS).collect();
        }
        self.name = escape_delimiter(&self.name);
        self.teacher = escape_delimiter(&self.teacher);
        self.room = escape_delimiter(&self.room);
        self
    }
}

/// A single fully-expanded `(day, week, section)` fact. Field order matters:
/// the derived `Ord` gives the deterministic day/week/section walk the
/// conflation passes rely on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtomicSlot {
    pub day: u8,
    pub week: u32,
    pub section: u32,
    pub name: String,
    pub teacher: String,
    pub room: String,
}

/// Intermediate merge unit: one slot (or a grown section/week run) with the
/// concurrent courses held as parallel arrays. `weeks` stays a singleton
/// until the final pass unions recurrences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSlot {
    pub day: u8,
    pub weeks: Vec<u32>,
    pub sections: Vec<u32>,
    pub names: Vec<String>,
    pub teachers: Vec<String>,
    pub rooms: Vec<String>,
}

impl MergedSlot {
    /// Parallel arrays must stay aligned one index per concurrent course.
    pub fn identity(&self) -> (&[String], &[String], &[String]) {
        (&self.names, &self.teachers, &self.rooms)
    }
}

/// Final output unit: a compact, human-readable schedule entry. Concurrent
/// courses are `&`-joined into the flat string fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub name: String,
    pub teacher: String,
    pub position: String,
    pub day: u8,
    pub sections: Vec<u32>,
    pub weeks: Vec<u32>,
}

impl From<MergedSlot> for ScheduleEntry {
    fn from(slot: MergedSlot) -> Self {
        let delimiter = JOIN_DELIMITER.to_string();
        ScheduleEntry {
            name: slot.names.join(&delimiter),
            teacher: slot.teachers.join(&delimiter),
            position: slot.rooms.join(&delimiter),
            day: slot.day,
            sections: slot.sections,
            weeks: slot.weeks,
        }
    }
}

/// Build the synthetic entry returned on unrecoverable failure, so the
/// caller always receives a non-empty, parseable schedule array. The shape
/// (day 1, weeks [1], sections [1,2,3]) renders as a visible banner block.
pub fn error_entry(message: &str) -> ScheduleEntry {
    ScheduleEntry {
        name: ERROR_BANNER.to_string(),
        teacher: ERROR_HINT.to_string(),
        position: truncate_chars(message, ERROR_MESSAGE_LIMIT),
        day: 1,
        sections: vec![1, 2, 3],
        weeks: vec![1],
    }
}

fn escape_delimiter(value: &str) -> String {
    if value.contains(JOIN_DELIMITER) {
        value.replace(JOIN_DELIMITER, JOIN_DELIMITER_ESCAPE)
    } else {
        value.to_string()
    }
}

/// Truncate on char boundaries; the message may be CJK text.
fn truncate_chars(message: &str, limit: usize) -> String {
    message.chars().take(limit).collect()
}
