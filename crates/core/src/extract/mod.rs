//! Field extraction: the regex cascade primitive and the script-literal
//! strategy for pulling course occurrences out of a timetable payload.
//! The DOM fallback strategy lives in [`table`].

pub mod table;

use std::collections::HashMap;

use regex::Regex;

use crate::schedule::RawOccurrence;

/// Highest period number a timetable row can plausibly carry. Candidates
/// beyond it are garbage (or hostile) payload data, not course facts.
pub(crate) const MAX_SECTION: u32 = 16;

/// An ordered list of alternative patterns tried in priority order; the
/// first non-empty capture wins. The portal templates drift between
/// deployments, so every extracted token goes through one of these.
pub struct Cascade {
    patterns: Vec<Regex>,
}

impl Cascade {
    /// Patterns are compile-time literals; each must contain one capture
    /// group.
    pub fn new(patterns: &[&str]) -> Self {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p).expect("invalid extraction pattern"))
            .collect();
        Cascade { patterns }
    }

    /// First non-empty capture across the patterns, in priority order.
    pub fn first_capture(&self, text: &str) -> Option<String> {
        self.patterns.iter().find_map(|pattern| {
            pattern
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
                .filter(|value| !value.is_empty())
        })
    }
}

/// Strategy A: script-embedded object literals. The payload carries blocks
/// like `var kbxx_id_7[3] = { name:"高等数学", teacher:"王翔", ... };`
/// whose properties follow a `key:"value"` grammar. Candidates missing a
/// required field, or with out-of-range numbers, are discarded.
pub fn extract_script_occurrences(payload: &str) -> Vec<RawOccurrence> {
    let block = Regex::new(r#"(?s)var\s+kbxx_id_\w*\[\d+\]\s*=\s*\{(.*?)\};"#)
        .expect("invalid extraction pattern");
    let property = Regex::new(r#"(\w+):"([^"]*)""#).expect("invalid extraction pattern");

    let mut occurrences = Vec::new();
    for captures in block.captures_iter(payload) {
        let body = captures.get(1).map(|m| m.as_str()).unwrap_or("");
        let mut fields: HashMap<&str, &str> = HashMap::new();
        for prop in property.captures_iter(body) {
            if let (Some(key), Some(value)) = (prop.get(1), prop.get(2)) {
                fields.insert(key.as_str(), value.as_str());
            }
        }
        if let Some(occurrence) = occurrence_from_fields(&fields) {
            occurrences.push(occurrence);
        }
    }
    occurrences
}

fn occurrence_from_fields(fields: &HashMap<&str, &str>) -> Option<RawOccurrence> {
    let name = non_empty(fields.get("name")?)?;
    let teacher = fields.get("teacher")?.to_string();
    let room = fields.get("location")?.to_string();
    let week = fields.get("week")?;
    let day: u8 = fields.get("day")?.parse().ok()?;
    let start: u32 = fields.get("start")?.parse().ok()?;
    let step: u32 = fields.get("step")?.parse().ok()?;

    let end = start.checked_add(step)?;
    if !(1..=7).contains(&day) || start < 1 || step < 1 || end > MAX_SECTION + 1 {
        return None;
    }

    Some(
        RawOccurrence {
            name,
            teacher,
            room,
            day,
            sections: (start..end).collect(),
            weeks: weeks_from_bitstring(week),
        }
        .normalized(),
    )
}

/// Decode the active-weeks bitstring: digit `i` set to `1` means the course
/// recurs on week `i`. Position 0 is padding (weeks are 1-based). An
/// all-zero string yields an empty list, which normalization turns into
/// the full-term default.
pub fn weeks_from_bitstring(bits: &str) -> Vec<u32> {
    bits.chars()
        .enumerate()
        .filter(|&(i, c)| i >= 1 && c == '1')
        .map(|(i, _)| i as u32)
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
