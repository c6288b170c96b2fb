//! Semester resolution: scrape the selector tokens from the timetable
//! page, query the semester calendar, and let the caller pick a term.
//! This flow never fails: every misstep degrades to the hard-coded
//! fallback set and is reported through the sink.

use serde_json::Value;

use crate::callback::{ChoicePrompt, ProgressSink, Prompter};
use crate::extract::Cascade;
use crate::fetch::{Method, Transport};

use super::{Endpoints, DATA_QUERY_PATH};

/// Semester ids used when the calendar cannot be fetched or parsed.
pub const FALLBACK_SEMESTER_IDS: [&str; 3] = ["62", "61", "60"];

const FALLBACK_SEMESTER_LABELS: [&str; 3] = [
    "0:2023-2024学年第二学期",
    "1:2023-2024学年第一学期",
    "2:2022-2023学年第二学期",
];

const FALLBACK_TAG_ID: &str = "semesterBar13579Semester";
const FALLBACK_VALUE: &str = "194";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemesterChoice {
    pub ids: Vec<String>,
    pub index: usize,
}

/// Resolve the semester list from the timetable page and ask the caller to
/// pick one. An unanswered or unparsable choice defaults to index 0.
pub fn resolve_semesters(
    transport: &dyn Transport,
    prompter: &dyn Prompter,
    sink: &dyn ProgressSink,
    endpoints: &Endpoints,
    timetable_html: &str,
) -> SemesterChoice {
    let (labels, ids) = match fetch_calendar(transport, sink, endpoints, timetable_html) {
        Some(parsed) => parsed,
        None => {
            sink.report("获取学期数据出错，将使用默认选项");
            log::warn!("semester calendar unavailable, using fallback ids");
            (
                FALLBACK_SEMESTER_LABELS.iter().map(|s| s.to_string()).collect(),
                FALLBACK_SEMESTER_IDS.iter().map(|s| s.to_string()).collect(),
            )
        }
    };

    sink.report(&format!("已找到 {} 个学期", ids.len()));
    let chosen = prompter.choose(&ChoicePrompt {
        title: "选择学期".to_string(),
        body: "请选择需要导入的学期".to_string(),
        options: labels,
    });

    let index = chosen
        .as_deref()
        .and_then(parse_choice_index)
        .unwrap_or(0)
        .min(ids.len().saturating_sub(1));

    SemesterChoice { ids, index }
}

/// The option labels carry an `"<index>:<label>"` shape.
fn parse_choice_index(choice: &str) -> Option<usize> {
    choice.split(':').next()?.trim().parse().ok()
}

fn fetch_calendar(
    transport: &dyn Transport,
    sink: &dyn ProgressSink,
    endpoints: &Endpoints,
    timetable_html: &str,
) -> Option<(Vec<String>, Vec<String>)> {
    // The selector widget's tag id and default value are embedded in the
    // page's inline script; near-miss templates fall back to constants.
    let tag_id = Cascade::new(&[r"semesterBar(.*?)Semester"])
        .first_capture(timetable_html)
        .map(|inner| format!("semesterBar{}Semester", inner))
        .unwrap_or_else(|| FALLBACK_TAG_ID.to_string());
    let value = Cascade::new(&[r#"value:"(.*?)""#])
        .first_capture(timetable_html)
        .unwrap_or_else(|| FALLBACK_VALUE.to_string());

    sink.report("正在获取学期数据...");
    let form: Vec<(&str, &str)> = vec![
        ("tagId", tag_id.as_str()),
        ("dataType", "semesterCalendar"),
        ("value", value.as_str()),
        ("empty", "false"),
    ];
    let url = endpoints.url(DATA_QUERY_PATH);
    let raw = transport.fetch_text(Method::Post, Some(&form), &url).ok()?;
    if raw.len() < 10 {
        return None;
    }

    let calendar = parse_calendar_json(&raw)?;
    flatten_semesters(&calendar)
}

/// Parse the calendar response, repairing once by trimming to the
/// outermost braces; some deployments wrap the JSON in script noise.
fn parse_calendar_json(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(raw) {
        return Some(value);
    }
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

/// Walk the `semesters` map (keyed by school-year groupings, each an
/// ordered list of `{id, name, schoolYear}`) into a flat, index-labelled
/// selection list and a parallel id list.
fn flatten_semesters(calendar: &Value) -> Option<(Vec<String>, Vec<String>)> {
    let semesters = calendar.get("semesters")?.as_object()?;

    let mut labels = Vec::new();
    let mut ids = Vec::new();
    for group in semesters.values() {
        let items = match group.as_array() {
            Some(items) => items,
            None => continue,
        };
        for item in items {
            let id = field_string(item, "id");
            if id.is_empty() {
                continue;
            }
            let school_year = field_string(item, "schoolYear");
            let name = field_string(item, "name");
            labels.push(format!("{}:{}学年{}学期", ids.len(), school_year, name));
            ids.push(id);
        }
    }

    if ids.is_empty() {
        None
    } else {
        Some((labels, ids))
    }
}

/// Ids come back as strings on some deployments and numbers on others.
fn field_string(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}
