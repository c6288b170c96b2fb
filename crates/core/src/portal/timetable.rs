//! Timetable fetch: load the course-table page, scrape the form token the
//! query endpoint requires, then walk the chosen semester (and older ones)
//! until a response actually carries course data.

use std::thread;
use std::time::Duration;

use crate::callback::ProgressSink;
use crate::extract::Cascade;
use crate::fetch::{Method, Transport};

use super::{semester::SemesterChoice, Endpoints, ImportError, COURSE_MARKERS, TIMETABLE_PATH, TIMETABLE_QUERY_PATH};

/// Token used when the page carries no recognizable ids field.
const FALLBACK_IDS: &str = "194";

/// Semesters tried (walking backward from the chosen one) before giving up.
const MAX_ATTEMPTS: usize = 3;

/// Fetch the course-table page. An implausibly short body means the session
/// landed somewhere that is not the timetable deployment.
pub fn fetch_timetable_page(
    transport: &dyn Transport,
    sink: &dyn ProgressSink,
    endpoints: &Endpoints,
) -> Result<String, ImportError> {
    sink.report("正在打开课表页面...");
    let body = transport.fetch_text(Method::Get, None, &endpoints.url(TIMETABLE_PATH))?;
    if body.len() < 100 {
        return Err(ImportError::Portal(
            "课表页面内容异常，请重新登录后再试".to_string(),
        ));
    }
    Ok(body)
}

/// The query endpoint wants the page's `ids` form token. Templates embed it
/// three different ways; patterns in priority order.
pub fn extract_ids_token(sink: &dyn ProgressSink, timetable_html: &str) -> String {
    let cascade = Cascade::new(&[
        r#"bg\.form\.addInput\(form,"ids","([^"]*)"\);"#,
        r#"name="ids" value="([^"]*)""#,
        r#"ids["']?\s*[:=]\s*["']?([^"',;\s]+)"#,
    ]);
    match cascade.first_capture(timetable_html) {
        Some(ids) => ids,
        None => {
            log::warn!("ids token not found on timetable page, using fallback");
            sink.report("未能识别课表参数，将使用默认值");
            FALLBACK_IDS.to_string()
        }
    }
}

/// Query the course data, starting at the chosen semester and stepping to
/// older ones when a response carries no course markers. A failed fetch
/// counts as a markerless attempt and the walk continues. Requests are
/// throttled so the portal's rate limiter does not kick in.
pub fn fetch_course_payload(
    transport: &dyn Transport,
    sink: &dyn ProgressSink,
    endpoints: &Endpoints,
    choice: &SemesterChoice,
    ids: &str,
    throttle_ms: u64,
) -> Option<String> {
    let url = endpoints.url(TIMETABLE_QUERY_PATH);

    let mut index = choice.index as isize;
    let mut attempts = 0usize;
    while index >= 0 && attempts < MAX_ATTEMPTS {
        let semester_id = choice.ids.get(index as usize)?.as_str();

        if throttle_ms > 0 {
            thread::sleep(Duration::from_millis(throttle_ms));
        }
        sink.report(&format!("正在获取课表数据 (学期 {})...", semester_id));

        let form: Vec<(&str, &str)> = vec![
            ("ignoreHead", "1"),
            ("setting.kind", "std"),
            ("startWeek", ""),
            ("semester.id", semester_id),
            ("ids", ids),
        ];
        match transport.fetch_text(Method::Post, Some(&form), &url) {
            Ok(body) if COURSE_MARKERS.iter().any(|marker| body.contains(marker)) => {
                return Some(body);
            }
            Ok(_) => log::debug!("semester {} returned no course markers", semester_id),
            Err(e) => log::debug!("timetable query for semester {} failed: {}", semester_id, e),
        }

        index -= 1;
        attempts += 1;
    }

    None
}
