//! End-to-end import flow tests over a scripted transport: probing, login,
//! semester resolution, the timetable query walk and failure degradation.

use std::cell::RefCell;
use std::collections::VecDeque;

use eamsync_core::callback::{ChoicePrompt, ProgressSink, Prompter, TextPrompt};
use eamsync_core::fetch::{FetchError, Method, Transport};
use eamsync_core::portal::login::sha1_hex;
use eamsync_core::schedule::ERROR_BANNER;
use eamsync_core::{ImportConfig, Importer};
use pretty_assertions::assert_eq;

struct RecordedRequest {
    #[allow(dead_code)]
    method: Method,
    url: String,
    form: Vec<(String, String)>,
}

/// Transport answering from a fixed route table (matched by URL suffix)
/// and recording every request for assertions.
struct ScriptedTransport {
    routes: Vec<(&'static str, String)>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    fn new(routes: Vec<(&'static str, String)>) -> Self {
        ScriptedTransport {
            routes,
            requests: RefCell::new(Vec::new()),
        }
    }

    fn requests_to(&self, suffix: &str) -> Vec<Vec<(String, String)>> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.url.ends_with(suffix))
            .map(|r| r.form.clone())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn fetch_text(
        &self,
        method: Method,
        form: Option<&[(&str, &str)]>,
        url: &str,
    ) -> Result<String, FetchError> {
        self.requests.borrow_mut().push(RecordedRequest {
            method,
            url: url.to_string(),
            form: form
                .unwrap_or(&[])
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        self.routes
            .iter()
            .find(|(suffix, _)| url.ends_with(suffix))
            .map(|(_, body)| body.clone())
            .ok_or(FetchError::HttpError(404))
    }
}

/// Wrapper failing the first N requests to one endpoint, then delegating.
struct FlakyTransport {
    inner: ScriptedTransport,
    fail_suffix: &'static str,
    failures_left: RefCell<u32>,
}

impl Transport for FlakyTransport {
    fn fetch_text(
        &self,
        method: Method,
        form: Option<&[(&str, &str)]>,
        url: &str,
    ) -> Result<String, FetchError> {
        if url.ends_with(self.fail_suffix) && *self.failures_left.borrow() > 0 {
            *self.failures_left.borrow_mut() -= 1;
            return Err(FetchError::HttpError(500));
        }
        self.inner.fetch_text(method, form, url)
    }
}

/// Prompter fed from queues; `None` past the scripted answers.
struct ScriptedPrompter {
    text_answers: RefCell<VecDeque<String>>,
    choice: Option<String>,
}

impl ScriptedPrompter {
    fn new(text_answers: &[&str], choice: Option<&str>) -> Self {
        ScriptedPrompter {
            text_answers: RefCell::new(text_answers.iter().map(|s| s.to_string()).collect()),
            choice: choice.map(|s| s.to_string()),
        }
    }

    fn silent() -> Self {
        Self::new(&[], None)
    }
}

impl Prompter for ScriptedPrompter {
    fn text(&self, _prompt: &TextPrompt) -> Option<String> {
        self.text_answers.borrow_mut().pop_front()
    }

    fn choose(&self, _prompt: &ChoicePrompt) -> Option<String> {
        self.choice.clone()
    }
}

#[derive(Default)]
struct RecordingSink {
    reports: RefCell<Vec<String>>,
    failures: RefCell<Vec<String>>,
    images: RefCell<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn report(&self, message: &str) {
        self.reports.borrow_mut().push(message.to_string());
    }

    fn fail(&self, message: &str) {
        self.failures.borrow_mut().push(message.to_string());
    }

    fn image(&self, url: &str) {
        self.images.borrow_mut().push(url.to_string());
    }
}

fn config(entry_url: &str) -> ImportConfig {
    ImportConfig {
        entry_url: entry_url.to_string(),
        tunnel_segment: "ahpu".to_string(),
        throttle_ms: 0,
        term_weeks: 16,
    }
}

const AUTHENTICATED_HOME: &str =
    "<html><head><title>教务系统</title></head><body><div>欢迎使用</div></body></html>";

const TIMETABLE_PAGE: &str = r#"
<html><head><title>学生课表</title></head><body>
<div id="courseTabControl"></div>
<script>
var bar = new SemesterBar("semesterBar9527Semester", {value:"888"});
bg.form.addInput(form,"ids","3042");
</script>
<div id="kbcontent"></div>
</body></html>
"#;

const SEMESTER_JSON: &str = r#"{"semesters":{"y2023":[
  {"id":123,"schoolYear":"2023-2024","name":"第一"},
  {"id":124,"schoolYear":"2023-2024","name":"第二"}
]}}"#;

const COURSE_PAYLOAD: &str = r#"
var kbxx_id_7[0] = { name:"高等数学", teacher:"王翔", location:"教1-101",
    week:"01111000000000000", day:"1", start:"1", step:"2" };
"#;

#[test]
fn test_full_import_happy_path() {
    let transport = ScriptedTransport::new(vec![
        ("homeExt.action", AUTHENTICATED_HOME.to_string()),
        ("courseTableForStd!courseTable.action", COURSE_PAYLOAD.to_string()),
        ("courseTableForStd.action", TIMETABLE_PAGE.to_string()),
        ("dataQuery.action", SEMESTER_JSON.to_string()),
    ]);
    let prompter = ScriptedPrompter::new(&[], Some("1:2023-2024学年第二学期"));
    let sink = RecordingSink::default();

    let importer = Importer::new(
        &transport,
        &prompter,
        &sink,
        config("http://jw.example.edu/eams/home.action"),
    );
    let entries = importer.run();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "高等数学");
    assert_eq!(entries[0].day, 1);
    assert_eq!(entries[0].sections, vec![1, 2]);
    assert_eq!(entries[0].weeks, vec![1, 2, 3, 4]);

    // The page's scraped selector tokens drive the calendar query.
    let calendar_forms = transport.requests_to("dataQuery.action");
    assert_eq!(calendar_forms.len(), 1);
    assert!(calendar_forms[0]
        .contains(&("tagId".to_string(), "semesterBar9527Semester".to_string())));
    assert!(calendar_forms[0].contains(&("value".to_string(), "888".to_string())));

    // The chosen (second) semester id and the scraped ids token are posted.
    let query_forms = transport.requests_to("courseTableForStd!courseTable.action");
    assert_eq!(query_forms.len(), 1);
    assert!(query_forms[0].contains(&("semester.id".to_string(), "124".to_string())));
    assert!(query_forms[0].contains(&("ids".to_string(), "3042".to_string())));

    assert!(sink.failures.borrow().is_empty());
}

#[test]
fn test_login_posts_salted_hash() {
    let login_page = r#"
<html><head><title>登录</title></head><body>
<script>var hashed = CryptoJS.SHA1('salt123' + form.password.value);</script>
<table class="login-table"><tr><td>
  <input type="text" name="username"/>
  <input type="password" name="password"/>
</td></tr></table>
</body></html>
"#;
    let transport = ScriptedTransport::new(vec![
        ("homeExt.action", login_page.to_string()),
        ("loginExt.action", AUTHENTICATED_HOME.to_string()),
        ("courseTableForStd!courseTable.action", COURSE_PAYLOAD.to_string()),
        ("courseTableForStd.action", TIMETABLE_PAGE.to_string()),
        ("dataQuery.action", SEMESTER_JSON.to_string()),
    ]);
    let prompter = ScriptedPrompter::new(&["stu2024001", "secret"], None);
    let sink = RecordingSink::default();

    let importer = Importer::new(
        &transport,
        &prompter,
        &sink,
        config("http://jw.example.edu/eams/home.action"),
    );
    let entries = importer.run();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "高等数学");

    let login_forms = transport.requests_to("loginExt.action");
    assert_eq!(login_forms.len(), 1);
    let expected_hash = sha1_hex("salt123secret");
    assert!(login_forms[0].contains(&("username".to_string(), "stu2024001".to_string())));
    assert!(login_forms[0].contains(&("password".to_string(), expected_hash.clone())));
    assert!(login_forms[0].contains(&("pwd".to_string(), expected_hash)));
    assert!(login_forms[0].contains(&("session_locale".to_string(), "zh_CN".to_string())));
}

#[test]
fn test_login_rejection_becomes_error_entry() {
    let login_page = r#"
<html><body>
<script>var hashed = CryptoJS.SHA1('salt123' + pwd);</script>
<table class="login-table"></table>
</body></html>
"#;
    let rejection = r#"<html><body><div class="actionError">用户名或密码错误</div></body></html>"#;
    let transport = ScriptedTransport::new(vec![
        ("homeExt.action", login_page.to_string()),
        ("loginExt.action", rejection.to_string()),
    ]);
    let prompter = ScriptedPrompter::new(&["stu2024001", "wrong"], None);
    let sink = RecordingSink::default();

    let importer = Importer::new(
        &transport,
        &prompter,
        &sink,
        config("http://jw.example.edu/eams/home.action"),
    );
    let entries = importer.run();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, ERROR_BANNER);
    assert!(entries[0].position.contains("用户名或密码错误"));
    assert_eq!(sink.failures.borrow().len(), 1);

    // A rejected login is never retried.
    assert_eq!(transport.requests_to("loginExt.action").len(), 1);
}

#[test]
fn test_cancelled_prompt_becomes_error_entry() {
    let login_page = r#"
<html><body>
<script>var hashed = CryptoJS.SHA1('salt123' + pwd);</script>
<table class="login-table"></table>
</body></html>
"#;
    let transport =
        ScriptedTransport::new(vec![("homeExt.action", login_page.to_string())]);
    let prompter = ScriptedPrompter::silent();
    let sink = RecordingSink::default();

    let importer = Importer::new(
        &transport,
        &prompter,
        &sink,
        config("http://jw.example.edu/eams/home.action"),
    );
    let entries = importer.run();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, ERROR_BANNER);
    assert!(entries[0].position.contains("导入已取消"));
}

#[test]
fn test_malformed_semester_response_falls_back() {
    let transport = ScriptedTransport::new(vec![
        ("homeExt.action", AUTHENTICATED_HOME.to_string()),
        ("courseTableForStd!courseTable.action", COURSE_PAYLOAD.to_string()),
        ("courseTableForStd.action", TIMETABLE_PAGE.to_string()),
        ("dataQuery.action", "this is not json at all".to_string()),
    ]);
    let prompter = ScriptedPrompter::silent();
    let sink = RecordingSink::default();

    let importer = Importer::new(
        &transport,
        &prompter,
        &sink,
        config("http://jw.example.edu/eams/home.action"),
    );
    let entries = importer.run();

    // Unanswered choice defaults to index 0, so the first fallback id is
    // the one queried.
    let query_forms = transport.requests_to("courseTableForStd!courseTable.action");
    assert_eq!(query_forms.len(), 1);
    assert!(query_forms[0].contains(&("semester.id".to_string(), "62".to_string())));

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "高等数学");
}

#[test]
fn test_wrapped_semester_json_is_repaired() {
    let wrapped = format!("<script>var data = {};</script>", SEMESTER_JSON);
    let transport = ScriptedTransport::new(vec![
        ("homeExt.action", AUTHENTICATED_HOME.to_string()),
        ("courseTableForStd!courseTable.action", COURSE_PAYLOAD.to_string()),
        ("courseTableForStd.action", TIMETABLE_PAGE.to_string()),
        ("dataQuery.action", wrapped),
    ]);
    let prompter = ScriptedPrompter::silent();
    let sink = RecordingSink::default();

    let importer = Importer::new(
        &transport,
        &prompter,
        &sink,
        config("http://jw.example.edu/eams/home.action"),
    );
    importer.run();

    // Repaired parse yields the real semester list, not the fallback.
    let query_forms = transport.requests_to("courseTableForStd!courseTable.action");
    assert!(query_forms[0].contains(&("semester.id".to_string(), "123".to_string())));
}

#[test]
fn test_markerless_responses_walk_older_semesters() {
    let transport = ScriptedTransport::new(vec![
        ("homeExt.action", AUTHENTICATED_HOME.to_string()),
        (
            "courseTableForStd!courseTable.action",
            "<html><body>本学期暂无课表数据</body></html>".to_string(),
        ),
        ("courseTableForStd.action", TIMETABLE_PAGE.to_string()),
        ("dataQuery.action", SEMESTER_JSON.to_string()),
    ]);
    let prompter = ScriptedPrompter::new(&[], Some("1:2023-2024学年第二学期"));
    let sink = RecordingSink::default();

    let importer = Importer::new(
        &transport,
        &prompter,
        &sink,
        config("http://jw.example.edu/eams/home.action"),
    );
    let entries = importer.run();

    // Index 1 then index 0, both markerless; the import degrades to an
    // empty schedule instead of erroring.
    let query_forms = transport.requests_to("courseTableForStd!courseTable.action");
    assert_eq!(query_forms.len(), 2);
    assert!(query_forms[0].contains(&("semester.id".to_string(), "124".to_string())));
    assert!(query_forms[1].contains(&("semester.id".to_string(), "123".to_string())));

    assert_eq!(entries, Vec::new());
    assert!(sink.failures.borrow().is_empty());
}

#[test]
fn test_transient_query_failure_walks_to_next_semester() {
    let transport = FlakyTransport {
        inner: ScriptedTransport::new(vec![
            ("homeExt.action", AUTHENTICATED_HOME.to_string()),
            ("courseTableForStd!courseTable.action", COURSE_PAYLOAD.to_string()),
            ("courseTableForStd.action", TIMETABLE_PAGE.to_string()),
            ("dataQuery.action", SEMESTER_JSON.to_string()),
        ]),
        fail_suffix: "courseTableForStd!courseTable.action",
        failures_left: RefCell::new(1),
    };
    let prompter = ScriptedPrompter::new(&[], Some("1:2023-2024学年第二学期"));
    let sink = RecordingSink::default();

    let importer = Importer::new(
        &transport,
        &prompter,
        &sink,
        config("http://jw.example.edu/eams/home.action"),
    );
    let entries = importer.run();

    // The failed first attempt counts like a markerless response; the walk
    // continues to the older semester instead of aborting.
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "高等数学");
    assert!(sink.failures.borrow().is_empty());

    let query_forms = transport.inner.requests_to("courseTableForStd!courseTable.action");
    assert_eq!(query_forms.len(), 1);
    assert!(query_forms[0].contains(&("semester.id".to_string(), "123".to_string())));
}

#[test]
fn test_ids_token_prefers_addinput_pattern() {
    let sink = RecordingSink::default();
    let page = r#"
<script>bg.form.addInput(form,"ids","3042");</script>
<input type="hidden" name="ids" value="9999"/>
<script>var ids = "1111";</script>
"#;

    let ids = eamsync_core::portal::timetable::extract_ids_token(&sink, page);
    assert_eq!(ids, "3042");
}

#[test]
fn test_ids_token_falls_back_when_absent() {
    let sink = RecordingSink::default();

    let ids = eamsync_core::portal::timetable::extract_ids_token(&sink, "<html></html>");
    assert_eq!(ids, "194");
    assert_eq!(sink.reports.borrow().len(), 1);
}

#[test]
fn test_unreachable_portal_becomes_error_entry() {
    let transport = ScriptedTransport::new(vec![]);
    let prompter = ScriptedPrompter::silent();
    let sink = RecordingSink::default();

    let importer = Importer::new(
        &transport,
        &prompter,
        &sink,
        config("http://jw.example.edu/eams/home.action"),
    );
    let entries = importer.run();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, ERROR_BANNER);
    assert_eq!(sink.failures.borrow().len(), 1);
}

#[test]
fn test_plain_flavor_probed_after_ext() {
    let transport = ScriptedTransport::new(vec![
        ("home.action", AUTHENTICATED_HOME.to_string()),
        ("courseTableForStd!courseTable.action", COURSE_PAYLOAD.to_string()),
        ("courseTableForStd.action", TIMETABLE_PAGE.to_string()),
        ("dataQuery.action", SEMESTER_JSON.to_string()),
    ]);
    let prompter = ScriptedPrompter::silent();
    let sink = RecordingSink::default();

    let importer = Importer::new(
        &transport,
        &prompter,
        &sink,
        config("http://jw.example.edu/eams/index.jsp"),
    );
    let entries = importer.run();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "高等数学");
}

#[test]
fn test_cas_entry_is_rejected_up_front() {
    let transport = ScriptedTransport::new(vec![]);
    let prompter = ScriptedPrompter::silent();
    let sink = RecordingSink::default();

    let importer = Importer::new(
        &transport,
        &prompter,
        &sink,
        config("https://cas.example.edu/cas/login?service=jw"),
    );
    let entries = importer.run();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, ERROR_BANNER);
    // Rejected before any network traffic.
    assert!(transport.requests.borrow().is_empty());
}
