//! The end-to-end import pipeline: probe, login if needed, resolve the
//! semester, fetch the course payload, extract and conflate.

use crate::callback::{ProgressSink, Prompter};
use crate::conflate;
use crate::dom;
use crate::extract;
use crate::fetch::Transport;
use crate::portal::{login, probe, semester, timetable, ImportError};
use crate::schedule::{self, ScheduleEntry, DEFAULT_TERM_WEEKS};

/// Entry URL used when the caller configures nothing. Points at the
/// tunneled deployment the engine was originally written against.
const DEFAULT_ENTRY_URL: &str =
    "https://webvpn.ahpu.edu.cn/http/webvpnd0b10bdb350bb9543ce925f1f45f7a8d037396bf3b450ddbbfbddfc8f5414a4c/ahpu";

const DEFAULT_TUNNEL_SEGMENT: &str = "ahpu";
const DEFAULT_THROTTLE_MS: u64 = 400;

#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// URL the user's session currently sits on; the probe derives the
    /// portal base from it.
    pub entry_url: String,
    /// Path segment tunneled deployments insert between base and page.
    pub tunnel_segment: String,
    /// Delay between consecutive timetable queries.
    pub throttle_ms: u64,
    /// Term length assumed when a payload carries no recurrence data.
    pub term_weeks: u32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            entry_url: DEFAULT_ENTRY_URL.to_string(),
            tunnel_segment: DEFAULT_TUNNEL_SEGMENT.to_string(),
            throttle_ms: DEFAULT_THROTTLE_MS,
            term_weeks: DEFAULT_TERM_WEEKS,
        }
    }
}

pub struct Importer<'a> {
    transport: &'a dyn Transport,
    prompter: &'a dyn Prompter,
    sink: &'a dyn ProgressSink,
    config: ImportConfig,
}

impl<'a> Importer<'a> {
    pub fn new(
        transport: &'a dyn Transport,
        prompter: &'a dyn Prompter,
        sink: &'a dyn ProgressSink,
        config: ImportConfig,
    ) -> Self {
        Importer { transport, prompter, sink, config }
    }

    /// Run the import. Unrecoverable failures collapse into a single
    /// synthetic error entry so the caller always gets a schedule array.
    pub fn run(&self) -> Vec<ScheduleEntry> {
        match self.try_run() {
            Ok(entries) => entries,
            Err(e) => {
                let message = e.to_string();
                log::error!("import failed: {}", message);
                self.sink.fail(&message);
                vec![schedule::error_entry(&message)]
            }
        }
    }

    /// Like [`run`](Self::run), serialized as a JSON array.
    pub fn run_json(&self) -> String {
        serde_json::to_string(&self.run()).unwrap_or_else(|_| "[]".to_string())
    }

    fn try_run(&self) -> Result<Vec<ScheduleEntry>, ImportError> {
        let outcome = probe::probe_session(
            self.transport,
            self.sink,
            &self.config.entry_url,
            &self.config.tunnel_segment,
        )?;

        if !outcome.authenticated {
            login::login(
                self.transport,
                self.prompter,
                self.sink,
                &outcome.endpoints,
                &outcome.home_html,
            )?;
        }

        let page = timetable::fetch_timetable_page(self.transport, self.sink, &outcome.endpoints)?;
        let choice = semester::resolve_semesters(
            self.transport,
            self.prompter,
            self.sink,
            &outcome.endpoints,
            &page,
        );
        let ids = timetable::extract_ids_token(self.sink, &page);

        let payload = match timetable::fetch_course_payload(
            self.transport,
            self.sink,
            &outcome.endpoints,
            &choice,
            &ids,
            self.config.throttle_ms,
        ) {
            Some(payload) => payload,
            None => {
                self.sink.report("未能获取到课表数据，将返回空课表");
                return Ok(Vec::new());
            }
        };

        let mut occurrences = extract::extract_script_occurrences(&payload);
        if occurrences.is_empty() {
            log::debug!("script extraction empty, falling back to table traversal");
            let doc = dom::parse_html(&payload);
            occurrences = extract::table::extract_table_occurrences(&doc, self.config.term_weeks);
        }

        let entries = conflate::conflate(&occurrences);
        self.sink
            .report(&format!("课表解析完成，共{}门课程", entries.len()));
        Ok(entries)
    }
}
