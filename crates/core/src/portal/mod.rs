//! Portal-facing flows: session probing, login, semester resolution and
//! the timetable query. Everything here targets the EAMS template family;
//! tokens that templates drift on are extracted through [`crate::extract::Cascade`]
//! with hard-coded fallbacks, so a near-miss deployment degrades instead of
//! failing.

pub mod login;
pub mod probe;
pub mod semester;
pub mod timetable;

use crate::fetch::FetchError;

/// Substring marking a URL-rewriting reverse-proxy (WebVPN) deployment.
pub const TUNNEL_MARKER: &str = "webvpn";

pub const DATA_QUERY_PATH: &str = "dataQuery.action";
pub const TIMETABLE_PATH: &str = "courseTableForStd.action";
pub const TIMETABLE_QUERY_PATH: &str = "courseTableForStd!courseTable.action";

/// Markers whose presence in a query response means it carries course data.
pub const COURSE_MARKERS: [&str; 2] = ["kbxx_id_", "actTeacherName"];

/// Resolved endpoint set for one portal deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Base URL without trailing slash; paths are appended to it.
    pub base: String,
    pub home_url: String,
    pub login_url: String,
    /// Class name whose presence in a document means "login form shown".
    pub login_marker: &'static str,
}

impl Endpoints {
    pub fn url(&self, path: &str) -> String {
        join_url(&self.base, path)
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

/// Engine-level error taxonomy. Only genuinely fatal conditions live here;
/// extraction failures degrade to defaults and never surface as errors.
#[derive(Debug)]
pub enum ImportError {
    /// Explicit login failure text from the portal, or an unusable login
    /// page. Never auto-retried: stale credentials retried blindly would
    /// repeat the failure and can trigger account lockouts.
    Login(String),
    /// The portal answered with something that cannot be a timetable
    /// deployment (no plausible endpoint, implausibly short page).
    Portal(String),
    /// The caller abandoned an interactive prompt.
    Cancelled,
    Fetch(FetchError),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Login(message) => write!(f, "{}", message),
            ImportError::Portal(message) => write!(f, "{}", message),
            ImportError::Cancelled => write!(f, "导入已取消"),
            ImportError::Fetch(e) => write!(f, "网络请求失败: {}", e),
        }
    }
}

impl std::error::Error for ImportError {}

impl From<FetchError> for ImportError {
    fn from(e: FetchError) -> Self {
        ImportError::Fetch(e)
    }
}
