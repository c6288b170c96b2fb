//! Session probing: find a working endpoint shape for this deployment and
//! decide whether the session is already authenticated.

use crate::callback::ProgressSink;
use crate::dom;
use crate::extract::Cascade;
use crate::fetch::{Method, Transport};

use super::{join_url, Endpoints, ImportError, TUNNEL_MARKER};

/// Portal flavor: Ext-suffixed deployments and plain ones name their pages
/// and login-form marker class differently.
struct Flavor {
    home: &'static str,
    login: &'static str,
    marker: &'static str,
}

const FLAVORS: [Flavor; 2] = [
    Flavor { home: "homeExt.action", login: "loginExt.action", marker: "login-table" },
    Flavor { home: "home.action", login: "login.action", marker: "logintable" },
];

pub struct ProbeOutcome {
    pub endpoints: Endpoints,
    pub authenticated: bool,
    /// The accepted home document; the login flow scrapes its salt and
    /// CAPTCHA fields from here without refetching.
    pub home_html: String,
}

/// Try base-URL shapes × portal flavors until one returns a plausible page.
/// Tunneled (WebVPN) deployments rewrite paths, so the configured path
/// segment is also tried inserted between base and page.
pub fn probe_session(
    transport: &dyn Transport,
    sink: &dyn ProgressSink,
    entry_url: &str,
    tunnel_segment: &str,
) -> Result<ProbeOutcome, ImportError> {
    let entry_url = entry_url.trim_end_matches('/');
    if entry_url.contains("cas/login") {
        return Err(ImportError::Login(
            "检测到CAS登录页面，请先完成登录".to_string(),
        ));
    }

    for base in candidate_bases(entry_url, tunnel_segment) {
        for flavor in &FLAVORS {
            let home_url = join_url(&base, flavor.home);
            let body = match transport.fetch_text(Method::Get, None, &home_url) {
                Ok(body) => body,
                Err(_) => continue,
            };
            if !is_plausible_page(&body) {
                continue;
            }

            sink.report(&format!("已确定API路径: {}", home_url));
            let login_url = join_url(&base, flavor.login);
            let authenticated = is_authenticated(&body, flavor.marker, entry_url, &login_url);
            return Ok(ProbeOutcome {
                endpoints: Endpoints {
                    base,
                    home_url,
                    login_url,
                    login_marker: flavor.marker,
                },
                authenticated,
                home_html: body,
            });
        }
    }

    Err(ImportError::Portal(
        "无法访问教务系统首页，请确认网络和地址".to_string(),
    ))
}

/// Base shapes in order: the entry URL with any page name stripped, then
/// (for tunneled deployments) the same with the campus path segment
/// appended when it is not already present.
fn candidate_bases(entry_url: &str, tunnel_segment: &str) -> Vec<String> {
    let base = derive_base(entry_url);
    let mut bases = vec![base.clone()];

    if entry_url.contains(TUNNEL_MARKER)
        && !tunnel_segment.is_empty()
        && !base.ends_with(&format!("/{}", tunnel_segment))
    {
        bases.push(join_url(&base, tunnel_segment));
    }
    bases
}

/// For tunneled URLs the meaningful prefix is scheme://webvpn-host/x/y;
/// otherwise drop a trailing page name (anything with a dot) and keep the
/// rest.
fn derive_base(entry_url: &str) -> String {
    let tunnel_prefix = Cascade::new(&[r"^(https?://webvpn\.[^/]+/[^/]+/[^/]+)"]);
    if let Some(prefix) = tunnel_prefix.first_capture(entry_url) {
        return prefix;
    }

    match entry_url.rsplit_once('/') {
        Some((head, tail)) if tail.contains('.') && head.contains("//") => head.to_string(),
        _ => entry_url.to_string(),
    }
}

/// Accept anything that is non-empty and does not look like a hard 404.
/// The heuristic is deliberately loose: tunneled deployments rewrite
/// status pages, so a strict status check would reject working portals.
fn is_plausible_page(body: &str) -> bool {
    if body.trim().is_empty() {
        return false;
    }
    body.contains("<title>") || body.to_lowercase().contains("login") || !body.contains("404")
}

/// Authenticated means the home document shows no login form and we did not
/// enter through the login page itself.
fn is_authenticated(body: &str, login_marker: &str, entry_url: &str, login_url: &str) -> bool {
    let doc = dom::parse_html(body);
    doc.find_by_class(login_marker).is_none() && entry_url != login_url
}
