//! Credential & login flow: scrape the hashing salt from the login page,
//! prompt for anything missing, submit the form, and surface the portal's
//! own error text verbatim when it rejects us.

use sha1::{Digest, Sha1};
use std::fmt::Write as _;

use crate::callback::{ProgressSink, Prompter, TextPrompt};
use crate::dom::{self, DomNode};
use crate::extract::Cascade;
use crate::fetch::{Method, Transport};

use super::{Endpoints, ImportError};

/// CSS classes marking the CAPTCHA widget on deployments that enable it.
const CAPTCHA_IMAGE_CLASS: &str = "verity-image";
const CAPTCHA_INPUT_CLASS: &str = "captcha_response";

/// CSS class of the portal's login error container.
const ERROR_CONTAINER_CLASS: &str = "actionError";

/// The login script salts the password before hashing; the salt is a
/// literal argument to the hashing call in inline script text. Patterns in
/// priority order; templates differ in which helper they call.
fn salt_cascade() -> Cascade {
    Cascade::new(&[
        r#"CryptoJS\.SHA1\(['"]([^'"]+)['"]"#,
        r#"b\.encode\(['"]([^'"]+)['"]"#,
        r#"SHA1\(['"]([^'"]+)['"]"#,
    ])
}

/// Run the full login flow against the given endpoints. `home_html` is the
/// already-fetched login page. Returns the post-login document.
pub fn login(
    transport: &dyn Transport,
    prompter: &dyn Prompter,
    sink: &dyn ProgressSink,
    endpoints: &Endpoints,
    home_html: &str,
) -> Result<String, ImportError> {
    let salt = salt_cascade().first_capture(home_html).ok_or_else(|| {
        ImportError::Login("无法提取登录参数，请手动登录后再尝试".to_string())
    })?;

    let doc = dom::parse_html(home_html);

    let username = match input_value(&doc, "username") {
        Some(value) => value,
        None => prompt_required(prompter, "请输入用户名", validate_username)?,
    };
    let password = match input_value(&doc, "password") {
        Some(value) => value,
        None => prompt_required(prompter, "请输入密码", validate_password)?,
    };
    let password_hash = sha1_hex(&format!("{}{}", salt, password));

    let mut form: Vec<(&str, &str)> = vec![
        ("username", username.as_str()),
        ("password", password_hash.as_str()),
        ("pwd", password_hash.as_str()),
        ("session_locale", "zh_CN"),
    ];

    let captcha;
    if has_captcha(&doc) {
        if let Some(src) = captcha_image_src(&doc) {
            sink.image(&src);
        }
        captcha = prompt_required(prompter, "请输入页面验证码", validate_captcha)?;
        form.push(("captcha_response", captcha.as_str()));
    }

    sink.report("登录中...");
    let response = transport.fetch_text(Method::Post, Some(&form), &endpoints.login_url)?;

    let response_doc = dom::parse_html(&response);
    if let Some(container) = response_doc.find_by_class(ERROR_CONTAINER_CLASS) {
        return Err(ImportError::Login(format!(
            "{}>>>请退出重新进入<<<",
            container.text_content()
        )));
    }

    Ok(response)
}

/// Compute the salted password hash the portal's own login script computes.
pub fn sha1_hex(input: &str) -> String {
    let digest = Sha1::digest(input.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

fn prompt_required(
    prompter: &dyn Prompter,
    title: &str,
    validate: fn(&str) -> Option<&'static str>,
) -> Result<String, ImportError> {
    prompter
        .text(&TextPrompt::required(title, validate))
        .filter(|value| !value.trim().is_empty())
        .ok_or(ImportError::Cancelled)
}

fn validate_username(value: &str) -> Option<&'static str> {
    if value.trim().is_empty() {
        Some("用户名输入有误")
    } else {
        None
    }
}

fn validate_password(value: &str) -> Option<&'static str> {
    if value.trim().is_empty() {
        Some("密码输入有误")
    } else {
        None
    }
}

fn validate_captcha(value: &str) -> Option<&'static str> {
    if value.trim().is_empty() {
        Some("验证码输入有误")
    } else {
        None
    }
}

/// Pre-filled value of a named input on the login page, if any.
fn input_value(doc: &DomNode, name: &str) -> Option<String> {
    doc.collect_tag("input")
        .into_iter()
        .find(|input| input.get_attr("name") == Some(name))
        .and_then(|input| input.get_attr("value"))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn has_captcha(doc: &DomNode) -> bool {
    doc.find_by_class(CAPTCHA_IMAGE_CLASS).is_some()
        || doc.find_by_class(CAPTCHA_INPUT_CLASS).is_some()
}

fn captcha_image_src(doc: &DomNode) -> Option<String> {
    if let Some(widget) = doc.find_by_class(CAPTCHA_IMAGE_CLASS) {
        if let Some(src) = widget.find_first_tag("img").and_then(|img| img.get_attr("src")) {
            return Some(src.to_string());
        }
    }
    doc.collect_tag("img")
        .into_iter()
        .filter_map(|img| img.get_attr("src"))
        .find(|src| src.to_lowercase().contains("captcha"))
        .map(str::to_string)
}
