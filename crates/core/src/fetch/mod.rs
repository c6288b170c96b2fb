//! The network seam: a text-fetch trait the engine consumes, plus the
//! blocking reqwest implementation with cookie persistence.
//! The HTTP client is gated behind the "fetch" feature flag.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// The one network primitive the engine needs. Implementations must not
/// panic across this boundary; every error is surfaced as a `FetchError`
/// and callers fall back (a failed fetch is treated as an absent response).
pub trait Transport {
    fn fetch_text(
        &self,
        method: Method,
        form: Option<&[(&str, &str)]>,
        url: &str,
    ) -> Result<String, FetchError>;
}

#[derive(Debug)]
pub enum FetchError {
    InvalidUrl(String),
    Network(String),
    HttpError(u16),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::InvalidUrl(e) => write!(f, "Invalid URL: {}", e),
            FetchError::Network(e) => write!(f, "Network error: {}", e),
            FetchError::HttpError(code) => write!(f, "HTTP error: {}", code),
        }
    }
}

impl std::error::Error for FetchError {}

#[cfg(feature = "fetch")]
pub use http::{HttpConfig, HttpTransport};

#[cfg(feature = "fetch")]
mod http {
    use super::{FetchError, Method, Transport};
    use reqwest::blocking::Client;
    use std::sync::Arc;
    use url::Url;

    /// Configuration for the blocking HTTP transport.
    pub struct HttpConfig {
        /// User-Agent header.
        pub user_agent: String,
        /// Request timeout in seconds.
        pub timeout_secs: u64,
    }

    impl Default for HttpConfig {
        fn default() -> Self {
            Self {
                user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                             (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36"
                    .to_string(),
                timeout_secs: 30,
            }
        }
    }

    /// Blocking transport with a cookie jar. The portal endpoints are
    /// session-stateful, so the same jar must carry the login cookie
    /// through every later request.
    pub struct HttpTransport {
        client: Client,
    }

    impl HttpTransport {
        pub fn new() -> Result<Self, FetchError> {
            Self::with_config(HttpConfig::default())
        }

        pub fn with_config(config: HttpConfig) -> Result<Self, FetchError> {
            let cookie_store = Arc::new(reqwest::cookie::Jar::default());
            let client = Client::builder()
                .user_agent(&config.user_agent)
                .timeout(std::time::Duration::from_secs(config.timeout_secs))
                .cookie_provider(cookie_store)
                .build()
                .map_err(|e| FetchError::Network(e.to_string()))?;
            Ok(Self { client })
        }
    }

    impl Transport for HttpTransport {
        fn fetch_text(
            &self,
            method: Method,
            form: Option<&[(&str, &str)]>,
            url: &str,
        ) -> Result<String, FetchError> {
            let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

            let request = match method {
                Method::Get => {
                    let builder = self.client.get(parsed.as_str());
                    match form {
                        Some(fields) => builder.query(fields),
                        None => builder,
                    }
                }
                Method::Post => {
                    let builder = self.client.post(parsed.as_str());
                    match form {
                        Some(fields) => builder.form(fields),
                        None => builder,
                    }
                }
            };

            let response = request.send().map_err(|e| FetchError::Network(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::HttpError(status.as_u16()));
            }
            response.text().map_err(|e| FetchError::Network(e.to_string()))
        }
    }
}
