use crate::error::{FetchError, Result, VaimmError};
use crate::fetch::retry::parse_retry_after;
use crate::fetch::FetchSettings;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, COOKIE, RETRY_AFTER, USER_AGENT};

/// Source of artifact bytes
///
/// The engine only ever issues plain GETs, so this is the whole surface it
/// needs from an HTTP client.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start a GET request; non-success statuses are returned as errors
    async fn get(&self, url: &str) -> std::result::Result<Box<dyn ResponseBody>, FetchError>;
}

/// Streaming response body
#[async_trait]
pub trait ResponseBody: Send {
    /// Length advertised by the server, if any
    fn content_length(&self) -> Option<u64>;

    /// Next chunk of the body, `None` at end of stream
    async fn chunk(&mut self) -> std::result::Result<Option<Bytes>, FetchError>;
}

/// reqwest-backed transport for the model CDN
pub struct HttpTransport {
    client: reqwest::Client,
    cookie: String,
    user_agent: String,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("client", &"Client { ... }")
            .field("cookie", &"***")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl HttpTransport {
    /// Create transport from fetch settings
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        if settings.cookie.trim().is_empty() {
            return Err(VaimmError::Config(
                "Missing cf_clearance cookie (use --cookie or TVAI_COOKIE)".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| VaimmError::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            cookie: format!("cf_clearance={}", settings.cookie.trim()),
            user_agent: settings.user_agent.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> std::result::Result<Box<dyn ResponseBody>, FetchError> {
        tracing::debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .header(COOKIE, &self.cookie)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "*/*")
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    FetchError::Request(e.to_string())
                } else {
                    FetchError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response.headers().get(RETRY_AFTER).and_then(|value| {
                let parsed = value
                    .to_str()
                    .ok()
                    .and_then(|text| parse_retry_after(text, chrono::Utc::now()));
                if parsed.is_none() {
                    tracing::debug!("Ignoring unparseable Retry-After header: {value:?}");
                }
                parsed
            });

            return Err(FetchError::Status {
                status: status.as_u16(),
                retry_after,
            });
        }

        Ok(Box::new(HttpBody {
            content_length: response.content_length(),
            stream: response.bytes_stream().boxed(),
        }))
    }
}

struct HttpBody {
    content_length: Option<u64>,
    stream: BoxStream<'static, reqwest::Result<Bytes>>,
}

#[async_trait]
impl ResponseBody for HttpBody {
    fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    async fn chunk(&mut self) -> std::result::Result<Option<Bytes>, FetchError> {
        self.stream
            .next()
            .await
            .transpose()
            .map_err(|e| FetchError::Transport(e.to_string()))
    }
}
