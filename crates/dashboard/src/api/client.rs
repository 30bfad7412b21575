//! Backend HTTP client
//!
//! Uses synchronous HTTP (ureq) to be executor-agnostic.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::BufReader;
use std::time::Duration;
use ureq::Agent;
use ureq::config::Config;
use ureq::http::Response;
use ureq::unversioned::resolver::DefaultResolver;
use ureq::unversioned::transport::{Connector, RustlsConnector};
use url::Url;

use super::wire::{
    AiJobcardsResponse, AiSearchRequest, AiSearchResponse, AssignRequest, CommentRequest,
    ErrorBody, StatusRequest,
};
use super::transport::{SocketHandle, StreamConnector};
use super::{AiAnswer, AiJobcards, Backend};
use crate::models::{Jobcard, JobcardId, JobcardPatch, JobcardStatus, Message, User};
use crate::search::SearchFilter;
use crate::stream::EventStream;

/// Upper bound for JSON bodies
const MAX_BODY_BYTES: u64 = 32 * 1024 * 1024;

/// Upper bound for image downloads
const MAX_IMAGE_BYTES: u64 = 64 * 1024 * 1024;

/// Connect timeout for the event stream; reads on it never time out
const STREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error for a non-2xx backend response
#[derive(Debug, thiserror::Error)]
#[error("Backend returned HTTP {status}: {message}")]
pub struct StatusError {
    pub status: u16,
    pub message: String,
}

/// HTTP client for the dashboard backend
pub struct BackendClient {
    base: Url,
    agent: Agent,
    stream_config: Config,
}

impl BackendClient {
    /// Create a client for the API rooted at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .with_context(|| format!("Invalid backend URL: {}", base_url))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        let stream_config = Agent::config_builder()
            .timeout_connect(Some(STREAM_CONNECT_TIMEOUT))
            .http_status_as_error(false)
            .max_idle_connections(0)
            .build();

        Ok(Self {
            base,
            agent,
            stream_config,
        })
    }

    /// Base URL all endpoint paths are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Agent for a single stream connection
    ///
    /// Each stream gets its own connector so its socket can be shut down
    /// without touching any other connection.
    fn stream_agent(&self) -> (Agent, SocketHandle) {
        let socket = SocketHandle::new();
        let connector = StreamConnector::new(socket.clone()).chain(RustlsConnector::default());
        let agent = Agent::with_parts(
            self.stream_config.clone(),
            connector,
            DefaultResolver::default(),
        );
        (agent, socket)
    }

    fn url(&self, path: &str) -> Result<String> {
        let url = self
            .base
            .join(path)
            .with_context(|| format!("Failed to build URL for {}", path))?;
        Ok(url.to_string())
    }

    fn jobcard_url(&self, id: &JobcardId, suffix: &str) -> Result<String> {
        self.url(&format!(
            "jobcards/{}{}",
            urlencoding::encode(id.as_str()),
            suffix
        ))
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let url = self.url(path)?;
        let response = self
            .agent
            .get(&url)
            .header("Accept", "application/json")
            .call()
            .with_context(|| format!("Failed to send {} request", what))?;
        read_json(response, what)
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        what: &str,
    ) -> Result<T> {
        let response = self
            .agent
            .post(url)
            .header("Accept", "application/json")
            .send_json(body)
            .with_context(|| format!("Failed to send {} request", what))?;
        read_json(response, what)
    }
}

impl Backend for BackendClient {
    fn list_messages(&self) -> Result<Vec<Message>> {
        self.get_json("messages", "list messages")
    }

    fn search_messages(&self, filter: &SearchFilter) -> Result<Vec<Message>> {
        let url = self.url("messages/search")?;
        self.post_json(&url, filter, "search messages")
    }

    fn ai_search(&self, query: &str) -> Result<AiAnswer> {
        let url = self.url("ai-search")?;
        let response: AiSearchResponse =
            self.post_json(&url, &AiSearchRequest { query }, "AI search")?;

        if let Some(err) = response.error {
            return Ok(AiAnswer::Error(err));
        }

        let text = match response.result {
            Some(serde_json::Value::String(s)) => s,
            Some(value) => serde_json::to_string_pretty(&value)
                .context("Failed to format AI search result")?,
            None => String::new(),
        };
        Ok(AiAnswer::Result(text))
    }

    fn fetch_image(&self, file_id: &str) -> Result<Vec<u8>> {
        let url = self.url(&format!("image/{}", urlencoding::encode(file_id)))?;
        let mut response = self
            .agent
            .get(&url)
            .call()
            .context("Failed to send image request")?;
        if !response.status().is_success() {
            return Err(status_error(response).into());
        }

        response
            .body_mut()
            .with_config()
            .limit(MAX_IMAGE_BYTES)
            .read_to_vec()
            .context("Failed to read image body")
    }

    fn list_users(&self) -> Result<Vec<User>> {
        self.get_json("users", "list users")
    }

    fn list_jobcards(&self) -> Result<Vec<Jobcard>> {
        self.get_json("jobcards", "list jobcards")
    }

    fn ai_jobcards(&self) -> Result<AiJobcards> {
        let response: AiJobcardsResponse = self.get_json("ai-jobcards", "AI jobcards")?;
        response
            .into_outcome()
            .context("Failed to parse AI jobcards")
    }

    fn create_jobcard(&self, jobcard: &Jobcard) -> Result<Jobcard> {
        let url = self.url("jobcards")?;
        self.post_json(&url, jobcard, "create jobcard")
    }

    fn set_jobcard_status(&self, id: &JobcardId, status: JobcardStatus) -> Result<Jobcard> {
        let url = self.jobcard_url(id, "/status")?;
        self.post_json(&url, &StatusRequest { status }, "jobcard status")
    }

    fn update_jobcard(&self, id: &JobcardId, patch: &JobcardPatch) -> Result<Jobcard> {
        let url = self.jobcard_url(id, "")?;
        let response = self
            .agent
            .put(&url)
            .header("Accept", "application/json")
            .send_json(patch)
            .context("Failed to send update jobcard request")?;
        read_json(response, "update jobcard")
    }

    fn assign_jobcard(&self, id: &JobcardId, user_id: &str) -> Result<Jobcard> {
        let url = self.jobcard_url(id, "/assign")?;
        self.post_json(&url, &AssignRequest { user_id }, "assign jobcard")
    }

    fn comment_jobcard(
        &self,
        id: &JobcardId,
        user_id: Option<&str>,
        text: &str,
    ) -> Result<Jobcard> {
        let url = self.jobcard_url(id, "/comment")?;
        self.post_json(&url, &CommentRequest { user_id, text }, "comment jobcard")
    }

    fn delete_jobcard(&self, id: &JobcardId) -> Result<()> {
        let url = self.jobcard_url(id, "")?;
        let response = self
            .agent
            .delete(&url)
            .call()
            .context("Failed to send delete jobcard request")?;
        if !response.status().is_success() {
            return Err(status_error(response).into());
        }
        Ok(())
    }

    fn open_stream(&self) -> Result<EventStream> {
        let url = self.url("messages/stream")?;
        let (agent, socket) = self.stream_agent();
        let response = agent
            .get(&url)
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .call()
            .context("Failed to open message stream")?;
        if !response.status().is_success() {
            return Err(status_error(response).into());
        }

        let reader = response.into_body().into_reader();
        Ok(EventStream::new(BufReader::new(reader)).with_interrupt(move || socket.shutdown()))
    }
}

fn read_json<T: DeserializeOwned>(mut response: Response<ureq::Body>, what: &str) -> Result<T> {
    if !response.status().is_success() {
        return Err(status_error(response))
            .with_context(|| format!("{} request rejected", what));
    }

    let bytes = response
        .body_mut()
        .with_config()
        .limit(MAX_BODY_BYTES)
        .read_to_vec()
        .with_context(|| format!("Failed to read {} response", what))?;

    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse {} response", what))
}

/// Turn a non-2xx response into a [`StatusError`], preferring the backend's own message
fn status_error(mut response: Response<ureq::Body>) -> StatusError {
    let status = response.status();
    let body = response
        .body_mut()
        .with_config()
        .limit(64 * 1024)
        .read_to_vec()
        .unwrap_or_default();

    let message = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .unwrap_or_else(|| {
            let text = String::from_utf8_lossy(&body).trim().to_string();
            if text.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                text
            }
        });

    StatusError {
        status: status.as_u16(),
        message,
    }
}
