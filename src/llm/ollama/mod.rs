
use std::io::{self, BufRead, BufReader};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::Generator;
use super::stream::{self, FragmentSender, TokenStream};
use crate::config::Config;
use crate::{PortfolioError, Result};

/// Blocking client for the Ollama generate API.
///
/// Requests are never retried; a slow model fails with
/// [`PortfolioError::Timeout`] once the configured timeout elapses.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    endpoint: Url,
    model: String,
    temperature: f32,
    timeout: Duration,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// One response object, or one NDJSON line when streaming
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config
            .ollama_url()
            .map_err(|e| PortfolioError::Config(format!("Failed to build Ollama URL: {}", e)))?
            .join("/api/generate")
            .map_err(|e| PortfolioError::Config(format!("Failed to build generate URL: {}", e)))?;
        let timeout = config.llm.request_timeout();

        Ok(Self {
            endpoint,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            timeout,
            agent: build_agent(timeout),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.agent = build_agent(timeout);
        self
    }

    fn request_body(&self, prompt: &str, stream: bool) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        serde_json::to_string(&request).map_err(|e| {
            PortfolioError::Generation(format!("Failed to serialize generate request: {}", e))
        })
    }
}

impl Generator for OllamaGenerator {
    #[inline]
    fn complete(&self, prompt: &str) -> Result<String> {
        let body = self.request_body(prompt, false)?;

        debug!(
            "Requesting completion from {} ({} prompt bytes)",
            self.model,
            prompt.len()
        );

        let mut response = send_request(&self.agent, &self.endpoint, &body, self.timeout)?;
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| map_transport_error(&e, self.timeout))?;

        let parsed: GenerateResponse = serde_json::from_str(&text).map_err(|e| {
            PortfolioError::Generation(format!("Failed to parse generate response: {}", e))
        })?;

        if let Some(error) = parsed.error {
            return Err(PortfolioError::Generation(error));
        }

        info!(
            "Received {} characters from {}",
            parsed.response.len(),
            self.model
        );
        Ok(parsed.response)
    }

    #[inline]
    fn stream(&self, prompt: &str) -> Result<TokenStream> {
        let body = self.request_body(prompt, true)?;
        let (sender, stream) = stream::channel(stream::DEFAULT_CAPACITY);

        let agent = self.agent.clone();
        let endpoint = self.endpoint.clone();
        let timeout = self.timeout;

        debug!("Starting streamed generation from {}", self.model);

        std::thread::Builder::new()
            .name("ollama-generate".to_string())
            .spawn(move || {
                if let Err(e) = produce_fragments(&agent, &endpoint, &body, timeout, &sender) {
                    warn!("Streamed generation failed: {}", e);
                    sender.fail(e);
                }
            })?;

        Ok(stream)
    }

    #[inline]
    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Read NDJSON lines and forward each non-empty `response` field
fn produce_fragments(
    agent: &ureq::Agent,
    endpoint: &Url,
    body: &str,
    timeout: Duration,
    sender: &FragmentSender,
) -> Result<()> {
    let response = send_request(agent, endpoint, body, timeout)?;
    let reader = BufReader::new(response.into_body().into_reader());

    for line in reader.lines() {
        let line = line.map_err(|e| map_io_error(e, timeout))?;
        if line.trim().is_empty() {
            continue;
        }

        let chunk: GenerateResponse = serde_json::from_str(&line).map_err(|e| {
            PortfolioError::Generation(format!("Malformed stream line '{}': {}", line, e))
        })?;

        if let Some(error) = chunk.error {
            return Err(PortfolioError::Generation(error));
        }

        if !chunk.response.is_empty() && !sender.send(chunk.response) {
            debug!("Stream consumer went away, stopping generation");
            return Ok(());
        }

        if chunk.done {
            return Ok(());
        }
    }

    warn!("Generation stream ended without a done marker");
    Ok(())
}

fn send_request(
    agent: &ureq::Agent,
    endpoint: &Url,
    body: &str,
    timeout: Duration,
) -> Result<ureq::http::Response<ureq::Body>> {
    let mut response = agent
        .post(endpoint.as_str())
        .header("Content-Type", "application/json")
        .send(body)
        .map_err(|e| map_transport_error(&e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response
            .body_mut()
            .read_to_string()
            .ok()
            .and_then(|text| serde_json::from_str::<ErrorResponse>(&text).ok())
            .map_or_else(|| status.to_string(), |e| e.error);

        return Err(PortfolioError::Generation(format!(
            "Ollama returned HTTP {}: {}",
            status.as_u16(),
            detail
        )));
    }

    Ok(response)
}

fn map_transport_error(error: &ureq::Error, timeout: Duration) -> PortfolioError {
    match error {
        ureq::Error::Timeout(_) => PortfolioError::Timeout(timeout),
        ureq::Error::Io(e) if e.kind() == io::ErrorKind::TimedOut => {
            PortfolioError::Timeout(timeout)
        }
        ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => PortfolioError::Network(
            format!("Cannot reach Ollama: {}. Is `ollama serve` running?", error),
        ),
        _ => PortfolioError::Network(format!("Generate request failed: {}", error)),
    }
}

fn map_io_error(error: io::Error, timeout: Duration) -> PortfolioError {
    if error.kind() == io::ErrorKind::TimedOut {
        return PortfolioError::Timeout(timeout);
    }

    // ureq wraps its own errors in io::Error when reading through a BodyReader
    match error.downcast::<ureq::Error>() {
        Ok(inner) => map_transport_error(&inner, timeout),
        Err(error) => PortfolioError::Io(error),
    }
}

/// Agent that reports HTTP error statuses as responses so Ollama's error body can be read
fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(timeout))
        .build()
        .into()
}
