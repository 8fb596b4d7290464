//! Client for a running relay.
//!
//! `PrecheckClient` posts files and checks to `/run-checks` and feeds the
//! streamed response through the demultiplexer into a shared `RunState`.
//! `CheckSession` owns that state and makes sure only the latest run can
//! write to it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::parse_base_url;
use crate::demux::LineDemultiplexer;
use crate::domain::{Check, EncodedFile, RunChecksRequest};
use crate::run_state::{RunId, RunState};

/// Connect timeout for relay requests. The response stream is not bounded.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Shown when the relay fails without a usable error body.
pub const GENERIC_RUN_ERROR: &str = "OpenAI request failed.";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Add at least one PDF before running the pre-check.")]
    NoFiles,
    #[error("{0}")]
    Relay(String),
    #[error("request to relay failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("response stream failed: {0}")]
    Stream(String),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// HTTP client for the relay's `/run-checks` endpoint.
#[derive(Debug, Clone)]
pub struct PrecheckClient {
    client: Client,
    endpoint: Url,
}

impl PrecheckClient {
    pub fn new(server_url: &str) -> anyhow::Result<Self> {
        let base = parse_base_url(server_url)?;
        let endpoint = base
            .join("run-checks")
            .with_context(|| format!("Failed to build run-checks URL from: {}", server_url))?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Execute one run, applying records to `state` as they arrive.
    ///
    /// Returns the number of records read from the stream.
    pub async fn run(
        &self,
        run: RunId,
        files: Vec<EncodedFile>,
        checks: Vec<Check>,
        state: &Mutex<RunState>,
    ) -> Result<usize, ClientError> {
        if files.is_empty() {
            return Err(ClientError::NoFiles);
        }

        let body = RunChecksRequest { files, checks };
        debug!("=== Run Checks Request ===");
        debug!("URL: {}", self.endpoint);

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        debug!("Status: {}", status);
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| GENERIC_RUN_ERROR.to_string());
            return Err(ClientError::Relay(message));
        }

        apply_stream(response.bytes_stream(), run, state).await
    }
}

/// Demultiplex a relay body stream into `state`, in arrival order.
pub async fn apply_stream<S, E>(
    stream: S,
    run: RunId,
    state: &Mutex<RunState>,
) -> Result<usize, ClientError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut demux = LineDemultiplexer::new();
    let mut received = 0;
    futures_util::pin_mut!(stream);

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| ClientError::Stream(err.to_string()))?;
        let records = demux.push(&chunk);
        if records.is_empty() {
            continue;
        }
        let mut state = state.lock().await;
        for record in records {
            state.apply(run, record);
            received += 1;
        }
    }

    if let Some(record) = demux.finish() {
        state.lock().await.apply(run, record);
        received += 1;
    }

    Ok(received)
}

/// A checklist session: one `RunState` and at most one live run.
pub struct CheckSession {
    client: PrecheckClient,
    state: Arc<Mutex<RunState>>,
    current: Option<(RunId, JoinHandle<()>)>,
}

impl CheckSession {
    pub fn new(client: PrecheckClient, checks: Vec<Check>) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(RunState::new(checks))),
            current: None,
        }
    }

    /// Start a run for `files`, cancelling any run still in flight.
    pub async fn start(&mut self, files: Vec<EncodedFile>) -> Result<RunId, ClientError> {
        if files.is_empty() {
            return Err(ClientError::NoFiles);
        }

        if let Some((_, previous)) = self.current.take() {
            if !previous.is_finished() {
                warn!("Cancelling previous run still in progress");
                previous.abort();
            }
        }

        let (run, checks) = {
            let mut state = self.state.lock().await;
            let run = state.begin_run();
            (run, state.checks().to_vec())
        };
        info!("Starting run {} with {} file(s)", run, files.len());

        let client = self.client.clone();
        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(async move {
            let result = client.run(run, files, checks, &state).await;
            let error = match result {
                Ok(received) => {
                    info!("Run {} finished, {} record(s) received", run, received);
                    None
                }
                Err(err) => {
                    warn!("Run {} failed: {}", run, err);
                    Some(err.to_string())
                }
            };
            state.lock().await.finish_run(run, error);
        });
        self.current = Some((run, handle));

        Ok(run)
    }

    /// Wait for the current run to end and return a snapshot of the state.
    ///
    /// A run whose task died before finishing is closed with a generic error.
    pub async fn wait(&mut self) -> RunState {
        let Some((run, handle)) = self.current.take() else {
            return self.state.lock().await.clone();
        };

        if let Err(err) = handle.await {
            warn!("Run {} task ended abnormally: {}", run, err);
        }

        let mut state = self.state.lock().await;
        if state.is_running() {
            state.finish_run(run, Some(GENERIC_RUN_ERROR.to_string()));
        }
        state.clone()
    }
}
