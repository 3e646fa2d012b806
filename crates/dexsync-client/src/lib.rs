//! Rate-limited access to the upstream reference-data API.
//!
//! `DataSource` is the seam the engine reconciles through; `ApiClient` is the
//! production implementation over blocking `ureq`. Tests substitute an
//! in-memory fixture source.

use std::time::{Duration, Instant};

use dexsync_core::{Kind, SyncError};
use tracing::{debug, warn};

/// Where upstream records come from.
///
/// Returns `Ok(None)` when the record does not exist upstream; the caller
/// applies its own absence policy.
pub trait DataSource {
    /// Fetch one record by kind and natural id.
    ///
    /// # Errors
    /// `SyncError::Transport` for network or protocol failures.
    fn fetch(&mut self, kind: Kind, api_id: i64) -> Result<Option<serde_json::Value>, SyncError>;
}

/// Blocking HTTP client with a wall-clock minimum interval between requests.
///
/// The upstream service asks consumers to keep request rates modest; one
/// request per second is the conventional ceiling, so that is the default.
pub struct ApiClient {
    agent: ureq::Agent,
    base_url: String,
    min_interval: Duration,
    last_request: Option<Instant>,
}

pub const DEFAULT_BASE_URL: &str = "https://pokeapi.co/api/v2";
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1000);

impl ApiClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, min_interval: Duration) -> Self {
        ApiClient {
            agent: ureq::Agent::new(),
            base_url: base_url.into(),
            min_interval,
            last_request: None,
        }
    }

    fn throttle(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "throttling upstream request");
                std::thread::sleep(wait);
            }
        }
        self.last_request = Some(Instant::now());
    }
}

impl Default for ApiClient {
    fn default() -> Self {
        ApiClient::new(DEFAULT_BASE_URL, DEFAULT_MIN_INTERVAL)
    }
}

impl DataSource for ApiClient {
    fn fetch(&mut self, kind: Kind, api_id: i64) -> Result<Option<serde_json::Value>, SyncError> {
        let Some(endpoint) = kind.endpoint() else {
            return Err(SyncError::Transport(format!(
                "{kind} is a snapshot-only kind and has no endpoint"
            )));
        };
        self.throttle();
        let url = format!("{}/{endpoint}/{api_id}/", self.base_url);
        debug!(%url, "fetching upstream record");
        match self.agent.get(&url).call() {
            Ok(response) => {
                let value: serde_json::Value = response
                    .into_json()
                    .map_err(|err| SyncError::Decode(format!("invalid json from {url}: {err}")))?;
                Ok(Some(value))
            }
            Err(ureq::Error::Status(404, _)) => {
                warn!(%url, "upstream record does not exist");
                Ok(None)
            }
            Err(ureq::Error::Status(code, _)) => {
                Err(SyncError::Transport(format!("{url} returned status {code}")))
            }
            Err(err) => Err(SyncError::Transport(format!("{url} failed: {err}"))),
        }
    }
}
