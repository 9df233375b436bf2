use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aurora_backend::{BackendError, BackendResult, LedgerBackend};
use aurora_types::{LedgerCloseMeta, LedgerRange};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::messages::{LatestLedgerSequenceResponse, LedgerResponse, PrepareRangeResponse};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for a remote captive-core server, itself a [`LedgerBackend`].
///
/// `prepare_range` blocks by polling the server until it reports ready; all
/// other calls are synchronous RPC. `close` stops an in-flight poll.
pub struct RemoteCaptiveBackend {
    base_url: String,
    client: reqwest::blocking::Client,
    poll_interval: Duration,
    cancelled: Arc<AtomicBool>,
}

impl RemoteCaptiveBackend {
    pub fn new(base_url: &str) -> BackendResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Remote(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Configure how often `prepare_range` polls the server.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn post_prepare(&self, range: LedgerRange) -> BackendResult<PrepareRangeResponse> {
        let response = self
            .client
            .post(self.url("prepare-range"))
            .header("content-type", "application/json; charset=utf-8")
            .json(&range)
            .send()
            .map_err(|e| BackendError::Remote(e.to_string()))?;
        decode_response(response)
    }
}

/// A non-2xx response body is the server's error message.
fn decode_response<T: DeserializeOwned>(response: reqwest::blocking::Response) -> BackendResult<T> {
    if !response.status().is_success() {
        let message = response
            .text()
            .unwrap_or_else(|e| format!("failed to read response body: {e}"));
        return Err(BackendError::Remote(message));
    }
    response
        .json()
        .map_err(|e| BackendError::Remote(format!("failed to decode json payload: {e}")))
}

impl LedgerBackend for RemoteCaptiveBackend {
    fn prepare_range(&mut self, range: LedgerRange) -> BackendResult<()> {
        loop {
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(BackendError::Remote("shutting down".to_string()));
            }
            let response = self.post_prepare(range)?;
            if response.ready {
                debug!(%range, ready_duration_ms = response.ready_duration, "remote range ready");
                return Ok(());
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    fn is_prepared(&mut self, range: LedgerRange) -> BackendResult<bool> {
        Ok(self.post_prepare(range)?.ready)
    }

    fn get_ledger(&mut self, sequence: u32) -> BackendResult<Option<LedgerCloseMeta>> {
        let response = self
            .client
            .get(self.url(&format!("ledger/{sequence}")))
            .send()
            .map_err(|e| BackendError::Remote(e.to_string()))?;
        let parsed: LedgerResponse = decode_response(response)?;
        if !parsed.present {
            return Ok(None);
        }
        Ok(parsed.ledger.map(|ledger| ledger.0))
    }

    fn latest_sequence(&mut self) -> BackendResult<u32> {
        let response = self
            .client
            .get(self.url("latest-sequence"))
            .send()
            .map_err(|e| BackendError::Remote(e.to_string()))?;
        let parsed: LatestLedgerSequenceResponse = decode_response(response)?;
        Ok(parsed.sequence)
    }

    /// Cancels an in-flight `prepare_range` poll. The server keeps its
    /// backend running; only this client stops.
    fn close(&mut self) -> BackendResult<()> {
        self.cancelled.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{build_router, ServerState};
    use aurora_backend::{DatabaseBackend, InMemoryCoreStore};
    use std::sync::Arc as StdArc;

    async fn spawn_server() -> String {
        let store = InMemoryCoreStore::new();
        for sequence in 64..=70 {
            store.insert(LedgerCloseMeta::empty(sequence));
        }
        let backend = DatabaseBackend::new(StdArc::new(store));
        let state = StdArc::new(ServerState::new(Box::new(backend)));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn end_to_end_over_real_http() {
        let base_url = spawn_server().await;

        tokio::task::spawn_blocking(move || {
            let mut client = RemoteCaptiveBackend::new(&base_url)
                .unwrap()
                .with_poll_interval(Duration::from_millis(5));

            client
                .prepare_range(LedgerRange::bounded(64, 70))
                .unwrap();
            assert!(client.is_prepared(LedgerRange::bounded(64, 70)).unwrap());

            let meta = client.get_ledger(64).unwrap().expect("ledger present");
            assert_eq!(meta.sequence(), 64);
            assert!(client.get_ledger(200).unwrap().is_none());

            assert_eq!(client.latest_sequence().unwrap(), 70);
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn close_cancels_polling() {
        let base_url = spawn_server().await;

        tokio::task::spawn_blocking(move || {
            let mut client = RemoteCaptiveBackend::new(&base_url).unwrap();
            client.close().unwrap();
            let err = client
                .prepare_range(LedgerRange::bounded(64, 70))
                .unwrap_err();
            assert!(err.to_string().contains("shutting down"));
        })
        .await
        .unwrap();
    }
}
