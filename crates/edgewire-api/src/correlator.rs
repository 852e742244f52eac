// ── Request correlator ──
//
// Many concurrent callers share one connection. Each outbound request is
// registered under a fresh id before it touches the wire; the matching
// response, whenever and in whatever order it arrives, settles exactly
// that caller. No ordering between requests is assumed.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::jsonrpc::{JsonrpcRequest, JsonrpcResponse, JsonrpcResponseSuccess};
use crate::transport::Transport;

type Settle = oneshot::Sender<Result<JsonrpcResponseSuccess, Error>>;

struct PendingCall {
    tx: Settle,
    method: String,
    created_at: Instant,
}

/// Removes its pending entry when the caller's future goes away, settled
/// or not.
struct PendingGuard {
    pending: Arc<DashMap<String, PendingCall>>,
    id: String,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.pending.remove(&self.id).is_some() {
            debug!(id = %self.id, "Caller stopped waiting, pending request released");
        }
    }
}

/// Tracks outstanding requests by id and settles them from responses.
pub struct Correlator {
    pending: Arc<DashMap<String, PendingCall>>,
    timeout: Option<Duration>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Correlator {
    /// `timeout` bounds how long a call may stay pending. `None` waits
    /// until a response arrives or the transport closes.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Register `request` under a fresh id, hand it to `transport`, and
    /// return a future for its response.
    ///
    /// Registration and the hand-off happen before this returns, so two
    /// calls made in sequence reach the wire in that sequence. Error
    /// responses resolve to [`Error::Remote`].
    pub fn send(
        &self,
        mut request: JsonrpcRequest,
        transport: &dyn Transport,
    ) -> BoxFuture<'static, Result<JsonrpcResponseSuccess, Error>> {
        let mut id = Uuid::new_v4().to_string();
        while self.pending.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }
        request.id.clone_from(&id);

        let text = match request.to_text() {
            Ok(text) => text,
            Err(e) => return future::ready(Err(e)).boxed(),
        };

        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            id.clone(),
            PendingCall {
                tx,
                method: request.method.clone(),
                created_at: Instant::now(),
            },
        );

        if let Err(e) = transport.send(text) {
            self.pending.remove(&id);
            debug!(id = %id, method = %request.method, error = %e, "Transport refused request");
            return future::ready(Err(e)).boxed();
        }

        let guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            id,
        };
        let timeout = self.timeout;
        let method = request.method;

        async move {
            let settled = match timeout {
                Some(limit) => {
                    if let Ok(settled) = tokio::time::timeout(limit, rx).await {
                        settled
                    } else {
                        warn!(id = %guard.id, method = %method, "Request timed out");
                        return Err(Error::Timeout {
                            method,
                            timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                        });
                    }
                }
                None => rx.await,
            };
            drop(guard);
            // Sender dropped without settling: the table was torn down.
            settled.unwrap_or(Err(Error::ConnectionLost))
        }
        .boxed()
    }

    /// Settle the pending call matching `response`.
    ///
    /// Unknown ids are reported as [`Error::UnmatchedResponse`] and
    /// otherwise ignored. A caller that stopped waiting is not an error.
    pub fn on_response_received(&self, response: JsonrpcResponse) -> Result<(), Error> {
        let Some((id, call)) = self.pending.remove(response.id()) else {
            let id = response.id().to_owned();
            warn!(id = %id, "Response does not match any pending request, discarding");
            return Err(Error::UnmatchedResponse { id });
        };

        debug!(
            id = %id,
            method = %call.method,
            elapsed_ms = u64::try_from(call.created_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Response settled"
        );

        if call.tx.send(response.into_result()).is_err() {
            debug!(id = %id, "Caller no longer waiting for response");
        }
        Ok(())
    }

    /// Reject every pending call with [`Error::ConnectionLost`].
    pub fn on_transport_closed(&self) {
        let ids: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        if !ids.is_empty() {
            debug!(count = ids.len(), "Rejecting pending requests, transport closed");
        }
        for id in ids {
            if let Some((_, call)) = self.pending.remove(&id) {
                let _ = call.tx.send(Err(Error::ConnectionLost));
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Ids of calls still waiting, oldest first.
    pub fn pending_ids(&self) -> Vec<String> {
        let mut calls: Vec<(Instant, String)> = self
            .pending
            .iter()
            .map(|e| (e.value().created_at, e.key().clone()))
            .collect();
        calls.sort();
        calls.into_iter().map(|(_, id)| id).collect()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }
}

// ── Tests ────────────────────────────────────────────────────────────
