//! Push-gossip engine for a single node
//!
//! Each round picks one peer uniformly at random from the node's static peer
//! set and pushes the current value to it. Receipt is an unconditional
//! overwrite: whatever value arrives replaces the local one, with no
//! comparison of timestamps or versions. Failed deliveries are reported to
//! the caller and never retried here.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use parking_lot::Mutex;
use rand::{rngs::StdRng, seq::IndexedRandom, SeedableRng};
use tokio::{sync::watch, time::interval};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::{GossipError, GossipResult, TransportError},
    metrics::GossipMetrics,
    node::{NodeState, NodeStatus},
    transport::{GossipMessage, GossipTransport},
};

/// Upper bound on a single delivery attempt.
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(3);

pub struct GossipEngine {
    state: NodeState,
    transport: Arc<dyn GossipTransport>,
    rng: Mutex<StdRng>,
    push_timeout: Duration,
    metrics: GossipMetrics,
}

impl std::fmt::Debug for GossipEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GossipEngine")
            .field("state", &self.state)
            .field("transport", &"<dyn GossipTransport>")
            .field("push_timeout", &self.push_timeout)
            .finish()
    }
}

impl GossipEngine {
    pub fn new(state: NodeState, transport: Arc<dyn GossipTransport>) -> Self {
        Self {
            state,
            transport,
            rng: Mutex::new(StdRng::from_os_rng()),
            push_timeout: DEFAULT_PUSH_TIMEOUT,
            metrics: GossipMetrics::new(),
        }
    }

    /// Replace the peer-selection randomness with a seeded source.
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn with_push_timeout(self, push_timeout: Duration) -> Self {
        Self {
            push_timeout,
            ..self
        }
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn id(&self) -> &str {
        self.state.id()
    }

    pub fn metrics(&self) -> &GossipMetrics {
        &self.metrics
    }

    pub fn push_timeout(&self) -> Duration {
        self.push_timeout
    }

    pub fn get_value(&self) -> String {
        self.state.get_value()
    }

    /// Manual override used to seed a new value at this node.
    pub fn set_value(&self, value: &str) -> bool {
        let changed = self.state.set_value(value);
        if changed {
            self.metrics.record_value_update();
        }
        changed
    }

    pub fn status(&self) -> NodeStatus {
        self.state.snapshot_status()
    }

    /// Draw one peer uniformly at random.
    pub fn select_peer(&self) -> GossipResult<String> {
        let mut rng = self.rng.lock();
        self.state
            .peers()
            .choose(&mut *rng)
            .cloned()
            .ok_or(GossipError::NoPeerAvailable)
    }

    /// Run one push round. Returns the peer the value was delivered to.
    ///
    /// Local state is never touched here, whether delivery succeeds or not.
    #[instrument(skip(self), fields(node = %self.state.id()))]
    pub async fn push(&self) -> GossipResult<String> {
        let peer = match self.select_peer() {
            Ok(peer) => peer,
            Err(e) => {
                self.metrics.record_push_failure();
                return Err(e);
            }
        };

        let message = GossipMessage {
            from: self.state.id().to_string(),
            value: self.state.get_value(),
            timestamp: Utc::now().timestamp(),
        };

        let outcome =
            match tokio::time::timeout(self.push_timeout, self.transport.deliver(&peer, &message))
                .await
            {
                Ok(res) => res,
                Err(_) => Err(TransportError::Timeout(
                    u64::try_from(self.push_timeout.as_millis()).unwrap_or(u64::MAX),
                )),
            };

        match outcome {
            Ok(()) => {
                self.metrics.record_push_sent();
                info!(
                    "[{}] Sent gossip to {}: value='{}'",
                    self.state.id(),
                    peer,
                    message.value
                );
                Ok(peer)
            }
            Err(source) => {
                self.metrics.record_push_failure();
                warn!(
                    "[{}] Failed to send gossip to {}: {}",
                    self.state.id(),
                    peer,
                    source
                );
                Err(GossipError::DeliveryFailure { peer, source })
            }
        }
    }

    /// Apply an inbound message. Last received write wins.
    ///
    /// `message.timestamp` is ignored, so a stale value still overwrites a
    /// newer local one. Returns whether the local value changed.
    pub fn receive(&self, message: &GossipMessage) -> bool {
        self.metrics.record_received();
        info!(
            "[{}] Received gossip from {}: value='{}'",
            self.state.id(),
            message.from,
            message.value
        );
        self.set_value(&message.value)
    }

    /// Push on a fixed schedule until `shutdown_rx` changes.
    ///
    /// Each tick is an independent round over the full peer set; failures are
    /// logged and the next tick proceeds without backoff.
    pub async fn run_gossip_loop(
        self: Arc<Self>,
        period: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut ticker = interval(period);
        info!(
            "[{}] Starting background gossip with {:?} interval",
            self.state.id(),
            period
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.push().await {
                        debug!("[{}] Background round failed: {}", self.state.id(), e);
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("[{}] Background gossip received shutdown signal", self.state.id());
                    break;
                }
            }
        }

        info!("[{}] Background gossip stopped", self.state.id());
    }
}
