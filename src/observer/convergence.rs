//! Convergence observation
//!
//! Seeds a fresh value at node-0, then repeatedly triggers a push from a
//! random node already known to hold it until every node does.

use std::time::Duration;

use rand::{seq::IndexedRandom, Rng};
use tracing::debug;

use super::{ClusterProbe, ObserverError};

pub const DEFAULT_MAX_ROUNDS: usize = 100;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ConvergenceConfig {
    pub max_rounds: usize,
    /// Pause between a trigger and sampling the cluster
    pub settle_delay: Duration,
    /// Node the new value is seeded at
    pub source: usize,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            settle_delay: DEFAULT_SETTLE_DELAY,
            source: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceRating {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl ConvergenceRating {
    /// Rate a converged run by rounds used relative to cluster size.
    pub fn from_rounds(rounds: usize, node_count: usize) -> Self {
        if rounds <= node_count * 2 {
            Self::Excellent
        } else if rounds <= node_count * 3 {
            Self::Good
        } else if rounds <= node_count * 6 {
            Self::Acceptable
        } else {
            Self::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRecord {
    pub round: usize,
    pub sender: usize,
    pub target: Option<usize>,
    pub error: Option<String>,
    pub newly_updated: Vec<usize>,
    pub converged_count: usize,
}

/// Progress reported while a run is in flight.
#[derive(Debug, Clone, Copy)]
pub enum ConvergenceEvent<'a> {
    /// Holders right after seeding, before the first round
    Seeded(&'a [bool]),
    Round(&'a RoundRecord),
}

#[derive(Debug, Clone)]
pub struct ConvergenceReport {
    pub value: String,
    pub node_count: usize,
    pub converged: bool,
    pub rounds: usize,
    /// Which nodes held the value right after seeding
    pub initial: Vec<bool>,
    pub history: Vec<RoundRecord>,
}

impl ConvergenceReport {
    pub fn rounds_per_node(&self) -> f64 {
        self.rounds as f64 / self.node_count as f64
    }

    pub fn rating(&self) -> Option<ConvergenceRating> {
        self.converged
            .then(|| ConvergenceRating::from_rounds(self.rounds, self.node_count))
    }
}

/// Value seeded by a convergence run started at `unix_secs`.
pub fn converged_value(unix_secs: i64) -> String {
    format!("converged-{}", unix_secs)
}

async fn sample(probe: &(impl ClusterProbe + ?Sized), node_count: usize, value: &str) -> Vec<bool> {
    let mut holders = Vec::with_capacity(node_count);
    for node in 0..node_count {
        let holds = match probe.value_of(node).await {
            Ok(v) => v == value,
            Err(e) => {
                debug!("Failed to sample node-{}: {}", node, e);
                false
            }
        };
        holders.push(holds);
    }
    holders
}

/// Run a convergence observation. Seeding failure aborts the run; failures
/// of individual rounds are recorded and the run continues. `on_event` sees
/// the seeded state once, then every round in order.
pub async fn observe_convergence<P, R, F>(
    probe: &P,
    node_count: usize,
    value: &str,
    config: &ConvergenceConfig,
    rng: &mut R,
    mut on_event: F,
) -> Result<ConvergenceReport, ObserverError>
where
    P: ClusterProbe + ?Sized,
    R: Rng + ?Sized,
    F: FnMut(ConvergenceEvent<'_>),
{
    if config.source >= node_count {
        return Err(ObserverError::UnknownNode(config.source));
    }
    probe.set_value(config.source, value).await?;

    let initial = sample(probe, node_count, value).await;
    on_event(ConvergenceEvent::Seeded(&initial));
    let mut updated = initial.clone();
    let mut history = Vec::new();
    let mut converged = updated.iter().all(|&u| u);
    let mut rounds = 0;

    while !converged && rounds < config.max_rounds {
        rounds += 1;

        let holders: Vec<usize> = (0..node_count).filter(|&i| updated[i]).collect();
        let Some(&sender) = holders.choose(rng) else {
            // The seeded value vanished from every sampled node.
            return Err(ObserverError::Node {
                node: config.source,
                message: "seeded value not observed on any node".to_string(),
            });
        };

        let (target, error) = match probe.trigger(sender).await {
            Ok(target) => (target, None),
            Err(e) => (None, Some(e.to_string())),
        };

        if !config.settle_delay.is_zero() {
            tokio::time::sleep(config.settle_delay).await;
        }

        let now = sample(probe, node_count, value).await;
        let mut newly_updated = Vec::new();
        for (i, &holds) in now.iter().enumerate() {
            if holds && !updated[i] {
                newly_updated.push(i);
                updated[i] = true;
            }
        }
        let converged_count = now.iter().filter(|&&h| h).count();
        converged = converged_count == node_count;

        let record = RoundRecord {
            round: rounds,
            sender,
            target,
            error,
            newly_updated,
            converged_count,
        };
        on_event(ConvergenceEvent::Round(&record));
        history.push(record);
    }

    Ok(ConvergenceReport {
        value: value.to_string(),
        node_count,
        converged,
        rounds,
        initial,
        history,
    })
}
