//! Target-selection distribution
//!
//! Triggers many rounds from one source node and checks how evenly the
//! chosen targets spread over its peers.

use std::time::Duration;

use super::{ClusterProbe, ObserverError};

pub const DEFAULT_ROUNDS: usize = 100;
pub const DEFAULT_ROUND_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct RandomnessConfig {
    pub rounds: usize,
    pub round_delay: Duration,
    pub source: usize,
}

impl Default for RandomnessConfig {
    fn default() -> Self {
        Self {
            rounds: DEFAULT_ROUNDS,
            round_delay: DEFAULT_ROUND_DELAY,
            source: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomnessRating {
    Good,
    Acceptable,
    Poor,
}

#[derive(Debug, Clone)]
pub struct DistributionReport {
    pub rounds: usize,
    /// `(node index, times selected)` for every peer of the source, by index
    pub counts: Vec<(usize, usize)>,
    pub failures: usize,
}

impl DistributionReport {
    /// Build a report from per-node hit counts, covering every node but `source`.
    pub fn new(
        rounds: usize,
        node_count: usize,
        source: usize,
        hits: &[usize],
        failures: usize,
    ) -> Self {
        let counts = (0..node_count)
            .filter(|&i| i != source)
            .map(|i| (i, hits.get(i).copied().unwrap_or(0)))
            .collect();
        Self {
            rounds,
            counts,
            failures,
        }
    }

    pub fn peer_count(&self) -> usize {
        self.counts.len()
    }

    /// Expected selections per peer, rounded down.
    pub fn expected(&self) -> usize {
        if self.counts.is_empty() {
            0
        } else {
            self.rounds / self.counts.len()
        }
    }

    pub fn total_received(&self) -> usize {
        self.counts.iter().map(|&(_, c)| c).sum()
    }

    pub fn min(&self) -> usize {
        self.counts.iter().map(|&(_, c)| c).min().unwrap_or(0)
    }

    pub fn max(&self) -> usize {
        self.counts.iter().map(|&(_, c)| c).max().unwrap_or(0)
    }

    pub fn range(&self) -> usize {
        self.max() - self.min()
    }

    /// Whether a single peer's count strays more than a third from expected.
    pub fn is_deviant(&self, count: usize) -> bool {
        let expected = self.expected();
        expected > 0 && count.abs_diff(expected) > expected / 3
    }

    /// Pearson chi-square statistic against a uniform spread of the
    /// successfully delivered rounds.
    pub fn chi_square(&self) -> f64 {
        let total = self.total_received();
        if total == 0 || self.counts.is_empty() {
            return 0.0;
        }
        let expected = total as f64 / self.counts.len() as f64;
        self.counts
            .iter()
            .map(|&(_, c)| {
                let diff = c as f64 - expected;
                diff * diff / expected
            })
            .sum()
    }

    /// Range check: the spread between the most and least selected peer
    /// against half the expected count.
    pub fn rating(&self) -> RandomnessRating {
        let acceptable = (self.expected() / 2).max(1);
        let range = self.range();
        if range <= acceptable {
            RandomnessRating::Good
        } else if range <= acceptable * 2 {
            RandomnessRating::Acceptable
        } else {
            RandomnessRating::Poor
        }
    }
}

/// Trigger `config.rounds` pushes from `config.source` and tally targets.
/// `on_round` receives the round number and whether it succeeded.
pub async fn observe_randomness<P, F>(
    probe: &P,
    node_count: usize,
    config: &RandomnessConfig,
    mut on_round: F,
) -> Result<DistributionReport, ObserverError>
where
    P: ClusterProbe + ?Sized,
    F: FnMut(usize, bool),
{
    if node_count < 2 {
        return Err(ObserverError::TooFewNodes {
            required: 2,
            actual: node_count,
        });
    }
    if config.source >= node_count {
        return Err(ObserverError::UnknownNode(config.source));
    }
    // Fail fast if the source itself is down.
    probe.value_of(config.source).await?;

    let mut hits = vec![0usize; node_count];
    let mut failures = 0;

    for round in 1..=config.rounds {
        let ok = match probe.trigger(config.source).await {
            Ok(Some(target)) if target != config.source => {
                hits[target] += 1;
                true
            }
            _ => {
                failures += 1;
                false
            }
        };
        on_round(round, ok);

        if !config.round_delay.is_zero() {
            tokio::time::sleep(config.round_delay).await;
        }
    }

    Ok(DistributionReport::new(
        config.rounds,
        node_count,
        config.source,
        &hits,
        failures,
    ))
}
