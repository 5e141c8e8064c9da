//! Synthetic traffic driver.
//!
//! Sends batches of messages from a rotating set of users through a
//! [`LimiterBackend`], pausing a random amount between messages, and reports
//! every admission decision together with the back-off the limiter suggests.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::error::Result;
use crate::ratelimit::{LimiterBackend, ManualClock};

/// Strategy for waiting between synthetic messages.
#[async_trait]
pub trait Pacer: Send + Sync {
    /// Wait for `duration`.
    async fn pause(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Advances a [`ManualClock`] instead of sleeping.
///
/// Pair it with a limiter reading the same clock to replay a simulation in
/// virtual time.
#[derive(Debug, Clone)]
pub struct VirtualPacer {
    clock: ManualClock,
}

impl VirtualPacer {
    /// Create a pacer driving `clock`.
    pub fn new(clock: ManualClock) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl Pacer for VirtualPacer {
    async fn pause(&self, duration: Duration) {
        self.clock.advance(duration);
    }
}

/// Outcome of a single synthetic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationEvent {
    /// 1-based message number, continuing across batches
    pub message_id: u32,
    /// User the message was sent as
    pub user_id: u32,
    /// Whether the limiter admitted the message
    pub admitted: bool,
    /// Wait the limiter reported right after the decision
    pub wait: Duration,
}

impl fmt::Display for SimulationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message {:2} | User {} | ", self.message_id, self.user_id)?;
        if self.admitted {
            write!(f, "admitted")
        } else {
            write!(f, "rejected (wait {:.1}s)", self.wait.as_secs_f64())
        }
    }
}

/// Result of a full simulation run.
#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    /// Every message outcome, in send order
    pub events: Vec<SimulationEvent>,
}

impl SimulationReport {
    /// Number of admitted messages.
    pub fn admitted(&self) -> usize {
        self.events.iter().filter(|e| e.admitted).count()
    }

    /// Number of rejected messages.
    pub fn rejected(&self) -> usize {
        self.events.len() - self.admitted()
    }
}

/// Drives synthetic traffic through a limiter.
pub struct TrafficSimulation<L, P> {
    limiter: L,
    pacer: P,
    config: SimulationConfig,
    rng: StdRng,
}

impl<L: LimiterBackend, P: Pacer> TrafficSimulation<L, P> {
    /// Create a simulation with an entropy-seeded pause generator.
    pub fn new(limiter: L, pacer: P, config: SimulationConfig) -> Result<Self> {
        Self::with_rng(limiter, pacer, config, StdRng::from_entropy())
    }

    /// Create a simulation with a fixed seed, for reproducible pauses.
    pub fn with_seed(limiter: L, pacer: P, config: SimulationConfig, seed: u64) -> Result<Self> {
        Self::with_rng(limiter, pacer, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(limiter: L, pacer: P, config: SimulationConfig, rng: StdRng) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            limiter,
            pacer,
            config,
            rng,
        })
    }

    /// The user a given message is attributed to.
    pub fn user_for(&self, message_id: u32) -> u32 {
        message_id % self.config.users + 1
    }

    /// Send one message and record the decision.
    pub fn send(&self, message_id: u32) -> SimulationEvent {
        let user_id = self.user_for(message_id);
        let key = user_id.to_string();

        let admitted = self.limiter.try_admit(&key);
        let wait = self.limiter.time_until_next_admission(&key);

        SimulationEvent {
            message_id,
            user_id,
            admitted,
            wait,
        }
    }

    /// Run every configured batch and collect the outcomes.
    pub async fn run(&mut self) -> SimulationReport {
        let mut report = SimulationReport::default();
        let mut message_id = 0;

        for batch in 0..self.config.batches {
            if batch > 0 {
                let pause = Duration::from_millis(self.config.batch_pause_ms);
                info!(pause = ?pause, "Waiting before next batch");
                self.pacer.pause(pause).await;
            }

            info!(batch = batch + 1, messages = self.config.messages, "Starting batch");

            for _ in 0..self.config.messages {
                message_id += 1;
                let event = self.send(message_id);
                info!("{}", event);
                report.events.push(event);

                let pause = self.next_pause();
                debug!(pause = ?pause, "Pausing between messages");
                self.pacer.pause(pause).await;
            }
        }

        info!(
            admitted = report.admitted(),
            rejected = report.rejected(),
            "Simulation finished"
        );
        report
    }

    fn next_pause(&mut self) -> Duration {
        let ms = self
            .rng
            .gen_range(self.config.min_pause_ms..=self.config.max_pause_ms);
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::SlidingWindowLimiter;
    use std::sync::Arc;

    fn fixed_pause_config() -> SimulationConfig {
        SimulationConfig {
            min_pause_ms: 1000,
            max_pause_ms: 1000,
            ..SimulationConfig::default()
        }
    }

    fn virtual_limiter(
        window_secs: u64,
        max_requests: u64,
    ) -> (Arc<SlidingWindowLimiter<ManualClock>>, ManualClock) {
        let clock = ManualClock::new();
        let limiter = Arc::new(SlidingWindowLimiter::with_clock(
            Duration::from_secs(window_secs),
            max_requests,
            clock.clone(),
        ));
        (limiter, clock)
    }

    #[test]
    fn test_user_rotation() {
        let (limiter, clock) = virtual_limiter(10, 1);
        let sim = TrafficSimulation::with_seed(
            limiter,
            VirtualPacer::new(clock),
            SimulationConfig::default(),
            7,
        )
        .unwrap();

        let users: Vec<u32> = (1..=6).map(|id| sim.user_for(id)).collect();
        assert_eq!(users, vec![2, 3, 4, 5, 1, 2]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let (limiter, clock) = virtual_limiter(10, 1);
        let config = SimulationConfig {
            users: 0,
            ..SimulationConfig::default()
        };
        assert!(TrafficSimulation::new(limiter, VirtualPacer::new(clock), config).is_err());
    }

    #[test]
    fn test_event_display() {
        let admitted = SimulationEvent {
            message_id: 3,
            user_id: 4,
            admitted: true,
            wait: Duration::from_secs(10),
        };
        assert_eq!(admitted.to_string(), "Message  3 | User 4 | admitted");

        let rejected = SimulationEvent {
            message_id: 12,
            user_id: 3,
            admitted: false,
            wait: Duration::from_millis(7420),
        };
        assert_eq!(rejected.to_string(), "Message 12 | User 3 | rejected (wait 7.4s)");
    }

    #[tokio::test]
    async fn test_two_batch_run_in_virtual_time() {
        let (limiter, clock) = virtual_limiter(10, 1);
        let mut sim = TrafficSimulation::with_seed(
            Arc::clone(&limiter),
            VirtualPacer::new(clock),
            fixed_pause_config(),
            42,
        )
        .unwrap();

        let report = sim.run().await;

        assert_eq!(report.events.len(), 20);
        assert_eq!(report.admitted(), 10);
        assert_eq!(report.rejected(), 10);

        // Each batch: the first five messages reach fresh users, the next five
        // revisit them five seconds later.
        for batch in report.events.chunks(10) {
            assert!(batch[..5].iter().all(|e| e.admitted));
            for event in &batch[5..] {
                assert!(!event.admitted);
                assert_eq!(event.wait, Duration::from_secs(5));
            }
        }
    }

    #[tokio::test]
    async fn test_generous_limit_admits_everything() {
        let (limiter, clock) = virtual_limiter(10, 100);
        let mut sim = TrafficSimulation::with_seed(
            limiter,
            VirtualPacer::new(clock),
            SimulationConfig::default(),
            1,
        )
        .unwrap();

        let report = sim.run().await;
        assert_eq!(report.rejected(), 0);
        assert!(report.events.iter().all(|e| e.wait == Duration::ZERO));
    }

    #[tokio::test]
    async fn test_tokio_pacer_sleeps() {
        let start = tokio::time::Instant::now();
        TokioPacer.pause(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
