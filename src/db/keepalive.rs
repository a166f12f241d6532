//! Connection keep-alive background task.
//!
//! Idle pooled connections are dropped by firewalls and proxies sitting between
//! the service and the database. The keeper issues a trivial statement on a
//! fixed interval so at least one connection stays warm.
//!
//! Failures never stop the loop. After `failure_threshold` consecutive failures
//! a circuit breaker opens and pings are skipped for `cooldown`; the next tick
//! after the cool-down runs a single half-open probe, which either closes the
//! breaker or re-opens it for another cool-down.

use crate::db::executor::QueryExecutor;
use crate::db::pool::DatabaseAccessor;
use crate::error::AgentResult;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, timeout};

/// Something the keeper can ping.
#[async_trait]
pub trait HealthProbe: Send + Sync + 'static {
    async fn ping(&self) -> AgentResult<()>;
}

/// Pings the shared pool through the accessor.
pub struct DatabaseProbe {
    accessor: Arc<DatabaseAccessor>,
    executor: QueryExecutor,
}

impl DatabaseProbe {
    pub fn new(accessor: Arc<DatabaseAccessor>, executor: QueryExecutor) -> Self {
        Self { accessor, executor }
    }
}

#[async_trait]
impl HealthProbe for DatabaseProbe {
    async fn ping(&self) -> AgentResult<()> {
        let pool = self.accessor.get_instance().await?;
        self.executor.ping(&pool).await
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct KeeperConfig {
    pub interval: Duration,
    /// Upper bound for a single ping, pool acquisition included.
    pub ping_timeout: Duration,
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(crate::config::DEFAULT_KEEPALIVE_INTERVAL_SECS),
            ping_timeout: Duration::from_secs(crate::config::DEFAULT_QUERY_TIMEOUT_SECS),
            failure_threshold: crate::config::DEFAULT_KEEPALIVE_FAILURE_THRESHOLD,
            cooldown: Duration::from_secs(crate::config::DEFAULT_KEEPALIVE_COOLDOWN_SECS),
        }
    }
}

impl KeeperConfig {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            interval: config.keepalive_interval_duration(),
            ping_timeout: config.query_timeout_duration(),
            failure_threshold: config.keepalive_failure_threshold,
            cooldown: config.keepalive_cooldown_duration(),
        }
    }
}

// ============================================================================
// CIRCUIT BREAKER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open { until: Instant },
    HalfOpen,
}

impl BreakerState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open { .. } => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: BreakerState,
    consecutive_failures: u32,
    failure_threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            failure_threshold: failure_threshold.max(1),
            cooldown,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether a ping may run at `now`. Moves an expired open breaker to half-open.
    pub fn allow(&mut self, now: Instant) -> bool {
        match self.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open { until } if now >= until => {
                self.state = BreakerState::HalfOpen;
                true
            }
            BreakerState::Open { .. } => false,
        }
    }

    pub fn record_success(&mut self) {
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
    }

    /// Returns true when this failure opened the breaker.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let should_open = matches!(self.state, BreakerState::HalfOpen)
            || self.consecutive_failures >= self.failure_threshold;
        if should_open {
            self.state = BreakerState::Open {
                until: now + self.cooldown,
            };
        }
        should_open
    }
}

// ============================================================================
// METRICS
// ============================================================================

#[derive(Debug, Default)]
struct KeeperMetrics {
    pings: AtomicU64,
    failures: AtomicU64,
    skipped: AtomicU64,
}

#[derive(Debug)]
struct KeeperShared {
    breaker: Mutex<CircuitBreaker>,
    metrics: KeeperMetrics,
    last_success: Mutex<Option<chrono::DateTime<chrono::Utc>>>,
    last_error: Mutex<Option<String>>,
}

/// Point-in-time view of the keeper, served by `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct KeeperStatus {
    pub running: bool,
    pub breaker: &'static str,
    pub consecutive_failures: u32,
    pub total_pings: u64,
    pub total_failures: u64,
    pub skipped_pings: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_success: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl KeeperStatus {
    pub fn is_healthy(&self) -> bool {
        self.breaker == "closed"
    }
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Handle to the running keep-alive task.
pub struct ConnectionKeeper {
    shared: Arc<KeeperShared>,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionKeeper {
    /// Spawn the keep-alive loop. The first ping runs one interval after start.
    pub fn start<P: HealthProbe>(probe: P, config: KeeperConfig) -> Self {
        let shared = Arc::new(KeeperShared {
            breaker: Mutex::new(CircuitBreaker::new(
                config.failure_threshold,
                config.cooldown,
            )),
            metrics: KeeperMetrics::default(),
            last_success: Mutex::new(None),
            last_error: Mutex::new(None),
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(keepalive_task(
            probe,
            config,
            Arc::clone(&shared),
            shutdown_rx,
        ));

        Self {
            shared,
            shutdown_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Signal the loop to stop and wait for it. Safe to call more than once.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Keep-alive task ended abnormally");
            }
        }
    }

    pub async fn status(&self) -> KeeperStatus {
        let (breaker, consecutive_failures) = {
            let breaker = self.shared.breaker.lock().await;
            (breaker.state().label(), breaker.consecutive_failures())
        };
        let running = self
            .handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_finished());
        let metrics = &self.shared.metrics;

        KeeperStatus {
            running,
            breaker,
            consecutive_failures,
            total_pings: metrics.pings.load(Ordering::Relaxed),
            total_failures: metrics.failures.load(Ordering::Relaxed),
            skipped_pings: metrics.skipped.load(Ordering::Relaxed),
            last_success: *self.shared.last_success.lock().await,
            last_error: self.shared.last_error.lock().await.clone(),
        }
    }
}

async fn keepalive_task<P: HealthProbe>(
    probe: P,
    config: KeeperConfig,
    shared: Arc<KeeperShared>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        failure_threshold = config.failure_threshold,
        cooldown_secs = config.cooldown.as_secs(),
        "Keep-alive task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                ping_once(&probe, &config, &shared).await;
            }
        }
    }

    tracing::info!(
        pings = shared.metrics.pings.load(Ordering::Relaxed),
        failures = shared.metrics.failures.load(Ordering::Relaxed),
        "Keep-alive task stopped"
    );
}

async fn ping_once<P: HealthProbe>(probe: &P, config: &KeeperConfig, shared: &KeeperShared) {
    let now = Instant::now();
    let (allowed, half_open) = {
        let mut breaker = shared.breaker.lock().await;
        let allowed = breaker.allow(now);
        (allowed, breaker.state() == BreakerState::HalfOpen)
    };

    if !allowed {
        shared.metrics.skipped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Keep-alive skipped, circuit breaker open");
        return;
    }

    shared.metrics.pings.fetch_add(1, Ordering::Relaxed);
    let outcome = match timeout(config.ping_timeout, probe.ping()).await {
        Ok(result) => result.map_err(|e| e.to_string()),
        Err(_) => Err(format!(
            "Ping timed out after {}s",
            config.ping_timeout.as_secs()
        )),
    };

    match outcome {
        Ok(()) => {
            shared.breaker.lock().await.record_success();
            *shared.last_success.lock().await = Some(chrono::Utc::now());
            if half_open {
                tracing::info!("Database reachable again, circuit breaker closed");
            } else {
                tracing::debug!("Database connection kept alive");
            }
        }
        Err(message) => {
            shared.metrics.failures.fetch_add(1, Ordering::Relaxed);
            let (opened, failures) = {
                let mut breaker = shared.breaker.lock().await;
                let opened = breaker.record_failure(Instant::now());
                (opened, breaker.consecutive_failures())
            };
            if opened {
                tracing::error!(
                    error = %message,
                    consecutive_failures = failures,
                    cooldown_secs = config.cooldown.as_secs(),
                    "Keep-alive failing, circuit breaker opened"
                );
            } else {
                tracing::warn!(
                    error = %message,
                    consecutive_failures = failures,
                    "Keep-alive ping failed"
                );
            }
            *shared.last_error.lock().await = Some(message);
        }
    }
}
