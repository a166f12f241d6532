//! Keep-alive task tests on paused Tokio time.

use async_trait::async_trait;
use nlq_server::db::{ConnectionKeeper, HealthProbe, KeeperConfig};
use nlq_server::error::{AgentError, AgentResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

/// Probe whose health is switched from the test.
#[derive(Clone, Default)]
struct SwitchProbe {
    healthy: Arc<AtomicBool>,
    calls: Arc<AtomicU32>,
}

impl SwitchProbe {
    fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for SwitchProbe {
    async fn ping(&self) -> AgentResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AgentError::connection("connection reset", "check the network"))
        }
    }
}

fn config() -> KeeperConfig {
    KeeperConfig {
        interval: Duration::from_secs(10),
        ping_timeout: Duration::from_secs(5),
        failure_threshold: 3,
        cooldown: Duration::from_secs(60),
    }
}

async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn test_pings_on_interval() {
    let probe = SwitchProbe::default();
    probe.set_healthy(true);
    let keeper = ConnectionKeeper::start(probe.clone(), config());

    advance(5).await;
    assert_eq!(probe.calls(), 0);

    advance(30).await;
    let status = keeper.status().await;
    assert_eq!(probe.calls(), 3);
    assert_eq!(status.total_pings, 3);
    assert_eq!(status.breaker, "closed");
    assert!(status.last_success.is_some());
    assert!(status.running);

    keeper.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_then_closes_after_probe() {
    let probe = SwitchProbe::default();
    let keeper = ConnectionKeeper::start(probe.clone(), config());

    // Failures at 10s, 20s, 30s open the breaker until 90s.
    advance(35).await;
    let status = keeper.status().await;
    assert_eq!(status.breaker, "open");
    assert_eq!(status.consecutive_failures, 3);
    assert_eq!(status.total_failures, 3);
    assert_eq!(status.last_error.as_deref(), Some("Connection failed: connection reset"));

    // Ticks at 40s..80s are skipped.
    advance(50).await;
    let status = keeper.status().await;
    assert_eq!(probe.calls(), 3);
    assert_eq!(status.skipped_pings, 5);

    // The half-open probe at 90s succeeds.
    probe.set_healthy(true);
    advance(10).await;
    let status = keeper.status().await;
    assert_eq!(probe.calls(), 4);
    assert_eq!(status.breaker, "closed");
    assert_eq!(status.consecutive_failures, 0);
    assert!(status.is_healthy());

    keeper.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_probe_reopens_breaker() {
    let probe = SwitchProbe::default();
    let keeper = ConnectionKeeper::start(probe.clone(), config());

    advance(95).await;
    let status = keeper.status().await;
    assert_eq!(probe.calls(), 4);
    assert_eq!(status.breaker, "open");
    assert_eq!(status.consecutive_failures, 4);

    // Open again until 150s.
    advance(50).await;
    assert_eq!(probe.calls(), 4);

    keeper.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_ends_task() {
    let probe = SwitchProbe::default();
    probe.set_healthy(true);
    let keeper = ConnectionKeeper::start(probe.clone(), config());

    advance(15).await;
    keeper.stop().await;
    assert!(!keeper.status().await.running);

    advance(60).await;
    assert_eq!(probe.calls(), 1);

    // A second stop is a no-op.
    keeper.stop().await;
}
