#![deny(warnings)]

//! Game session runtime.
//!
//! A [`GameSession`] is the explicit context a front end holds for one
//! player: it owns the network model, the cumulative state and the feed,
//! and wires the simulator, score engine and optional relay together.
//! Only one send may be in flight at a time.

use gauntlet_core::{
    DashboardStats, GameConfig, GameState, NetworkCondition, NetworkConditionModel, Outcome,
    RandomSource, RelayVerdict, SeededRandom, StrategyCatalog, TransactionHistory,
    ValidationError,
};
use gauntlet_sim::{OutcomeSimulator, ScoreEngine, SimError};
use persistence::{PersistError, SaveStore, SavedSession};
use relay::Relay;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

/// Errors surfaced to the front end.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A send is already in flight.
    #[error("a transaction is already being sent")]
    Busy,
    #[error(transparent)]
    Sim(#[from] SimError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// What one send produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendReport {
    pub outcome: Outcome,
    pub delta: Decimal,
    pub state: GameState,
    pub leveled_up: bool,
}

struct SessionInner {
    model: NetworkConditionModel,
    state: GameState,
    history: TransactionHistory,
    rng: Box<dyn RandomSource + Send>,
}

/// Clears the in-flight flag when the send finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One player's game.
pub struct GameSession {
    config: GameConfig,
    simulator: OutcomeSimulator,
    engine: ScoreEngine,
    relay: Option<Arc<dyn Relay>>,
    inner: Mutex<SessionInner>,
    in_flight: AtomicBool,
}

impl GameSession {
    /// Fresh session seeded from `config.rng_seed`.
    pub fn new(config: GameConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let inner = SessionInner {
            model: NetworkConditionModel::new(),
            state: GameState::new(),
            history: TransactionHistory::with_capacity(config.history_capacity),
            rng: Box::new(SeededRandom::new(config.rng_seed)),
        };
        Ok(Self {
            simulator: OutcomeSimulator::new(StrategyCatalog::standard()),
            engine: ScoreEngine::new(config.scoring.clone()),
            relay: None,
            inner: Mutex::new(inner),
            in_flight: AtomicBool::new(false),
            config,
        })
    }

    pub fn with_relay(mut self, relay: Arc<dyn Relay>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn with_rng(self, rng: Box<dyn RandomSource + Send>) -> Self {
        self.lock().rng = rng;
        self
    }

    /// Continue from saved progress.
    pub fn with_saved(self, saved: SavedSession) -> Self {
        {
            let mut inner = self.lock();
            inner.state = saved.state;
            inner.history = TransactionHistory::from_entries(
                self.config.history_capacity,
                saved.history.iter().cloned().collect(),
            );
        }
        self
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn catalog(&self) -> &StrategyCatalog {
        self.simulator.catalog()
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn current_condition(&self) -> NetworkCondition {
        self.lock().model.current()
    }

    /// Re-roll the network condition.
    pub fn tick(&self) -> NetworkCondition {
        let mut inner = self.lock();
        let SessionInner { model, rng, .. } = &mut *inner;
        model.tick(rng.as_mut())
    }

    pub fn state(&self) -> GameState {
        self.lock().state.clone()
    }

    pub fn history(&self) -> TransactionHistory {
        self.lock().history.clone()
    }

    pub fn dashboard(&self) -> DashboardStats {
        DashboardStats::from_state(&self.lock().state)
    }

    /// Back to a fresh state and an empty feed.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = GameState::new();
        inner.history.clear();
        info!("session reset");
    }

    /// Send with the given strategy under the current condition.
    ///
    /// Rejected with [`SessionError::Busy`] while another send is
    /// outstanding. Unknown strategies are rejected before anything changes.
    pub async fn send(&self, strategy_id: &str) -> Result<SendReport, SessionError> {
        let strategy = self
            .simulator
            .catalog()
            .lookup(strategy_id)
            .map_err(SimError::from)?;
        let _guard = InFlight::acquire(&self.in_flight).ok_or(SessionError::Busy)?;

        let condition = self.current_condition();
        let verdict = self.try_relay(&strategy.relay_options).await;

        let mut inner = self.lock();
        let SessionInner {
            state,
            history,
            rng,
            ..
        } = &mut *inner;
        let outcome = self
            .simulator
            .simulate(strategy_id, &condition, verdict.as_ref(), rng.as_mut())?;
        let prior_level = state.level();
        let update = self.engine.apply_outcome(&outcome, state)?;
        *state = update.state.clone();
        history.push(outcome.clone());

        let leveled_up = update.state.level() > prior_level;
        if leveled_up {
            info!(level = update.state.level(), "level up");
        }
        Ok(SendReport {
            outcome,
            delta: update.delta,
            state: update.state,
            leveled_up,
        })
    }

    async fn try_relay(&self, options: &gauntlet_core::RelayOptions) -> Option<RelayVerdict> {
        if !self.config.use_real_relay {
            return None;
        }
        let relay = self.relay.as_ref()?;
        let limit = Duration::from_millis(self.config.relay_timeout_ms);
        match tokio::time::timeout(limit, relay.attempt_send(options)).await {
            Ok(Ok(verdict)) => Some(verdict),
            Ok(Err(e)) => {
                warn!(error = %e, "simulating send instead");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.config.relay_timeout_ms,
                    "relay timed out, simulating send instead"
                );
                None
            }
        }
    }

    pub async fn save(&self, store: &SaveStore) -> Result<(), SessionError> {
        let (state, history) = {
            let inner = self.lock();
            (inner.state.clone(), inner.history.clone())
        };
        store.save_session(&state, &history).await?;
        Ok(())
    }

    pub async fn load(self, store: &SaveStore) -> Result<Self, SessionError> {
        let saved = store.load_session(self.config.history_capacity).await?;
        Ok(self.with_saved(saved))
    }

    /// Tick every `tick_interval_secs` until `shutdown` becomes true or its
    /// sender is dropped. The first change happens one interval after start.
    pub async fn run_ticker(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.tick_interval_secs));
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gauntlet_core::{CongestionTier, FixedRandom, RelayOptions};
    use relay::RelayUnavailable;
    use tokio::sync::Notify;

    struct Scripted(Result<RelayVerdict, RelayUnavailable>);

    #[async_trait]
    impl Relay for Scripted {
        async fn attempt_send(&self, _: &RelayOptions) -> Result<RelayVerdict, RelayUnavailable> {
            self.0.clone()
        }
    }

    struct Stalled;

    #[async_trait]
    impl Relay for Stalled {
        async fn attempt_send(&self, _: &RelayOptions) -> Result<RelayVerdict, RelayUnavailable> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(RelayVerdict::landed("too late"))
        }
    }

    struct Gated {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Relay for Gated {
        async fn attempt_send(&self, _: &RelayOptions) -> Result<RelayVerdict, RelayUnavailable> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(RelayVerdict::landed("gated"))
        }
    }

    fn relay_config() -> GameConfig {
        GameConfig {
            use_real_relay: true,
            relay_timeout_ms: 50,
            ..GameConfig::default()
        }
    }

    fn fixed(session: GameSession, v: f64) -> GameSession {
        session.with_rng(Box::new(FixedRandom(v)))
    }

    #[tokio::test]
    async fn send_updates_state_and_feed() {
        let s = fixed(GameSession::new(GameConfig::default()).unwrap(), 0.5);
        let r = s.send("safe").await.unwrap();
        assert!(r.outcome.success);
        assert_eq!(r.delta, Decimal::from(70));
        assert_eq!(s.state().attempts, 1);
        assert_eq!(s.history().latest(), Some(&r.outcome));
        assert_eq!(s.dashboard().success_rate_pct, Decimal::ONE_HUNDRED);
        assert!(!s.is_sending());
    }

    #[tokio::test]
    async fn unknown_strategy_changes_nothing() {
        let s = GameSession::new(GameConfig::default()).unwrap();
        let err = s.send("moon").await.unwrap_err();
        assert!(matches!(err, SessionError::Sim(SimError::UnknownStrategy(_))));
        assert_eq!(s.state(), GameState::new());
        assert!(s.history().is_empty());
        assert!(!s.is_sending());
    }

    #[tokio::test]
    async fn relay_rejection_is_authoritative() {
        let s = fixed(GameSession::new(relay_config()).unwrap(), 0.0)
            .with_relay(Arc::new(Scripted(Ok(RelayVerdict::rejected("dropped")))));
        let r = s.send("safe").await.unwrap();
        assert!(!r.outcome.success);
        assert!(r.outcome.used_real_relay);
        assert_eq!(r.outcome.error_message.as_deref(), Some("dropped"));
    }

    #[tokio::test]
    async fn relay_success_earns_bonus() {
        let s = fixed(GameSession::new(relay_config()).unwrap(), 0.5)
            .with_relay(Arc::new(Scripted(Ok(RelayVerdict::landed("realsig")))));
        let r = s.send("safe").await.unwrap();
        assert_eq!(r.outcome.signature.as_deref(), Some("realsig"));
        assert_eq!(r.delta, Decimal::from(80));
    }

    #[tokio::test]
    async fn unavailable_relay_falls_back_to_simulation() {
        let s = fixed(GameSession::new(relay_config()).unwrap(), 0.5)
            .with_relay(Arc::new(Scripted(Err(RelayUnavailable("down".into())))));
        let r = s.send("safe").await.unwrap();
        assert!(r.outcome.success);
        assert!(!r.outcome.used_real_relay);
    }

    #[tokio::test]
    async fn stalled_relay_times_out() {
        let s = fixed(GameSession::new(relay_config()).unwrap(), 0.5).with_relay(Arc::new(Stalled));
        let r = s.send("balanced").await.unwrap();
        assert!(!r.outcome.used_real_relay);
        assert_eq!(s.state().attempts, 1);
    }

    #[tokio::test]
    async fn relay_disabled_in_config_is_not_called() {
        let s = fixed(GameSession::new(GameConfig::default()).unwrap(), 0.5)
            .with_relay(Arc::new(Scripted(Ok(RelayVerdict::rejected("should not be used")))));
        let r = s.send("safe").await.unwrap();
        assert!(r.outcome.success);
        assert!(!r.outcome.used_real_relay);
    }

    #[tokio::test]
    async fn second_send_is_rejected_while_first_in_flight() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let relay = Gated {
            entered: entered.clone(),
            release: release.clone(),
        };
        let config = GameConfig {
            relay_timeout_ms: 10_000,
            ..relay_config()
        };
        let s = Arc::new(fixed(GameSession::new(config).unwrap(), 0.5).with_relay(Arc::new(relay)));

        let first = {
            let s = s.clone();
            tokio::spawn(async move { s.send("fast").await })
        };
        entered.notified().await;
        assert!(s.is_sending());
        assert!(matches!(s.send("safe").await, Err(SessionError::Busy)));

        release.notify_one();
        let r = first.await.unwrap().unwrap();
        assert_eq!(r.outcome.signature.as_deref(), Some("gated"));
        assert!(!s.is_sending());
        assert_eq!(s.state().attempts, 1);
        assert_eq!(s.history().len(), 1);
    }

    #[tokio::test]
    async fn outcome_records_tier_at_send_time() {
        let s = fixed(GameSession::new(GameConfig::default()).unwrap(), 0.99);
        assert_eq!(s.tick().tier, CongestionTier::Extreme);
        let r = s.send("cheap").await.unwrap();
        assert_eq!(r.outcome.network_tier, CongestionTier::Extreme);
    }

    #[tokio::test]
    async fn reset_clears_progress() {
        let s = fixed(GameSession::new(GameConfig::default()).unwrap(), 0.5);
        s.send("safe").await.unwrap();
        s.reset();
        assert_eq!(s.state(), GameState::new());
        assert!(s.history().is_empty());
    }

    #[tokio::test]
    async fn feed_is_bounded_by_config() {
        let config = GameConfig {
            history_capacity: 20,
            ..GameConfig::default()
        };
        let s = GameSession::new(config).unwrap();
        for _ in 0..25 {
            s.send("balanced").await.unwrap();
        }
        assert_eq!(s.history().len(), 20);
        assert_eq!(s.state().attempts, 25);
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let store = SaveStore::open("sqlite::memory:").await.unwrap();
        let s = GameSession::new(GameConfig::default()).unwrap();
        for id in ["safe", "fast", "cheap"] {
            s.send(id).await.unwrap();
        }
        s.save(&store).await.unwrap();

        let restored = GameSession::new(GameConfig::default())
            .unwrap()
            .load(&store)
            .await
            .unwrap();
        assert_eq!(restored.state(), s.state());
        assert_eq!(restored.history(), s.history());
    }

    #[tokio::test]
    async fn crossing_a_thousand_levels_up() {
        let saved = SavedSession {
            state: GameState {
                score: Decimal::from(990),
                attempts: 14,
                successes: 14,
                total_cost: Decimal::new(14, 4),
            },
            history: TransactionHistory::default(),
        };
        let s = fixed(GameSession::new(GameConfig::default()).unwrap(), 0.5).with_saved(saved);
        let r = s.send("safe").await.unwrap();
        assert!(r.leveled_up);
        assert_eq!(r.state.level(), 2);
    }

    #[test]
    fn rejects_invalid_config() {
        let config = GameConfig {
            history_capacity: 500,
            ..GameConfig::default()
        };
        assert!(matches!(GameSession::new(config), Err(SessionError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_rerolls_every_interval_and_stops_on_shutdown() {
        let s = Arc::new(fixed(GameSession::new(GameConfig::default()).unwrap(), 0.99));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(s.clone().run_ticker(rx));

        // No re-roll at start-up.
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(s.current_condition().tier, CongestionTier::Low);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(s.current_condition().tier, CongestionTier::Extreme);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
