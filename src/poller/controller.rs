//! Generic polling controller.
//!
//! Owns the fetch/refresh/stop lifecycle for one resource:
//! - one fetch on `start()` (unless `run_immediately` is off)
//! - one fetch per interval tick, per `refresh()`, and per params change
//! - every request takes a token; only the latest token may publish
//! - after `stop()` nothing publishes, even if a request resolves later
//!
//! There is no hard cancellation of in-flight requests. A superseded
//! request still runs to completion but its result is dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::fetch_state::FetchState;
use crate::api::source::{CredentialSource, DataSource};
use crate::error::{extract_error_info, FetchError};
use crate::widgets::Normalizer;

#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Human-readable resource name, used in logs and the fallback message.
    pub resource: String,
    /// Auto-refresh period. `None` fetches only on start, refresh and
    /// params change.
    pub interval: Option<Duration>,
    pub run_immediately: bool,
}

impl PollOptions {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            interval: None,
            run_immediately: true,
        }
    }

    pub fn with_interval(mut self, interval: Option<Duration>) -> Self {
        self.interval = interval.filter(|period| !period.is_zero());
        self
    }

    pub fn with_run_immediately(mut self, run_immediately: bool) -> Self {
        self.run_immediately = run_immediately;
        self
    }

    /// Message shown when the failure carries nothing user-safe.
    pub fn fallback_message(&self) -> String {
        format!("Failed to load {}", self.resource)
    }
}

struct Cycle<P> {
    params: P,
    /// Last request token issued. Bumped on every request, params change
    /// and stop so older responses can no longer match.
    latest: u64,
    active: bool,
}

struct Ticket<P> {
    token: u64,
    params: P,
}

struct Shared<P, N: Normalizer> {
    source: Arc<dyn DataSource<P>>,
    normalizer: N,
    credentials: Arc<dyn CredentialSource>,
    options: PollOptions,
    cycle: Mutex<Cycle<P>>,
    state: watch::Sender<FetchState<N::Model>>,
}

impl<P, N: Normalizer> Shared<P, N> {
    fn is_active(&self) -> bool {
        self.cycle.lock().active
    }

    /// Returns whether the controller was active.
    fn deactivate(&self) -> bool {
        let mut cycle = self.cycle.lock();
        let was_active = cycle.active;
        cycle.active = false;
        cycle.latest += 1;
        was_active
    }

    /// Publish the outcome of request `token` if it is still the latest.
    ///
    /// The check and the publish happen under the cycle lock, so a newer
    /// request cannot start in between.
    fn finish(&self, token: u64, outcome: Result<N::Model, FetchError>) {
        let cycle = self.cycle.lock();
        if !cycle.active || cycle.latest != token {
            log::debug!(
                "{}: discarding response for request {} (latest {}, active {})",
                self.options.resource,
                token,
                cycle.latest,
                cycle.active
            );
            return;
        }

        match outcome {
            Ok(model) => {
                self.state
                    .send_replace(FetchState::succeeded(model, Utc::now()));
            }
            Err(err) => {
                log::warn!("{}: fetch failed: {}", self.options.resource, err);
                let info = extract_error_info(&err, &self.options.fallback_message());
                self.state.send_modify(|state| *state = state.failed(info));
            }
        }
    }
}

impl<P, N> Shared<P, N>
where
    P: Clone + Send + Sync + 'static,
    N: Normalizer,
{
    /// Issue a request token and publish the in-flight status.
    fn begin(&self) -> Option<Ticket<P>> {
        let mut cycle = self.cycle.lock();
        if !cycle.active {
            return None;
        }
        cycle.latest += 1;
        let ticket = Ticket {
            token: cycle.latest,
            params: cycle.params.clone(),
        };
        self.state.send_modify(|state| *state = state.started());
        Some(ticket)
    }

    /// Start one fetch in the background. Returns false if nothing was
    /// started (inactive, or no runtime to spawn on).
    fn dispatch(self: &Arc<Self>) -> bool {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::error!(
                    "{}: no async runtime available, fetch skipped",
                    self.options.resource
                );
                return false;
            }
        };

        let Some(ticket) = self.begin() else {
            return false;
        };
        runtime.spawn(Arc::clone(self).run(ticket));
        true
    }

    /// Fetch and normalize on a task of its own, so a panic in the source
    /// or the normalizer still ends in a published error.
    async fn run(self: Arc<Self>, ticket: Ticket<P>) {
        let Ticket { token, params } = ticket;
        let worker = Arc::clone(&self);
        let outcome = match tokio::spawn(async move { worker.fetch(&params).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("{}: fetch task failed: {}", self.options.resource, e);
                Err(FetchError::Normalize(format!("fetch task failed: {}", e)))
            }
        };
        self.finish(token, outcome);
    }

    async fn fetch(&self, params: &P) -> Result<N::Model, FetchError> {
        let token = self.credentials.bearer_token();
        let raw = self.source.fetch(params, token.as_deref()).await?;
        Ok(self.normalizer.normalize(raw)?)
    }
}

/// Polls one resource and publishes its `FetchState`.
///
/// Must be driven from inside a tokio runtime. Dropping the controller
/// stops it.
pub struct PollingController<P, N: Normalizer> {
    shared: Arc<Shared<P, N>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl<P, N> PollingController<P, N>
where
    P: Clone + PartialEq + Send + Sync + 'static,
    N: Normalizer,
{
    pub fn new(
        source: Arc<dyn DataSource<P>>,
        normalizer: N,
        credentials: Arc<dyn CredentialSource>,
        params: P,
        options: PollOptions,
    ) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        Self {
            shared: Arc::new(Shared {
                source,
                normalizer,
                credentials,
                options,
                cycle: Mutex::new(Cycle {
                    params,
                    latest: 0,
                    active: false,
                }),
                state,
            }),
            timer: Mutex::new(None),
        }
    }

    /// Activate for the current params. No-op if already active.
    pub fn start(&self) {
        {
            let mut cycle = self.shared.cycle.lock();
            if cycle.active {
                return;
            }
            cycle.active = true;
        }

        log::info!(
            "{}: started (interval: {:?})",
            self.shared.options.resource,
            self.shared.options.interval
        );

        if self.shared.options.run_immediately {
            self.shared.dispatch();
        }
        if let Some(period) = self.shared.options.interval {
            self.spawn_timer(period);
        }
    }

    /// Replace the request params. A change supersedes any in-flight
    /// request and, while active, fetches right away. The timer keeps its
    /// cadence. Returns false if `params` equals the current value.
    pub fn set_params(&self, params: P) -> bool {
        let active = {
            let mut cycle = self.shared.cycle.lock();
            if cycle.params == params {
                return false;
            }
            cycle.params = params;
            cycle.latest += 1;
            cycle.active
        };

        log::debug!("{}: params changed", self.shared.options.resource);
        if active {
            self.shared.dispatch();
        }
        true
    }

    /// Fetch now, outside the timer cadence. Overlapping calls are allowed;
    /// only the newest response publishes.
    pub fn refresh(&self) -> bool {
        let started = self.shared.dispatch();
        if started {
            log::debug!("{}: manual refresh", self.shared.options.resource);
        }
        started
    }

    pub fn params(&self) -> P {
        self.shared.cycle.lock().params.clone()
    }

    fn spawn_timer(&self, period: Duration) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::error!(
                    "{}: no async runtime available, auto-refresh disabled",
                    self.shared.options.resource
                );
                return;
            }
        };

        let shared = Arc::clone(&self.shared);
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !shared.dispatch() {
                    break;
                }
            }
        });

        if let Some(previous) = self.timer.lock().replace(handle) {
            previous.abort();
        }
    }
}

impl<P, N: Normalizer> PollingController<P, N> {
    /// Deactivate: cancel the timer and drop any response still in flight.
    pub fn stop(&self) {
        let was_active = self.shared.deactivate();
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }
        if was_active {
            log::info!("{}: stopped", self.shared.options.resource);
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    pub fn options(&self) -> &PollOptions {
        &self.shared.options
    }

    pub fn snapshot(&self) -> FetchState<N::Model> {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<N::Model>> {
        self.shared.state.subscribe()
    }
}

impl<P, N: Normalizer> Drop for PollingController<P, N> {
    fn drop(&mut self) {
        self.stop();
    }
}
