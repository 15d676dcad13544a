use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{bail, Context, Result};
use chrono::Timelike;
use parking_lot::Mutex;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    daemon::{config::SamplingConfig, storage::entities::TickEvent},
    utils::clock::Clock,
    window_api::{ForegroundAppSource, IdleSource},
};

use super::{activity::ActivityEvaluator, counter::EventCounter};

/// Turns drained input plus the two OS signals into one [TickEvent] per interval.
pub struct Sampler {
    counter: Arc<EventCounter>,
    idle_source: Arc<dyn IdleSource>,
    app_source: Arc<dyn ForegroundAppSource>,
    evaluator: ActivityEvaluator,
    denylist: HashSet<String>,
    interval: Duration,
    query_timeout: Duration,
    next: mpsc::Sender<TickEvent>,
    clock: Box<dyn Clock>,
    paused: Arc<AtomicBool>,
    last_active_app: Arc<Mutex<Option<String>>>,
    idle_query: Arc<AtomicBool>,
    app_query: Arc<AtomicBool>,
}

/// Marks a source as busy until the blocking query holding it finishes or is dropped.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    /// `None` while an earlier query on the same source is still running.
    fn acquire(busy: &Arc<AtomicBool>) -> Option<Self> {
        (!busy.swap(true, Ordering::SeqCst)).then(|| Self(busy.clone()))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Sampler {
    pub fn new(
        counter: Arc<EventCounter>,
        idle_source: Arc<dyn IdleSource>,
        app_source: Arc<dyn ForegroundAppSource>,
        config: &SamplingConfig,
        next: mpsc::Sender<TickEvent>,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            counter,
            idle_source,
            app_source,
            evaluator: ActivityEvaluator::from_seconds(config.idle_threshold_seconds),
            denylist: config
                .app_denylist
                .iter()
                .map(|app| app.to_lowercase())
                .collect(),
            interval: config.interval()?,
            query_timeout: config.query_timeout()?,
            next,
            clock,
            paused: Arc::new(AtomicBool::new(false)),
            last_active_app: Arc::new(Mutex::new(None)),
            idle_query: Arc::new(AtomicBool::new(false)),
            app_query: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Runs a blocking OS query on the blocking pool. Errors, panics and timeouts are logged and
    /// reported as `None` so a broken source never stalls the timer. A query that timed out keeps
    /// its source busy, later ticks skip that source until it returns.
    async fn query_source<T, F>(
        &self,
        what: &'static str,
        busy: &Arc<AtomicBool>,
        query: F,
    ) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let Some(in_flight) = InFlight::acquire(busy) else {
            debug!("Previous query for {what} is still running");
            return None;
        };
        let task = tokio::task::spawn_blocking(move || {
            let _in_flight = in_flight;
            query()
        });
        match tokio::time::timeout(self.query_timeout, task).await {
            Ok(Ok(Ok(value))) => Some(value),
            Ok(Ok(Err(e))) => {
                warn!("Failed to query {what} {e:?}");
                None
            }
            Ok(Err(e)) => {
                warn!("Query for {what} panicked {e:?}");
                None
            }
            Err(_) => {
                warn!("Query for {what} timed out after {:?}", self.query_timeout);
                None
            }
        }
    }

    async fn idle_seconds(&self) -> f64 {
        let source = self.idle_source.clone();
        self.query_source("idle time", &self.idle_query, move || {
            source.seconds_since_last_input()
        })
        .await
        .unwrap_or(f64::INFINITY)
    }

    /// Foreground app that may receive time, if any.
    async fn resolve_app(&self) -> Option<String> {
        let source = self.app_source.clone();
        self.query_source("foreground app", &self.app_query, move || {
            source.current_foreground_process_name()
        })
        .await
        .flatten()
        .filter(|app| !app.trim().is_empty())
        .filter(|app| !self.denylist.contains(&app.to_lowercase()))
    }

    async fn refresh_last_active_app(&self) {
        let app = self.resolve_app().await;
        *self.last_active_app.lock() = app;
    }

    /// Executes a single sampling step. Only fails when the processing side is gone.
    pub async fn tick(&mut self) -> Result<()> {
        let input = self.counter.take_and_reset();
        if self.paused.load(Ordering::SeqCst) {
            debug!("Paused, dropping {input:?}");
            return Ok(());
        }

        let idle = self.idle_seconds().await;
        let is_active = self
            .evaluator
            .is_active(input.clicks, input.keystrokes, idle);
        let interval = self.interval.as_secs_f64();
        let screen_time_delta = if is_active { interval } else { 0. };

        let app = self.resolve_app().await;
        let app_delta = if is_active && app.is_some() {
            interval
        } else {
            0.
        };

        if screen_time_delta > 0. || !input.is_empty() {
            let now = self.clock.time();
            let event = TickEvent {
                date: now.date_naive(),
                hour: now.hour(),
                screen_time_delta,
                clicks: input.clicks,
                keystrokes: input.keystrokes,
                app: app.clone(),
                app_delta,
                per_key: input.per_key,
            };
            let span = info_span!("Sending tick");
            debug!("Sending tick {:?}", event);
            self.next
                .send(event)
                .instrument(span)
                .await
                .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
        } else {
            debug!("Idle tick, idle for {idle}s");
        }

        *self.last_active_app.lock() = app;
        Ok(())
    }

    /// Executes the sampling event loop until `shutdown` is cancelled. Cancellation is only
    /// observed between ticks, so a tick that already started is always forwarded.
    pub async fn run(mut self, shutdown: CancellationToken) -> Self {
        let mut tick_point = self.clock.instant();
        loop {
            tick_point += self.interval;

            let cancelled = tokio::select! {
                biased;
                _ = shutdown.cancelled() => true,
                _ = self.clock.sleep_until(tick_point) => false,
            };
            if cancelled {
                return self;
            }

            if let Err(e) = self.tick().await {
                error!("Stopping sampler, ticks can't be delivered {e:?}");
                return self;
            }

            // Skip the ticks we are too late for instead of firing them in a burst.
            let now = self.clock.instant();
            if now > tick_point + self.interval {
                warn!("Tick overran by {:?}", now - tick_point);
                tick_point = now;
            }
        }
    }
}

enum SchedulerState {
    Stopped(Sampler),
    Running {
        shutdown: CancellationToken,
        handle: JoinHandle<Sampler>,
    },
    /// The sampler task panicked and took the sampler with it.
    Lost,
}

/// Start/stop handle around a [Sampler] running as a tokio task.
pub struct SamplingScheduler {
    state: SchedulerState,
    paused: Arc<AtomicBool>,
    last_active_app: Arc<Mutex<Option<String>>>,
}

impl SamplingScheduler {
    pub fn new(sampler: Sampler) -> Self {
        Self {
            paused: sampler.paused.clone(),
            last_active_app: sampler.last_active_app.clone(),
            state: SchedulerState::Stopped(sampler),
        }
    }

    /// Starts ticking. The first tick fires one interval from now. Does nothing if already
    /// running. A sampler that stopped on its own is restarted.
    pub async fn start(&mut self) -> Result<()> {
        if let SchedulerState::Running { handle, .. } = &self.state {
            if !handle.is_finished() {
                return Ok(());
            }
            self.stop().await?;
        }

        match &self.state {
            SchedulerState::Stopped(sampler) => sampler.refresh_last_active_app().await,
            SchedulerState::Running { .. } => return Ok(()),
            SchedulerState::Lost => bail!("Sampler was lost after a failure"),
        }

        if let SchedulerState::Stopped(sampler) =
            std::mem::replace(&mut self.state, SchedulerState::Lost)
        {
            let shutdown = CancellationToken::new();
            let handle = tokio::spawn(sampler.run(shutdown.clone()));
            self.state = SchedulerState::Running { shutdown, handle };
            info!("Sampling started");
        }
        Ok(())
    }

    /// Stops ticking and waits for a tick in progress to be forwarded. Does nothing if already
    /// stopped.
    pub async fn stop(&mut self) -> Result<()> {
        let SchedulerState::Running { shutdown, handle } = &mut self.state else {
            return Ok(());
        };
        shutdown.cancel();
        let joined = handle.await;
        match joined {
            Ok(sampler) => {
                self.state = SchedulerState::Stopped(sampler);
                info!("Sampling stopped");
                Ok(())
            }
            Err(e) => {
                self.state = SchedulerState::Lost;
                Err(e).context("Sampler task failed")
            }
        }
    }

    /// Paused ticks still drain the counter but forward nothing.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
        info!("Sampling paused: {paused}");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        matches!(&self.state, SchedulerState::Running { handle, .. } if !handle.is_finished())
    }

    pub fn last_active_app(&self) -> Option<String> {
        self.last_active_app.lock().clone()
    }
}
