use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use collection::{
    counter::EventCounter,
    input_hook::spawn_input_hook,
    scheduler::{Sampler, SamplingScheduler},
};
use config::SamplingConfig;
use processing::{store_writer::StoreWriter, ProcessingModule};
use storage::{
    aggregation_store::{AggregationStore, SqliteAggregationStore},
    entities::TickEvent,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    utils::{
        clock::{Clock, DefaultClock},
        dir::DATABASE_FILE_NAME,
    },
    window_api::{ForegroundAppSource, GenericWindowManager, IdleSource, NoForegroundApp},
};

pub mod args;
pub mod collection;
pub mod config;
pub mod live;
pub mod processing;
pub mod shutdown;
pub mod storage;

/// Ticks that may wait for the store before the sampler blocks.
const TICK_CHANNEL_CAPACITY: usize = 10;

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf, config: SamplingConfig) -> Result<()> {
    config.validate()?;
    let store: Arc<dyn AggregationStore> = Arc::new(SqliteAggregationStore::open(
        &dir.join(DATABASE_FILE_NAME),
        Box::new(DefaultClock),
    )?);
    std::env::set_current_dir("/")?;

    let counter = Arc::new(EventCounter::new());
    spawn_input_hook(counter.clone())?;
    let (idle_source, app_source) = platform_sources(&counter);

    let shutdown_token = CancellationToken::new();
    tokio::spawn(shutdown::detect_shutdown(shutdown_token.clone()));

    run_pipeline(
        store,
        counter,
        idle_source,
        app_source,
        &config,
        DefaultClock,
        shutdown_token,
    )
    .await
}

/// OS backed sources when a backend was compiled in, otherwise the hook's own idle time and no
/// app attribution.
fn platform_sources(
    counter: &Arc<EventCounter>,
) -> (Arc<dyn IdleSource>, Arc<dyn ForegroundAppSource>) {
    match GenericWindowManager::new() {
        Ok(manager) => {
            let manager = Arc::new(manager);
            (
                manager.clone() as Arc<dyn IdleSource>,
                manager as Arc<dyn ForegroundAppSource>,
            )
        }
        Err(e) => {
            warn!("Falling back to input hook idle time without app tracking {e:?}");
            (
                counter.clone() as Arc<dyn IdleSource>,
                Arc::new(NoForegroundApp) as Arc<dyn ForegroundAppSource>,
            )
        }
    }
}

/// Samples into the store until `shutdown` is cancelled. The processing side drains whatever the
/// sampler managed to send before it returns.
async fn run_pipeline(
    store: Arc<dyn AggregationStore>,
    counter: Arc<EventCounter>,
    idle_source: Arc<dyn IdleSource>,
    app_source: Arc<dyn ForegroundAppSource>,
    config: &SamplingConfig,
    clock: impl Clock,
    shutdown: CancellationToken,
) -> Result<()> {
    let (sender, receiver) = mpsc::channel::<TickEvent>(TICK_CHANNEL_CAPACITY);
    let sampler = Sampler::new(
        counter.clone(),
        idle_source,
        app_source,
        config,
        sender,
        Box::new(clock),
    )?;
    let processor = ProcessingModule::new(receiver, StoreWriter::new(store.clone()));

    let (sampling_result, processing_result) = tokio::join!(
        drive_scheduler(SamplingScheduler::new(sampler), shutdown),
        processor.run(),
    );

    match live::live_session_stats(store.as_ref(), &counter) {
        Ok(today) => info!("Shutting down, today so far {today:?}"),
        Err(e) => warn!("Failed to read today's stats {e:?}"),
    }

    if let Err(sampling_result) = &sampling_result {
        error!("Sampling got an error {:?}", sampling_result);
    }

    if let Err(processing_result) = &processing_result {
        error!("Processing module got an error {:?}", processing_result);
    }

    sampling_result.and(processing_result)
}

/// Owns the scheduler for the lifetime of the daemon. Returning drops it together with the last
/// tick sender, which lets the processing module finish.
async fn drive_scheduler(
    mut scheduler: SamplingScheduler,
    shutdown: CancellationToken,
) -> Result<()> {
    scheduler.start().await?;
    shutdown.cancelled().await;
    scheduler.stop().await
}

#[cfg(test)]
mod daemon_tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            collection::{
                counter::EventCounter,
                scheduler::{Sampler, SamplingScheduler},
            },
            config::SamplingConfig,
            processing::{store_writer::StoreWriter, ProcessingModule},
            run_pipeline,
            storage::{
                aggregation_store::{AggregationStore, SqliteAggregationStore},
                entities::{TickEvent, Totals},
            },
        },
        utils::{clock::test_clock::TestClock, logging::TEST_LOGGING},
        window_api::{MockForegroundAppSource, MockIdleSource},
    };

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 7, 4).unwrap()
    }

    fn test_config() -> SamplingConfig {
        SamplingConfig {
            interval_seconds: 0.05,
            ..SamplingConfig::default()
        }
    }

    fn active_sources() -> (MockIdleSource, MockForegroundAppSource) {
        let mut idle = MockIdleSource::new();
        idle.expect_seconds_since_last_input().returning(|| Ok(0.));
        let mut app = MockForegroundAppSource::new();
        let mut apps = ["code.exe", "explorer.exe", "firefox"].into_iter().cycle();
        app.expect_current_foreground_process_name()
            .returning(move || Ok(apps.next().map(str::to_string)));
        (idle, app)
    }

    /// Very simple smoke test to check if the whole pipeline is working. Ticks are real time, so
    /// only lower bounds are asserted.
    #[tokio::test]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let path = dir.path().join("activity.db");
        let store: Arc<dyn AggregationStore> = Arc::new(SqliteAggregationStore::open(
            &path,
            Box::new(TestClock::at(test_date(), 10)),
        )?);
        let counter = Arc::new(EventCounter::new());
        let (idle, app) = active_sources();
        let shutdown_token = CancellationToken::new();
        let config = test_config();

        counter.on_click();
        counter.on_key_press("Key.space");

        let (_, result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(330)).await;
                shutdown_token.cancel()
            },
            run_pipeline(
                store.clone(),
                counter.clone(),
                Arc::new(idle),
                Arc::new(app),
                &config,
                TestClock::at(test_date(), 10),
                shutdown_token.clone(),
            ),
        );
        result?;

        let today = store.today_stats()?;
        assert!(today.screen_time_seconds >= 0.1);
        assert_eq!(today.mouse_clicks, 1);
        assert_eq!(today.keystrokes, 1);
        assert_eq!(store.hourly_activity(test_date())?[10], today);
        assert_eq!(store.keyboard_heatmap()?.get("SPACE"), Some(&1));

        let apps = store.top_apps(test_date(), 10)?;
        assert!(apps.iter().any(|app| app.app_name == "code.exe"));
        assert!(apps.iter().all(|app| app.app_name != "explorer.exe"));
        let app_time = apps.iter().map(|app| app.duration_seconds).sum::<f64>();
        assert!(app_time <= today.screen_time_seconds);

        Ok(())
    }

    #[tokio::test]
    async fn paused_sampling_leaves_store_unchanged() -> Result<()> {
        let dir = tempdir()?;
        let store: Arc<dyn AggregationStore> = Arc::new(SqliteAggregationStore::open(
            &dir.path().join("activity.db"),
            Box::new(TestClock::at(test_date(), 10)),
        )?);
        let counter = Arc::new(EventCounter::new());
        let (idle, app) = active_sources();
        let (sender, receiver) = mpsc::channel::<TickEvent>(10);
        let mut scheduler = SamplingScheduler::new(Sampler::new(
            counter.clone(),
            Arc::new(idle),
            Arc::new(app),
            &test_config(),
            sender,
            Box::new(TestClock::at(test_date(), 10)),
        )?);
        let processor = ProcessingModule::new(receiver, StoreWriter::new(store.clone()));

        scheduler.set_paused(true);
        counter.on_click();
        counter.on_key_press("a");

        let (control, processing) = tokio::join!(
            async move {
                scheduler.start().await?;
                tokio::time::sleep(Duration::from_millis(120)).await;
                scheduler.stop().await?;
                drop(scheduler);
                anyhow::Ok(counter.peek())
            },
            processor.run(),
        );
        processing?;

        let pending = control?;
        assert_eq!((pending.clicks, pending.keystrokes), (0, 0));
        assert_eq!(store.today_stats()?, Totals::default());
        Ok(())
    }
}
