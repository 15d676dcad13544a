use std::{
    collections::{BTreeSet, HashMap},
    path::Path,
    time::Duration,
};

use anyhow::{anyhow, ensure, Context, Result};
use chrono::{Datelike, NaiveDate};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info};

use crate::utils::{
    clock::Clock,
    time::{date_to_key, days_between, first_day_of_year, last_day_of_year, parse_date_key},
};

use super::{
    calendar::CalendarPeriod,
    entities::{AppStat, DailyStat, TickEvent, Totals},
};

pub const DAILY_GOAL_SETTING: &str = "daily_goal";
pub const DEFAULT_DAILY_GOAL_HOURS: f64 = 4.0;

const SCHEMA: &str = "\
    CREATE TABLE IF NOT EXISTS daily_stats (
      date TEXT PRIMARY KEY,
      screen_time_seconds REAL NOT NULL DEFAULT 0,
      mouse_clicks INTEGER NOT NULL DEFAULT 0,
      keystrokes INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS hourly_stats (
      date TEXT NOT NULL,
      hour INTEGER NOT NULL CHECK (hour BETWEEN 0 AND 23),
      screen_time_seconds REAL NOT NULL DEFAULT 0,
      mouse_clicks INTEGER NOT NULL DEFAULT 0,
      keystrokes INTEGER NOT NULL DEFAULT 0,
      PRIMARY KEY (date, hour)
    );

    CREATE TABLE IF NOT EXISTS app_stats (
      date TEXT NOT NULL,
      app_name TEXT NOT NULL,
      duration_seconds REAL NOT NULL DEFAULT 0,
      PRIMARY KEY (date, app_name)
    );

    CREATE TABLE IF NOT EXISTS keyboard_stats (
      date TEXT NOT NULL,
      key_name TEXT NOT NULL,
      count INTEGER NOT NULL DEFAULT 0,
      PRIMARY KEY (date, key_name)
    );

    CREATE TABLE IF NOT EXISTS settings (
      key TEXT PRIMARY KEY,
      value TEXT NOT NULL
    );";

/// Durable aggregates of every tick plus the read queries the reports are built from. Reads never
/// fail because data is missing. Days, hours and months without rows come back as zero.
#[cfg_attr(test, mockall::automock)]
pub trait AggregationStore: Send + Sync {
    /// Applies one tick to every affected table in a single transaction. Rows are created on the
    /// first positive delta and only ever incremented afterwards.
    fn record_tick(&self, tick: &TickEvent) -> Result<()>;

    fn today_stats(&self) -> Result<Totals>;

    /// Longest running apps of the day. Equal durations are ordered by name.
    fn top_apps(&self, date: NaiveDate, limit: usize) -> Result<Vec<AppStat>>;

    /// Lifetime press count per key.
    fn keyboard_heatmap(&self) -> Result<HashMap<String, u64>>;

    /// Years that have data, newest first. The current year is always present.
    fn available_years(&self) -> Result<Vec<i32>>;

    /// Stored rows of a year in date order, without gap filling.
    fn year_rows(&self, year: i32) -> Result<Vec<DailyStat>>;

    /// The seven days ending with `end`, oldest first.
    fn weekly_trend(&self, end: NaiveDate) -> Result<[DailyStat; 7]>;

    /// Monthly sums of a year. Months that have not started yet are `None` rather than zero.
    fn yearly_trend(&self, year: i32) -> Result<[Option<Totals>; 12]>;

    fn hourly_activity(&self, date: NaiveDate) -> Result<[Totals; 24]>;

    /// Every day of the week, month or year containing `reference`.
    fn calendar_range(&self, period: CalendarPeriod, reference: NaiveDate)
        -> Result<Vec<DailyStat>>;

    /// Consecutive days with screen time, ending today or yesterday.
    fn current_streak(&self) -> Result<u32>;

    fn lifetime_stats(&self) -> Result<Totals>;

    /// The last `days` days ending today, oldest first.
    fn recent_days(&self, days: u32) -> Result<Vec<DailyStat>>;

    fn setting(&self, key: &str) -> Result<Option<String>>;

    fn set_setting(&self, key: &str, value: &str) -> Result<()>;

    fn daily_goal_hours(&self) -> Result<f64>;
}

/// SQLite backed [AggregationStore]. The writer and the reader use separate connections so that
/// under WAL reports never wait for a tick being written.
pub struct SqliteAggregationStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    clock: Box<dyn Clock>,
}

impl SqliteAggregationStore {
    pub fn open(path: &Path, clock: Box<dyn Clock>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }

        let writer = open_connection(path)?;
        writer
            .execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;",
            )
            .context("Failed to configure journal")?;
        writer
            .execute_batch(SCHEMA)
            .context("Failed to initialize schema")?;
        writer
            .execute(
                "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
                params![DAILY_GOAL_SETTING, DEFAULT_DAILY_GOAL_HOURS.to_string()],
            )
            .context("Failed to seed settings")?;

        let reader = open_connection(path)?;
        info!("Opened activity database {}", path.display());

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            clock,
        })
    }

    fn today(&self) -> NaiveDate {
        self.clock.time().date_naive()
    }

    /// Stored rows between two days (inclusive), keyed by date.
    fn daily_rows(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyStat>> {
        let conn = self.reader.lock();
        let mut statement = conn.prepare_cached(
            "SELECT date, screen_time_seconds, mouse_clicks, keystrokes
             FROM daily_stats
             WHERE date BETWEEN ?1 AND ?2
             ORDER BY date",
        )?;
        let rows = statement
            .query_map(params![date_to_key(start), date_to_key(end)], |row| {
                Ok((row.get::<_, String>(0)?, read_totals(row, 1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read daily_stats")?;

        rows.into_iter()
            .map(|(date, totals)| {
                Ok(DailyStat {
                    date: parse_date_key(&date)?,
                    totals,
                })
            })
            .collect()
    }

    /// Same as [Self::daily_rows] but with a zeroed row for every missing day.
    fn filled_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyStat>> {
        let stored = self
            .daily_rows(start, end)?
            .into_iter()
            .map(|stat| (stat.date, stat.totals))
            .collect::<HashMap<_, _>>();

        Ok(days_between(start, end)
            .map(|date| DailyStat {
                date,
                totals: stored.get(&date).copied().unwrap_or_default(),
            })
            .collect())
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.busy_timeout(Duration::from_secs(5))
        .context("Failed to set busy timeout")?;
    Ok(conn)
}

/// SQLite integers are signed. Counters never get near the limit, but a value that does not fit
/// is an error rather than a wrap.
fn to_sql_count(count: u64) -> Result<i64> {
    i64::try_from(count).map_err(|_| anyhow!("Counter {count} does not fit into storage"))
}

fn from_sql_count(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

fn read_totals(row: &Row<'_>, offset: usize) -> rusqlite::Result<Totals> {
    Ok(Totals {
        screen_time_seconds: row.get(offset)?,
        mouse_clicks: from_sql_count(row.get(offset + 1)?),
        keystrokes: from_sql_count(row.get(offset + 2)?),
    })
}

fn validate_tick(tick: &TickEvent) -> Result<()> {
    ensure!(tick.hour < 24, "Hour {} is out of range", tick.hour);
    ensure!(
        tick.screen_time_delta.is_finite() && tick.screen_time_delta >= 0.,
        "Screen time delta {} must be a non-negative number",
        tick.screen_time_delta
    );
    ensure!(
        tick.app_delta.is_finite() && tick.app_delta >= 0.,
        "App delta {} must be a non-negative number",
        tick.app_delta
    );
    if let Some(app) = &tick.app {
        ensure!(!app.trim().is_empty(), "App name can't be empty");
    }
    ensure!(
        tick.per_key.keys().all(|key| !key.is_empty()),
        "Key names can't be empty"
    );
    Ok(())
}

fn apply_tick(tx: &Transaction<'_>, tick: &TickEvent) -> Result<()> {
    let date = date_to_key(tick.date);
    let clicks = to_sql_count(tick.clicks)?;
    let keystrokes = to_sql_count(tick.keystrokes)?;

    if tick.screen_time_delta > 0. || clicks > 0 || keystrokes > 0 {
        tx.prepare_cached(
            "INSERT INTO daily_stats (date, screen_time_seconds, mouse_clicks, keystrokes)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(date) DO UPDATE SET
               screen_time_seconds = screen_time_seconds + excluded.screen_time_seconds,
               mouse_clicks = mouse_clicks + excluded.mouse_clicks,
               keystrokes = keystrokes + excluded.keystrokes",
        )?
        .execute(params![date, tick.screen_time_delta, clicks, keystrokes])
        .context("Failed to upsert daily_stats")?;

        tx.prepare_cached(
            "INSERT INTO hourly_stats (date, hour, screen_time_seconds, mouse_clicks, keystrokes)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(date, hour) DO UPDATE SET
               screen_time_seconds = screen_time_seconds + excluded.screen_time_seconds,
               mouse_clicks = mouse_clicks + excluded.mouse_clicks,
               keystrokes = keystrokes + excluded.keystrokes",
        )?
        .execute(params![date, tick.hour, tick.screen_time_delta, clicks, keystrokes])
        .context("Failed to upsert hourly_stats")?;
    }

    if let Some(app) = tick.app.as_deref().filter(|_| tick.app_delta > 0.) {
        tx.prepare_cached(
            "INSERT INTO app_stats (date, app_name, duration_seconds)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(date, app_name) DO UPDATE SET
               duration_seconds = duration_seconds + excluded.duration_seconds",
        )?
        .execute(params![date, app, tick.app_delta])
        .context("Failed to upsert app_stats")?;
    }

    let mut key_statement = tx.prepare_cached(
        "INSERT INTO keyboard_stats (date, key_name, count)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(date, key_name) DO UPDATE SET
           count = count + excluded.count",
    )?;
    for (key, count) in tick.per_key.iter().filter(|(_, count)| **count > 0) {
        key_statement
            .execute(params![date, key, to_sql_count(*count)?])
            .context("Failed to upsert keyboard_stats")?;
    }

    Ok(())
}

impl AggregationStore for SqliteAggregationStore {
    fn record_tick(&self, tick: &TickEvent) -> Result<()> {
        validate_tick(tick)?;
        if tick.is_noop() {
            return Ok(());
        }

        let mut conn = self.writer.lock();
        let tx = conn.transaction().context("Failed to start tick transaction")?;
        apply_tick(&tx, tick)?;
        tx.commit().context("Failed to commit tick")?;
        debug!("Recorded tick for {} {}:00", tick.date, tick.hour);
        Ok(())
    }

    fn today_stats(&self) -> Result<Totals> {
        let conn = self.reader.lock();
        let totals = conn
            .query_row(
                "SELECT screen_time_seconds, mouse_clicks, keystrokes
                 FROM daily_stats WHERE date = ?1",
                params![date_to_key(self.today())],
                |row| read_totals(row, 0),
            )
            .optional()
            .context("Failed to read today's stats")?;
        Ok(totals.unwrap_or_default())
    }

    fn top_apps(&self, date: NaiveDate, limit: usize) -> Result<Vec<AppStat>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.reader.lock();
        let mut statement = conn.prepare_cached(
            "SELECT app_name, duration_seconds
             FROM app_stats
             WHERE date = ?1
             ORDER BY duration_seconds DESC, app_name ASC
             LIMIT ?2",
        )?;
        let apps = statement
            .query_map(params![date_to_key(date), limit], |row| {
                Ok(AppStat {
                    app_name: row.get(0)?,
                    duration_seconds: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read app_stats")?;
        Ok(apps)
    }

    fn keyboard_heatmap(&self) -> Result<HashMap<String, u64>> {
        let conn = self.reader.lock();
        let mut statement = conn.prepare_cached(
            "SELECT key_name, SUM(count) FROM keyboard_stats GROUP BY key_name",
        )?;
        let keys = statement
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, from_sql_count(row.get(1)?)))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()
            .context("Failed to read keyboard_stats")?;
        Ok(keys)
    }

    fn available_years(&self) -> Result<Vec<i32>> {
        let conn = self.reader.lock();
        let mut statement = conn.prepare_cached(
            "SELECT DISTINCT CAST(substr(date, 1, 4) AS INTEGER) FROM daily_stats",
        )?;
        let mut years = statement
            .query_map([], |row| row.get::<_, i32>(0))?
            .collect::<rusqlite::Result<BTreeSet<_>>>()
            .context("Failed to read available years")?;
        years.insert(self.today().year());
        Ok(years.into_iter().rev().collect())
    }

    fn year_rows(&self, year: i32) -> Result<Vec<DailyStat>> {
        let (Some(start), Some(end)) = (first_day_of_year(year), last_day_of_year(year)) else {
            return Ok(Vec::new());
        };
        self.daily_rows(start, end)
    }

    fn weekly_trend(&self, end: NaiveDate) -> Result<[DailyStat; 7]> {
        let start = end
            .checked_sub_days(chrono::Days::new(6))
            .ok_or_else(|| anyhow!("Date {end} is too early for a weekly trend"))?;
        self.filled_range(start, end)?
            .try_into()
            .map_err(|rows: Vec<DailyStat>| anyhow!("Expected 7 days, got {}", rows.len()))
    }

    fn yearly_trend(&self, year: i32) -> Result<[Option<Totals>; 12]> {
        let today = self.today();
        // Months after this one have not happened yet.
        let last_known_month = match year.cmp(&today.year()) {
            std::cmp::Ordering::Less => 12,
            std::cmp::Ordering::Equal => today.month(),
            std::cmp::Ordering::Greater => 0,
        };

        let (Some(start), Some(end)) = (first_day_of_year(year), last_day_of_year(year)) else {
            return Ok([None; 12]);
        };

        let conn = self.reader.lock();
        let mut statement = conn.prepare_cached(
            "SELECT CAST(substr(date, 6, 2) AS INTEGER),
                    COALESCE(SUM(screen_time_seconds), 0.0),
                    COALESCE(SUM(mouse_clicks), 0),
                    COALESCE(SUM(keystrokes), 0)
             FROM daily_stats
             WHERE date BETWEEN ?1 AND ?2
             GROUP BY 1",
        )?;
        let sums = statement
            .query_map(params![date_to_key(start), date_to_key(end)], |row| {
                Ok((row.get::<_, u32>(0)?, read_totals(row, 1)?))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()
            .context("Failed to read monthly sums")?;

        Ok(std::array::from_fn(|index| {
            let month = index as u32 + 1;
            (month <= last_known_month).then(|| sums.get(&month).copied().unwrap_or_default())
        }))
    }

    fn hourly_activity(&self, date: NaiveDate) -> Result<[Totals; 24]> {
        let conn = self.reader.lock();
        let mut statement = conn.prepare_cached(
            "SELECT hour, screen_time_seconds, mouse_clicks, keystrokes
             FROM hourly_stats WHERE date = ?1",
        )?;
        let rows = statement
            .query_map(params![date_to_key(date)], |row| {
                Ok((row.get::<_, i64>(0)?, read_totals(row, 1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read hourly_stats")?;

        let mut hours = [Totals::default(); 24];
        for (hour, totals) in rows {
            if let Some(slot) = usize::try_from(hour).ok().and_then(|hour| hours.get_mut(hour)) {
                *slot = totals;
            }
        }
        Ok(hours)
    }

    fn calendar_range(
        &self,
        period: CalendarPeriod,
        reference: NaiveDate,
    ) -> Result<Vec<DailyStat>> {
        let (start, end) = period.bounds(reference);
        self.filled_range(start, end)
    }

    fn current_streak(&self) -> Result<u32> {
        let today = self.today();
        let conn = self.reader.lock();
        let mut statement = conn.prepare_cached(
            "SELECT date FROM daily_stats
             WHERE screen_time_seconds > 0 AND date <= ?1
             ORDER BY date DESC",
        )?;
        let dates = statement
            .query_map(params![date_to_key(today)], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read active days")?;

        let Some(yesterday) = today.pred_opt() else {
            return Ok(0);
        };
        let mut streak = 0;
        let mut expected: Option<NaiveDate> = None;
        for date in dates {
            let date = parse_date_key(&date)?;
            let continues = match expected {
                None => date == today || date == yesterday,
                Some(expected) => date == expected,
            };
            if !continues {
                break;
            }
            streak += 1;
            expected = date.pred_opt();
        }
        Ok(streak)
    }

    fn lifetime_stats(&self) -> Result<Totals> {
        let conn = self.reader.lock();
        conn.query_row(
            "SELECT COALESCE(SUM(screen_time_seconds), 0.0),
                    COALESCE(SUM(mouse_clicks), 0),
                    COALESCE(SUM(keystrokes), 0)
             FROM daily_stats",
            [],
            |row| read_totals(row, 0),
        )
        .context("Failed to read lifetime stats")
    }

    fn recent_days(&self, days: u32) -> Result<Vec<DailyStat>> {
        ensure!(days >= 1, "At least one day has to be requested");
        let end = self.today();
        let start = end
            .checked_sub_days(chrono::Days::new(u64::from(days - 1)))
            .ok_or_else(|| anyhow!("{days} days is too far back"))?;
        self.filled_range(start, end)
    }

    fn setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.reader.lock();
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to read setting {key}"))
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        ensure!(!key.is_empty(), "Setting key can't be empty");
        let conn = self.writer.lock();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .with_context(|| format!("Failed to write setting {key}"))?;
        Ok(())
    }

    fn daily_goal_hours(&self) -> Result<f64> {
        Ok(self
            .setting(DAILY_GOAL_SETTING)?
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|hours| hours.is_finite() && *hours > 0.)
            .unwrap_or(DEFAULT_DAILY_GOAL_HOURS))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::utils::clock::test_clock::TestClock;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn open_store(today: &str) -> (TempDir, SqliteAggregationStore) {
        let dir = tempdir().unwrap();
        let store = SqliteAggregationStore::open(
            &dir.path().join("activity.db"),
            Box::new(TestClock::on(today)),
        )
        .unwrap();
        (dir, store)
    }

    fn tick(date: &str, hour: u32, screen_time: f64, clicks: u64, keystrokes: u64) -> TickEvent {
        TickEvent {
            date: day(date),
            hour,
            screen_time_delta: screen_time,
            clicks,
            keystrokes,
            app: None,
            app_delta: 0.,
            per_key: HashMap::new(),
        }
    }

    fn coding_tick() -> TickEvent {
        TickEvent {
            app: Some("code.exe".into()),
            app_delta: 2.,
            per_key: HashMap::from([("A".to_string(), 2), ("SPACE".to_string(), 1)]),
            ..tick("2025-06-01", 10, 2., 3, 5)
        }
    }

    #[test]
    fn repeated_ticks_increment_every_table() {
        let (_dir, store) = open_store("2025-06-01");
        store.record_tick(&coding_tick()).unwrap();
        store.record_tick(&coding_tick()).unwrap();

        let expected = Totals {
            screen_time_seconds: 4.,
            mouse_clicks: 6,
            keystrokes: 10,
        };
        assert_eq!(store.today_stats().unwrap(), expected);
        assert_eq!(store.hourly_activity(day("2025-06-01")).unwrap()[10], expected);
        assert_eq!(
            store.top_apps(day("2025-06-01"), 5).unwrap(),
            vec![AppStat {
                app_name: "code.exe".into(),
                duration_seconds: 4.
            }]
        );
        let keys = store.keyboard_heatmap().unwrap();
        assert_eq!(keys.get("A"), Some(&4));
        assert_eq!(keys.get("SPACE"), Some(&2));
    }

    #[test]
    fn invalid_ticks_are_rejected_without_writing() {
        let (_dir, store) = open_store("2025-06-01");
        assert!(store.record_tick(&tick("2025-06-01", 24, 2., 1, 0)).is_err());
        assert!(store.record_tick(&tick("2025-06-01", 3, -2., 1, 0)).is_err());
        assert!(store.record_tick(&tick("2025-06-01", 3, f64::NAN, 1, 0)).is_err());
        let empty_app = TickEvent {
            app: Some(" ".into()),
            app_delta: 2.,
            ..tick("2025-06-01", 3, 2., 0, 0)
        };
        assert!(store.record_tick(&empty_app).is_err());

        assert_eq!(store.today_stats().unwrap(), Totals::default());
        assert_eq!(store.available_years().unwrap(), vec![2025]);
    }

    #[test]
    fn zero_tick_creates_no_rows() {
        let (_dir, store) = open_store("2025-06-01");
        store.record_tick(&tick("2025-06-01", 3, 0., 0, 0)).unwrap();
        assert!(store.year_rows(2025).unwrap().is_empty());
        // Not a streak day either.
        store.record_tick(&tick("2025-06-01", 3, 0., 4, 0)).unwrap();
        assert_eq!(store.current_streak().unwrap(), 0);
    }

    #[test]
    fn app_time_needs_a_positive_delta() {
        let (_dir, store) = open_store("2025-06-01");
        let idle_app = TickEvent {
            app: Some("firefox".into()),
            ..tick("2025-06-01", 9, 0., 1, 0)
        };
        store.record_tick(&idle_app).unwrap();
        assert!(store.top_apps(day("2025-06-01"), 5).unwrap().is_empty());
    }

    #[test]
    fn top_apps_are_sorted_and_limited() {
        let (_dir, store) = open_store("2025-06-01");
        for (app, seconds) in [("b", 4.), ("a", 4.), ("c", 10.), ("d", 1.)] {
            store
                .record_tick(&TickEvent {
                    app: Some(app.into()),
                    app_delta: seconds,
                    ..tick("2025-06-01", 9, seconds, 0, 0)
                })
                .unwrap();
        }
        let names = store
            .top_apps(day("2025-06-01"), 3)
            .unwrap()
            .into_iter()
            .map(|app| app.app_name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["c", "a", "b"]);
    }

    #[test]
    fn streak_ends_today_or_yesterday() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("activity.db");
        {
            let store =
                SqliteAggregationStore::open(&path, Box::new(TestClock::on("2025-06-03"))).unwrap();
            store.record_tick(&tick("2025-06-01", 10, 2., 0, 0)).unwrap();
            store.record_tick(&tick("2025-06-02", 10, 2., 0, 0)).unwrap();
            assert_eq!(store.current_streak().unwrap(), 2);
        }
        let store =
            SqliteAggregationStore::open(&path, Box::new(TestClock::on("2025-06-04"))).unwrap();
        assert_eq!(store.current_streak().unwrap(), 0);
        store.record_tick(&tick("2025-06-04", 10, 2., 0, 0)).unwrap();
        assert_eq!(store.current_streak().unwrap(), 1);
    }

    #[test]
    fn streak_ignores_gaps_further_back() {
        let (_dir, store) = open_store("2025-06-10");
        for date in ["2025-06-01", "2025-06-07", "2025-06-08", "2025-06-10"] {
            store.record_tick(&tick(date, 10, 2., 0, 0)).unwrap();
        }
        assert_eq!(store.current_streak().unwrap(), 1);
    }

    #[test]
    fn weekly_trend_is_gap_filled() {
        let (_dir, store) = open_store("2025-06-03");
        store.record_tick(&tick("2025-05-30", 10, 6., 1, 1)).unwrap();
        store.record_tick(&tick("2025-06-02", 10, 2., 0, 0)).unwrap();

        let week = store.weekly_trend(day("2025-06-03")).unwrap();
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].date, day("2025-05-28"));
        assert!(week.windows(2).all(|w| w[0].date.succ_opt() == Some(w[1].date)));
        assert_eq!(week[2].totals.screen_time_seconds, 6.);
        assert_eq!(week[5].totals.screen_time_seconds, 2.);
        assert_eq!(week[6].totals, Totals::default());
    }

    #[test]
    fn yearly_trend_marks_future_months() {
        let (_dir, store) = open_store("2025-06-03");
        store.record_tick(&tick("2025-02-10", 10, 2., 1, 0)).unwrap();
        store.record_tick(&tick("2025-02-11", 10, 3., 1, 0)).unwrap();
        store.record_tick(&tick("2024-12-31", 10, 3., 0, 0)).unwrap();

        let current = store.yearly_trend(2025).unwrap();
        assert_eq!(current.len(), 12);
        assert_eq!(current[0], Some(Totals::default()));
        assert_eq!(
            current[1],
            Some(Totals {
                screen_time_seconds: 5.,
                mouse_clicks: 2,
                keystrokes: 0
            })
        );
        assert!(current[5].is_some());
        assert!(current[6..].iter().all(Option::is_none));

        let past = store.yearly_trend(2024).unwrap();
        assert!(past.iter().all(Option::is_some));
        assert_eq!(past[11].map(|t| t.screen_time_seconds), Some(3.));

        assert!(store.yearly_trend(2026).unwrap().iter().all(Option::is_none));
    }

    #[test]
    fn hourly_activity_has_every_hour() {
        let (_dir, store) = open_store("2025-06-03");
        store.record_tick(&tick("2025-06-03", 0, 2., 0, 0)).unwrap();
        store.record_tick(&tick("2025-06-03", 23, 2., 0, 0)).unwrap();
        let hours = store.hourly_activity(day("2025-06-03")).unwrap();
        assert_eq!(hours.len(), 24);
        assert_eq!(hours[0].screen_time_seconds, 2.);
        assert_eq!(hours[23].screen_time_seconds, 2.);
        assert_eq!(hours.iter().filter(|h| h.is_active()).count(), 2);
        assert!(store.hourly_activity(day("2025-06-04")).unwrap().iter().all(|h| !h.is_active()));
    }

    #[test]
    fn calendar_ranges_cover_the_period() {
        let (_dir, store) = open_store("2025-06-03");
        store.record_tick(&tick("2025-06-03", 10, 2., 0, 0)).unwrap();

        let week = store.calendar_range(CalendarPeriod::Week, day("2025-06-03")).unwrap();
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].date, day("2025-06-01"));
        assert_eq!(week[2].totals.screen_time_seconds, 2.);

        let month = store.calendar_range(CalendarPeriod::Month, day("2025-02-03")).unwrap();
        assert_eq!(month.len(), 28);
        let year = store.calendar_range(CalendarPeriod::Year, day("2024-05-05")).unwrap();
        assert_eq!(year.len(), 366);
    }

    #[test]
    fn years_and_rows() {
        let (_dir, store) = open_store("2025-06-03");
        store.record_tick(&tick("2023-03-01", 10, 2., 0, 0)).unwrap();
        store.record_tick(&tick("2023-01-01", 10, 1., 0, 0)).unwrap();
        store.record_tick(&tick("2021-01-01", 10, 1., 0, 0)).unwrap();

        assert_eq!(store.available_years().unwrap(), vec![2025, 2023, 2021]);
        let rows = store.year_rows(2023).unwrap();
        assert_eq!(
            rows.iter().map(|r| r.date).collect::<Vec<_>>(),
            vec![day("2023-01-01"), day("2023-03-01")]
        );
        assert_eq!(store.lifetime_stats().unwrap().screen_time_seconds, 4.);
    }

    #[test]
    fn recent_days_end_today() {
        let (_dir, store) = open_store("2025-06-03");
        let days = store.recent_days(30).unwrap();
        assert_eq!(days.len(), 30);
        assert_eq!(days.last().map(|d| d.date), Some(day("2025-06-03")));
        assert!(store.recent_days(0).is_err());
    }

    #[test]
    fn settings_and_goal() {
        let (_dir, store) = open_store("2025-06-03");
        assert_eq!(store.daily_goal_hours().unwrap(), DEFAULT_DAILY_GOAL_HOURS);
        store.set_setting(DAILY_GOAL_SETTING, "6.5").unwrap();
        assert_eq!(store.daily_goal_hours().unwrap(), 6.5);
        store.set_setting(DAILY_GOAL_SETTING, "lots").unwrap();
        assert_eq!(store.daily_goal_hours().unwrap(), DEFAULT_DAILY_GOAL_HOURS);
        assert_eq!(store.setting("theme").unwrap(), None);
    }

    #[test]
    fn reopening_keeps_data_and_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("activity.db");
        {
            let store =
                SqliteAggregationStore::open(&path, Box::new(TestClock::on("2025-06-01"))).unwrap();
            store.record_tick(&coding_tick()).unwrap();
            store.set_setting(DAILY_GOAL_SETTING, "2").unwrap();
        }
        let store =
            SqliteAggregationStore::open(&path, Box::new(TestClock::on("2025-06-01"))).unwrap();
        assert_eq!(store.today_stats().unwrap().mouse_clicks, 3);
        assert_eq!(store.daily_goal_hours().unwrap(), 2.);
    }
}
