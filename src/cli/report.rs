use std::fmt::{Display, Write};

use ansi_term::Style;
use anyhow::{ensure, Result};
use chrono::{Datelike, Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Subcommand, ValueEnum};
use serde::Serialize;

use crate::{
    daemon::storage::{
        aggregation_store::{AggregationStore, DAILY_GOAL_SETTING},
        calendar::CalendarPeriod,
        entities::{AppStat, DailyStat, Totals},
    },
    utils::{clock::Clock, percentage::goal_percentage, time::parse_date_key},
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PeriodArg {
    Week,
    Month,
    Year,
}

impl From<PeriodArg> for CalendarPeriod {
    fn from(value: PeriodArg) -> Self {
        match value {
            PeriodArg::Week => CalendarPeriod::Week,
            PeriodArg::Month => CalendarPeriod::Month,
            PeriodArg::Year => CalendarPeriod::Year,
        }
    }
}

const DATE_HELP: &str =
    "Day to report on, \"2025-06-01\", \"yesterday\", \"3 days ago\" or \"15/03/2025\". Defaults to today";

#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    #[command(about = "Screen time, clicks and keystrokes so far today")]
    Today,
    #[command(about = "Apps with the most foreground time on a day")]
    Apps {
        #[arg(help = DATE_HELP)]
        date: Option<String>,
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    #[command(about = "Most pressed keys of all time")]
    Keys {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    #[command(about = "The seven days ending on a date")]
    Week {
        #[arg(help = DATE_HELP)]
        end: Option<String>,
    },
    #[command(about = "Every recorded day of a year")]
    Year {
        #[arg(help = "Defaults to the current year")]
        year: Option<i32>,
    },
    #[command(about = "Monthly totals of a year")]
    Months {
        #[arg(help = "Defaults to the current year")]
        year: Option<i32>,
    },
    #[command(about = "Hour by hour breakdown of a day")]
    Hours {
        #[arg(help = DATE_HELP)]
        date: Option<String>,
    },
    #[command(about = "Every day of the week, month or year containing a date")]
    Calendar {
        #[arg(value_enum, default_value_t = PeriodArg::Month)]
        period: PeriodArg,
        #[arg(help = DATE_HELP)]
        date: Option<String>,
    },
    #[command(about = "Consecutive days with screen time")]
    Streak,
    #[command(about = "Years that have data")]
    Years,
    #[command(about = "The last few days, ending today")]
    Recent {
        #[arg(default_value_t = 30)]
        days: u32,
    },
    #[command(about = "Totals of everything recorded")]
    Lifetime,
    #[command(about = "Show the daily screen time goal, or set it in hours")]
    Goal { hours: Option<f64> },
}

/// Where relative dates are resolved from.
pub struct ReportContext<'a> {
    pub clock: &'a dyn Clock,
    pub date_style: DateStyle,
    pub json: bool,
}

impl ReportContext<'_> {
    fn today(&self) -> NaiveDate {
        self.clock.time().date_naive()
    }

    /// Accepts storage style keys first, then anything chrono-english understands.
    fn parse_date(&self, value: Option<String>) -> Result<NaiveDate> {
        let Some(value) = value else {
            return Ok(self.today());
        };
        if let Ok(date) = parse_date_key(&value) {
            return Ok(date);
        }
        let now = self.clock.time();
        match parse_date_string(&value, now, self.date_style.into()) {
            Ok(date) => Ok(date.with_timezone(&Local).date_naive()),
            Err(e) => Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate date {value:?}: {e}"),
                )
                .into()),
        }
    }
}

#[derive(Serialize)]
struct TodayReport {
    date: NaiveDate,
    #[serde(flatten)]
    totals: Totals,
    goal_hours: f64,
    goal_percentage: Option<f64>,
}

#[derive(Serialize)]
struct KeyCount {
    key: String,
    count: u64,
}

#[derive(Serialize)]
struct MonthReport {
    month: u32,
    totals: Option<Totals>,
}

#[derive(Serialize)]
struct HourReport {
    hour: usize,
    #[serde(flatten)]
    totals: Totals,
}

#[derive(Serialize)]
struct StreakReport {
    streak_days: u32,
}

#[derive(Serialize)]
struct GoalReport {
    goal_hours: f64,
}

/// Runs a report against the store and formats it either as text or as JSON.
pub fn render_report(
    command: ReportCommand,
    store: &dyn AggregationStore,
    context: &ReportContext,
) -> Result<String> {
    match command {
        ReportCommand::Today => {
            let totals = store.today_stats()?;
            let goal_hours = store.daily_goal_hours()?;
            let report = TodayReport {
                date: context.today(),
                totals,
                goal_hours,
                goal_percentage: goal_percentage(totals.screen_time_seconds, goal_hours)
                    .map(|p| *p),
            };
            emit(context.json, &report, |report, out| {
                heading(out, &format!("Today {}", report.date))?;
                write_totals(out, &report.totals)?;
                match goal_percentage(report.totals.screen_time_seconds, report.goal_hours) {
                    Some(progress) => {
                        writeln!(out, "Goal\t{progress} of {}h", report.goal_hours)
                    }
                    None => writeln!(out, "Goal\tnot set"),
                }
            })
        }
        ReportCommand::Apps { date, limit } => {
            let date = context.parse_date(date)?;
            let apps = store.top_apps(date, limit)?;
            emit(context.json, &apps, |apps: &Vec<AppStat>, out| {
                heading(out, &format!("Apps {date}"))?;
                if apps.is_empty() {
                    return writeln!(out, "No app time recorded");
                }
                for app in apps {
                    writeln!(
                        out,
                        "{}\t{}",
                        format_duration(app.duration_seconds),
                        app.app_name
                    )?;
                }
                Ok(())
            })
        }
        ReportCommand::Keys { limit } => {
            let keys = top_keys(store.keyboard_heatmap()?.into_iter(), limit);
            emit(context.json, &keys, |keys: &Vec<KeyCount>, out| {
                heading(out, "Keys")?;
                if keys.is_empty() {
                    return writeln!(out, "No keystrokes recorded");
                }
                for key in keys {
                    writeln!(out, "{}\t{}", key.count, key.key)?;
                }
                Ok(())
            })
        }
        ReportCommand::Week { end } => {
            let end = context.parse_date(end)?;
            let days = store.weekly_trend(end)?.to_vec();
            emit(context.json, &days, |days, out| write_days(out, "Week", days))
        }
        ReportCommand::Year { year } => {
            let year = year.unwrap_or_else(|| context.today().year());
            let days = store.year_rows(year)?;
            emit(context.json, &days, |days, out| {
                write_days(out, &format!("Year {year}"), days)
            })
        }
        ReportCommand::Months { year } => {
            let year = year.unwrap_or_else(|| context.today().year());
            let months = store
                .yearly_trend(year)?
                .into_iter()
                .zip(1..)
                .map(|(totals, month)| MonthReport { month, totals })
                .collect::<Vec<_>>();
            emit(context.json, &months, |months: &Vec<MonthReport>, out| {
                heading(out, &format!("Months {year}"))?;
                for month in months {
                    match &month.totals {
                        Some(totals) => writeln!(
                            out,
                            "{:02}\t{}\t{} clicks\t{} keys",
                            month.month,
                            format_duration(totals.screen_time_seconds),
                            totals.mouse_clicks,
                            totals.keystrokes
                        )?,
                        None => writeln!(out, "{:02}\t-", month.month)?,
                    }
                }
                Ok(())
            })
        }
        ReportCommand::Hours { date } => {
            let date = context.parse_date(date)?;
            let hours = store
                .hourly_activity(date)?
                .into_iter()
                .enumerate()
                .map(|(hour, totals)| HourReport { hour, totals })
                .collect::<Vec<_>>();
            emit(context.json, &hours, |hours: &Vec<HourReport>, out| {
                heading(out, &format!("Hours {date}"))?;
                for hour in hours.iter().filter(|hour| hour.totals != Totals::default()) {
                    writeln!(
                        out,
                        "{:02}:00\t{}\t{} clicks\t{} keys",
                        hour.hour,
                        format_duration(hour.totals.screen_time_seconds),
                        hour.totals.mouse_clicks,
                        hour.totals.keystrokes
                    )?;
                }
                Ok(())
            })
        }
        ReportCommand::Calendar { period, date } => {
            let date = context.parse_date(date)?;
            let days = store.calendar_range(period.into(), date)?;
            emit(context.json, &days, |days, out| {
                write_days(out, &format!("Calendar around {date}"), days)
            })
        }
        ReportCommand::Streak => {
            let report = StreakReport {
                streak_days: store.current_streak()?,
            };
            emit(context.json, &report, |report, out| {
                writeln!(out, "{} day streak", report.streak_days)
            })
        }
        ReportCommand::Years => {
            let years = store.available_years()?;
            emit(context.json, &years, |years: &Vec<i32>, out| {
                for year in years {
                    writeln!(out, "{year}")?;
                }
                Ok(())
            })
        }
        ReportCommand::Recent { days } => {
            let days = store.recent_days(days)?;
            emit(context.json, &days, |days, out| write_days(out, "Recent", days))
        }
        ReportCommand::Lifetime => {
            let totals = store.lifetime_stats()?;
            emit(context.json, &totals, |totals, out| {
                heading(out, "Lifetime")?;
                write_totals(out, totals)
            })
        }
        ReportCommand::Goal { hours } => {
            if let Some(hours) = hours {
                ensure!(
                    hours.is_finite() && hours > 0.,
                    "Goal must be a positive number of hours, got {hours}"
                );
                store.set_setting(DAILY_GOAL_SETTING, &hours.to_string())?;
            }
            let report = GoalReport {
                goal_hours: store.daily_goal_hours()?,
            };
            emit(context.json, &report, |report, out| {
                writeln!(out, "Daily goal {}h", report.goal_hours)
            })
        }
    }
}

fn emit<T: Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce(&T, &mut String) -> std::fmt::Result,
) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(value)?);
    }
    let mut out = String::new();
    text(value, &mut out)?;
    Ok(out.trim_end().to_string())
}

fn heading(out: &mut String, title: &str) -> std::fmt::Result {
    writeln!(out, "{}", Style::new().bold().paint(title))
}

fn write_totals(out: &mut String, totals: &Totals) -> std::fmt::Result {
    writeln!(out, "Screen\t{}", format_duration(totals.screen_time_seconds))?;
    writeln!(out, "Clicks\t{}", totals.mouse_clicks)?;
    writeln!(out, "Keys\t{}", totals.keystrokes)
}

fn write_days(out: &mut String, title: &str, days: &[DailyStat]) -> std::fmt::Result {
    heading(out, title)?;
    for day in days {
        writeln!(
            out,
            "{}\t{}\t{} clicks\t{} keys",
            day.date.format("%a %Y-%m-%d"),
            format_duration(day.totals.screen_time_seconds),
            day.totals.mouse_clicks,
            day.totals.keystrokes
        )?;
    }
    Ok(())
}

/// Most pressed first, equal counts by name.
fn top_keys(keys: impl Iterator<Item = (String, u64)>, limit: usize) -> Vec<KeyCount> {
    let mut keys = keys
        .map(|(key, count)| KeyCount { key, count })
        .collect::<Vec<_>>();
    keys.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    keys.truncate(limit);
    keys
}

pub fn format_duration(seconds: f64) -> String {
    let seconds = seconds.max(0.).round() as i64;
    let (hours, minutes, seconds) = (seconds / 3600, seconds / 60 % 60, seconds % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
