pub mod daemon_path;
pub mod process;
pub mod report;

use std::{env, path::PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use daemon_path::to_daemon_path;
use process::{restart_server, stop_servers};
use report::{render_report, DateStyle, ReportCommand, ReportContext};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{
        config::SamplingConfig, start_daemon, storage::aggregation_store::SqliteAggregationStore,
    },
    utils::{
        clock::DefaultClock,
        dir::{create_application_default_path, DATABASE_FILE_NAME},
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "dailygrid", version, long_about = None)]
#[command(about = "Daily screen time, input and app statistics", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(long, global = true, help = "Print reports as JSON")]
    json: bool,
    #[arg(
        long,
        global = true,
        default_value_t = DateStyle::Uk,
        help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year"
    )]
    date_style: DateStyle,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Starts a daemon for the application, replacing a running one")]
    Init {},
    #[command(about = "Run a daemon directly in current console. Used for debugging")]
    Serve {
        #[arg(long, help = "Seconds between samples")]
        interval: Option<f64>,
        #[arg(
            long = "idle-threshold",
            help = "Seconds without input before the screen counts as unattended"
        )]
        idle_threshold: Option<f64>,
    },
    #[command(about = "Stop currently running daemon.")]
    Stop {},
    #[command(flatten)]
    Report(ReportCommand),
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();
    let app_dir = args
        .dir
        .clone()
        .map_or_else(create_application_default_path, Ok)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir.join("logs"), logging_level, args.log)?;

    match args.commands {
        Commands::Init {} => restart_server(args.dir.as_deref()),
        Commands::Stop {} => {
            let stopped = stop_servers(&to_daemon_path(env::current_exe()?))?;
            println!("Stopped {stopped} daemon(s)");
            Ok(())
        }
        Commands::Serve {
            interval,
            idle_threshold,
        } => {
            let config = SamplingConfig::load(&app_dir)?.with_overrides(interval, idle_threshold);
            start_daemon(app_dir, config).await
        }
        Commands::Report(command) => {
            let store = SqliteAggregationStore::open(
                &app_dir.join(DATABASE_FILE_NAME),
                Box::new(DefaultClock),
            )?;
            let context = ReportContext {
                clock: &DefaultClock,
                date_style: args.date_style,
                json: args.json,
            };
            println!("{}", render_report(command, &store, &context)?);
            Ok(())
        }
    }
}
