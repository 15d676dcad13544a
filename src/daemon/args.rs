use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
pub struct DaemonArgs {
    /// Stay in the foreground instead of detaching.
    #[arg(long)]
    pub force: bool,
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
    /// Seconds between samples. Overrides config.json.
    #[arg(long)]
    pub interval: Option<f64>,
    /// Seconds without input after which the screen counts as unattended. Overrides config.json.
    #[arg(long = "idle-threshold")]
    pub idle_threshold: Option<f64>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::DaemonArgs;

    #[test]
    fn parses_sampling_overrides() {
        let args = DaemonArgs::parse_from([
            "dailygrid-daemon",
            "--force",
            "--interval",
            "5",
            "--idle-threshold",
            "120.5",
            "--log-filter",
            "debug",
        ]);
        assert!(args.force);
        assert_eq!(args.interval, Some(5.));
        assert_eq!(args.idle_threshold, Some(120.5));
        assert!(args.dir.is_none());
    }
}
