//! Daemon and cli that turn desktop input into screen time, click, keystroke, per-app and per-key
//! statistics kept in a local SQLite database. The daemon samples activity on a fixed interval,
//! the cli reads the aggregates back as daily, hourly, weekly, monthly and yearly reports.
//!

pub mod cli;
pub mod daemon;
pub mod utils;
pub mod window_api;
