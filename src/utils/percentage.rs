use std::{fmt::Display, ops::Deref};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0}%", self.0)
    }
}

impl Percentage {
    pub fn new_opt(value: f64) -> Option<Percentage> {
        if value < 0. || !value.is_finite() {
            None
        } else {
            Some(Percentage(value))
        }
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Share of the daily goal reached. A goal that isn't positive can't be reached, so it yields
/// `None`.
pub fn goal_percentage(screen_time_seconds: f64, goal_hours: f64) -> Option<Percentage> {
    if goal_hours <= 0. {
        return None;
    }
    Percentage::new_opt(screen_time_seconds / (goal_hours * 3600.) * 100.)
}
