/// Decides whether a sampling interval counts as screen time.
pub struct ActivityEvaluator {
    threshold_s: f64,
}

impl ActivityEvaluator {
    pub fn from_seconds(threshold_s: f64) -> Self {
        Self { threshold_s }
    }

    /// Any input during the interval makes it active even if the OS idle timer says otherwise.
    /// A failed idle query is passed in as infinity.
    pub fn is_active(&self, clicks: u64, keystrokes: u64, idle_seconds: f64) -> bool {
        clicks > 0 || keystrokes > 0 || idle_seconds < self.threshold_s
    }
}

#[cfg(test)]
mod tests {
    use super::ActivityEvaluator;

    #[test]
    fn recent_input_is_active() {
        let evaluator = ActivityEvaluator::from_seconds(300.);
        assert!(evaluator.is_active(0, 0, 12.));
        assert!(!evaluator.is_active(0, 0, 300.));
        assert!(!evaluator.is_active(0, 0, f64::INFINITY));
    }

    #[test]
    fn counted_input_overrides_idle_timer() {
        let evaluator = ActivityEvaluator::from_seconds(300.);
        assert!(evaluator.is_active(1, 0, 600.));
        assert!(evaluator.is_active(0, 3, f64::INFINITY));
    }
}
