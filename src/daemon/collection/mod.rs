//! Everything between the OS input hook and the tick channel. The hook thread feeds an
//! [counter::EventCounter] and the [scheduler::SamplingScheduler] drains it once per interval.

pub mod activity;
pub mod counter;
pub mod input_hook;
pub mod keys;
pub mod scheduler;
