use std::{sync::Arc, thread, time::Duration};

use anyhow::Result;
use rdev::{listen, Event, EventType};
use tracing::{error, info};

use super::{counter::EventCounter, keys::rdev_key_name};

const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Starts the global input hook on its own OS thread. The hook blocks forever, so the thread is
/// detached and dies with the process.
pub fn spawn_input_hook(counter: Arc<EventCounter>) -> Result<thread::JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("input-hook".into())
        .spawn(move || loop {
            let hook_counter = counter.clone();
            info!("Starting input hook");
            match listen(move |event| dispatch(&hook_counter, &event)) {
                Ok(()) => break,
                Err(e) => {
                    error!("Input hook failed {e:?}, retrying in {RETRY_DELAY:?}");
                    thread::sleep(RETRY_DELAY);
                }
            }
        })?;
    Ok(handle)
}

/// Only presses are counted. Releases, moves and wheel events are ignored.
fn dispatch(counter: &EventCounter, event: &Event) {
    match event.event_type {
        EventType::KeyPress(key) => {
            counter.on_key_press(&rdev_key_name(key, event.name.as_deref()))
        }
        EventType::ButtonPress(_) => counter.on_click(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use rdev::{Button, Key};

    use super::*;

    fn event(event_type: EventType, name: Option<&str>) -> Event {
        Event {
            time: SystemTime::now(),
            name: name.map(str::to_string),
            event_type,
        }
    }

    #[test]
    fn presses_are_counted() {
        let counter = EventCounter::new();
        dispatch(&counter, &event(EventType::KeyPress(Key::KeyH), Some("h")));
        dispatch(&counter, &event(EventType::KeyPress(Key::Space), Some(" ")));
        dispatch(&counter, &event(EventType::ButtonPress(Button::Left), None));

        let drained = counter.take_and_reset();
        assert_eq!(drained.clicks, 1);
        assert_eq!(drained.keystrokes, 2);
        assert_eq!(drained.per_key.get("H"), Some(&1));
        assert_eq!(drained.per_key.get("SPACE"), Some(&1));
    }

    #[test]
    fn releases_and_motion_are_ignored() {
        let counter = EventCounter::new();
        dispatch(&counter, &event(EventType::KeyRelease(Key::KeyH), None));
        dispatch(&counter, &event(EventType::ButtonRelease(Button::Left), None));
        dispatch(&counter, &event(EventType::MouseMove { x: 1., y: 2. }, None));
        dispatch(
            &counter,
            &event(
                EventType::Wheel {
                    delta_x: 0,
                    delta_y: 1,
                },
                None,
            ),
        );
        assert!(counter.take_and_reset().is_empty());
    }
}
