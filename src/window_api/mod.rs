//! Contains the two OS signals the sampler consults every tick: time since the last user input
//! and the process owning the foreground window. [GenericWindowManager] is the main artifact of
//! this module that abstracts the operations.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use anyhow::Result;

/// Seconds elapsed since the last OS-level input. An error is treated by callers as "idle
/// forever".
#[cfg_attr(test, mockall::automock)]
pub trait IdleSource: Send + Sync {
    fn seconds_since_last_input(&self) -> Result<f64>;
}

/// Name of the process owning the foreground window, for example `code.exe` or `firefox`.
#[cfg_attr(test, mockall::automock)]
pub trait ForegroundAppSource: Send + Sync {
    fn current_foreground_process_name(&self) -> Result<Option<String>>;
}

/// Serves as a cross-compatible implementation of both sources.
pub struct GenericWindowManager {
    inner: Box<dyn PlatformWindowManager>,
}

/// Intended to serve as a contract windows and linux systems must implement.
trait PlatformWindowManager: IdleSource + ForegroundAppSource {}

impl<T: IdleSource + ForegroundAppSource> PlatformWindowManager for T {}

impl GenericWindowManager {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WindowsWindowManager;
                Ok(Self {
                    inner: Box::new(WindowsWindowManager::new()),
                })
            }
            else if #[cfg(feature = "x11")] {
                use x11::LinuxWindowManager;
                Ok(Self {
                    inner: Box::new(LinuxWindowManager::new()?),
                })
            }
            else {
                Err(anyhow::anyhow!("No window manager backend was compiled in"))
            }
        }
    }
}

impl IdleSource for GenericWindowManager {
    fn seconds_since_last_input(&self) -> Result<f64> {
        self.inner.seconds_since_last_input()
    }
}

impl ForegroundAppSource for GenericWindowManager {
    fn current_foreground_process_name(&self) -> Result<Option<String>> {
        self.inner.current_foreground_process_name()
    }
}

/// Used when no backend is available. App attribution is simply skipped.
pub struct NoForegroundApp;

impl ForegroundAppSource for NoForegroundApp {
    fn current_foreground_process_name(&self) -> Result<Option<String>> {
        Ok(None)
    }
}
