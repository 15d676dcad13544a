use anyhow::{anyhow, Result};
use sysinfo::{Pid, System};
use tracing::instrument;
use xcb::{
    Connection, Xid,
    screensaver::{QueryInfo, QueryInfoReply},
    x::{ATOM_ANY, Atom, Drawable, GetProperty, InternAtom, Window},
};

use super::{ForegroundAppSource, IdleSource};

fn intern_atom(conn: &Connection, name: &[u8]) -> Result<Atom> {
    let reply = conn.wait_for_reply(conn.send_request(&InternAtom {
        only_if_exists: false,
        name,
    }))?;
    Ok(reply.atom())
}

fn get_pid(conn: &Connection, window: Window, pid_atom: Atom) -> Result<Option<u32>> {
    let result = conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window,
        property: pid_atom,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length: 1,
    }))?;
    Ok(result.value::<u32>().first().copied())
}

/// Executable file name, e.g. `firefox`.
fn get_process_name(id: u32) -> Option<String> {
    let system = System::new_all();
    let process = system.process(Pid::from_u32(id))?;
    process
        .exe()
        .and_then(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
}

fn get_active_window(
    conn: &Connection,
    root: Window,
    active_window_atom: Atom,
) -> Result<Option<Window>> {
    let result = conn.wait_for_reply(conn.send_request(&GetProperty {
        delete: false,
        window: root,
        property: active_window_atom,
        r#type: ATOM_ANY,
        long_offset: 0,
        long_length: 1,
    }))?;
    Ok(result
        .value::<Window>()
        .first()
        .copied()
        .filter(|window| *window != Window::none()))
}

pub struct LinuxWindowManager {
    connection: Connection,
    preferred_screen: usize,
    active_window_atom: Atom,
    pid_atom: Atom,
}

impl LinuxWindowManager {
    pub fn new() -> Result<Self> {
        let (connection, preferred_screen) = xcb::Connection::connect(None)?;
        let active_window_atom = intern_atom(&connection, b"_NET_ACTIVE_WINDOW")?;
        let pid_atom = intern_atom(&connection, b"_NET_WM_PID")?;
        Ok(Self {
            connection,
            preferred_screen: preferred_screen.max(0) as usize,
            active_window_atom,
            pid_atom,
        })
    }

    // Currently the application only supports 1 x11 screen.
    fn root(&self) -> Result<Window> {
        self.connection
            .get_setup()
            .roots()
            .nth(self.preferred_screen)
            .map(|screen| screen.root())
            .ok_or_else(|| anyhow!("X11 screen {} is missing", self.preferred_screen))
    }
}

impl ForegroundAppSource for LinuxWindowManager {
    #[instrument(skip(self))]
    fn current_foreground_process_name(&self) -> Result<Option<String>> {
        let Some(active_window) =
            get_active_window(&self.connection, self.root()?, self.active_window_atom)?
        else {
            return Ok(None);
        };
        let Some(pid) = get_pid(&self.connection, active_window, self.pid_atom)? else {
            return Ok(None);
        };
        Ok(get_process_name(pid))
    }
}

impl IdleSource for LinuxWindowManager {
    #[instrument(skip(self))]
    fn seconds_since_last_input(&self) -> Result<f64> {
        let idle = self.connection.send_request(&QueryInfo {
            drawable: Drawable::Window(self.root()?),
        });
        let reply: QueryInfoReply = self.connection.wait_for_reply(idle)?;
        Ok(f64::from(reply.ms_since_user_input()) / 1000.)
    }
}
