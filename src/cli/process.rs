use std::{
    env,
    path::Path,
    process::{Command, Stdio},
};

use anyhow::{anyhow, Result};
use sysinfo::{get_current_pid, Signal, System};
use tracing::info;

use super::daemon_path::to_daemon_path;

/// Stops every process started from `executable` except this one and its children. Returns how
/// many were stopped.
pub fn stop_servers(executable: &Path) -> Result<usize> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Can't get own pid {e}"))?;
    let mut stopped = 0;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if process
            .exe()
            .filter(|v| v.exists())
            .filter(|v| executable == *v)
            .is_some()
        {
            info!("Stopping daemon {pid}");
            // SIGTERM lets the daemon finish its last tick. Windows has no such thing, there this
            // terminates the process.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
            stopped += 1;
        }
    }
    Ok(stopped)
}

/// Shuts down previous daemons and starts a new one. The daemon binary detaches on its own.
pub fn restart_server(dir: Option<&Path>) -> Result<()> {
    let daemon = to_daemon_path(env::current_exe()?);
    if !daemon.exists() {
        return Err(anyhow!("Daemon binary is missing at {}", daemon.display()));
    }
    let stopped = stop_servers(&daemon)?;
    if stopped > 0 {
        println!("Stopped {stopped} running daemon(s)");
    }

    let mut command = Command::new(&daemon);
    if let Some(dir) = dir {
        command.arg("--dir").arg(dir);
    }
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());

    #[cfg(feature = "win")]
    {
        use std::os::windows::process::CommandExt;
        use windows::Win32::System::Threading::DETACHED_PROCESS;
        command.creation_flags(DETACHED_PROCESS.0);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    // On unix the launched process only forks and exits, so waiting doesn't block.
    #[cfg(unix)]
    {
        let status = command.status()?;
        if !status.success() {
            return Err(anyhow!("Daemon failed to start {status}"));
        }
    }
    #[cfg(not(unix))]
    {
        #[allow(clippy::zombie_processes)]
        let _ = command.spawn()?;
    }
    println!("Started {}", daemon.display());
    Ok(())
}
