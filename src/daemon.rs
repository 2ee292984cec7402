/// Pidfile-based daemon control for the server role.
use std::{fs, path::Path, process::Command};

use anyhow::{anyhow, bail, Context, Result};
use daemonize::Daemonize;

use crate::{config, server::Server};

const PID_FILE: &str = "envdb.pid";
const LOG_FILE: &str = "envdb.log";

/// Detach and run the server in the background. Refuses to start a second
/// daemon while the pidfile points at a live process.
pub fn start(server: Server, web_port: u16) -> Result<()> {
    let dir = config::data_dir()?;
    let pid_path = dir.join(PID_FILE);

    if let Some(pid) = read_pid(&pid_path)? {
        if process_alive(pid) {
            bail!("server is already running (pid {})", pid);
        }
        log::debug!("removing stale pid file for pid {}", pid);
        fs::remove_file(&pid_path)
            .with_context(|| format!("failed to remove stale pid file {}", pid_path.display()))?;
    }

    let log_path = dir.join(LOG_FILE);
    let stdout = fs::File::create(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;
    let stderr = stdout.try_clone().context("failed to clone log file handle")?;

    println!(
        "🚀 Starting server on port {} (log: {})",
        server.port(),
        log_path.display()
    );

    Daemonize::new()
        .pid_file(&pid_path)
        .working_directory(&dir)
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("failed to daemonize")?;

    // From here on we are the detached child. The runtime must not exist
    // before the fork.
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    rt.block_on(server.run(web_port))
}

/// Stop the daemonized server via its pidfile.
pub fn stop() -> Result<()> {
    let pid_path = config::data_dir()?.join(PID_FILE);

    let pid = read_pid(&pid_path)?
        .ok_or_else(|| anyhow!("server is not running (no pid file at {})", pid_path.display()))?;

    let status = Command::new("kill")
        .arg(pid.to_string())
        .status()
        .context("failed to run kill")?;

    if !status.success() {
        bail!("failed to stop server process {}", pid);
    }

    fs::remove_file(&pid_path)
        .with_context(|| format!("failed to remove pid file {}", pid_path.display()))?;

    println!("Server stopped (pid {}).", pid);
    Ok(())
}

/// Report whether the daemonized server is running. Mutates nothing.
pub fn status() -> Result<()> {
    let pid_path = config::data_dir()?.join(PID_FILE);

    match read_pid(&pid_path)? {
        Some(pid) if process_alive(pid) => println!("✅ Server is running (pid {}).", pid),
        Some(pid) => println!("❌ Server is not running (stale pid file, pid {}).", pid),
        None => println!("❌ Server is not running."),
    }

    Ok(())
}

fn read_pid(path: &Path) -> Result<Option<i32>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let pid = contents
        .trim()
        .parse()
        .with_context(|| format!("pid file {} is corrupt", path.display()))?;

    Ok(Some(pid))
}

fn process_alive(pid: i32) -> bool {
    Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
