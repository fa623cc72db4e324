//! Gateway child process: started with the routing config, stopped before every rebuild.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use super::{GatewayLaunch, InitError};

/// Environment variable the gateway reads its ClickHouse URL from.
pub const STORAGE_URL_ENV: &str = "TENSORZERO_CLICKHOUSE_URL";

/// A running gateway we started. Killed when stopped or dropped.
#[derive(Debug)]
pub struct GatewayProcess {
    child: Child,
    command: PathBuf,
}

impl GatewayProcess {
    /// Run `<command> <args..> --config-file <config_path>` with the storage URL in its environment.
    /// Output lines are forwarded to the log.
    pub fn spawn(launch: &GatewayLaunch, config_path: &Path, storage_url: &str) -> Result<Self, InitError> {
        let mut child = Command::new(&launch.command)
            .args(&launch.args)
            .arg("--config-file")
            .arg(config_path)
            .env(STORAGE_URL_ENV, storage_url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InitError::Spawn {
                command: launch.command.clone(),
                source,
            })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr));
        }
        log::info!(
            "started gateway {} (pid {:?}) with {}",
            launch.command.display(),
            child.id(),
            config_path.display()
        );
        Ok(Self {
            child,
            command: launch.command.clone(),
        })
    }

    /// Fails with `GatewayExited` once the process has stopped on its own.
    pub fn check_running(&mut self) -> Result<(), InitError> {
        match self.child.try_wait() {
            Ok(None) => Ok(()),
            Ok(Some(status)) => Err(InitError::GatewayExited {
                command: self.command.clone(),
                status: status.to_string(),
            }),
            Err(e) => Err(InitError::GatewayExited {
                command: self.command.clone(),
                status: e.to_string(),
            }),
        }
    }

    /// Kill the process and wait for it, so its port is free for the next start.
    pub async fn stop(mut self) {
        if let Err(e) = self.child.kill().await {
            log::warn!("stopping gateway {}: {}", self.command.display(), e);
            return;
        }
        log::info!("stopped gateway {}", self.command.display());
    }
}

async fn forward_lines<R: AsyncRead + Unpin>(reader: R) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        log::debug!("[gateway] {}", line);
    }
}
