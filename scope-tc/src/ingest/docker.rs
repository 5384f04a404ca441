//! Docker event source backed by the `docker` CLI.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::EventSource;
use crate::store::{ContainerEvent, ContainerState, ContainerStore};

/// Follows `docker events` after an initial sync of existing containers.
///
/// `store` is only read, to find records for containers that disappeared
/// while no event stream was attached.
pub struct DockerEventSource {
    docker_bin: PathBuf,
    store: ContainerStore,
}

impl DockerEventSource {
    pub fn new(docker_bin: impl Into<PathBuf>, store: ContainerStore) -> Self {
        Self {
            docker_bin: docker_bin.into(),
            store,
        }
    }

    /// Emit one event per existing container, and a `Destroyed` event for
    /// every known container docker no longer lists.
    async fn sync(&self, tx: &mpsc::Sender<ContainerEvent>) -> Result<()> {
        let ids = self.output(&["ps", "-aq", "--no-trunc"]).await?;
        let listed: HashSet<&str> = ids
            .lines()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect();

        let gone: Vec<String> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|c| c.state != ContainerState::Destroyed)
            .filter(|c| !listed.contains(c.id.as_str()))
            .map(|c| c.id)
            .collect();
        for id in &gone {
            debug!(container_id = %id, "Container vanished while not watching events");
            if tx
                .send(ContainerEvent::new(id.as_str(), ContainerState::Destroyed))
                .await
                .is_err()
            {
                return Ok(());
            }
        }

        let mut count = 0usize;
        for id in listed {
            let line = match self
                .output(&["inspect", "--format", "{{.State.Status}} {{.State.Pid}}", id])
                .await
            {
                Ok(line) => line,
                Err(e) => {
                    // Removed between `ps` and `inspect`.
                    debug!(container_id = %id, error = %e, "Skipping container during sync");
                    continue;
                }
            };
            let Some((state, pid)) = parse_inspect_line(&line) else {
                warn!(container_id = %id, output = %line.trim(), "Unrecognized inspect output");
                continue;
            };
            let mut event = ContainerEvent::new(id, state);
            event.pid = pid;
            if tx.send(event).await.is_err() {
                return Ok(());
            }
            count += 1;
        }

        info!(containers = count, removed = gone.len(), "Synced existing containers");
        Ok(())
    }

    async fn inspect_pid(&self, id: &str) -> Option<i32> {
        match self
            .output(&["inspect", "--format", "{{.State.Pid}}", id])
            .await
        {
            Ok(out) => out.trim().parse().ok().filter(|pid| *pid > 0),
            Err(e) => {
                warn!(container_id = %id, error = %e, "Failed to inspect container pid");
                None
            }
        }
    }

    async fn output(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.docker_bin)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.docker_bin.display()))?;
        if !output.status.success() {
            bail!(
                "{} {} failed: {}",
                self.docker_bin.display(),
                args.first().unwrap_or(&""),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl EventSource for DockerEventSource {
    fn name(&self) -> &str {
        "docker"
    }

    async fn run(&self, tx: mpsc::Sender<ContainerEvent>) -> Result<()> {
        // Replay from before the sync so nothing between `ps` and the
        // subscription is missed. Duplicates are harmless.
        let since = Utc::now().timestamp().to_string();
        self.sync(&tx).await?;

        let mut child = Command::new(&self.docker_bin)
            .args([
                "events",
                "--since",
                since.as_str(),
                "--format",
                "{{json .}}",
                "--filter",
                "type=container",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {} events", self.docker_bin.display()))?;

        let stdout = child.stdout.take().context("No stdout from docker events")?;
        let mut lines = BufReader::new(stdout).lines();

        while let Some(line) = lines.next_line().await? {
            let Some(mut event) = parse_event_line(&line) else {
                continue;
            };
            if event.state == ContainerState::Running {
                event.pid = self.inspect_pid(&event.id).await;
            }
            if tx.send(event).await.is_err() {
                break;
            }
        }

        if let Ok(status) = child.wait().await {
            debug!(status = %status, "docker events exited");
        }

        Ok(())
    }
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "Action")]
    action: String,
    #[serde(rename = "Actor")]
    actor: RawActor,
    #[serde(rename = "timeNano", default)]
    time_nano: Option<i64>,
}

#[derive(Deserialize)]
struct RawActor {
    #[serde(rename = "ID")]
    id: String,
}

/// Parse one line of `docker events --format '{{json .}}'`.
///
/// Returns `None` for non-container events and for actions that do not
/// change the lifecycle state.
pub fn parse_event_line(line: &str) -> Option<ContainerEvent> {
    let raw: RawEvent = serde_json::from_str(line).ok()?;
    if !raw.kind.is_empty() && raw.kind != "container" {
        return None;
    }
    if raw.actor.id.is_empty() {
        return None;
    }
    let state = state_for_action(&raw.action)?;

    let mut event = ContainerEvent::new(raw.actor.id, state);
    event.observed_at = raw.time_nano.map(DateTime::<Utc>::from_timestamp_nanos);
    Some(event)
}

/// Lifecycle state implied by a docker event action.
pub fn state_for_action(action: &str) -> Option<ContainerState> {
    // exec_start, health_status and friends carry a ": detail" suffix.
    let action = action.split(':').next().unwrap_or_default().trim();
    match action {
        "create" => Some(ContainerState::Created),
        "start" | "restart" | "unpause" => Some(ContainerState::Running),
        // `kill` is sent for any signal and does not mean the container
        // stopped. A real stop is always followed by `die`.
        "die" | "stop" | "pause" => Some(ContainerState::Stopped),
        "destroy" => Some(ContainerState::Destroyed),
        _ => None,
    }
}

/// Lifecycle state for a `docker inspect` `.State.Status` value.
pub fn state_for_status(status: &str) -> Option<ContainerState> {
    match status {
        "created" => Some(ContainerState::Created),
        "running" | "restarting" => Some(ContainerState::Running),
        "paused" | "exited" | "dead" => Some(ContainerState::Stopped),
        "removing" => Some(ContainerState::Destroyed),
        _ => None,
    }
}

fn parse_inspect_line(line: &str) -> Option<(ContainerState, Option<i32>)> {
    let mut parts = line.split_whitespace();
    let state = state_for_status(parts.next()?)?;
    let pid = parts
        .next()
        .and_then(|p| p.parse::<i32>().ok())
        .filter(|pid| *pid > 0);
    Some((state, pid))
}
