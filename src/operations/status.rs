// Service status - systemd state plus uptime and memory of the main process

use crate::config::OperationsConfig;
use crate::instances::ServerTarget;
use crate::operations::process::{capture_stdout, CommandSpec};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub running: bool,
    /// "running", "stopped" or "unknown" when systemctl could not be run
    pub status: String,
    pub pid: Option<u32>,
    /// Elapsed time as printed by `ps`, e.g. "1-02:03:04"
    pub uptime: Option<String>,
    pub memory: Option<String>,
}

impl ServiceStatus {
    fn stopped() -> Self {
        Self {
            running: false,
            status: "stopped".to_string(),
            pid: None,
            uptime: None,
            memory: None,
        }
    }

    fn unknown() -> Self {
        Self {
            status: "unknown".to_string(),
            ..Self::stopped()
        }
    }
}

/// Status queries never use sudo; `is-active` and `show` are unprivileged
pub async fn service_status(target: &ServerTarget, ops: &OperationsConfig) -> ServiceStatus {
    let service = target.service_name.as_str();

    // `is-active` exits non-zero for inactive units; only its output matters
    let is_active = CommandSpec::new(&ops.systemctl, ["is-active", service]);
    let active = match capture_stdout(&is_active).await {
        Ok((_, stdout)) => stdout.trim() == "active",
        Err(e) => {
            tracing::warn!("Cannot query service {}: {}", service, e);
            return ServiceStatus::unknown();
        }
    };
    if !active {
        return ServiceStatus::stopped();
    }

    let show = CommandSpec::new(&ops.systemctl, ["show", service, "--property=MainPID", "--value"]);
    let pid = match capture_stdout(&show).await {
        Ok((_, stdout)) => stdout.trim().parse::<u32>().ok().filter(|pid| *pid != 0),
        Err(e) => {
            tracing::warn!("Cannot read main PID of {}: {}", service, e);
            None
        }
    };
    let Some(pid) = pid else {
        return ServiceStatus::stopped();
    };

    let pid_arg = pid.to_string();
    let ps = CommandSpec::new(&ops.ps, ["-p", pid_arg.as_str(), "-o", "etime=,rss="]);
    let (uptime, memory) = match capture_stdout(&ps).await {
        Ok((_, stdout)) => parse_ps_line(&stdout),
        Err(e) => {
            tracing::debug!("ps failed for pid {}: {}", pid, e);
            (None, None)
        }
    };

    ServiceStatus {
        running: true,
        status: "running".to_string(),
        pid: Some(pid),
        uptime,
        memory,
    }
}

/// Parse `<etime> <rss KiB>` into uptime and memory in whole MB
fn parse_ps_line(line: &str) -> (Option<String>, Option<String>) {
    let mut fields = line.split_whitespace();
    let uptime = fields.next().map(str::to_string);
    let memory = fields
        .next()
        .and_then(|rss| rss.parse::<u64>().ok())
        .map(|kib| (kib + 512) / 1024)
        .filter(|mb| *mb > 0)
        .map(|mb| format!("{} MB", mb));
    (uptime, memory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn target() -> ServerTarget {
        ServerTarget {
            id: "default".to_string(),
            host: "127.0.0.1".to_string(),
            rcon_port: 27015,
            ini_path: None,
            service_name: "pzserver".to_string(),
            install_dir: PathBuf::from("/opt/pzserver"),
            log_path: None,
            maintenance_log_path: None,
        }
    }

    #[cfg(unix)]
    fn fake_tool(name: &str, script: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("pzpanel-status-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_parse_ps_line() {
        assert_eq!(
            parse_ps_line("   01:02:03 2097152\n"),
            (Some("01:02:03".to_string()), Some("2048 MB".to_string()))
        );
        assert_eq!(parse_ps_line(""), (None, None));
        assert_eq!(parse_ps_line("05:00 100"), (Some("05:00".to_string()), None));
    }

    #[tokio::test]
    async fn test_inactive_service_is_stopped() {
        // `echo is-active pzserver` is not "active"
        let ops = OperationsConfig {
            systemctl: "echo".to_string(),
            ..Default::default()
        };
        let status = service_status(&target(), &ops).await;
        assert_eq!(status, ServiceStatus::stopped());
    }

    #[tokio::test]
    async fn test_missing_systemctl_is_unknown() {
        let ops = OperationsConfig {
            systemctl: "/nonexistent/pzpanel-systemctl".to_string(),
            ..Default::default()
        };
        let status = service_status(&target(), &ops).await;
        assert!(!status.running);
        assert_eq!(status.status, "unknown");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_active_service_reports_process() {
        let systemctl = fake_tool(
            "systemctl",
            r#"case "$1" in is-active) echo active ;; show) echo 4242 ;; esac"#,
        );
        let ps = fake_tool("ps", r#"[ "$2" = 4242 ] && echo "  2-03:04:05 1048576""#);
        let ops = OperationsConfig {
            systemctl,
            ps,
            ..Default::default()
        };

        let status = service_status(&target(), &ops).await;
        assert!(status.running);
        assert_eq!(status.status, "running");
        assert_eq!(status.pid, Some(4242));
        assert_eq!(status.uptime.as_deref(), Some("2-03:04:05"));
        assert_eq!(status.memory.as_deref(), Some("1024 MB"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_active_without_main_pid_is_stopped() {
        let systemctl = fake_tool(
            "systemctl",
            r#"case "$1" in is-active) echo active ;; show) echo 0 ;; esac"#,
        );
        let ops = OperationsConfig {
            systemctl,
            ..Default::default()
        };
        assert_eq!(service_status(&target(), &ops).await, ServiceStatus::stopped());
    }
}
