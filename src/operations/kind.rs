// Operation kinds - which external commands each server operation runs

use crate::config::{BackupConfig, OperationsConfig};
use crate::instances::ServerTarget;
use crate::operations::process::CommandSpec;
use crate::operations::OperationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Start,
    Stop,
    Restart,
    Backup,
    Update,
}

/// What runs after the primary command exits cleanly
#[derive(Debug, Clone, PartialEq)]
pub enum FollowUp {
    None,
    /// Stream recent service journal lines
    Journal(CommandSpec),
    /// Report the newest archive in this directory
    ReportArchive(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationPlan {
    pub kind: OperationKind,
    /// Lines logged before the primary command starts
    pub banner: Vec<String>,
    pub primary: CommandSpec,
    /// Logged once the primary command exits with code 0
    pub success_log: String,
    pub follow_up: FollowUp,
    pub success_message: String,
    pub failure_message: String,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Start => "start",
            OperationKind::Stop => "stop",
            OperationKind::Restart => "restart",
            OperationKind::Backup => "backup",
            OperationKind::Update => "update",
        }
    }

    pub fn plan(
        self,
        target: &ServerTarget,
        ops: &OperationsConfig,
        backups: &BackupConfig,
    ) -> Result<OperationPlan, OperationError> {
        let plan = match self {
            OperationKind::Start | OperationKind::Stop | OperationKind::Restart => {
                let banner = match self {
                    OperationKind::Start => "🚀 Starting Project Zomboid server...",
                    OperationKind::Stop => "🛑 Stopping Project Zomboid server...",
                    _ => "🔄 Restarting Project Zomboid server...",
                };
                let primary = privileged(
                    ops,
                    &ops.systemctl,
                    [self.as_str(), target.service_name.as_str()],
                );
                let journal = privileged(
                    ops,
                    &ops.journalctl,
                    [
                        "-u".to_string(),
                        target.service_name.clone(),
                        "-n".to_string(),
                        ops.journal_lines.to_string(),
                        "--no-pager".to_string(),
                    ],
                );

                OperationPlan {
                    kind: self,
                    banner: vec![banner.to_string()],
                    primary,
                    success_log: "✅ Command executed successfully (exit code: 0)".to_string(),
                    follow_up: FollowUp::Journal(journal),
                    success_message: format!("Server {} completed successfully", self),
                    failure_message: format!("Server {} failed", self),
                }
            }
            OperationKind::Update => {
                let install_dir = target.install_dir.to_string_lossy().to_string();
                let primary = CommandSpec::new(
                    ops.steamcmd.clone(),
                    [
                        "+login".to_string(),
                        "anonymous".to_string(),
                        "+force_install_dir".to_string(),
                        install_dir,
                        "+app_update".to_string(),
                        ops.steam_app_id.to_string(),
                        "validate".to_string(),
                        "+quit".to_string(),
                    ],
                );

                OperationPlan {
                    kind: self,
                    banner: vec![
                        "📥 Starting SteamCMD update...".to_string(),
                        format!("Command: {}", primary.display()),
                    ],
                    primary,
                    success_log: "✅ Update completed successfully".to_string(),
                    follow_up: FollowUp::None,
                    success_message: "Server updated successfully".to_string(),
                    failure_message: "Update failed".to_string(),
                }
            }
            OperationKind::Backup => OperationPlan {
                kind: self,
                banner: vec!["💾 Starting backup process...".to_string()],
                primary: CommandSpec::parse(&backups.command)?,
                success_log: "✅ Backup script finished".to_string(),
                follow_up: FollowUp::ReportArchive(backups.dir.clone()),
                success_message: "Backup created successfully".to_string(),
                failure_message: "Backup failed".to_string(),
            },
        };

        Ok(plan)
    }
}

fn privileged<I, S>(ops: &OperationsConfig, program: &str, args: I) -> CommandSpec
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    if ops.use_sudo {
        CommandSpec::new("sudo", std::iter::once(program.to_string()).chain(args))
    } else {
        CommandSpec::new(program, args)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = OperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(OperationKind::Start),
            "stop" => Ok(OperationKind::Stop),
            "restart" => Ok(OperationKind::Restart),
            "backup" => Ok(OperationKind::Backup),
            "update" => Ok(OperationKind::Update),
            other => Err(OperationError::UnknownOperation(other.to_string())),
        }
    }
}
