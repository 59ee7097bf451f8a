//! Neovim child process behind the [`Engine`] trait

use super::autocmd::LUA_AUTOCMDS;
use super::handler::{AgentHandler, Writer};
use super::{Engine, EngineEvents, StartupReport};
use crate::error::EngineError;
use crate::screen::CellPos;
use async_trait::async_trait;
use nvim_rs::create::tokio as create;
use nvim_rs::{Neovim, UiAttachOptions};
use rmpv::Value;
use std::fmt;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

/// Minimum required Neovim version (major, minor, patch)
const NEOVIM_REQUIRED_VERSION: (u64, u64, u64) = (0, 9, 0);

/// Timeout for a single RPC issued on behalf of a host call
const RPC_TIMEOUT: Duration = Duration::from_secs(2);

/// Neovim version information
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeovimVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl NeovimVersion {
    /// Check if version meets minimum requirements
    pub fn meets_requirement(&self, major: u64, minor: u64, patch: u64) -> bool {
        (self.major, self.minor, self.patch) >= (major, minor, patch)
    }
}

impl fmt::Display for NeovimVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Engine backed by `nvim --embed`
pub struct NeovimEngine {
    nvim_path: String,
    /// Start Neovim with --clean flag (no plugins or user config)
    clean: bool,
    neovim: Option<Neovim<Writer>>,
    child: Option<Child>,
    /// Waits for the IO loop to end and reports the exit to the engine loop
    exit_watch: Option<JoinHandle<()>>,
}

impl NeovimEngine {
    pub fn new(nvim_path: impl Into<String>, clean: bool) -> Self {
        Self {
            nvim_path: nvim_path.into(),
            clean,
            neovim: None,
            child: None,
            exit_watch: None,
        }
    }

    fn neovim(&self) -> Result<&Neovim<Writer>, EngineError> {
        self.neovim.as_ref().ok_or(EngineError::NotStarted)
    }

    async fn command(&self, cmd: &str) -> Result<(), EngineError> {
        let neovim = self.neovim()?;
        rpc(neovim.command(cmd)).await
    }
}

/// Run one RPC with the call timeout, flattening its error
async fn rpc<T, E, F>(future: F) -> Result<T, EngineError>
where
    F: std::future::Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    match tokio::time::timeout(RPC_TIMEOUT, future).await {
        Ok(result) => result.map_err(|e| EngineError::Rpc(e.to_string())),
        Err(_) => Err(EngineError::Rpc("timed out".to_string())),
    }
}

#[async_trait]
impl Engine for NeovimEngine {
    async fn start(
        &mut self,
        width: u32,
        height: u32,
        args: &[String],
        events: EngineEvents,
    ) -> Result<StartupReport, EngineError> {
        if self.neovim.is_some() {
            return Err(EngineError::AlreadyStarted);
        }

        tracing::info!(
            nvim = %self.nvim_path,
            clean = self.clean,
            width,
            height,
            ?args,
            "starting neovim"
        );

        let mut cmd = create_nvim_command(&self.nvim_path, self.clean, args);
        let handler = AgentHandler::new(events.clone());
        let (neovim, io_handler, child) = create::new_child_cmd(&mut cmd, handler).await?;

        let exit_watch = tokio::spawn(async move {
            match io_handler.await {
                Ok(Ok(())) => tracing::info!("neovim io loop finished"),
                Ok(Err(e)) => tracing::info!(error = %e, "neovim io loop ended"),
                Err(e) => tracing::debug!(error = %e, "neovim io task aborted"),
            }
            events.exited();
        });

        let mut report = StartupReport::default();

        let mut ui_opts = UiAttachOptions::new();
        ui_opts.set_rgb(true);
        ui_opts.set_linegrid_external(true);
        neovim
            .ui_attach(i64::from(width), i64::from(height), &ui_opts)
            .await
            .map_err(|e| EngineError::Rpc(format!("Failed to attach UI: {}", e)))?;
        tracing::debug!("UI attached");

        let channel = match neovim.get_api_info().await {
            Ok(info) => {
                let version = parse_version(&info);
                check_version(version.as_ref(), &mut report);
                info.first().and_then(|v| v.as_i64())
            }
            Err(e) => {
                report.diagnostics.push(format!("Failed to query api info: {}", e));
                None
            }
        };

        match channel {
            Some(channel) => {
                if let Err(e) = neovim.exec_lua(LUA_AUTOCMDS, vec![Value::from(channel)]).await {
                    report
                        .diagnostics
                        .push(format!("Failed to install autocommands: {}", e));
                }
            }
            None => report
                .diagnostics
                .push("Unknown rpc channel, autocommands disabled".to_string()),
        }

        for diagnostic in &report.diagnostics {
            tracing::warn!(%diagnostic, "neovim startup");
        }

        self.neovim = Some(neovim);
        self.child = Some(child);
        self.exit_watch = Some(exit_watch);
        Ok(report)
    }

    async fn input(&mut self, keys: &str) -> Result<(), EngineError> {
        if keys.is_empty() {
            return Ok(());
        }
        let neovim = self.neovim()?;
        // nvim_input returns bytes written, but we only care about success
        rpc(neovim.input(keys)).await.map(|_| ())
    }

    async fn resize(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        let neovim = self.neovim()?;
        rpc(neovim.ui_try_resize(i64::from(width), i64::from(height))).await
    }

    async fn scroll(
        &mut self,
        horizontal: i32,
        vertical: i32,
        row: u32,
        col: u32,
    ) -> Result<(), EngineError> {
        let neovim = self.neovim()?;
        let steps = [
            (vertical, "down", "up"),
            (horizontal, "right", "left"),
        ];
        for (delta, positive, negative) in steps {
            let action = if delta > 0 { positive } else { negative };
            for _ in 0..delta.unsigned_abs() {
                rpc(neovim.input_mouse("wheel", action, "", 0, i64::from(row), i64::from(col)))
                    .await?;
            }
        }
        Ok(())
    }

    async fn refresh(&mut self) -> Result<(), EngineError> {
        self.command("redraw").await
    }

    async fn focus(&mut self, gained: bool) -> Result<(), EngineError> {
        let event = if gained { "FocusGained" } else { "FocusLost" };
        self.command(&format!("doautoall <nomodeline> {}", event)).await
    }

    async fn cursor(&mut self) -> Result<CellPos, EngineError> {
        let neovim = self.neovim()?;
        let window = rpc(neovim.get_current_win()).await?;
        let (line, col) = rpc(window.get_cursor()).await?;
        Ok(CellPos::new(
            line.saturating_sub(1).max(0) as u32,
            col.max(0) as u32,
        ))
    }

    async fn stop(&mut self) {
        // Clear the neovim instance without sending quit command
        self.neovim = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                tracing::debug!(error = %e, "neovim already gone");
            }
        }
        if let Some(handle) = self.exit_watch.take() {
            handle.abort();
        }
        tracing::info!("neovim stopped");
    }
}

impl Drop for NeovimEngine {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
    }
}

/// Create Neovim command with platform-specific settings
fn create_nvim_command(nvim_path: &str, clean: bool, extra_args: &[String]) -> Command {
    let mut cmd = Command::new(nvim_path);
    cmd.arg("--embed");
    if clean {
        cmd.arg("--clean");
    }
    cmd.args(extra_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Pull the version out of `nvim_get_api_info`
///
/// API info is `[channel_id, {version: {...}, functions: [...], ...}]`.
fn parse_version(api_info: &[Value]) -> Option<NeovimVersion> {
    let info_map = api_info.get(1)?.as_map()?;
    let (_, version) = info_map
        .iter()
        .find(|(key, _)| key.as_str() == Some("version"))?;

    let mut parsed = NeovimVersion::default();
    for (key, value) in version.as_map()? {
        match key.as_str() {
            Some("major") => parsed.major = value.as_u64().unwrap_or(0),
            Some("minor") => parsed.minor = value.as_u64().unwrap_or(0),
            Some("patch") => parsed.patch = value.as_u64().unwrap_or(0),
            _ => {}
        }
    }
    Some(parsed)
}

fn check_version(version: Option<&NeovimVersion>, report: &mut StartupReport) {
    let (major, minor, patch) = NEOVIM_REQUIRED_VERSION;
    match version {
        Some(version) => {
            tracing::info!(%version, "neovim version");
            if !version.meets_requirement(major, minor, patch) {
                report.diagnostics.push(format!(
                    "Neovim version {} is below minimum required {}.{}.{}",
                    version, major, minor, patch
                ));
            }
        }
        None => tracing::debug!("could not determine neovim version"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_info(major: u64, minor: u64, patch: u64) -> Vec<Value> {
        vec![
            Value::from(3),
            Value::Map(vec![(
                Value::from("version"),
                Value::Map(vec![
                    (Value::from("major"), Value::from(major)),
                    (Value::from("minor"), Value::from(minor)),
                    (Value::from("patch"), Value::from(patch)),
                ]),
            )]),
        ]
    }

    #[test]
    fn test_meets_requirement() {
        let v = NeovimVersion {
            major: 0,
            minor: 10,
            patch: 1,
        };
        assert!(v.meets_requirement(0, 9, 0));
        assert!(v.meets_requirement(0, 10, 1));
        assert!(!v.meets_requirement(0, 10, 2));
        assert!(!v.meets_requirement(1, 0, 0));
    }

    #[test]
    fn test_parse_version_from_api_info() {
        assert_eq!(
            parse_version(&api_info(0, 10, 2)),
            Some(NeovimVersion {
                major: 0,
                minor: 10,
                patch: 2
            })
        );
        assert_eq!(parse_version(&[Value::from(1)]), None);
    }

    #[test]
    fn test_old_version_is_a_startup_diagnostic() {
        let mut report = StartupReport::default();
        check_version(parse_version(&api_info(0, 8, 3)).as_ref(), &mut report);
        assert!(report.has_errors());

        let mut report = StartupReport::default();
        check_version(parse_version(&api_info(0, 9, 5)).as_ref(), &mut report);
        assert!(!report.has_errors());
    }

    #[tokio::test]
    async fn test_calls_before_start_fail() {
        let mut engine = NeovimEngine::new("nvim", true);
        assert!(matches!(
            engine.input("x").await,
            Err(EngineError::NotStarted)
        ));
        assert!(matches!(engine.cursor().await, Err(EngineError::NotStarted)));
        // Stopping an engine that never started is fine
        engine.stop().await;
    }
}
