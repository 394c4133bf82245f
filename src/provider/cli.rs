//! Subprocess-backed CLI agent backends.
//!
//! Each call spawns one external process with the prompt as its final
//! argument and captures stdout. `kill_on_drop` guarantees a hung agent is
//! terminated when the timeout elapses; no process state survives between
//! calls.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{ProviderClass, ProviderError, ProviderId, TranslationBackend};
use crate::config::CliConfig;

/// A local CLI agent invoked as a subprocess.
#[derive(Debug, Clone)]
pub struct CliAgentBackend {
    id: ProviderId,
    program: String,
    args: Vec<&'static str>,
}

impl CliAgentBackend {
    /// Claude CLI agent (`claude -p <prompt>`).
    pub fn claude(config: &CliConfig) -> Self {
        Self {
            id: ProviderId::Claude,
            program: config.claude_binary.clone(),
            args: vec!["-p"],
        }
    }

    /// Cursor CLI agent (`cursor-agent --print --force <prompt>`).
    pub fn cursor_agent(config: &CliConfig) -> Self {
        Self {
            id: ProviderId::CursorAgent,
            program: config.cursor_agent_binary.clone(),
            args: vec!["--print", "--force"],
        }
    }

    async fn run(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError> {
        if !self.is_available() {
            return Err(ProviderError::Unavailable(self.id));
        }

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProviderError::Unavailable(self.id)
            } else {
                ProviderError::Backend(self.id, format!("failed to spawn {}: {e}", self.program))
            }
        })?;

        // Dropping the unfinished future kills the child via kill_on_drop.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ProviderError::Backend(
                    self.id,
                    format!("failed to collect output: {e}"),
                ));
            }
            Err(_) => return Err(ProviderError::Timeout(self.id, timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::Backend(
                self.id,
                format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            return Err(ProviderError::Backend(
                self.id,
                "empty response".to_string(),
            ));
        }
        Ok(stdout)
    }
}

#[async_trait]
impl TranslationBackend for CliAgentBackend {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn class(&self) -> ProviderClass {
        ProviderClass::CliAgent
    }

    fn is_available(&self) -> bool {
        binary_on_path(&self.program)
    }

    async fn translate(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError> {
        self.run(prompt, timeout).await
    }

    async fn label(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError> {
        self.run(prompt, timeout).await
    }
}

/// Whether a binary resolves on `PATH` (absolute paths are checked directly).
fn binary_on_path(program: &str) -> bool {
    let candidate = Path::new(program);
    if candidate.is_absolute() {
        return candidate.is_file();
    }
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}
