//! Helper-process bridge: one child process per call.
//!
//! The request is JSON passed as the final argument. The helper prints its
//! result on stdout and reports failure with a non-zero exit status.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::bridge::{Bridge, BridgeConfig, BridgeRequest, PollResult};
use crate::error::BridgeError;

/// Bridge implementation that shells out to a helper program.
///
/// Holds no connection and no state between calls.
#[derive(Debug, Clone)]
pub struct HelperBridge {
    config: BridgeConfig,
}

impl HelperBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    /// Run the helper once and return its stdout.
    async fn invoke(&self, request: &BridgeRequest<'_>) -> Result<String, BridgeError> {
        let payload = serde_json::to_string(request)?;

        let mut command = Command::new(&self.config.program);
        if let Some(script) = &self.config.script {
            command.arg(script);
        }
        command
            .arg(&payload)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(action = request.action(), program = %self.config.program, "Invoking bridge helper");

        let output = command.output().await.map_err(|source| BridgeError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BridgeError::Exited {
                status: output.status.to_string(),
                output: combine_output(&stdout, &stderr),
            });
        }

        Ok(stdout)
    }
}

/// Stdout followed by stderr, as one diagnostic blob.
fn combine_output(stdout: &str, stderr: &str) -> String {
    if stderr.is_empty() {
        stdout.to_string()
    } else if stdout.is_empty() {
        stderr.to_string()
    } else {
        format!("{}\n{}", stdout.trim_end_matches('\n'), stderr)
    }
}

#[async_trait]
impl Bridge for HelperBridge {
    async fn send(
        &self,
        target: &str,
        persona: &str,
        user_message: &str,
        reply: &str,
    ) -> Result<(), BridgeError> {
        let request = BridgeRequest::Chat {
            target_remark: target,
            persona,
            user_message,
            reply,
            addr: &self.config.addr,
        };
        let stdout = self.invoke(&request).await?;
        tracing::debug!(correspondent = %target, output = %stdout.trim(), "Bridge chat completed");
        Ok(())
    }

    async fn poll(&self, target: &str) -> Result<PollResult, BridgeError> {
        let request = BridgeRequest::Poll {
            target_remark: target,
            addr: &self.config.addr,
        };
        let stdout = self.invoke(&request).await?;
        serde_json::from_str(stdout.trim())
            .map_err(|source| BridgeError::MalformedOutput { source, output: stdout })
    }
}
