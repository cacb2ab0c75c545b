use crate::traits::SpeechChannel;
use anyhow::{Result, anyhow};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Speech via external commands: a capture command that prints one recognized
/// utterance on stdout, and a synthesis command that reads the text to speak
/// on stdin (`say -f -`, `espeak --stdin`, a whisper wrapper, ...).
#[derive(Debug, Clone)]
pub struct ProcessSpeech {
    capture_command: Option<String>,
    speak_command: Option<String>,
}

impl ProcessSpeech {
    pub fn new(capture_command: Option<&str>, speak_command: Option<&str>) -> Result<Self> {
        let capture_command = capture_command
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        let speak_command = speak_command
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        if capture_command.is_none() && speak_command.is_none() {
            return Err(anyhow!(
                "process speech requires at least one of capture/speak commands"
            ));
        }
        Ok(Self {
            capture_command,
            speak_command,
        })
    }
}

#[async_trait::async_trait]
impl SpeechChannel for ProcessSpeech {
    fn channel_id(&self) -> &str {
        "process"
    }

    async fn capture(&self, cancel: &CancellationToken) -> Result<Option<String>> {
        let Some(command) = self.capture_command.as_deref() else {
            return Ok(None);
        };

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| anyhow!("spawn capture command: {e}"))?;

        // Dropping the in-flight future kills the child, so a cancelled
        // capture leaves nothing behind.
        let output = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("speech capture cancelled");
                return Ok(None);
            }
            output = child.wait_with_output() => output?,
        };

        if !output.status.success() {
            return Err(anyhow!("capture command exited with {}", output.status));
        }

        let utterance = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        if utterance.is_empty() {
            return Ok(None);
        }
        tracing::debug!(utterance_len = utterance.len(), "utterance captured");
        Ok(Some(utterance))
    }

    async fn speak(&self, text: &str) -> Result<()> {
        let Some(command) = self.speak_command.as_deref() else {
            return Ok(());
        };

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| anyhow!("spawn speak command: {e}"))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }
        let status = child.wait().await?;
        if !status.success() {
            return Err(anyhow!("speak command exited with {status}"));
        }
        Ok(())
    }

    fn supports_capture(&self) -> bool {
        self.capture_command.is_some()
    }

    fn supports_synthesis(&self) -> bool {
        self.speak_command.is_some()
    }
}
