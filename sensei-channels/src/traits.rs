use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait SpeechChannel: Send + Sync {
    /// Unique channel identifier: "process", "null".
    fn channel_id(&self) -> &str;

    /// Capture at most one utterance, then terminate. Returns `None` when
    /// nothing was heard or the capture was cancelled; cancellation must not
    /// leave a partial utterance behind.
    async fn capture(&self, cancel: &CancellationToken) -> Result<Option<String>>;

    /// Synthesize `text`. Fire-and-forget; failures are the adapter's to log.
    async fn speak(&self, text: &str) -> Result<()>;

    fn supports_capture(&self) -> bool {
        false
    }

    fn supports_synthesis(&self) -> bool {
        false
    }
}
