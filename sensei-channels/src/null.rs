use crate::traits::SpeechChannel;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

/// Speech absent: capture hears nothing, synthesis is a no-op. Keeps the core
/// text-only without any special-casing at call sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSpeech;

#[async_trait::async_trait]
impl SpeechChannel for NullSpeech {
    fn channel_id(&self) -> &str {
        "null"
    }

    async fn capture(&self, _cancel: &CancellationToken) -> Result<Option<String>> {
        Ok(None)
    }

    async fn speak(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}
