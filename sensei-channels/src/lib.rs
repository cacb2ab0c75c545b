//! Speech channel adapters.
//!
//! Adapters are pure I/O: they turn captured audio into one utterance string
//! and synthesize reply text. The assistant core never depends on a concrete
//! adapter; absence of speech degrades to text-only interaction.

mod null;
mod process;
mod traits;

pub use null::NullSpeech;
pub use process::ProcessSpeech;
pub use traits::SpeechChannel;
