pub mod chunk;
pub mod extract;
pub mod loader;

pub use chunk::{plan, Chunk};
pub use extract::{check_ffmpeg, check_ffprobe, get_audio_duration, get_audio_info};
pub use loader::{AudioSource, PcmSlice};

/// Metadata produced by a single FFmpeg decode step (duration as probed,
/// sample rate/channels as requested of the decoder).
#[derive(Debug, Clone)]
pub struct AudioMetadata {
    pub duration: std::time::Duration,
    pub sample_rate: u32,
    pub channels: u16,
}
