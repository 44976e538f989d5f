//! C1: Audio Loader.
//!
//! Decodes an input file once via FFmpeg into mono 16-bit PCM at a fixed
//! sample rate, then reads the resulting WAV fully into an
//! `Arc<Vec<i16>>` so every worker slices the same shared-immutable
//! buffer instead of re-invoking FFmpeg per chunk (spec section 4.1:
//! "Decode once; all later slicing is by sample index").

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{AutosubError, Result};

use super::extract;

/// An immutable, fully-decoded audio source. Cheap to clone: the sample
/// buffer is reference-counted.
#[derive(Debug, Clone)]
pub struct AudioSource {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_sec: f64,
    pub size_bytes: u64,
    samples: Arc<Vec<i16>>,
}

/// A read-only view into `AudioSource`'s PCM buffer, safe to hand to many
/// concurrent workers.
#[derive(Debug, Clone)]
pub struct PcmSlice {
    samples: Arc<Vec<i16>>,
    start_idx: usize,
    end_idx: usize,
    pub sample_rate: u32,
}

impl PcmSlice {
    pub fn samples(&self) -> &[i16] {
        &self.samples[self.start_idx..self.end_idx]
    }

    pub fn len_samples(&self) -> usize {
        self.end_idx - self.start_idx
    }

    pub fn duration_sec(&self) -> f64 {
        self.len_samples() as f64 / self.sample_rate as f64
    }

    /// Encode this slice as a standalone mono 16-bit WAV, for engines that
    /// take a file/byte payload rather than raw samples.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| AutosubError::AudioExtraction(format!("wav encode failed: {e}")))?;
            for &s in self.samples() {
                writer
                    .write_sample(s)
                    .map_err(|e| AutosubError::AudioExtraction(format!("wav encode failed: {e}")))?;
            }
            writer
                .finalize()
                .map_err(|e| AutosubError::AudioExtraction(format!("wav encode failed: {e}")))?;
        }
        Ok(cursor.into_inner())
    }
}

impl AudioSource {
    /// `load(path, targetRateHz) -> AudioSource + PCM accessor`.
    ///
    /// Errors: `UnsupportedFormat`/`CorruptAudio` surface as
    /// `AutosubError::AudioExtraction`; `IOError` as `AutosubError::Io`.
    /// Fails fast if the resulting duration is zero.
    pub async fn load(path: &Path, target_rate_hz: u32) -> Result<Self> {
        if !path.exists() {
            return Err(AutosubError::FileNotFound(path.display().to_string()));
        }

        let tmp_dir = tempfile::tempdir()?;
        let wav_path = tmp_dir.path().join("decoded.wav");

        info!("decoding {} to {}Hz mono PCM", path.display(), target_rate_hz);
        let metadata = extract::extract_audio(path, &wav_path, target_rate_hz).await?;

        if metadata.duration.as_secs_f64() <= 0.0 {
            return Err(AutosubError::AudioExtraction(
                "decoded audio has zero duration".to_string(),
            ));
        }

        let size_bytes = std::fs::metadata(&wav_path)?.len();

        let mut reader = hound::WavReader::open(&wav_path)
            .map_err(|e| AutosubError::AudioExtraction(format!("failed to read decoded wav: {e}")))?;
        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<i16>, _>>()
            .map_err(|e| AutosubError::AudioExtraction(format!("corrupt audio: {e}")))?;

        debug!(samples = samples.len(), rate = spec.sample_rate, "loaded pcm buffer");

        let duration_sec = samples.len() as f64 / spec.sample_rate as f64;

        // tmp_dir is dropped here, releasing the decoded wav's file descriptor
        // and deleting the scratch file on every exit path (including early
        // returns above, via `?`).

        Ok(Self {
            path: path.to_path_buf(),
            sample_rate: spec.sample_rate,
            channels: 1,
            duration_sec,
            size_bytes,
            samples: Arc::new(samples),
        })
    }

    pub fn total_samples(&self) -> usize {
        self.samples.len()
    }

    /// Slice `[start_sec, end_sec)` of the shared buffer by sample index.
    /// Clamps to the buffer bounds so a planner rounding error can never
    /// panic a worker.
    pub fn slice(&self, start_sec: f64, end_sec: f64) -> PcmSlice {
        let rate = self.sample_rate as f64;
        let start_idx = ((start_sec * rate).round() as i64)
            .clamp(0, self.samples.len() as i64) as usize;
        let end_idx = ((end_sec * rate).round() as i64)
            .clamp(start_idx as i64, self.samples.len() as i64) as usize;
        PcmSlice {
            samples: Arc::clone(&self.samples),
            start_idx,
            end_idx,
            sample_rate: self.sample_rate,
        }
    }
}

impl AudioSource {
    /// Build an `AudioSource` directly from an in-memory sample buffer,
    /// bypassing ffmpeg. Used by other modules' tests (scheduler, merger)
    /// that need a ready source without a real decode.
    #[cfg(test)]
    pub(crate) fn for_test(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            path: PathBuf::from("/tmp/fake.wav"),
            sample_rate,
            channels: 1,
            duration_sec: samples.len() as f64 / sample_rate as f64,
            size_bytes: 0,
            samples: Arc::new(samples),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_source(samples: Vec<i16>, rate: u32) -> AudioSource {
        AudioSource::for_test(samples, rate)
    }

    #[test]
    fn slice_clamps_to_buffer_bounds() {
        let source = fake_source(vec![0i16; 1600], 1600); // 1 second @ 1600Hz
        let slice = source.slice(-5.0, 100.0);
        assert_eq!(slice.len_samples(), 1600);
    }

    #[test]
    fn slice_picks_correct_sample_range() {
        let source = fake_source((0..1600i16).collect(), 1600);
        let slice = source.slice(0.25, 0.5);
        assert_eq!(slice.len_samples(), 400);
        assert_eq!(slice.samples()[0], 400);
    }

    #[test]
    fn to_wav_bytes_roundtrips_sample_count() {
        let source = fake_source(vec![1, -1, 2, -2], 8000);
        let slice = source.slice(0.0, source.duration_sec);
        let bytes = slice.to_wav_bytes().unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, -1, 2, -2]);
    }
}
