use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{audio::AudioSpec, flags::Context, pixel::PixelFormat, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub mixer: MixerConfig,
    pub video: VideoConfig,
}

impl AppConfig {
    /// Loads a JSON configuration file. Missing sections and fields keep
    /// their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Configuration specific to the audio subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Frames per device buffer.
    pub block_frames: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_frames: 1024,
        }
    }
}

impl AudioConfig {
    pub fn spec(&self) -> AudioSpec {
        AudioSpec::stereo_s16(self.sample_rate, self.block_frames)
    }
}

/// Default DSP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub pan: f32,
    pub volume: f32,
    pub pitch: f64,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            pan: 0.0,
            volume: 1.0,
            pitch: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub depth: u32,
    /// Video mode flag names, e.g. `"double-buffered"`.
    pub mode_flags: Vec<String>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            depth: 32,
            mode_flags: vec!["hardware-surface".to_string(), "double-buffered".to_string()],
        }
    }
}

impl VideoConfig {
    /// Native video mode mask. Unknown flag names are skipped.
    pub fn mode_mask(&self) -> u32 {
        Context::Video.encode_names(&self.mode_flags)
    }

    pub fn pixel_format(&self) -> Result<PixelFormat> {
        PixelFormat::derive(self.depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MediaBindError;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.mixer.volume, 1.0);
        assert_eq!(config.video.mode_mask(), 0x4000_0001);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = AppConfig::from_json_str(
            r#"{ "mixer": { "pan": -0.5 }, "video": { "depth": 8, "mode_flags": ["full-screen", "no-such-flag"] } }"#,
        )
        .unwrap();

        assert_eq!(config.mixer.pan, -0.5);
        assert_eq!(config.mixer.pitch, 1.0);
        assert_eq!(config.video.mode_mask(), 0x8000_0000);
        assert!(matches!(
            config.video.pixel_format(),
            Err(MediaBindError::UnsupportedDepth(8))
        ));
        assert_eq!(config.audio.spec().buffer_size(), 1024 * 4);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            AppConfig::from_json_str("{ \"audio\": 3 }"),
            Err(MediaBindError::Json(_))
        ));
    }
}
