//! Encode types and format-specific encoding options.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Default maximum bitrate for the 1080p rendition
pub const DEFAULT_MAX_RATE_1080P: &str = "1200k";
/// Default maximum bitrate for the 720p rendition
pub const DEFAULT_MAX_RATE_720P: &str = "600k";
/// Default maximum bitrate for the 480p rendition
pub const DEFAULT_MAX_RATE_480P: &str = "400k";
/// Default HLS segment duration in seconds
pub const DEFAULT_SEGMENT_DURATION: u32 = 10;
/// Encode type used when the caller leaves it empty
pub const DEFAULT_ENCODE_TYPE: &str = "mp4";

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum EncodeType {
    /// Single H.264 MP4 file
    #[serde(rename = "mp4")]
    Mp4,
    /// HLS master playlist plus one playlist per rendition
    #[serde(rename = "hls")]
    Hls,
    /// HLS with AES-128 segment encryption
    #[serde(rename = "hls-encrypted")]
    HlsEncrypted,
}

impl EncodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodeType::Mp4 => "mp4",
            EncodeType::Hls => "hls",
            EncodeType::HlsEncrypted => "hls-encrypted",
        }
    }

    /// Extension of the artifact reported back to the caller.
    pub fn output_extension(&self) -> &'static str {
        match self {
            EncodeType::Mp4 => "mp4",
            EncodeType::Hls | EncodeType::HlsEncrypted => "m3u8",
        }
    }

    /// File name of the primary artifact for a resolved base name.
    pub fn output_file_name(&self, base_name: &str) -> String {
        format!("{}.{}", base_name, self.output_extension())
    }
}

impl fmt::Display for EncodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncodeType {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        match s {
            "mp4" => Ok(EncodeType::Mp4),
            "hls" => Ok(EncodeType::Hls),
            "hls-encrypted" => Ok(EncodeType::HlsEncrypted),
            other => Err(ModelError::invalid_encode_type(other)),
        }
    }
}

/// One resolution tier of an HLS output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Rendition {
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
}

impl Rendition {
    /// All renditions, highest first. Stream indices in FFmpeg follow this order.
    pub const ALL: [Rendition; 3] = [Rendition::P1080, Rendition::P720, Rendition::P480];

    pub fn name(&self) -> &'static str {
        match self {
            Rendition::P1080 => "1080p",
            Rendition::P720 => "720p",
            Rendition::P480 => "480p",
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Rendition::P1080 => 1080,
            Rendition::P720 => 720,
            Rendition::P480 => 480,
        }
    }

    pub fn audio_bitrate(&self) -> &'static str {
        match self {
            Rendition::P1080 | Rendition::P720 => "128k",
            Rendition::P480 => "64k",
        }
    }

    /// Per-rendition playlist name, e.g. `movie-720p.m3u8`.
    pub fn playlist_name(&self, base_name: &str) -> String {
        format!("{}-{}.m3u8", base_name, self.name())
    }
}

/// Format-specific configuration for a job.
///
/// Defaults are applied once, when the job is built: empty bitrate ceilings
/// fall back to the tier constants and a zero segment duration becomes
/// [`DEFAULT_SEGMENT_DURATION`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EncodeOptions {
    /// Maximum bitrate for the 1080p rendition
    #[serde(default = "default_max_rate_1080p")]
    pub max_rate_1080p: String,

    /// Maximum bitrate for the 720p rendition
    #[serde(default = "default_max_rate_720p")]
    pub max_rate_720p: String,

    /// Maximum bitrate for the 480p rendition
    #[serde(default = "default_max_rate_480p")]
    pub max_rate_480p: String,

    /// HLS segment length in seconds
    #[serde(default = "default_segment_duration")]
    pub segment_duration: u32,

    /// Replace the output name with a random one
    #[serde(default)]
    pub rename_output: bool,

    /// For encrypted HLS, the FFmpeg key info file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_info: Option<PathBuf>,
}

fn default_max_rate_1080p() -> String {
    DEFAULT_MAX_RATE_1080P.to_string()
}
fn default_max_rate_720p() -> String {
    DEFAULT_MAX_RATE_720P.to_string()
}
fn default_max_rate_480p() -> String {
    DEFAULT_MAX_RATE_480P.to_string()
}
fn default_segment_duration() -> u32 {
    DEFAULT_SEGMENT_DURATION
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            max_rate_1080p: DEFAULT_MAX_RATE_1080P.to_string(),
            max_rate_720p: DEFAULT_MAX_RATE_720P.to_string(),
            max_rate_480p: DEFAULT_MAX_RATE_480P.to_string(),
            segment_duration: DEFAULT_SEGMENT_DURATION,
            rename_output: false,
            key_info: None,
        }
    }
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable random output naming.
    pub fn with_rename_output(mut self, rename: bool) -> Self {
        self.rename_output = rename;
        self
    }

    /// Set the HLS segment duration.
    pub fn with_segment_duration(mut self, seconds: u32) -> Self {
        self.segment_duration = seconds;
        self
    }

    /// Set the bitrate ceilings. Empty strings keep the defaults.
    pub fn with_max_rates(
        mut self,
        max_1080p: impl Into<String>,
        max_720p: impl Into<String>,
        max_480p: impl Into<String>,
    ) -> Self {
        self.max_rate_1080p = max_1080p.into();
        self.max_rate_720p = max_720p.into();
        self.max_rate_480p = max_480p.into();
        self
    }

    /// Set the FFmpeg key info file for encrypted HLS.
    pub fn with_encryption(mut self, key_info: impl Into<PathBuf>) -> Self {
        self.key_info = Some(key_info.into());
        self
    }

    /// Bitrate ceiling for a rendition.
    pub fn max_rate(&self, rendition: Rendition) -> &str {
        match rendition {
            Rendition::P1080 => &self.max_rate_1080p,
            Rendition::P720 => &self.max_rate_720p,
            Rendition::P480 => &self.max_rate_480p,
        }
    }

    /// Fill unset values with their defaults.
    pub fn with_defaults(mut self) -> Self {
        if self.max_rate_1080p.trim().is_empty() {
            self.max_rate_1080p = DEFAULT_MAX_RATE_1080P.to_string();
        }
        if self.max_rate_720p.trim().is_empty() {
            self.max_rate_720p = DEFAULT_MAX_RATE_720P.to_string();
        }
        if self.max_rate_480p.trim().is_empty() {
            self.max_rate_480p = DEFAULT_MAX_RATE_480P.to_string();
        }
        if self.segment_duration == 0 {
            self.segment_duration = DEFAULT_SEGMENT_DURATION;
        }
        self
    }
}
