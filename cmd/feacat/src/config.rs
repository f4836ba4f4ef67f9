//! Pipeline description, loaded from YAML/JSON and overridden by flags.

use std::path::PathBuf;

use clap::ValueEnum;
use segstream_codec::CamFormat;
use segstream_filter::OnlNormConfig;
use serde::{Deserialize, Serialize};

/// File formats understood by `feacat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pre,
    Lna8,
    Onlftr,
    Ascii,
    Ilab,
}

impl Format {
    /// The binary frame layout, for the three frame formats.
    pub fn cam(self) -> Option<CamFormat> {
        match self {
            Format::Pre => Some(CamFormat::Pre),
            Format::Lna8 => Some(CamFormat::Lna8),
            Format::Onlftr => Some(CamFormat::OnlFtr),
            Format::Ascii | Format::Ilab => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NormMode {
    #[default]
    None,
    /// Means and scales from a side file.
    File,
    /// Per-segment statistics.
    Utts,
    /// Running statistics.
    Online,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub format: Format,
    /// Features per frame.
    pub width: usize,
    /// Label columns of ASCII input.
    pub labels: usize,
    /// Use the segment index; off for pipes.
    pub indexed: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            format: Format::Pre,
            width: 0,
            labels: 0,
            indexed: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: Format,
    /// Flush after every write.
    pub online: bool,
    /// Largest label an ILab output must hold.
    pub max_label: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: Format::Ascii,
            online: false,
            max_label: 255,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaConfig {
    /// 0 for none, 1 for deltas, 2 for deltas and double deltas.
    pub order: u8,
    /// Taps of the delta kernel.
    pub window: usize,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self { order: 0, window: 9 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NormConfig {
    pub mode: NormMode,
    /// Side file for [`NormMode::File`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    pub online: OnlNormConfig,
}

/// Everything `feacat` does between reading and writing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    /// Segments to keep, as a range expression.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentrange: Option<String>,
    pub ftr_start: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ftr_count: Option<usize>,
    pub delta: DeltaConfig,
    pub norm: NormConfig,
    /// Token map for symbolic ASCII labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phoneset: Option<PathBuf>,
}

impl PipelineConfig {
    /// Whether any stage rewrites the feature columns.
    pub fn filters_features(&self) -> bool {
        self.ftr_start > 0
            || self.ftr_count.is_some()
            || self.delta.order > 0
            || self.norm.mode != NormMode::None
    }
}
