//! Format conversion with optional selection, deltas and normalization.

use std::path::{Path, PathBuf};

use clap::Args;
use tracing::info;

use super::{InputArgs, load_pipeline};
use crate::Cli;
use crate::config::{Format, NormMode, PipelineConfig};
use crate::pipeline;

/// Convert feature files, writing the result to `-o` or stdout.
#[derive(Args, Debug)]
pub struct ConvertCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Output format
    #[arg(short = 'p', long = "opformat", value_enum)]
    output_format: Option<Format>,

    /// First feature column to keep
    #[arg(long = "ftrstart")]
    ftr_start: Option<usize>,

    /// Number of feature columns to keep
    #[arg(long = "ftrcount")]
    ftr_count: Option<usize>,

    /// Append deltas (1) or deltas and double deltas (2)
    #[arg(long = "deltaorder")]
    delta_order: Option<u8>,

    /// Delta kernel taps
    #[arg(long = "deltawin")]
    delta_window: Option<usize>,

    /// Normalization
    #[arg(long, value_enum)]
    norm: Option<NormMode>,

    /// Norm side file for --norm file
    #[arg(long = "normfile")]
    norm_file: Option<PathBuf>,

    /// Update rate of online normalization, for both means and variances
    #[arg(long)]
    alpha: Option<f64>,

    /// Flush output after every frame
    #[arg(long)]
    online: bool,

    /// Largest label of ILab output
    #[arg(long = "max-label")]
    max_label: Option<u32>,
}

impl ConvertCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut cfg = load_pipeline(cli)?;
        self.apply(&mut cfg);

        let output = cli.output.as_deref().map(Path::new);
        let summary = pipeline::convert(&cfg, &self.input.inputs, output)?;
        info!(
            "converted {} segments, {} frames of {} features",
            summary.segments, summary.frames, summary.num_ftrs
        );
        Ok(())
    }

    fn apply(&self, cfg: &mut PipelineConfig) {
        self.input.apply(cfg);
        if let Some(format) = self.output_format {
            cfg.output.format = format;
        }
        if let Some(start) = self.ftr_start {
            cfg.ftr_start = start;
        }
        if self.ftr_count.is_some() {
            cfg.ftr_count = self.ftr_count;
        }
        if let Some(order) = self.delta_order {
            cfg.delta.order = order;
        }
        if let Some(window) = self.delta_window {
            cfg.delta.window = window;
        }
        if let Some(mode) = self.norm {
            cfg.norm.mode = mode;
        }
        if let Some(path) = &self.norm_file {
            cfg.norm.file = Some(path.clone());
            if self.norm.is_none() {
                cfg.norm.mode = NormMode::File;
            }
        }
        if let Some(alpha) = self.alpha {
            cfg.norm.online.alpha_m = alpha;
            cfg.norm.online.alpha_v = alpha;
        }
        if self.online {
            cfg.output.online = true;
        }
        if let Some(max) = self.max_label {
            cfg.output.max_label = max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "feacat", "convert", "a.onl", "b.onl", "-i", "onlftr", "-w", "13", "-p", "pre",
            "--deltaorder", "2", "--normfile", "n.txt", "-s", "0-9", "-o", "out.pre",
        ]);
        let crate::Commands::Convert(cmd) = &cli.command else {
            panic!("expected convert");
        };
        let mut cfg = PipelineConfig::default();
        cmd.apply(&mut cfg);
        assert_eq!(cmd.input.inputs.len(), 2);
        assert_eq!(cfg.input.format, Format::Onlftr);
        assert_eq!(cfg.input.width, 13);
        assert_eq!(cfg.output.format, Format::Pre);
        assert_eq!(cfg.delta.order, 2);
        assert_eq!(cfg.norm.mode, NormMode::File);
        assert_eq!(cfg.sentrange.as_deref(), Some("0-9"));
        assert_eq!(cli.output.as_deref(), Some("out.pre"));
    }
}
