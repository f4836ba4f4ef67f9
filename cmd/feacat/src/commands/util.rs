//! Utility functions for CLI commands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use tracing::debug;

use crate::Cli;
use crate::config::{Format, PipelineConfig};

/// Input selection shared by all commands.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Input files, read one after another ("-" for stdin)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Input format
    #[arg(short = 'i', long = "ipformat", value_enum)]
    pub format: Option<Format>,

    /// Features per input frame
    #[arg(short = 'w', long)]
    pub width: Option<usize>,

    /// Label columns of ASCII input
    #[arg(long)]
    pub labels: Option<usize>,

    /// Read inputs sequentially, without their segment index
    #[arg(long)]
    pub unindexed: bool,

    /// Segments to keep, e.g. "0-9,20" or "^0:-2:0"
    #[arg(short = 's', long)]
    pub sentrange: Option<String>,

    /// Token map for symbolic ASCII labels
    #[arg(long)]
    pub phoneset: Option<PathBuf>,
}

impl InputArgs {
    pub fn apply(&self, cfg: &mut PipelineConfig) {
        if let Some(format) = self.format {
            cfg.input.format = format;
        }
        if let Some(width) = self.width {
            cfg.input.width = width;
        }
        if let Some(labels) = self.labels {
            cfg.input.labels = labels;
        }
        if self.unindexed {
            cfg.input.indexed = false;
        }
        if let Some(range) = &self.sentrange {
            cfg.sentrange = Some(range.clone());
        }
        if let Some(path) = &self.phoneset {
            cfg.phoneset = Some(path.clone());
        }
    }
}

/// Loads the pipeline file named by `-f`, or the defaults.
pub fn load_pipeline(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    match cli.pipeline.as_deref() {
        Some(path) => {
            let cfg = load_request(path)?;
            debug!("loaded pipeline from {}", path);
            Ok(cfg)
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// Loads a request from a YAML or JSON file.
pub fn load_request<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("yaml");

    let result = match ext.to_lowercase().as_str() {
        "json" => serde_json::from_str(&content)?,
        _ => serde_yaml::from_str(&content)?,
    };

    Ok(result)
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(
    result: &T,
    output_path: Option<&str>,
    as_json: bool,
) -> anyhow::Result<()> {
    let output = if as_json {
        serde_json::to_string_pretty(result)? + "\n"
    } else {
        serde_yaml::to_string(result)?
    };

    match output_path {
        Some(path) => std::fs::write(path, output)?,
        None => print!("{}", output),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormMode;
    use std::io::Write;

    #[test]
    fn test_load_request_by_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let yaml = dir.path().join("p.yaml");
        std::fs::File::create(&yaml)
            .unwrap()
            .write_all(b"input:\n  width: 4\nnorm:\n  mode: utts\n")
            .unwrap();
        let cfg: PipelineConfig = load_request(yaml.to_str().unwrap()).unwrap();
        assert_eq!(cfg.input.width, 4);
        assert_eq!(cfg.norm.mode, NormMode::Utts);

        let json = dir.path().join("p.json");
        std::fs::write(&json, r#"{"output": {"format": "pre"}, "ftr_count": 2}"#).unwrap();
        let cfg: PipelineConfig = load_request(json.to_str().unwrap()).unwrap();
        assert_eq!(cfg.output.format, Format::Pre);
        assert_eq!(cfg.ftr_count, Some(2));

        assert!(load_request::<PipelineConfig>("/nonexistent/p.yaml").is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let mut cfg = PipelineConfig::default();
        cfg.input.width = 13;
        cfg.sentrange = Some("0-3".into());
        let args = InputArgs {
            inputs: vec![PathBuf::from("a.pre")],
            format: Some(Format::Onlftr),
            width: None,
            labels: None,
            unindexed: true,
            sentrange: Some("all".into()),
            phoneset: None,
        };
        args.apply(&mut cfg);
        assert_eq!(cfg.input.format, Format::Onlftr);
        assert_eq!(cfg.input.width, 13);
        assert!(!cfg.input.indexed);
        assert_eq!(cfg.sentrange.as_deref(), Some("all"));
    }
}
