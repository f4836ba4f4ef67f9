//! Stream statistics.

use clap::Args;

use super::{InputArgs, load_pipeline, output_result};
use crate::Cli;
use crate::pipeline;

/// Print segment count, frames per segment and widths of the inputs.
#[derive(Args, Debug)]
pub struct InfoCommand {
    #[command(flatten)]
    input: InputArgs,
}

impl InfoCommand {
    pub fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let mut cfg = load_pipeline(cli)?;
        self.input.apply(&mut cfg);
        let info = pipeline::describe(&cfg, &self.input.inputs)?;
        output_result(&info, cli.output.as_deref(), cli.json)
    }
}
