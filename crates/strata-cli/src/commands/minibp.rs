//! `strata minibp`: the canonical generator
//!
//! The Bootstrap manifest runs this to write the Primary manifest, and with
//! `--template` to regenerate the bootstrap template itself.

use crate::commands::init::current_exe;
use crate::logger;
use crate::GlobalOpts;
use anyhow::Result;
use clap::Args;
use strata_bootstrap::{run_minibp, GeneratorArgs};

#[derive(Args, Debug, Clone)]
pub struct MinibpCommand {
    #[command(flatten)]
    pub args: GeneratorArgs,
}

pub fn handle_minibp(cmd: MinibpCommand, _opts: GlobalOpts) -> Result<()> {
    let outcome = run_minibp(&cmd.args, &current_exe()?)?;
    if outcome.written {
        logger::info(&format!("Wrote {}", outcome.output.display()));
    } else {
        logger::debug(&format!("{} unchanged", outcome.output.display()));
    }
    Ok(())
}
