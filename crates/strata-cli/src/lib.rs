//! strata command line library - exposes commands for testing

pub mod commands;
pub mod common;
pub mod errors;

pub use common::GlobalOpts;
pub use errors::CliError;
pub use strata_logger as logger;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding a tracing filter, e.g. `strata_graph=trace`
pub const LOG_ENV_VAR: &str = "STRATA_LOG";

/// Install the tracing subscriber for the library crates.
///
/// `STRATA_LOG` wins over the verbosity flags.
pub fn init_tracing(opts: &GlobalOpts) {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| default_filter(opts.verbosity_level()).into());
    let registry = tracing_subscriber::registry().with(filter);
    let result = if opts.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    if let Err(e) = result {
        logger::warn(&format!("Failed to initialize tracing: {}", e));
    }
}

fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
