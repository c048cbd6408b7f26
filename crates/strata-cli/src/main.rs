use clap::{Parser, Subcommand};
use strata::{
    commands::{
        build::{self, BuildCommand},
        config::{self, ConfigAction},
        init::{self, InitCommand},
        minibp::{self, MinibpCommand},
    },
    init_tracing, logger, GlobalOpts,
};

#[derive(Parser)]
#[command(name = "strata")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Three-stage meta-build bootstrapper",
    long_about = "strata turns Blueprints.toml descriptions into Ninja manifests, bootstrapping its own generator in three stages."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure a build directory and write its Bootstrap manifest
    Init(InitCommand),
    /// Run the Bootstrap, Primary and Main stages
    Build(BuildCommand),
    /// Generate the Primary manifest or the bootstrap template
    Minibp(MinibpCommand),
    /// Show or change build directory configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init_with_verbosity(cli.global.verbosity_level()) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
    init_tracing(&cli.global);

    let result = match cli.command {
        Commands::Init(cmd) => init::handle_init(cmd, cli.global).map_err(anyhow::Error::from),
        Commands::Build(cmd) => build::handle_build(cmd, cli.global)
            .map(|_| ())
            .map_err(anyhow::Error::from),
        Commands::Minibp(cmd) => minibp::handle_minibp(cmd, cli.global),
        Commands::Config { action } => {
            config::handle_config(action, cli.global).map_err(anyhow::Error::from)
        }
    };

    if let Err(e) = result {
        logger::error(&format!("{:#}", e));
        if logger::get_verbosity() == 0 {
            logger::show_log_path();
        }
        std::process::exit(1);
    }
}
