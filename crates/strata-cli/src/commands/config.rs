use crate::errors::CliError;
use crate::logger;
use crate::GlobalOpts;
use clap::Subcommand;
use colored::*;
use std::path::PathBuf;
use strata_config::config::CONFIG_KEYS;
use strata_config::Config;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show the configuration of a build directory
    Show {
        #[arg(short = 'C', long = "dir", default_value = ".")]
        build_dir: PathBuf,
    },
    /// Set one configuration value
    Set {
        key: String,
        value: String,
        #[arg(short = 'C', long = "dir", default_value = ".")]
        build_dir: PathBuf,
    },
    /// Print the path of the configuration file
    Path {
        #[arg(short = 'C', long = "dir", default_value = ".")]
        build_dir: PathBuf,
    },
}

pub fn handle_config(action: ConfigAction, opts: GlobalOpts) -> Result<(), CliError> {
    match action {
        ConfigAction::Show { build_dir } => {
            let config = Config::load(&build_dir)?;
            println!("{}", "Configuration:".bold().green());
            if config.is_empty() {
                if opts.verbosity_level() > 0 {
                    println!("  {}", "(empty)".yellow());
                }
            } else {
                for (key, value) in config.values_iter() {
                    println!("  {}: {}", key.cyan(), value);
                }
            }
        }
        ConfigAction::Set {
            key,
            value,
            build_dir,
        } => {
            // Only the build directory's own file is edited, never user defaults
            let path = Config::path(&build_dir);
            let mut config = Config::load_from_path(&path)?;
            if !config.set(&key, value.clone()) {
                return Err(CliError::UnknownConfigKey(key, CONFIG_KEYS.join(", ")));
            }
            config.save_to_path(&path)?;
            logger::success(&format!("Set {} = {}", key, value));
        }
        ConfigAction::Path { build_dir } => {
            let config_path = Config::path(&build_dir);
            logger::debug(&format!("Reading config from: {}", config_path.display()));
            println!("{}", config_path.display());
            if let Some(defaults) = Config::user_defaults_path().filter(|p| p.exists()) {
                println!("{} {}", "defaults-from".cyan(), defaults.display());
            }
        }
    }
    Ok(())
}
