//! Offline control utility: validates a processor configuration and prints the activation
//! order the manager would build from it, without touching any event stream.

use cassrs::config::Settings;
use cassrs::manager::ProcessorManager;
use cassrs::registry::builtin_registry;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "cassctl", about = "Validate a processor graph configuration")]
struct Args {
    /// Path to the TOML processor configuration to validate.
    config: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let settings = match Settings::load(&args.config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to load '{}': {e}", args.config.display());
            return ExitCode::FAILURE;
        }
    };

    let workers = settings.general.workers;
    match ProcessorManager::build(settings, workers, builtin_registry()) {
        Ok(mgr) => {
            println!("graph builds cleanly, activation order:");
            for name in mgr.active_order() {
                println!("  {name}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("graph rejected: {e}");
            ExitCode::FAILURE
        }
    }
}
