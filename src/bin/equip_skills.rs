//! Give every incomplete monster instance its element's default loadout.

use std::process::ExitCode;

use anyhow::{Context, Result};
use skill_sync::{logging, LoadoutAssigner, SyncConfig};

fn run() -> Result<bool> {
    let config = SyncConfig::from_env().context("loading configuration")?;
    let store = config
        .open_store()
        .with_context(|| format!("opening store at {}", config.data_dir().display()))?;

    let assigned = LoadoutAssigner::new(&store)
        .with_unknown_skill_policy(config.unknown_skills)
        .run();
    match assigned {
        Ok(outcome) => {
            println!("== default loadouts ==");
            print!("{outcome}");
            Ok(true)
        }
        Err(err) => {
            if let Some(progress) = err.progress() {
                println!("== default loadouts (aborted) ==");
                print!("{progress}");
            }
            eprintln!("error: {err}");
            Ok(false)
        }
    }
}

fn main() -> ExitCode {
    logging::init();
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
