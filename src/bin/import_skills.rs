//! Refresh the skill master collection from the shard files.

use std::process::ExitCode;

use anyhow::{Context, Result};
use skill_sync::{logging, SkillImport, SyncConfig};

fn run() -> Result<bool> {
    let config = SyncConfig::from_env().context("loading configuration")?;
    let store = config
        .open_store()
        .with_context(|| format!("opening store at {}", config.data_dir().display()))?;
    tracing::info!(
        project = %config.credentials.project_id,
        skills_dir = %config.skills_dir.display(),
        "configuration loaded"
    );

    match SkillImport::new(&store, config.import_settings()).run() {
        Ok(summary) => {
            println!("{summary}");
            Ok(true)
        }
        Err(failure) => {
            println!("{}", failure.summary);
            eprintln!("error: {failure}");
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
