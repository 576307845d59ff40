use crate::{
    artifacts,
    config::ProjectConfig,
};
use anyhow::{
    Context,
    Result,
    anyhow,
};
use std::{
    fs,
    path::Path,
};

pub const EXPORTED_CONFIG_FILE: &str = "deploy-config.json";

/// Copies the address map and the front-end contract's artifact into the
/// configured constants directory.
pub fn update_front_end(config: &ProjectConfig) -> Result<()> {
    let front_end = config
        .front_end
        .as_ref()
        .ok_or_else(|| anyhow!("no [front_end] table in configuration"))?;
    println!("Updating front end...");

    let constants_dir = front_end.constants_dir();
    fs::create_dir_all(&constants_dir).with_context(|| {
        format!("Failed to create front-end directory {}", constants_dir.display())
    })?;

    let address_map = deployments::address_map_path(&config.project.deployments_dir);
    copy_files_to_front_end(&address_map, &constants_dir.join(&front_end.addresses_file))?;

    let abi = artifacts::artifact_path(&config.project.artifacts_dir, &front_end.contract)?;
    copy_files_to_front_end(&abi, &constants_dir.join(&front_end.abi_file))?;

    if front_end.export_config {
        let json = serde_json::to_vec_pretty(config)
            .context("Failed to serialize configuration")?;
        let dest = constants_dir.join(EXPORTED_CONFIG_FILE);
        fs::write(&dest, json)
            .with_context(|| format!("Failed to write {}", dest.display()))?;
    }

    println!("Front end updated!");
    Ok(())
}

/// Replaces whatever is at `dest` with a copy of `src`.
pub fn copy_files_to_front_end(src: &Path, dest: &Path) -> Result<()> {
    if !src.is_file() {
        return Err(anyhow!("{} does not exist", src.display()));
    }
    if dest.is_dir() {
        fs::remove_dir_all(dest)
            .with_context(|| format!("Failed to remove {}", dest.display()))?;
    } else if dest.exists() {
        fs::remove_file(dest)
            .with_context(|| format!("Failed to remove {}", dest.display()))?;
    }
    fs::copy(src, dest).with_context(|| {
        format!("Failed to copy {} to {}", src.display(), dest.display())
    })?;
    tracing::debug!("Copied {} to {}", src.display(), dest.display());
    Ok(())
}
