use crate::config::Config;
use ansi_term::Colour::{Green, Red};
use anyhow::{anyhow, Result};
use std::path::Path;
use walkdir::WalkDir;

/// Validate a declared-state file, or every *.yaml / *.yml under a directory.
pub fn validate_target(target: &Path) -> Result<()> {
    if !target.exists() {
        return Err(anyhow!(
            "{:?} ... {} - file/directory does not exist",
            target,
            Red.paint("Failed")
        ));
    }

    if target.is_dir() {
        let mut files = vec![];
        for entry in WalkDir::new(target) {
            let entry = entry?;
            let path = entry.path();
            let is_yaml = path
                .extension()
                .map_or(false, |ext| ext == "yaml" || ext == "yml");
            if path.is_file() && is_yaml {
                files.push(path.to_path_buf());
            }
        }

        let mut invalid = 0;
        for file in &files {
            // Validate but keep going
            if let Err(e) = validate_file(file) {
                println!("{}", e);
                invalid += 1;
            }
        }

        if invalid > 0 {
            return Err(anyhow!("{} of {} file(s) invalid", invalid, files.len()));
        }

        return Ok(());
    }

    // Validate single file
    validate_file(target)
}

/// Validate target yaml file
pub fn validate_file(file: &Path) -> Result<()> {
    Config::new(file).map_err(|e| anyhow!("{:?} ... {} - {:#}", file, Red.paint("invalid"), e))?;

    // "OK" in green color
    println!("{:?} ... {}", file, Green.paint("ok"));

    Ok(())
}
