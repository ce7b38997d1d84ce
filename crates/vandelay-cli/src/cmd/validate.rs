use crate::output::{print_json, print_warnings};
use std::path::Path;
use vandelay_core::compose;
use vandelay_core::config::Config;
use vandelay_core::types::Warning;

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let mut warnings = config.validate();

    // Dry composition is skipped once the config has errors.
    if !Config::has_errors(&warnings) {
        match compose(&config) {
            Ok(composition) => {
                for w in composition.warnings {
                    if !warnings.contains(&w) {
                        warnings.push(w);
                    }
                }
            }
            Err(e) => warnings.push(Warning::error(e.to_string())),
        }
    }

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        print_warnings(&warnings);
    }

    if Config::has_errors(&warnings) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
