use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use vandelay_core::config::{Config, SecretConfig};
use vandelay_core::types::WorkloadMode;

pub fn run(path: &Path, mode: &str, force: bool, json: bool) -> anyhow::Result<()> {
    let mode: WorkloadMode = mode.parse()?;

    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }

    let config = starter(mode);
    config
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;

    if json {
        print_json(&serde_json::json!({
            "path": path.display().to_string(),
            "mode": mode,
        }))?;
    } else {
        println!("created: {} ({mode})", path.display());
        println!("set AWS_IAM_ARN, AWS_ACCOUNT_ID and AWS_REGION (or edit the file) before `vandelay plan`");
    }
    Ok(())
}

fn starter(mode: WorkloadMode) -> Config {
    let mut config = Config::new(mode);
    config.secrets.push(SecretConfig {
        name: "met-api-key".to_string(),
        reference: "MET_API_KEY".to_string(),
        env_var: None,
    });
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn starter_config_roundtrips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vandelay.yaml");
        starter(WorkloadMode::PersistentAccelerated).save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.mode, WorkloadMode::PersistentAccelerated);
        assert_eq!(loaded.secrets.len(), 1);
        assert_eq!(loaded.secrets[0].env_var(), "MET_API_KEY");
    }
}
