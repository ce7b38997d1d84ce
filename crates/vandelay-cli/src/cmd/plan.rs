use crate::output::{print_json, print_table};
use anyhow::Context;
use std::path::Path;
use vandelay_core::{compose, io, paths};

pub fn run(
    config_path: &Path,
    out: Option<&Path>,
    save: bool,
    format: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let composition = compose(&config).context("composition failed")?;
    let plan = &composition.plan;

    for w in &composition.warnings {
        eprintln!("warning: {}", w.message);
    }

    let rendered = match format {
        None | Some("json") => plan.to_json()?,
        Some("yaml") => plan.to_yaml()?,
        Some(other) => anyhow::bail!("unknown format '{other}' (expected json or yaml)"),
    };

    let target = match (out, save) {
        (Some(p), _) => Some(p.to_path_buf()),
        (None, true) => {
            let dir = config_path.parent().unwrap_or_else(|| Path::new("."));
            Some(paths::plan_path(dir))
        }
        (None, false) => None,
    };

    if let Some(target) = target {
        io::atomic_write(&target, rendered.as_bytes())
            .with_context(|| format!("failed to write {}", target.display()))?;
        if json {
            print_json(&serde_json::json!({
                "path": target.display().to_string(),
                "resources": plan.resources.len(),
            }))?;
        } else {
            println!(
                "wrote {} resources to {}",
                plan.resources.len(),
                target.display()
            );
        }
        return Ok(());
    }

    // An explicit --format wins over --json.
    if format.is_some() {
        println!("{rendered}");
        return Ok(());
    }
    if json {
        return print_json(plan);
    }

    let rows: Vec<Vec<String>> = plan
        .resources
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.kind().to_string(),
                r.depends_on.join(","),
            ]
        })
        .collect();
    print_table(&["NAME", "KIND", "DEPENDS ON"], rows);
    Ok(())
}
