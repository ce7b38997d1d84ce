use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use vandelay_core::compose;

pub fn run(config_path: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let composition = compose(&config).context("composition failed")?;
    let outputs = &composition.plan.outputs;

    if json {
        return print_json(outputs);
    }
    if outputs.is_empty() {
        println!("No ad-hoc commands (manual_trigger is off).");
        return Ok(());
    }
    for (i, output) in outputs.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("# {}", output.name);
        println!("{}", output.value);
    }
    Ok(())
}
