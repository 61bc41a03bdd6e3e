use super::PipelineArgs;
use crate::output::{print_json, print_table};
use std::path::Path;

/// Exits non-zero when anything blocks launching the resolved target.
pub fn run(root: &Path, args: &PipelineArgs, json: bool) -> anyhow::Result<()> {
    let resolved = super::resolve(root, args)?;
    let blockers = resolved.launch_blockers();

    if json {
        print_json(&serde_json::json!({
            "target": resolved.target,
            "launchable": resolved.is_launchable(),
            "blockers": blockers,
            "resolved": resolved.resolved,
        }))?;
    } else if blockers.is_empty() {
        println!("Ready to launch ({})", resolved.target);
    } else {
        let rows = blockers
            .iter()
            .flat_map(|b| {
                b.errors.iter().map(move |e| {
                    vec![
                        b.node.to_string(),
                        e.kind.as_str().to_string(),
                        e.to_string(),
                    ]
                })
            })
            .collect();
        print_table(&["NODE", "PROBLEM", "DETAIL"], rows);
    }

    if !blockers.is_empty() {
        anyhow::bail!(
            "{} node(s) block launching the {} target",
            blockers.len(),
            resolved.target
        );
    }
    Ok(())
}
