use super::PipelineArgs;
use crate::output::{print_json, print_table};
use std::path::Path;

pub fn run(root: &Path, args: &PipelineArgs, json: bool) -> anyhow::Result<()> {
    let resolved = super::resolve(root, args)?;
    let plan = resolved.plan();

    if json {
        print_json(&plan)?;
        return Ok(());
    }

    if plan.is_empty() {
        println!("Nothing to apply for {}.", resolved.target);
        return Ok(());
    }

    let rows = plan
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let flag = if resolved.diagnostics.contains_key(&step.action_id) {
                "!"
            } else {
                ""
            };
            vec![
                (i + 1).to_string(),
                step.action_id.to_string(),
                step.value.kind().to_string(),
                flag.to_string(),
            ]
        })
        .collect();
    print_table(&["#", "NODE", "ACTION", "DEPS"], rows);
    Ok(())
}
