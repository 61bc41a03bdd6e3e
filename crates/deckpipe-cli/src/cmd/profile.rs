use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use deckpipe_core::{
    patch::PipelineUpdate,
    selection::{Definition, Selection},
    store::ProfileStore,
    template::DUAL_SCREEN,
    types::{ActionId, ProfileId, TemplateId},
};
use std::path::Path;

#[derive(Subcommand)]
pub enum ProfileSubcommand {
    /// Create a profile from a built-in template
    Create {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, default_value = DUAL_SCREEN)]
        template: String,
    },
    /// Copy a profile under a new id; node ids are kept
    Clone {
        source: String,
        id: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete a profile and every context override of it
    Delete { id: String },
    /// List profiles
    List,
    /// Show a profile's roots and nodes
    Show { id: String },
    /// Apply one pipeline update given as YAML or JSON (`-` reads stdin)
    Patch { id: String, update: String },
    /// Turn a toggleable node on
    Enable { id: String, node: String },
    /// Turn a toggleable node off
    Disable { id: String, node: String },
    /// Pick the alternative a one-of group resolves to
    Choose {
        id: String,
        node: String,
        alternative: String,
    },
}

pub fn run(root: &Path, subcmd: ProfileSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ProfileSubcommand::Create { id, name, template } => {
            create(root, &id, name, &template, json)
        }
        ProfileSubcommand::Clone { source, id, name } => {
            clone(root, &source, &id, name.as_deref(), json)
        }
        ProfileSubcommand::Delete { id } => delete(root, &id, json),
        ProfileSubcommand::List => list(root, json),
        ProfileSubcommand::Show { id } => show(root, &id, json),
        ProfileSubcommand::Patch { id, update } => {
            let update = super::parse_update(&update)?;
            apply(root, &id, update, json)
        }
        ProfileSubcommand::Enable { id, node } => apply(root, &id, set_enabled(&node, true), json),
        ProfileSubcommand::Disable { id, node } => {
            apply(root, &id, set_enabled(&node, false), json)
        }
        ProfileSubcommand::Choose {
            id,
            node,
            alternative,
        } => {
            let update = PipelineUpdate::ChooseOneOf {
                id: ActionId::new(node),
                chosen: ActionId::new(alternative),
            };
            apply(root, &id, update, json)
        }
    }
}

pub(crate) fn set_enabled(node: &str, enabled: bool) -> PipelineUpdate {
    PipelineUpdate::SetEnabled {
        id: ActionId::new(node),
        enabled,
    }
}

fn create(
    root: &Path,
    id: &str,
    name: Option<String>,
    template: &str,
    json: bool,
) -> anyhow::Result<()> {
    let (_, deck) = super::open(root)?;
    let name = name.unwrap_or_else(|| id.replace(['-', '_'], " "));
    let profile = deck
        .create_profile(id, &name, &TemplateId::new(template))
        .with_context(|| format!("failed to create profile '{id}'"))?;

    if json {
        print_json(&profile)?;
    } else {
        println!("Created profile: {id} ({name}) from template {template}");
        println!("Next: deckpipe check --profile {id}");
    }
    Ok(())
}

fn clone(
    root: &Path,
    source: &str,
    id: &str,
    name: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let (_, deck) = super::open(root)?;
    let profile = deck
        .clone_profile(&ProfileId::new(source), id, name)
        .with_context(|| format!("failed to clone '{source}' as '{id}'"))?;

    if json {
        print_json(&profile)?;
    } else {
        println!("Cloned profile: {source} -> {id} ({})", profile.definition.name);
    }
    Ok(())
}

fn delete(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let (_, deck) = super::open(root)?;
    let contexts = deck
        .delete_profile(&ProfileId::new(id))
        .with_context(|| format!("failed to delete profile '{id}'"))?;

    if json {
        print_json(&serde_json::json!({ "id": id, "deleted": true, "contexts": contexts }))?;
    } else {
        println!("Deleted profile: {id} ({contexts} context(s) updated)");
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let (_, deck) = super::open(root)?;
    let profiles = deck
        .store()
        .list_profiles()
        .context("failed to list profiles")?;

    if json {
        let summaries: Vec<_> = profiles
            .iter()
            .map(|p| {
                serde_json::json!({
                    "id": p.id,
                    "name": p.definition.name,
                    "template": p.definition.template,
                    "tags": p.definition.tags,
                    "nodes": p.definition.nodes.len(),
                })
            })
            .collect();
        print_json(&summaries)?;
        return Ok(());
    }

    if profiles.is_empty() {
        println!("No profiles yet.");
        return Ok(());
    }

    let rows = profiles
        .iter()
        .map(|p| {
            vec![
                p.id.to_string(),
                p.definition
                    .template
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
                join(p.definition.tags.iter()),
                p.definition.name.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "TEMPLATE", "TAGS", "NAME"], rows);
    Ok(())
}

fn show(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let (_, deck) = super::open(root)?;
    let profile = deck
        .store()
        .load_profile(&ProfileId::new(id))
        .with_context(|| format!("profile '{id}' not found"))?;

    if json {
        print_json(&profile)?;
        return Ok(());
    }

    println!("Profile: {} ({})", profile.id, profile.definition.name);
    print_definition(&profile.definition);
    Ok(())
}

fn apply(root: &Path, id: &str, update: PipelineUpdate, json: bool) -> anyhow::Result<()> {
    let (_, deck) = super::open(root)?;
    let profile = deck
        .patch_profile(&ProfileId::new(id), &update)
        .with_context(|| format!("cannot apply {} to '{id}'", update.op_name()))?;

    if json {
        print_json(&profile)?;
    } else {
        println!("Applied {} to profile {id}", update.op_name());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering shared with `context show`
// ---------------------------------------------------------------------------

pub(crate) fn print_definition(def: &Definition) {
    if !def.description.is_empty() {
        println!("Desc:     {}", def.description);
    }
    if let Some(ref template) = def.template {
        println!("Template: {template}");
    }
    if !def.tags.is_empty() {
        println!("Tags:     {}", join(def.tags.iter()));
    }

    if !def.targets.is_empty() {
        println!("\nRoots:");
        for (target, root) in &def.targets {
            println!("  {:<10} {}", target.as_str(), describe(root));
        }
    }

    if def.nodes.is_empty() {
        println!("\nNo nodes.");
        return;
    }
    println!();
    let rows = def
        .nodes
        .values()
        .map(|n| {
            vec![
                n.id.to_string(),
                n.enabled.to_string(),
                if n.quick_access { "yes" } else { "" }.to_string(),
                n.override_source
                    .as_ref()
                    .map(|s| format!("-> {s}"))
                    .unwrap_or_else(|| describe(&n.selection)),
            ]
        })
        .collect();
    print_table(&["NODE", "ENABLED", "QUICK", "SELECTION"], rows);
}

fn describe(selection: &Selection) -> String {
    match selection {
        Selection::Leaf(value) => value.kind().to_string(),
        Selection::OneOf { chosen, .. } => format!("one of, chose {chosen}"),
        Selection::AllOf { members } => format!("all of {}", join(members.iter())),
    }
}

fn join<T: ToString>(items: impl Iterator<Item = T>) -> String {
    items.map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}
