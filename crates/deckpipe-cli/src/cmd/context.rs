use crate::output::{print_json, print_table};
use anyhow::Context as _;
use clap::Subcommand;
use deckpipe_core::{
    patch::PipelineUpdate,
    service::Deck,
    store::{CollectionMap, FsStore},
    types::{ActionId, ContextId, ProfileId},
};
use std::path::Path;

#[derive(Subcommand)]
pub enum ContextSubcommand {
    /// Show a context's default profile, applicable profiles and overrides
    Show {
        id: String,
        /// Print this profile's override for the context
        #[arg(long)]
        profile: Option<String>,
    },
    /// Make a profile the context's default
    SetDefault { id: String, profile: String },
    /// Fall back to the first applicable profile
    ClearDefault { id: String },
    /// Apply one pipeline update to the context's override
    Patch {
        id: String,
        update: String,
        /// Profile whose override to edit (default: the effective profile)
        #[arg(long)]
        profile: Option<String>,
    },
    /// Turn a toggleable node on for this context only
    Enable {
        id: String,
        node: String,
        #[arg(long)]
        profile: Option<String>,
    },
    /// Turn a toggleable node off for this context only
    Disable {
        id: String,
        node: String,
        #[arg(long)]
        profile: Option<String>,
    },
    /// Follow another profile's version of a node
    Defer {
        id: String,
        node: String,
        /// Profile to follow
        #[arg(long = "to")]
        source: String,
        #[arg(long)]
        profile: Option<String>,
    },
    /// Forget every customization of a context
    Reset { id: String },
    /// Drop the context's customization of a node
    Revert {
        id: String,
        node: String,
        #[arg(long)]
        profile: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: ContextSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ContextSubcommand::Show { id, profile } => show(root, &id, profile.as_deref(), json),
        ContextSubcommand::SetDefault { id, profile } => {
            set_default(root, &id, Some(&profile), json)
        }
        ContextSubcommand::ClearDefault { id } => set_default(root, &id, None, json),
        ContextSubcommand::Patch {
            id,
            update,
            profile,
        } => {
            let update = super::parse_update(&update)?;
            apply(root, &id, profile.as_deref(), update, json)
        }
        ContextSubcommand::Enable { id, node, profile } => apply(
            root,
            &id,
            profile.as_deref(),
            super::profile::set_enabled(&node, true),
            json,
        ),
        ContextSubcommand::Disable { id, node, profile } => apply(
            root,
            &id,
            profile.as_deref(),
            super::profile::set_enabled(&node, false),
            json,
        ),
        ContextSubcommand::Defer {
            id,
            node,
            source,
            profile,
        } => {
            let update = PipelineUpdate::SetOverrideSource {
                id: ActionId::new(node),
                source: Some(ProfileId::new(source)),
            };
            apply(root, &id, profile.as_deref(), update, json)
        }
        ContextSubcommand::Reset { id } => reset(root, &id, json),
        ContextSubcommand::Revert { id, node, profile } => {
            revert(root, &id, profile.as_deref(), &node, json)
        }
    }
}

/// The explicit profile, else the context's effective one.
fn pick_profile(
    root: &Path,
    deck: &Deck<FsStore>,
    ctx: &ContextId,
    explicit: Option<&str>,
) -> anyhow::Result<ProfileId> {
    match explicit {
        Some(p) => Ok(ProfileId::new(p)),
        None => {
            let collections = CollectionMap::load(root)?;
            Ok(deck.effective_profile(ctx, &collections)?)
        }
    }
}

fn show(root: &Path, id: &str, profile: Option<&str>, json: bool) -> anyhow::Result<()> {
    let (_, deck) = super::open(root)?;
    let ctx = ContextId::new(id);
    let context = deck
        .context(&ctx)
        .with_context(|| format!("failed to load context '{id}'"))?;

    if let Some(profile) = profile {
        let profile = ProfileId::new(profile);
        let Some(def) = context.override_for(&profile) else {
            anyhow::bail!("context '{id}' has no override for '{profile}'");
        };
        if json {
            print_json(def)?;
        } else {
            println!("Context: {id}, override of {profile}");
            super::profile::print_definition(def);
        }
        return Ok(());
    }

    let collections = CollectionMap::load(root)?;
    let applicable = deck.applicable_profiles(&ctx, &collections)?;
    let effective = deck.effective_profile(&ctx, &collections).ok();

    if json {
        print_json(&serde_json::json!({
            "id": context.id,
            "default_profile": context.default_profile,
            "effective_profile": effective,
            "applicable": applicable.iter().map(|p| &p.id).collect::<Vec<_>>(),
            "overrides": context.overrides.keys().collect::<Vec<_>>(),
        }))?;
        return Ok(());
    }

    println!("Context: {id}");
    println!(
        "Default:   {}",
        context
            .default_profile
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "(none)".to_string())
    );
    match effective {
        Some(p) => println!("Effective: {p}"),
        None => println!("Effective: (no applicable profile)"),
    }

    if applicable.is_empty() && context.overrides.is_empty() {
        return Ok(());
    }
    println!();
    let mut rows: Vec<Vec<String>> = applicable
        .iter()
        .map(|p| {
            vec![
                p.id.to_string(),
                "applicable".to_string(),
                context
                    .override_for(&p.id)
                    .map(|o| o.nodes.len().to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    for (pid, def) in &context.overrides {
        if !applicable.iter().any(|p| &p.id == pid) {
            rows.push(vec![pid.to_string(), String::new(), def.nodes.len().to_string()]);
        }
    }
    print_table(&["PROFILE", "STATUS", "OVERRIDDEN NODES"], rows);
    Ok(())
}

fn set_default(root: &Path, id: &str, profile: Option<&str>, json: bool) -> anyhow::Result<()> {
    let (_, deck) = super::open(root)?;
    let profile = profile.map(ProfileId::new);
    let context = deck
        .set_default_profile(&ContextId::new(id), profile.as_ref())
        .with_context(|| format!("failed to update context '{id}'"))?;

    if json {
        print_json(&serde_json::json!({
            "id": context.id,
            "default_profile": context.default_profile,
        }))?;
    } else {
        match profile {
            Some(p) => println!("Context {id} now defaults to {p}"),
            None => println!("Context {id} has no default profile"),
        }
    }
    Ok(())
}

fn reset(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let (_, deck) = super::open(root)?;
    deck.reset_context(&ContextId::new(id))
        .with_context(|| format!("failed to reset context '{id}'"))?;

    if json {
        print_json(&serde_json::json!({ "id": id, "reset": true }))?;
    } else {
        println!("Reset context: {id}");
    }
    Ok(())
}

fn apply(
    root: &Path,
    id: &str,
    profile: Option<&str>,
    update: PipelineUpdate,
    json: bool,
) -> anyhow::Result<()> {
    let (_, deck) = super::open(root)?;
    let ctx = ContextId::new(id);
    let profile = pick_profile(root, &deck, &ctx, profile)?;
    let shell = deck
        .patch_context(&ctx, &profile, &update)
        .with_context(|| format!("cannot apply {} to '{id}' ({profile})", update.op_name()))?;

    if json {
        print_json(&shell)?;
    } else {
        println!("Applied {} to context {id} ({profile})", update.op_name());
    }
    Ok(())
}

fn revert(
    root: &Path,
    id: &str,
    profile: Option<&str>,
    node: &str,
    json: bool,
) -> anyhow::Result<()> {
    let (_, deck) = super::open(root)?;
    let ctx = ContextId::new(id);
    let profile = pick_profile(root, &deck, &ctx, profile)?;
    let shell = deck
        .revert_context_node(&ctx, &profile, &ActionId::new(node))
        .with_context(|| format!("cannot revert '{node}' in '{id}'"))?;

    if json {
        print_json(&shell)?;
    } else {
        println!("Reverted {node} in context {id} ({profile})");
    }
    Ok(())
}
