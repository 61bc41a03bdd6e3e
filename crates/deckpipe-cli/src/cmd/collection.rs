use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use deckpipe_core::{
    paths,
    store::CollectionMap,
    types::{CollectionId, ContextId},
};
use std::path::Path;

#[derive(Subcommand)]
pub enum CollectionSubcommand {
    /// Put a context in a collection
    Add { collection: String, context: String },
    /// Take a context out of a collection
    Remove { collection: String, context: String },
    /// List collections and their contexts
    List,
}

pub fn run(root: &Path, subcmd: CollectionSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        CollectionSubcommand::Add {
            collection,
            context,
        } => {
            paths::validate_record_id(&context)?;
            edit(root, json, |map| {
                map.add(CollectionId::new(collection), ContextId::new(context))
            })
        }
        CollectionSubcommand::Remove {
            collection,
            context,
        } => edit(root, json, |map| {
            map.remove(&CollectionId::new(collection), &ContextId::new(context))
        }),
        CollectionSubcommand::List => list(root, json),
    }
}

fn edit(
    root: &Path,
    json: bool,
    change: impl FnOnce(&mut CollectionMap) -> bool,
) -> anyhow::Result<()> {
    super::open(root)?;
    let mut map = CollectionMap::load(root).context("failed to load collections")?;
    let changed = change(&mut map);
    if changed {
        map.save(root).context("failed to save collections")?;
    }

    if json {
        print_json(&serde_json::json!({ "changed": changed }))?;
    } else if changed {
        println!("Collections updated");
    } else {
        println!("Nothing to change");
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let map = CollectionMap::load(root).context("failed to load collections")?;

    if json {
        print_json(&map.collections)?;
        return Ok(());
    }

    if map.collections.is_empty() {
        println!("No collections yet.");
        return Ok(());
    }

    let rows = map
        .collections
        .iter()
        .map(|(id, members)| {
            let members: Vec<&str> = members.iter().map(ContextId::as_str).collect();
            vec![id.to_string(), members.join(", ")]
        })
        .collect();
    print_table(&["COLLECTION", "CONTEXTS"], rows);
    Ok(())
}
