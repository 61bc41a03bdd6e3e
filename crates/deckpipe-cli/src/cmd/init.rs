use anyhow::Context;
use deckpipe_core::{config::Config, io, paths, store::CollectionMap};
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing deckpipe in: {}", root.display());

    for dir in [paths::DECKPIPE_DIR, paths::PROFILES_DIR, paths::CONTEXTS_DIR] {
        let p = root.join(dir);
        io::ensure_dir(&p).with_context(|| format!("failed to create {}", p.display()))?;
    }

    if paths::config_path(root).exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        Config::default()
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    if paths::collections_path(root).exists() {
        println!("  exists:  {}", paths::COLLECTIONS_FILE);
    } else {
        CollectionMap::default()
            .save(root)
            .context("failed to write collections.yaml")?;
        println!("  created: {}", paths::COLLECTIONS_FILE);
    }

    println!("\nNext: deckpipe profile create <id> --template dual-screen");
    Ok(())
}
