use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use deckpipe_core::{
    paths,
    saga::TeardownLog,
    teardown_db::TeardownDb,
    types::ContextId,
};
use std::path::Path;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum TeardownSubcommand {
    /// List pending compensations, oldest first
    List {
        /// Only entries recorded for this context
        #[arg(long)]
        context: Option<String>,
    },
    /// Drop entries without running them
    Forget {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
}

pub fn run(root: &Path, subcmd: TeardownSubcommand, json: bool) -> anyhow::Result<()> {
    super::open(root)?;
    let db = TeardownDb::open(&paths::teardown_db_path(root))
        .context("failed to open teardown log")?;
    match subcmd {
        TeardownSubcommand::List { context } => list(&db, context.as_deref(), json),
        TeardownSubcommand::Forget { ids } => forget(&db, &ids, json),
    }
}

fn list(db: &TeardownDb, context: Option<&str>, json: bool) -> anyhow::Result<()> {
    let context = context.map(ContextId::new);
    let entries = db
        .list(context.as_ref())
        .context("failed to read teardown log")?;

    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("Nothing to tear down.");
        return Ok(());
    }

    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.id.to_string(),
                e.recorded_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                e.owning_context
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "-".to_string()),
                e.action_id.to_string(),
                e.compensation.kind().to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "RECORDED", "CONTEXT", "NODE", "UNDO"], rows);
    Ok(())
}

fn forget(db: &TeardownDb, ids: &[Uuid], json: bool) -> anyhow::Result<()> {
    db.remove(ids).context("failed to update teardown log")?;
    if json {
        print_json(&serde_json::json!({ "forgotten": ids }))?;
    } else {
        println!("Forgot {} teardown entr{}", ids.len(), if ids.len() == 1 { "y" } else { "ies" });
    }
    Ok(())
}
