use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use deckpipe_core::{template::TemplateCatalog, types::TemplateId};

#[derive(Subcommand)]
pub enum TemplateSubcommand {
    /// List built-in templates
    List,
    /// Show a template's nodes
    Show { id: String },
}

pub fn run(subcmd: TemplateSubcommand, json: bool) -> anyhow::Result<()> {
    let catalog = TemplateCatalog::builtin();
    match subcmd {
        TemplateSubcommand::List => {
            if json {
                let summaries: Vec<_> = catalog
                    .list()
                    .map(|t| serde_json::json!({ "id": t.id, "summary": t.summary }))
                    .collect();
                return print_json(&summaries);
            }
            let rows = catalog
                .list()
                .map(|t| vec![t.id.to_string(), t.summary.to_string()])
                .collect();
            print_table(&["ID", "SUMMARY"], rows);
            Ok(())
        }
        TemplateSubcommand::Show { id } => {
            let template = catalog
                .get(&TemplateId::new(id.as_str()))
                .with_context(|| format!("no template '{id}'"))?;
            if json {
                return print_json(template);
            }
            println!("Template: {}", template.id);
            super::profile::print_definition(&template.definition);
            Ok(())
        }
    }
}
