pub mod check;
pub mod collection;
pub mod config;
pub mod context;
pub mod init;
pub mod plan;
pub mod profile;
pub mod teardown;
pub mod template;

use anyhow::Context as _;
use clap::Args;
use deckpipe_core::{
    config::Config,
    dependency::LocalDependencyStatus,
    patch::PipelineUpdate,
    reify::ResolvedPipeline,
    service::Deck,
    store::{CollectionMap, FsStore},
    types::{ContextId, ProfileId, Target},
};
use std::io::Read;
use std::path::Path;

/// Which pipeline to reify: a profile on its own, or a context's view of
/// one (its effective profile unless `--profile` names another).
#[derive(Args)]
pub struct PipelineArgs {
    #[arg(long)]
    pub profile: Option<String>,

    #[arg(long)]
    pub context: Option<String>,

    /// primary or secondary (default: config.default_target)
    #[arg(long)]
    pub target: Option<Target>,
}

/// Config plus a store-backed Deck. Fails on an uninitialized root.
pub fn open(root: &Path) -> anyhow::Result<(Config, Deck<FsStore>)> {
    let config = Config::load(root).context("failed to load config")?;
    Ok((config, Deck::new(FsStore::new(root))))
}

pub fn resolve(root: &Path, args: &PipelineArgs) -> anyhow::Result<ResolvedPipeline> {
    let (config, deck) = open(root)?;
    let target = args.target.unwrap_or(config.default_target);
    let deps = LocalDependencyStatus::new(&config.dependencies);

    match (&args.context, &args.profile) {
        (Some(ctx), profile) => {
            let ctx = ContextId::new(ctx.as_str());
            let profile = match profile {
                Some(p) => ProfileId::new(p.as_str()),
                None => {
                    let collections = CollectionMap::load(root)?;
                    deck.effective_profile(&ctx, &collections)?
                }
            };
            deck.reify_context(&ctx, &profile, target, &deps)
                .with_context(|| format!("cannot reify '{profile}' for context '{ctx}'"))
        }
        (None, Some(profile)) => {
            let profile = ProfileId::new(profile.as_str());
            deck.reify_profile(&profile, target, &deps)
                .with_context(|| format!("cannot reify profile '{profile}'"))
        }
        (None, None) => anyhow::bail!("pass --profile, --context, or both"),
    }
}

/// Parse a PipelineUpdate from inline YAML/JSON, or from stdin when `-`.
pub fn parse_update(raw: &str) -> anyhow::Result<PipelineUpdate> {
    let text = if raw == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read update from stdin")?;
        buf
    } else {
        raw.to_string()
    };
    serde_yaml::from_str(&text).context("invalid pipeline update")
}
