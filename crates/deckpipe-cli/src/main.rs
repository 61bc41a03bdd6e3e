mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    collection::CollectionSubcommand, config::ConfigSubcommand, context::ContextSubcommand,
    profile::ProfileSubcommand, teardown::TeardownSubcommand, template::TemplateSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "deckpipe",
    about = "Launch pipelines for dual-screen handhelds: profiles, per-app overrides, teardown",
    version,
    propagate_version = true
)]
struct Cli {
    /// Data root (default: auto-detect from .deckpipe/ upward, else cwd)
    #[arg(long, global = true, env = "DECKPIPE_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .deckpipe/ with a default config
    Init,

    /// Manage profiles
    Profile {
        #[command(subcommand)]
        subcommand: ProfileSubcommand,
    },

    /// Inspect and customize a context's view of its profiles
    Context {
        #[command(subcommand)]
        subcommand: ContextSubcommand,
    },

    /// Manage which collections contain which contexts
    Collection {
        #[command(subcommand)]
        subcommand: CollectionSubcommand,
    },

    /// Reify a pipeline and report the dependencies that block launching it
    Check {
        #[command(flatten)]
        source: cmd::PipelineArgs,
    },

    /// Show the ordered actions setup would apply
    Plan {
        #[command(flatten)]
        source: cmd::PipelineArgs,
    },

    /// List built-in templates
    Template {
        #[command(subcommand)]
        subcommand: TemplateSubcommand,
    },

    /// Inspect the pending teardown log
    Teardown {
        #[command(subcommand)]
        subcommand: TeardownSubcommand,
    },

    /// Inspect and validate .deckpipe/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Profile { subcommand } => cmd::profile::run(&root, subcommand, cli.json),
        Commands::Context { subcommand } => cmd::context::run(&root, subcommand, cli.json),
        Commands::Collection { subcommand } => cmd::collection::run(&root, subcommand, cli.json),
        Commands::Check { source } => cmd::check::run(&root, &source, cli.json),
        Commands::Plan { source } => cmd::plan::run(&root, &source, cli.json),
        Commands::Template { subcommand } => cmd::template::run(subcommand, cli.json),
        Commands::Teardown { subcommand } => cmd::teardown::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
