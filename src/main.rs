use anyhow::Result;
use clap::Parser;
use enginekit::cli::{AppContext, Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    enginekit::infra::logging::init(cli.verbose);

    // Build a context once, pass everywhere
    let ctx = AppContext {
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Cvars(args) => enginekit::core::cvars_run(args, &ctx),
        Commands::PchCheck(args) => enginekit::core::pch_run(args, &ctx),
        Commands::CmakeHeaders(args) => enginekit::core::cmake_headers_run(args, &ctx),
        Commands::MapEntities(args) => enginekit::core::paks::map_entities::run(args, &ctx),
        Commands::ScriptKeywords(args) => enginekit::core::paks::script_keywords::run(args, &ctx),
        Commands::DupPaks(args) => enginekit::core::paks::dup_paks::run(args, &ctx),
        Commands::Merged(args) => enginekit::core::merged_run(args, &ctx),
        Commands::UniqueWords(args) => enginekit::core::unique_words_run(args, &ctx),
        Commands::Init(args) => enginekit::infra::config::init(args, &ctx),
        Commands::Completions(args) => enginekit::completion::run(args, &ctx),
    }
}
