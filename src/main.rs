mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{CacheAction, Cli, Commands, ConfigAction};
use minisite::prelude::*;
use minisite::settings::Settings;
use minisite::templates::{all_templates, template_for};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Templates { kind } => {
            let templates = match kind {
                Some(k) => match template_for(&k) {
                    Some(t) => vec![t],
                    None => bail!("unknown template kind `{k}` (expected movie, book, music)"),
                },
                None => all_templates(),
            };
            println!("{}", serde_json::to_string_pretty(&templates)?);
        }
        Commands::Parse { config, input } => {
            let raw = std::fs::read_to_string(&config).with_context(|| format!("reading {}", config.display()))?;
            let cfg: ContentTypeConfiguration = serde_json::from_str(&raw).with_context(|| format!("decoding {}", config.display()))?;
            cfg.validate()?;
            let doc = std::fs::read_to_string(&input).with_context(|| format!("reading {}", input.display()))?;
            let parsed = parse(&doc, &cfg)?;
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        command => {
            let mut settings = Settings::load(cli.settings.as_deref())?;
            if cli.database.is_some() {
                settings.database_url = cli.database;
            }
            let agg = Aggregator::connect(&settings, true).await?;
            run_stored(&agg, command).await?;
        }
    }
    Ok(())
}

async fn run_stored(agg: &Aggregator, command: Commands) -> Result<()> {
    match command {
        Commands::Config { action } => match action {
            ConfigAction::Set { file } => {
                let raw = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
                let source: SourceConfiguration = serde_json::from_str(&raw).with_context(|| format!("decoding {}", file.display()))?;
                let revision = agg.save_configuration(&source).await?;
                println!("{} saved (revision {})", source.source_id, revision);
            }
            ConfigAction::Show { source } => match agg.get_configuration(&source).await? {
                Some(cfg) => println!("{}", serde_json::to_string_pretty(&cfg)?),
                None => println!("no configuration for {source}"),
            },
            ConfigAction::Delete { source } => {
                if agg.delete_configuration(&source).await? {
                    println!("{source} deleted");
                } else {
                    println!("no configuration for {source}");
                }
            }
            ConfigAction::List => {
                for (id, name) in agg.list_configurations().await? {
                    println!("{id}\t{name}");
                }
            }
        },
        Commands::Fetch { source, url, refresh } => match agg.load_listing(&source, &url, refresh).await? {
            Listing::Custom(parsed) => println!("{}", serde_json::to_string_pretty(&parsed)?),
            Listing::Default(raw) => {
                eprintln!("{source} has no mapping configuration; raw document follows");
                println!("{raw}");
            }
        },
        Commands::Items { source, category } => {
            let items = agg.list_items(&source, category).await?;
            for it in &items {
                println!("{}\t{}\t{}", it.id, it.name, it.remarks.as_deref().unwrap_or(""));
            }
            eprintln!("{} item(s)", items.len());
        }
        Commands::Cache { action } => match action {
            CacheAction::Clear { prefix } => {
                let n = agg.clear_response_cache(prefix.as_deref()).await?;
                println!("removed {n} cached document(s)");
            }
            CacheAction::Vacuum => agg.vacuum_db().await?,
        },
        Commands::Templates { .. } | Commands::Parse { .. } => bail!("command does not use the database"),
    }
    Ok(())
}
