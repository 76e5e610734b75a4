use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use yc_directory_crawler::PipelineDriver;
use yc_directory_crawler::infrastructure::config::defaults;
use yc_directory_crawler::infrastructure::{
    ConfigManager, RendererFactory, build_factory, init_logging_with_config,
};

#[derive(Parser)]
#[command(
    name = "yc-directory-crawler",
    version,
    about = "Scrape the YC company directory and enrich it with founder data"
)]
struct Cli {
    /// Config file (JSON or TOML). Defaults to the user config dir if present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override logging.level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scroll the listing page and write the discovery CSV
    Discover {
        /// Stop once this many unique cards are loaded
        #[arg(long)]
        target: Option<usize>,

        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Read a discovery CSV, visit every detail page, write the enriched CSV
    Enrich {
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long)]
        output: Option<PathBuf>,

        /// Concurrent detail-page sessions
        #[arg(long, value_parser = parse_workers)]
        workers: Option<usize>,
    },
    /// Discovery then enrichment, writing both CSVs
    Run {
        #[arg(long)]
        target: Option<usize>,

        #[arg(long, value_parser = parse_workers)]
        workers: Option<usize>,
    },
    /// Write the default configuration file and exit
    InitConfig {
        /// Destination. Defaults to the user config dir
        path: Option<PathBuf>,
    },
}

fn parse_workers(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("workers must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::InitConfig { path } = &cli.command {
        let path = match path {
            Some(path) => path.clone(),
            None => ConfigManager::get_config_dir()?.join(defaults::CONFIG_FILE_NAME),
        };
        ConfigManager::write_default(&path).await?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config = ConfigManager::new(cli.config.clone())
        .load()
        .context("Failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_logging_with_config(&config.logging).context("Failed to initialize logging")?;

    info!("🚀 Starting YC directory crawler ({:?} renderer)", config.renderer.engine);

    let factory: Arc<dyn RendererFactory> = Arc::from(
        build_factory(&config)
            .await
            .context("Failed to initialize renderer")?,
    );
    let driver = PipelineDriver::new(config, factory);

    let result = execute(&driver, cli.command).await;
    driver.shutdown().await;
    result
}

async fn execute(driver: &PipelineDriver, command: Command) -> Result<()> {
    let output = driver.config().output.clone();

    match command {
        Command::Discover { target, output: path } => {
            let path = path.unwrap_or(output.discovery_csv);
            let report = driver
                .run_discovery(target, &path)
                .await
                .context("Discovery failed")?;
            info!("✅ Discovery finished: {} startups in {}", report.records.len(), path.display());
        }
        Command::Enrich {
            input,
            output: path,
            workers,
        } => {
            let input = input.unwrap_or(output.discovery_csv);
            let path = path.unwrap_or(output.enriched_csv);
            let (records, summary) = driver
                .enrich_file(&input, workers, &path)
                .await
                .with_context(|| format!("Enrichment of {} failed", input.display()))?;
            info!(
                "✅ Enrichment finished: {} startups ({} with founders) in {}",
                records.len(),
                summary.found,
                path.display()
            );
        }
        Command::Run { target, workers } => {
            let records = driver.run_all(target, workers).await.context("Pipeline run failed")?;
            info!(
                "✅ All done: {} startups in {}",
                records.len(),
                output.enriched_csv.display()
            );
        }
        Command::InitConfig { .. } => {}
    }
    Ok(())
}
