use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use docsql::{Config, Driver, JsonFileStore};
use docsql_core::Scheme;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "docsql")]
#[command(about = "Run SQL-like query schemes against a JSON document store", long_about = None)]
struct Args {
    /// Directory holding docsql.toml and .env
    #[arg(long, default_value = ".")]
    config: PathBuf,

    /// Data file (overrides the config file)
    #[arg(long)]
    data: Option<PathBuf>,

    /// Query files, each a JSON array of schemes
    #[arg(required = true)]
    queries: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let data_file = args.data.unwrap_or_else(|| config.data_file.clone());
    let store = JsonFileStore::open(&data_file)?;
    tracing::info!("Data file: {}", data_file.display());

    let driver = Driver::new(Arc::new(store));
    driver.connect().await?;

    let mut outputs = Vec::new();
    for path in &args.queries {
        let content = std::fs::read_to_string(path)?;
        let schemes: Vec<Scheme> = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
        tracing::debug!("{}: {} queries", path.display(), schemes.len());
        outputs.extend(driver.execute(schemes).await?);
    }

    driver.disconnect().await?;

    let output = serde_json::Value::Array(outputs);
    if config.pretty {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", output);
    }
    Ok(())
}
