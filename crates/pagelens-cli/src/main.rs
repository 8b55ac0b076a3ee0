use anyhow::Result;
use clap::{Parser, Subcommand};
use pagelens_service::{AppConfig, PageService};
use pagelens_storage::Store;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pagelens")]
#[command(about = "Company page insights: cached queries with scrape-on-miss population")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve,
    /// Fetch one page through the freshness policy and print it
    Fetch {
        page_id: String,
        /// Bypass the freshness check and re-acquire
        #[arg(long)]
        refresh: bool,
    },
    /// Create the database schema and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            pagelens_web::serve_from_env().await?;
        }
        Commands::Fetch { page_id, refresh } => {
            let config = AppConfig::from_env();
            let store = Store::connect(&config.database_url).await?;
            let service = PageService::new(store, config.build_acquirer()?)
                .with_reconcile_mode(config.reconcile_mode)
                .with_max_posts(config.max_posts_per_page);
            let page = service.get_or_refresh(&page_id, refresh).await?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Commands::Migrate => {
            let config = AppConfig::from_env();
            Store::connect(&config.database_url).await?;
            println!("schema ready at {}", config.database_url);
        }
    }

    Ok(())
}
