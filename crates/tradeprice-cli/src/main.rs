mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tradeprice-cli")]
#[command(about = "NZ trade store and price lookup")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Store location commands
    Stores {
        #[command(subcommand)]
        command: StoresCommands,
    },
    /// Compare prices for a product across retailers
    Prices {
        product: String,
        #[arg(long)]
        brand: Option<String>,
        /// Limit to these retailer ids; repeatable
        #[arg(long = "retailer")]
        retailers: Vec<String>,
    },
    /// Product catalog commands
    Products {
        #[command(subcommand)]
        command: ProductsCommands,
    },
    /// Auckland area lookups
    Area {
        #[command(subcommand)]
        command: AreaCommands,
    },
    /// Distance in km between two coordinates
    Distance {
        #[arg(allow_negative_numbers = true)]
        lat1: f64,
        #[arg(allow_negative_numbers = true)]
        lng1: f64,
        #[arg(allow_negative_numbers = true)]
        lat2: f64,
        #[arg(allow_negative_numbers = true)]
        lng2: f64,
    },
}

#[derive(Debug, Subcommand)]
enum StoresCommands {
    /// Fetch stores for every retailer, or just one
    Refresh {
        #[arg(long)]
        retailer: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum ProductsCommands {
    /// Catalog entries, optionally narrowed by category and text
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
        /// Rebuild the catalog before listing
        #[arg(long)]
        refresh: bool,
    },
    /// Search retailers for a product term
    Search {
        term: String,
        /// Limit to these retailer ids; repeatable
        #[arg(long = "retailer")]
        retailers: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
enum AreaCommands {
    /// Area containing or nearest to a coordinate
    Closest {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lng: f64,
    },
    /// Area names matching a partial name or alias
    Suggest {
        partial: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = match cli.command {
        Commands::Stores {
            command: StoresCommands::Refresh { retailer },
        } => commands::refresh_stores(retailer.as_deref()).await?,
        Commands::Prices {
            product,
            brand,
            retailers,
        } => commands::compare_prices(&product, brand.as_deref(), &retailers).await?,
        Commands::Products {
            command:
                ProductsCommands::List {
                    category,
                    search,
                    limit,
                    refresh,
                },
        } => {
            commands::list_products(category.as_deref(), search.as_deref(), limit, refresh).await?
        }
        Commands::Products {
            command: ProductsCommands::Search { term, retailers },
        } => commands::search_products(&term, &retailers).await?,
        Commands::Area {
            command: AreaCommands::Closest { lat, lng },
        } => commands::closest_area(lat, lng)?,
        Commands::Area {
            command: AreaCommands::Suggest { partial, limit },
        } => commands::suggest_areas(&partial, limit)?,
        Commands::Distance {
            lat1,
            lng1,
            lat2,
            lng2,
        } => commands::distance(lat1, lng1, lat2, lng2),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
