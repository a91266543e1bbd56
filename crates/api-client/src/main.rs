//! Operator CLI for the upstream API fallback system.

use anyhow::{bail, Context, Result};
use api_client::{FallbackClient, HealthChecker, NormalizedResponse, StatusMonitor};
use clap::{Parser, Subcommand};
use shared::{domain, Config, Database, EndpointRegistry, EndpointUpdate, NewEndpoint};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage upstream API endpoints
    Endpoints {
        #[command(subcommand)]
        action: EndpointAction,
    },

    /// Probe every active endpoint across the monitored paths and record results
    Check,

    /// Fetch a resource through the fallback chain and print it
    Fetch {
        #[command(subcommand)]
        resource: FetchCommand,
    },

    /// Delete health history older than the given number of days
    PruneHealth {
        #[arg(long, default_value_t = 30)]
        keep_days: i64,
    },
}

#[derive(Subcommand, Debug)]
enum EndpointAction {
    /// List endpoints (active only by default)
    List {
        /// Include inactive endpoints
        #[arg(long)]
        all: bool,
    },

    /// Add a new endpoint
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        url: String,
        /// Source site domain, e.g. gomunime.co
        #[arg(long)]
        domain: String,
        /// Higher number = tried first
        #[arg(long, default_value_t = 0)]
        priority: i64,
        /// Create the endpoint disabled
        #[arg(long)]
        inactive: bool,
    },

    /// Update fields of an existing endpoint
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        domain: Option<String>,
        #[arg(long)]
        priority: Option<i64>,
        #[arg(long, conflicts_with = "deactivate")]
        activate: bool,
        #[arg(long)]
        deactivate: bool,
    },

    /// Soft-disable an endpoint (preferred over delete)
    Deactivate {
        #[arg(long)]
        id: i64,
    },

    /// Hard-delete an endpoint and its health history
    Delete {
        #[arg(long)]
        id: i64,
    },

    /// Run a one-off live health probe against one endpoint
    Test {
        #[arg(long)]
        id: i64,
        /// Path to probe instead of the configured health path
        #[arg(long)]
        path: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum FetchCommand {
    /// Home page aggregate
    Home,
    /// Latest anime
    Latest {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Movie list
    Movies {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Release schedule, optionally one day
    Schedule {
        #[arg(long)]
        day: Option<String>,
    },
    /// Anime detail by slug or source-site URL
    Anime {
        #[arg(long)]
        slug: String,
    },
    /// Episode detail by source-site URL
    Episode {
        #[arg(long)]
        url: String,
    },
    /// Title search
    Search {
        #[arg(long)]
        query: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging
    let log_level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    shared::logging::init(shared::LogConfig {
        log_dir: config.log_dir().to_string_lossy().to_string(),
        component: "api-client".to_string(),
        default_level: log_level,
        console: true,
        file: true,
        json_format: false,
    })?;

    info!(config_file = %args.config.display(), "Loaded configuration");

    // Initialize database and registry
    std::fs::create_dir_all(config.data_dir()).context("Failed to create data directory")?;

    let db_path = config.database_path();
    info!(db_path = %db_path.display(), "Opening database");
    let database = Database::open(&db_path).context("Failed to open database")?;

    let registry = Arc::new(EndpointRegistry::new(
        database,
        Duration::from_secs(config.api.registry_cache_ttl_secs),
    ));

    match args.command {
        Command::Endpoints { action } => run_endpoints(action, &registry, &config).await,
        Command::Check => run_check(&registry, &config).await,
        Command::Fetch { resource } => run_fetch(resource, &registry, &config).await,
        Command::PruneHealth { keep_days } => {
            let cutoff = chrono::Utc::now() - chrono::Duration::days(keep_days);
            let removed = registry.prune_health_before(cutoff)?;
            println!("Removed {} health records older than {} days", removed, keep_days);
            Ok(())
        }
    }
}

async fn run_endpoints(
    action: EndpointAction,
    registry: &Arc<EndpointRegistry>,
    config: &Config,
) -> Result<()> {
    match action {
        EndpointAction::List { all } => {
            let endpoints = if all {
                registry.list_all()?
            } else {
                registry.list_active()?
            };

            if endpoints.is_empty() {
                println!("No endpoints configured.");
                return Ok(());
            }

            println!("Found {} endpoints:", endpoints.len());
            for endpoint in endpoints {
                let status = if endpoint.is_active { "ACTIVE" } else { "INACTIVE" };
                let last_used = endpoint
                    .last_used
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".to_string());

                println!(
                    "  [{}] {} | priority {} | {}",
                    endpoint.id, endpoint.name, endpoint.priority, status
                );
                println!("      url: {}", endpoint.url);
                println!("      domain: {}", endpoint.source_domain);
                println!(
                    "      served: {} | last used: {}",
                    endpoint.success_count, last_used
                );
            }
            Ok(())
        }

        EndpointAction::Add {
            name,
            url,
            domain,
            priority,
            inactive,
        } => {
            if !domain::is_valid_domain(&domain) {
                bail!("'{}' is not a valid source domain", domain);
            }

            let endpoint = registry.add(&NewEndpoint {
                name,
                url,
                source_domain: domain::strip_scheme(&domain).to_string(),
                priority,
                is_active: !inactive,
            })?;

            println!("Added endpoint [{}] {}", endpoint.id, endpoint.name);
            Ok(())
        }

        EndpointAction::Update {
            id,
            name,
            url,
            domain,
            priority,
            activate,
            deactivate,
        } => {
            if let Some(ref domain) = domain {
                if !domain::is_valid_domain(domain) {
                    bail!("'{}' is not a valid source domain", domain);
                }
            }

            let is_active = match (activate, deactivate) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };

            let endpoint = registry.update(
                id,
                &EndpointUpdate {
                    name,
                    url,
                    source_domain: domain.map(|d| domain::strip_scheme(&d).to_string()),
                    priority,
                    is_active,
                },
            )?;

            println!("Updated endpoint [{}] {}", endpoint.id, endpoint.name);
            Ok(())
        }

        EndpointAction::Deactivate { id } => {
            let endpoint = registry.deactivate(id)?;
            println!("Deactivated endpoint [{}] {}", endpoint.id, endpoint.name);
            Ok(())
        }

        EndpointAction::Delete { id } => {
            registry.delete(id)?;
            println!("Deleted endpoint [{}]", id);
            Ok(())
        }

        EndpointAction::Test { id, path } => {
            let endpoint = registry.get(id)?;
            let checker = HealthChecker::new(&config.api)?;
            let probe_path = path.unwrap_or_else(|| config.api.health_path.clone());

            let result = checker.check(&endpoint, &probe_path).await;

            println!(
                "{} {}/{}",
                endpoint.name,
                endpoint.url.trim_end_matches('/'),
                probe_path.trim_start_matches('/')
            );
            println!("  status: {}", result.status);
            if let Some(ms) = result.response_time_ms {
                println!("  response time: {}ms", ms);
            }
            if let Some(error) = result.error {
                println!("  error: {}", error);
            }
            Ok(())
        }
    }
}

async fn run_check(registry: &Arc<EndpointRegistry>, config: &Config) -> Result<()> {
    let checker = HealthChecker::new(&config.api)?;
    let monitor = StatusMonitor::new(
        checker,
        Arc::clone(registry),
        config.monitor.search_probe_query.clone(),
    );

    let stats = monitor.run_once(&config.monitor.paths).await?;

    println!(
        "Checked {} endpoints, {} probes: {} up, {} down, {} error",
        stats.endpoints_checked, stats.probes, stats.up, stats.down, stats.error
    );
    for summary in &stats.per_endpoint {
        println!(
            "  {}: {} up, {} down, {} error",
            summary.name, summary.up, summary.down, summary.error
        );
    }
    Ok(())
}

async fn run_fetch(
    resource: FetchCommand,
    registry: &Arc<EndpointRegistry>,
    config: &Config,
) -> Result<()> {
    let client = FallbackClient::new(Arc::clone(registry), &config.api)?;

    let response = match resource {
        FetchCommand::Home => client.get_home().await?,
        FetchCommand::Latest { page } => client.get_anime_terbaru(page).await?,
        FetchCommand::Movies { page } => client.get_movie_list(page).await?,
        FetchCommand::Schedule { day } => client.get_jadwal_rilis(day.as_deref()).await?,
        FetchCommand::Anime { slug } => {
            // Accept either a bare slug or a full source-site URL
            let current_domain = current_source_domain(registry)?;
            let slug = domain::extract_anime_slug(&slug, &current_domain);
            let response = client.get_anime_detail(&slug).await?;

            println!(
                "source page: {}",
                domain::build_source_url(&response.source_domain, &format!("anime/{}/", slug))
            );
            response
        }
        FetchCommand::Episode { url } => client.get_episode_detail(&url).await?,
        FetchCommand::Search { query } => client.search_anime(&query).await?,
    };

    print_response(&response)?;
    Ok(())
}

/// Source domain of the current highest-priority active endpoint.
fn current_source_domain(registry: &Arc<EndpointRegistry>) -> Result<String> {
    let endpoints = registry.list_active()?;
    Ok(endpoints
        .first()
        .map(|e| e.source_domain.clone())
        .unwrap_or_else(|| "gomunime.co".to_string()))
}

fn print_response(response: &NormalizedResponse) -> Result<()> {
    println!(
        "served by: {} ({}) | confidence: {:.2} | fetched: {}",
        response.source_name,
        response.source_domain,
        response.confidence,
        response.fetched_at.format("%Y-%m-%d %H:%M:%S"),
    );
    println!("{}", serde_json::to_string_pretty(&response.data)?);
    Ok(())
}
