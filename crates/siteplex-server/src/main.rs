//! Siteplex server
//!
//! Hosts many sites behind one listener. Each request is dispatched to a
//! site by host name or by the first path segment, and every site owns its
//! own database pools.
//!
//! Usage:
//! ```bash
//! # Serve the sites of a configuration file
//! siteplex-server --config sites.yaml
//!
//! # Or of a configuration directory (config.yaml + sites/*.yaml)
//! siteplex-server --config-dir /etc/siteplex
//!
//! # Check pending migrations of every site without committing them
//! siteplex-server --config sites.yaml migrate --check
//!
//! # Apply the migrations of one site's main database
//! siteplex-server --config sites.yaml migrate shop --db main
//! ```

mod bootstrap;
mod commands;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use bootstrap::Bootstrap;
use clap::{Parser, Subcommand};
use siteplex_config_file::SitesConfig;
use tokio::net::TcpListener;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Siteplex - multi-site HTTP host
#[derive(Parser)]
#[command(name = "siteplex-server")]
#[command(about = "Serve many sites, each with its own databases, from one process", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (YAML or TOML)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "SITEPLEX_CONFIG",
        global = true
    )]
    config: Option<PathBuf>,

    /// Configuration directory with config.yaml and sites/*.yaml
    #[arg(long, value_name = "DIR", env = "SITEPLEX_CONFIG_DIR", global = true)]
    config_dir: Option<PathBuf>,

    /// Serve a single site for every request
    #[arg(long, global = true)]
    alone: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server (default if no command specified)
    Serve,
    /// List the configured sites with their bindings
    Sites {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Apply pending schema migrations
    Migrate {
        /// Site name, or `*` for every site
        site: Option<String>,

        /// Run the migrations and roll them back
        #[arg(long)]
        check: bool,

        /// Only these databases, in this order
        #[arg(long = "db", value_name = "NAME")]
        databases: Vec<String>,
    },
    /// Fire the init event of each site database
    InitDb {
        /// Site name, or `*` for every site
        site: Option<String>,

        /// Only these databases, in this order
        #[arg(long = "db", value_name = "NAME")]
        databases: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli)?;

    // Merge environment variables (they override config file)
    config.merge_env();

    // CLI flags have the highest precedence
    if cli.alone {
        config.alone = true;
    }

    init_tracing(&config)?;

    let lifecycle = commands::lifecycle_dispatcher()?;
    let Bootstrap { registry, router } = bootstrap::build(&config, &lifecycle).await?;

    let outcome = match cli.command {
        Some(Commands::Sites { json }) => commands::list_sites(&registry, json),
        Some(Commands::Migrate {
            site,
            check,
            databases,
        }) => commands::migrate(&registry, site.as_deref(), databases, check).await,
        Some(Commands::InitDb { site, databases }) => {
            commands::init_db(&registry, site.as_deref(), databases).await
        }
        Some(Commands::Serve) | None => serve(&config, &router).await,
    };

    bootstrap::close(&registry).await;
    outcome
}

fn load_config(cli: &Cli) -> Result<SitesConfig> {
    if let Some(path) = &cli.config {
        SitesConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))
    } else if let Some(dir) = &cli.config_dir {
        SitesConfig::from_dir(dir)
            .with_context(|| format!("Failed to load configuration from {}", dir.display()))
    } else {
        Ok(SitesConfig::default())
    }
}

/// Initialize tracing with configured level and sqlx query control
fn init_tracing(config: &SitesConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::new(format!("{}", log_level));

    // sqlx query logs stay at WARN unless explicitly requested
    if !config.logging.log_sql_queries {
        match "sqlx=warn".parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Failed to set sqlx log filter: {}", e),
        }
    }

    let builder = FmtSubscriber::builder().with_env_filter(filter);
    let installed = if config.logging.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.context("Failed to install tracing subscriber")?;
    Ok(())
}

async fn serve(config: &SitesConfig, router: &siteplex_routing::SitesRouter) -> Result<()> {
    let app = router.into_axum_router()?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Listening on http://{}{}/", addr, router.options().mount_prefix());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_migrate() {
        let cli = Cli::parse_from([
            "siteplex-server",
            "--config",
            "sites.yaml",
            "migrate",
            "shop",
            "--check",
            "--db",
            "main",
            "--db",
            "logs",
        ]);
        match cli.command {
            Some(Commands::Migrate {
                site,
                check,
                databases,
            }) => {
                assert_eq!(site.as_deref(), Some("shop"));
                assert!(check);
                assert_eq!(databases, vec!["main", "logs"]);
            }
            _ => panic!("expected migrate"),
        }
        assert_eq!(cli.config, Some(PathBuf::from("sites.yaml")));
    }

    #[test]
    fn test_cli_defaults_to_serve() {
        let cli = Cli::parse_from(["siteplex-server", "--alone"]);
        assert!(cli.command.is_none());
        assert!(cli.alone);
    }
}
