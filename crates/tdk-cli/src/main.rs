use anyhow::Result;
use clap::{Parser, Subcommand};
use tdk_alerts::{is_muted, set_muted};
use tdk_lifecycle::canonical_status;
use tdk_runtime::PgSettingsKv;
use tdk_schemas::Side;

mod commands;

#[derive(Parser)]
#[command(name = "tdk")]
#[command(about = "Trade Desk Kernel CLI", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (default: $TDK_CONFIG or config/base.yaml)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Trade ledger ingestion
    Sync {
        #[command(subcommand)]
        cmd: SyncCmd,
    },

    /// Run a reconciliation scan and persist its findings
    Scan {
        /// Audit domains (trades | positions | sync | all). Default: reconcile.default_scope
        #[arg(long)]
        scope: Vec<String>,

        /// Operator or process requesting the scan
        #[arg(long = "by")]
        triggered_by: String,
    },

    /// Reconciliation findings
    Findings {
        #[command(subcommand)]
        cmd: FindingsCmd,
    },

    /// Scan log
    Scans {
        #[command(subcommand)]
        cmd: ScansCmd,
    },

    /// Order alert settings
    Alerts {
        #[command(subcommand)]
        cmd: AlertsCmd,
    },

    /// Print the canonical lifecycle status for a raw exchange status
    Normalize {
        /// Raw status code or name (e.g. 2, BUYER_PAYED)
        raw: String,

        /// Order side (BUY | SELL)
        #[arg(long)]
        side: String,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum SyncCmd {
    /// Run exactly one sync cycle.
    Once,
}

#[derive(Subcommand)]
enum FindingsCmd {
    List {
        /// open | acknowledged | resolved
        #[arg(long)]
        status: Option<String>,
    },
    /// Aggregate counts over all findings
    Summary,
    /// Acknowledge or resolve an open finding
    Review {
        #[arg(long)]
        id: String,

        /// acknowledged | resolved
        #[arg(long)]
        status: String,

        #[arg(long)]
        note: Option<String>,
    },
}

#[derive(Subcommand)]
enum ScansCmd {
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum AlertsCmd {
    /// Show the mute flag for a user
    Status {
        #[arg(long, default_value = "operator")]
        user: String,
    },
    /// Set or clear the mute flag for a user
    Mute {
        #[arg(long, default_value = "operator")]
        user: String,

        /// Clear the flag instead of setting it
        #[arg(long, default_value_t = false)]
        off: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    let config_paths = cli.config_paths;

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = tdk_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = tdk_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_trades_table={} has_findings_table={}",
                        s.ok, s.has_trades_table, s.has_findings_table
                    );
                    if let Some(n) = s.trade_count {
                        println!("trade_count={n}");
                    }
                }
                DbCmd::Migrate => {
                    tdk_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = tdk_config::load_layered_yaml(&path_refs)?;
            loaded.engine()?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Sync { cmd } => match cmd {
            SyncCmd::Once => {
                let pool = tdk_db::connect_from_env().await?;
                commands::sync::sync_once(pool, &config_paths).await?;
            }
        },

        Commands::Scan {
            scope,
            triggered_by,
        } => {
            let pool = tdk_db::connect_from_env().await?;
            commands::reconcile::scan(pool, &config_paths, scope, triggered_by).await?;
        }

        Commands::Findings { cmd } => {
            let pool = tdk_db::connect_from_env().await?;
            match cmd {
                FindingsCmd::List { status } => {
                    commands::reconcile::list_findings(pool, &config_paths, status).await?
                }
                FindingsCmd::Summary => commands::reconcile::summary(pool, &config_paths).await?,
                FindingsCmd::Review { id, status, note } => {
                    commands::reconcile::review(pool, &config_paths, id, status, note).await?
                }
            }
        }

        Commands::Scans { cmd } => match cmd {
            ScansCmd::List { limit } => {
                let pool = tdk_db::connect_from_env().await?;
                commands::reconcile::list_scans(pool, &config_paths, limit).await?;
            }
        },

        Commands::Alerts { cmd } => {
            let pool = tdk_db::connect_from_env().await?;
            let kv = PgSettingsKv::new(pool);
            match cmd {
                AlertsCmd::Status { user } => {
                    let muted = is_muted(&kv, &user).await?;
                    println!("user_id={} muted={}", user, muted);
                }
                AlertsCmd::Mute { user, off } => {
                    set_muted(&kv, &user, !off).await?;
                    println!("user_id={} muted={}", user, !off);
                }
            }
        }

        Commands::Normalize { raw, side } => {
            let side = Side::parse(&side)?;
            let status = canonical_status(&raw, side);
            println!("{}", status.label());
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
