mod admin_cmds;
mod config;
mod serve_cmd;
#[cfg(test)]
mod test_util;

use clap::{Parser, Subcommand};

use planhub_db::pool;

use config::PlanhubConfig;

#[derive(Parser)]
#[command(name = "planhub", about = "Plan CRUD service")]
struct Cli {
    /// Database URL (overrides PLANHUB_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a planhub config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/planhub")]
        db_url: String,
        /// Enable cloud mode (trial plan quota)
        #[arg(long)]
        cloud: bool,
        /// Root directory for plan directories
        #[arg(long)]
        plans_dir: Option<std::path::PathBuf>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the planhub database (requires config file or env vars)
    DbInit,
    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides [server] bind)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides [server] port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Organization management
    Org {
        #[command(subcommand)]
        command: OrgCommands,
    },
    /// User management
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Project management
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// API token management
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum OrgCommands {
    /// Create an organization
    Create {
        /// Organization name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Create a user and add them to an organization
    Create {
        /// Email address (unique)
        email: String,
        /// Display name (defaults to the email)
        #[arg(long)]
        name: Option<String>,
        /// Organization ID to join
        #[arg(long)]
        org: String,
        /// Role in the org: owner, admin, member, viewer
        #[arg(long, default_value = "member")]
        role: String,
        /// Mark the user as a trial user
        #[arg(long)]
        trial: bool,
    },
    /// Set or clear a user's trial flag
    Trial {
        /// User ID
        user: String,
        /// New trial flag value
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        enabled: bool,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a project in an organization
    Create {
        /// Project name
        name: String,
        /// Organization ID
        #[arg(long)]
        org: String,
    },
    /// List projects in an organization
    List {
        /// Organization ID
        #[arg(long)]
        org: String,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Print an API token for a user acting in an organization
    Issue {
        /// User ID
        #[arg(long)]
        user: String,
        /// Organization ID
        #[arg(long)]
        org: String,
    },
}

/// Execute the `planhub init` command: write config file.
fn cmd_init(
    db_url: &str,
    cloud: bool,
    plans_dir: Option<std::path::PathBuf>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let token_secret = config::generate_token_secret();

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        auth: config::AuthSection {
            token_secret: token_secret.clone(),
        },
        server: config::ServerSection {
            cloud,
            plans_dir,
            ..config::ServerSection::default()
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  auth.token_secret = {}...{}", &token_secret[..8], &token_secret[56..]);
    println!("  server.cloud = {cloud}");
    println!();
    println!("Next: run `planhub db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `planhub db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = PlanhubConfig::resolve(cli_db_url)?;

    println!("Initializing planhub database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let summary = pool::summarize(&db_pool).await?;
    println!("Database ready.");
    println!("  orgs:     {}", summary.orgs);
    println!("  users:    {}", summary.users);
    println!("  projects: {}", summary.projects);
    println!(
        "  plans:    {} ({} drafts, {} archived)",
        summary.plans, summary.drafts, summary.archived
    );

    db_pool.close().await;

    println!("planhub db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            cloud,
            plans_dir,
            force,
        } => {
            cmd_init(&db_url, cloud, plans_dir, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            let resolved = PlanhubConfig::resolve(cli.database_url.as_deref())?;
            let mut settings = resolved.server;
            if let Some(bind) = bind {
                settings.bind = bind;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result =
                serve_cmd::run_serve(db_pool.clone(), resolved.token_config, &settings).await;
            db_pool.close().await;
            result?;
        }
        Commands::Org { command } => {
            let resolved = PlanhubConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = admin_cmds::run_org_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::User { command } => {
            let resolved = PlanhubConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = admin_cmds::run_user_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Project { command } => {
            let resolved = PlanhubConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = admin_cmds::run_project_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Token { command } => {
            let resolved = PlanhubConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result =
                admin_cmds::run_token_command(command, &db_pool, &resolved.token_config).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_accepts_overrides() {
        let cli = Cli::try_parse_from(["planhub", "serve", "--port", "9100", "--bind", "0.0.0.0"])
            .unwrap();
        match cli.command {
            Commands::Serve { bind, port } => {
                assert_eq!(bind.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(9100));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn user_create_defaults_to_member() {
        let cli = Cli::try_parse_from([
            "planhub",
            "user",
            "create",
            "dev@example.com",
            "--org",
            "6ba7b810-9dad-11d1-80b4-00c04fd430c8",
        ])
        .unwrap();
        match cli.command {
            Commands::User {
                command: UserCommands::Create { role, trial, .. },
            } => {
                assert_eq!(role, "member");
                assert!(!trial);
            }
            _ => panic!("expected user create"),
        }
    }
}
