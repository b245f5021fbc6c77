//! Canopy CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (schema + session table)
//! canopy migrate
//!
//! # Create an admin account
//! canopy admin create -e ops@canopy.shop -p "$ADMIN_PASSWORD" -n Robin
//!
//! # Promote an existing account
//! canopy admin promote -e ops@canopy.shop
//!
//! # Seed system categories and default settings
//! canopy seed
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `admin create` / `admin promote` - Manage admin accounts
//! - `seed` - Insert reference data

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "canopy")]
#[command(author, version, about = "Canopy CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Seed system categories and settings defaults
    Seed,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin account
    Create {
        /// Admin email address
        #[arg(short, long, env = "CANOPY_ADMIN_EMAIL")]
        email: String,

        /// Admin password (min 8 characters)
        #[arg(short, long, env = "CANOPY_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,

        /// First name shown in the back office
        #[arg(short = 'n', long)]
        first_name: Option<String>,
    },
    /// Give an existing account the admin role
    Promote {
        /// Account email address
        #[arg(short, long, env = "CANOPY_ADMIN_EMAIL")]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Create {
                email,
                password,
                first_name,
            } => commands::admin::create_user(&email, &password, first_name.as_deref()).await?,
            AdminAction::Promote { email } => commands::admin::promote(&email).await?,
        },
        Commands::Seed => commands::seed::run().await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_admin_create_args() {
        let cli = Cli::try_parse_from([
            "canopy", "admin", "create", "-e", "ops@canopy.shop", "-p", "hunter22!", "-n", "Robin",
        ]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Admin {
                action: AdminAction::Create { .. }
            })
        ));
    }
}
