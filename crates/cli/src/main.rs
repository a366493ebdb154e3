mod config;
mod error;

use std::path::PathBuf;
use std::sync::Arc;

use access::{AccessManager, Attributes};
use accounts::{
    AccountService, AdminUpdate, LoginRequest, ProfileUpdate, RegisterRequest, Role, UserProfile,
};
use clap::{Parser, Subcommand};
use storage::{KvStore, MemoryStore, SqliteStore, UserStore};
use tracing_subscriber::EnvFilter;

use config::{CacheBackend, Config};
use error::{Error, Result};

const CONFIG_FILE: &str = "biblioteca.toml";
const TOKEN_ENV: &str = "BIBLIOTECA_TOKEN";

#[derive(Parser)]
#[command(name = "biblioteca")]
#[command(about = "User accounts with attribute-based access control", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        password: String,
        /// user or admin
        #[arg(long, default_value = "user")]
        role: String,
    },
    /// Log in and print a session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Token currently held, if any
        #[arg(long)]
        token: Option<String>,
    },
    /// End a session
    Logout {
        #[arg(long)]
        token: Option<String>,
    },
    /// Show the user behind a token
    Whoami {
        #[arg(long)]
        token: Option<String>,
    },
    /// Show one user
    User {
        id: String,
    },
    /// List users
    Users {
        /// Only users with this role
        #[arg(short, long)]
        role: Option<String>,
    },
    /// Edit a profile (owner or admin)
    Edit {
        id: String,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Edit any profile by e-mail (admin only)
    AdminEdit {
        email: String,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        new_email: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    /// Evaluate an action against subject and resource attributes
    Check {
        action: String,
        /// Subject attribute as key=value (repeatable)
        #[arg(short, long = "subject")]
        subject: Vec<String>,
        /// Resource attribute as key=value (repeatable)
        #[arg(short, long = "resource")]
        resource: Vec<String>,
    },
    /// List actions with registered policies
    Policies,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Logs go to stderr so command output stays clean on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("biblioteca=info".parse()?)
                .add_directive("accounts=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;
    tracing::debug!(path = %cli.config.display(), "loaded config");

    let access = Arc::new(build_access(&config)?);

    match cli.command {
        Commands::Check {
            action,
            subject,
            resource,
        } => cmd_check(&access, &action, &subject, &resource),
        Commands::Policies => {
            cmd_policies(&access);
            Ok(())
        }
        command => {
            let data_dir = data_dir(&config)?;
            std::fs::create_dir_all(&data_dir)?;
            let users = UserStore::open(data_dir.join("users.db"))?;
            match config.cache.backend {
                CacheBackend::Sqlite => {
                    let store = SqliteStore::open(data_dir.join("cache.db"))?;
                    let service = AccountService::new(
                        users,
                        Arc::new(store),
                        access,
                        config.account_settings(),
                    );
                    dispatch(&service, command).await
                }
                CacheBackend::Memory => {
                    let service = AccountService::new(
                        users,
                        Arc::new(MemoryStore::new()),
                        access,
                        config.account_settings(),
                    );
                    dispatch(&service, command).await
                }
            }
        }
    }
}

fn build_access(config: &Config) -> Result<AccessManager> {
    let mut access = AccessManager::with_defaults();
    access.load_rules(config.rules.clone())?;
    Ok(access)
}

async fn dispatch<S: KvStore>(service: &AccountService<S>, command: Commands) -> Result<()> {
    match command {
        Commands::Register {
            email,
            first_name,
            last_name,
            password,
            role,
        } => {
            let profile = service
                .register(RegisterRequest {
                    first_name,
                    last_name,
                    email,
                    password,
                    role: role.parse()?,
                })
                .await?;
            println!("Registered {}", profile.id);
            print_profile(&profile);
        }
        Commands::Login {
            email,
            password,
            token,
        } => {
            let current = token_or_env(token);
            let session = service
                .login(LoginRequest { email, password }, current.as_deref())
                .await?;
            println!("{}", session.token);
            eprintln!("expires at {}", session.claims.expires_at.to_rfc3339());
        }
        Commands::Logout { token } => {
            service.logout(token_or_env(token).as_deref()).await?;
            println!("Logged out.");
        }
        Commands::Whoami { token } => {
            let token = require_token(token)?;
            print_profile(&service.current_user(&token).await?);
        }
        Commands::User { id } => {
            print_profile(&service.get_user(&id).await?);
        }
        Commands::Users { role } => {
            let role = role.map(|r| r.parse::<Role>()).transpose()?;
            print_users(&service.list_users(role).await?);
        }
        Commands::Edit {
            id,
            token,
            first_name,
            last_name,
            email,
            password,
        } => {
            let token = require_token(token)?;
            let update = ProfileUpdate {
                first_name,
                last_name,
                email,
                password,
            };
            print_profile(&service.edit_user(&token, &id, update).await?);
        }
        Commands::AdminEdit {
            email,
            token,
            first_name,
            last_name,
            new_email,
            role,
        } => {
            let token = require_token(token)?;
            let update = AdminUpdate {
                first_name,
                last_name,
                email: new_email,
                role: role.map(|r| r.parse::<Role>()).transpose()?,
            };
            print_profile(&service.admin_edit_user(&token, &email, update).await?);
        }
        Commands::Check { .. } | Commands::Policies => {}
    }
    Ok(())
}

fn cmd_check(access: &AccessManager, action: &str, subject: &[String], resource: &[String]) -> Result<()> {
    let subject = Attributes::from_pairs(subject.iter().map(String::as_str))?;
    let resource = Attributes::from_pairs(resource.iter().map(String::as_str))?;
    let allowed = access.check(action, &subject, &resource);
    println!("{action}: {}", if allowed { "allowed" } else { "denied" });
    Ok(())
}

fn cmd_policies(access: &AccessManager) {
    let actions = access.actions();
    if actions.is_empty() {
        println!("No policies registered.");
        return;
    }

    println!("{:<32}  POLICIES", "ACTION");
    println!("{}", "-".repeat(44));
    for action in actions {
        println!("{action:<32}  {}", access.policies_for(action));
    }
}

fn print_profile(profile: &UserProfile) {
    println!("id:    {}", profile.id);
    println!("name:  {} {}", profile.first_name, profile.last_name);
    println!("email: {}", profile.email);
    println!("role:  {}", profile.role);
}

fn print_users(users: &[UserProfile]) {
    println!("{:<32}  {:<24}  {:<32}  ROLE", "ID", "NAME", "EMAIL");
    println!("{}", "-".repeat(100));
    for user in users {
        let name = format!("{} {}", user.first_name, user.last_name);
        println!(
            "{:<32}  {:<24}  {:<32}  {}",
            user.id, name, user.email, user.role
        );
    }
}

/// The explicit token, falling back to `BIBLIOTECA_TOKEN`.
fn token_or_env(token: Option<String>) -> Option<String> {
    token.or_else(|| std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()))
}

fn require_token(token: Option<String>) -> Result<String> {
    token_or_env(token).ok_or(Error::Accounts(accounts::Error::NotAuthenticated))
}

fn data_dir(config: &Config) -> Result<PathBuf> {
    config
        .storage
        .data_dir
        .clone()
        .or_else(dirs_data_dir)
        .ok_or(Error::NoDataDir)
}

fn dirs_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share/biblioteca"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local/share")))
            .map(|p| p.join("biblioteca"))
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|h| PathBuf::from(h).join("biblioteca"))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        None
    }
}
