//! libris server entry point.

use clap::Parser;
use libris::{
    auth::AuthService,
    config::{BookCommand, Cli, Command, Config, UserCommand},
    db::{self, Database},
    library::catalog,
    server,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    match cli.command {
        Some(Command::Init { force }) => cmd_init(force).await,
        Some(Command::User { action }) => cmd_user(action, &config).await,
        Some(Command::Book { action }) => cmd_book(action, &config).await,
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        None => cmd_serve(config, None).await,
    }
}

/// Initialize config, database and starter catalog.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    let config = Config::default();
    let db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    let added = catalog::seed(&db)?;
    println!("Added {} starter books", added);

    println!("\nEdit config.toml to configure your server.");
    println!("Then run: libris user add <email> --name <name> --role librarian");

    Ok(())
}

/// User management commands.
async fn cmd_user(action: UserCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;
    let auth = AuthService::from_config(db, &config.auth);

    match action {
        UserCommand::Add {
            email,
            name,
            password,
            role,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("Password: ")?,
            };

            let user = auth.create_user(&name, &email, &password, &role)?;
            println!(
                "Created user: {} (role: {}, id: {})",
                user.email, user.role, user.id
            );
        }

        UserCommand::Del { email } => {
            if auth.delete_user_by_email(&email)? {
                println!("Deleted user: {}", email);
            } else {
                println!("User not found: {}", email);
            }
        }

        UserCommand::List => {
            let users = auth.list_users()?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<6} {:<32} {:<20} {:<10} CREATED", "ID", "EMAIL", "NAME", "ROLE");
                println!("{}", "-".repeat(86));
                for user in users {
                    let created = db::timestamp_to_datetime(user.created_at)
                        .format("%Y-%m-%d %H:%M")
                        .to_string();
                    println!(
                        "{:<6} {:<32} {:<20} {:<10} {}",
                        user.id, user.email, user.name, user.role, created
                    );
                }
            }
        }

        UserCommand::Passwd { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt_password("New password: ")?,
            };

            if auth.change_password(&email, &password)? {
                println!("Password changed for: {}", email);
            } else {
                println!("User not found: {}", email);
            }
        }
    }

    Ok(())
}

/// Catalog management commands.
async fn cmd_book(action: BookCommand, config: &Config) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        BookCommand::List => {
            let books = db.list_books()?;
            if books.is_empty() {
                println!("No books found.");
            } else {
                println!("{:<6} {:<40} {:<24} YEAR", "ID", "TITLE", "AUTHOR");
                println!("{}", "-".repeat(80));
                for book in books {
                    println!(
                        "{:<6} {:<40} {:<24} {}",
                        book.id, book.title, book.author, book.year
                    );
                }
            }
        }

        BookCommand::Seed => {
            let added = catalog::seed(&db)?;
            println!("Added {} starter books", added);
        }

        BookCommand::Del { id } => {
            if db.delete_book(id)? {
                println!("Deleted book: {}", id);
            } else {
                println!("Book not found: {}", id);
            }
        }
    }

    Ok(())
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    // Override bind address if specified
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "libris=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = Database::open(&config.database.path)?;

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        registration = %config.auth.registration,
        "Starting libris server"
    );

    if config.catalog.seed_on_start {
        catalog::seed(&db)?;
    }

    let bind_addr = config.server.bind;
    let state = server::AppState::from_config(config, db);
    let app = server::create_router(state);

    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(address = %bind_addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Prompt for password input.
fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    Ok(password.trim().to_string())
}
