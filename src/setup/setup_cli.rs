use clap::{Parser, Subcommand};
use journal_backend::config::Config;
use journal_backend::helper::encryption_helpers::{self, DataEncryption};
use journal_backend::models::db_operations::users_db_operations;
use journal_backend::models::{NewUser, Role};
use journal_backend::setup::db_setup;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial application setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    /// Create the schema. Safe to re-run.
    Setup,
}

#[derive(Subcommand, Debug)]
enum AdminAction {
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    List,
    ChangePassword {
        #[arg(long)]
        username: String,
        #[arg(long)]
        new_password: String,
    },
}

#[derive(Subcommand, Debug)]
enum KeyAction {
    /// Print a fresh value for ENCRYPTION_KEY.
    Generate,
    /// Verify that the configured ENCRYPTION_KEY is usable.
    Check,
}

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        // A new key is needed before the configuration is complete, so this one skips loading it.
        Commands::Key { action: KeyAction::Generate } => println!("{}", encryption_helpers::generate_key()),
        Commands::Key { action: KeyAction::Check } => check_key(&load_config(&cli)),
        Commands::Db { action: DbAction::Setup } => setup_database(&load_config(&cli)),
        Commands::Admin { action } => {
            let config = load_config(&cli);
            match action {
                AdminAction::Create { username, email, password } => {
                    create_admin_user(&config, username, email, password)
                }
                AdminAction::List => list_admin_users(&config),
                AdminAction::ChangePassword { username, new_password } => {
                    change_admin_password(&config, username, new_password)
                }
            }
        }
    }
}

fn load_config(cli: &Cli) -> Config {
    let config = Config::from_env(&cli.env_file).expect("FATAL: Failed to load or parse configuration.");
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));
    config
}

fn open_database(config: &Config) -> Option<Connection> {
    let Some(db_path) = config.database_file() else {
        eprintln!("❌ Error: APP_ENV=testing uses an in-memory database; there is nothing to set up on disk.");
        return None;
    };
    if let Some(parent_dir) = db_path.parent() {
        if let Err(e) = fs::create_dir_all(parent_dir) {
            eprintln!("❌ Error creating database directory '{}': {}", parent_dir.display(), e);
            return None;
        }
    }
    match Connection::open(&db_path).and_then(|conn| db_setup::configure_connection(&conn).map(|_| conn)) {
        Ok(conn) => Some(conn),
        Err(e) => {
            eprintln!("❌ Error opening database at '{}': {}", db_path.display(), e);
            None
        }
    }
}

fn setup_database(config: &Config) {
    let Some(mut conn) = open_database(config) else { return };
    println!("\nSetting up database at '{}'...", config.database_path);
    match db_setup::setup_database(&mut conn) {
        Ok(_) => println!("✅ Database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up database: {}", e),
    }
}

fn create_admin_user(config: &Config, username: &str, email: &str, password: &str) {
    let Some(mut conn) = open_database(config) else { return };
    if let Err(e) = db_setup::setup_database(&mut conn) {
        eprintln!("❌ Error preparing database: {}", e);
        return;
    }
    let new_user = NewUser {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        role: Role::Admin,
    };
    match users_db_operations::create_user(&mut conn, &new_user) {
        Ok(user) => println!("✅ Admin user '{}' created successfully (id {}).", user.username, user.id),
        Err(e) => eprintln!("❌ Error creating admin user: {}", e),
    }
}

fn list_admin_users(config: &Config) {
    let Some(conn) = open_database(config) else { return };
    match users_db_operations::read_users_by_role(&conn, Role::Admin) {
        Ok(admins) => {
            println!("Listing Admin Users:");
            for admin in admins {
                let status = if admin.is_active { "" } else { " (deactivated)" };
                println!("- {} <{}>{}", admin.username, admin.email, status);
            }
        }
        Err(e) => eprintln!("❌ Error fetching admins: {}. Has `setup_cli db setup` been run?", e),
    }
}

fn change_admin_password(config: &Config, username: &str, new_password: &str) {
    let Some(conn) = open_database(config) else { return };
    match users_db_operations::read_user_by_username(&conn, username) {
        Ok(Some(user)) if user.role == Role::Admin => {}
        Ok(_) => {
            eprintln!("❌ Error: No admin user named '{}' found.", username);
            return;
        }
        Err(e) => {
            eprintln!("❌ Error looking up '{}': {}", username, e);
            return;
        }
    }
    match users_db_operations::change_password(&conn, username, new_password) {
        Ok(()) => println!("✅ Password for admin user '{}' changed successfully.", username),
        Err(e) => eprintln!("❌ Error updating password: {}", e),
    }
}

fn check_key(config: &Config) {
    if config.encryption_key.is_none() {
        eprintln!("❌ ENCRYPTION_KEY is not set. The server would fall back to an ephemeral key; run `setup_cli key generate`.");
        return;
    }
    let result = DataEncryption::from_config(config).and_then(|enc| {
        let token = enc.encrypt("key check")?;
        enc.decrypt(&token)
    });
    match result {
        Ok(_) => println!("✅ ENCRYPTION_KEY is valid."),
        Err(e) => eprintln!("❌ ENCRYPTION_KEY is not usable: {}", e),
    }
}
