use actix_cors::Cors;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    cookie::Key,
    http::header,
    middleware::{DefaultHeaders, Logger},
    web, App, HttpResponse, HttpServer, Responder,
};
use clap::Parser;
use journal_backend::{
    build_pool, config::Config, helper::encryption_helpers::DataEncryption, routes, setup::db_setup,
};
use std::fs;
use std::path::PathBuf;

async fn root_handler() -> impl Responder {
    HttpResponse::Ok().content_type("text/plain").body("OK")
}

#[derive(Parser, Debug)]
#[command(name = "journal_server", author, version, about = "Starts the journal web server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

fn build_cors(allowed_origins: &str) -> Cors {
    let cors = if allowed_origins.trim() == "*" {
        Cors::default().allow_any_origin()
    } else {
        allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .supports_credentials()
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file).expect("FATAL: Failed to load or parse configuration.");

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));
    log::info!("Starting in {} mode", config.app_env.as_str());

    if let Some(db_file) = config.database_file() {
        if let Some(parent) = db_file.parent() {
            fs::create_dir_all(parent).expect("Failed to create database directory");
        }
    }
    fs::create_dir_all(&config.upload_path).expect("Failed to create upload directory");

    let pool = build_pool(&config).expect("FATAL: Failed to create Rusqlite connection pool.");
    {
        let mut conn = pool.get().expect("Failed to get DB connection for schema setup.");
        db_setup::setup_database(&mut conn).expect("FATAL: Failed to create the database schema.");
    }

    let encryption = DataEncryption::from_config(&config).expect("FATAL: ENCRYPTION_KEY is not a valid key.");
    if encryption.is_ephemeral() {
        log::warn!("Run 'setup_cli --env-file <path> key generate' and set ENCRYPTION_KEY to keep encrypted data across restarts.");
    }

    let session_key_bytes =
        hex::decode(&config.session_secret_key).expect("FATAL: SESSION_SECRET_KEY in .env is not a valid hex string.");
    let session_key = Key::try_from(session_key_bytes.as_slice())
        .expect("FATAL: The decoded SESSION_SECRET_KEY is not long enough (minimum 64 bytes required).");

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Server starting at http://{}", server_address);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), session_key.clone())
            .cookie_secure(config.use_secure_cookies)
            .cookie_http_only(true)
            .cookie_same_site(actix_web::cookie::SameSite::Lax)
            .build();

        App::new()
            .wrap(session_mw)
            .wrap(build_cors(&config.allowed_origins))
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY")),
            )
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(pool.clone()))
            .configure(routes::config_api)
            .service(actix_files::Files::new("/media", &config.upload_path))
            .route("/", web::get().to(root_handler))
    })
    .bind(server_address)?
    .run()
    .await
}
