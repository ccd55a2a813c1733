pub mod config;
pub mod database;
pub mod error;
pub mod fairings;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod state;

use rocket::Config;
use rocket_cors::{AllowedOrigins, CorsOptions};
use std::sync::Arc;

pub use config::AppConfig;
pub use database::{DatabaseService, KeyValueStore, MemoryStore, SharedStore};
pub use error::{ApiError, RegistryError};
pub use fairings::RequestLogger;
pub use services::{
    ArtifactStore, CommentLedger, CredentialStore, ManualClock, Notifier, PackageRegistry,
    SharedClock, SystemClock, TokenLifetimes, TokenManager,
};
pub use state::AppState;

use services::{LogMailer, Mailer, OutboxMailer};

/// Builds every component over the given store and clock
pub fn build_state(
    config: AppConfig,
    store: SharedStore,
    clock: SharedClock,
) -> Result<AppState, RegistryError> {
    let credentials = CredentialStore::new(store.clone(), clock.clone(), config.bcrypt_cost);
    let tokens = TokenManager::new(
        store.clone(),
        credentials.clone(),
        clock.clone(),
        TokenLifetimes {
            confirmation_secs: config.confirmation_ttl_secs,
            session_secs: config.session_ttl_secs,
        },
    );
    let artifacts = ArtifactStore::open(
        &config.artifact_dir,
        store.clone(),
        clock.clone(),
        &config.artifact_extension,
    )?;
    let comments = CommentLedger::new(store.clone(), credentials.clone(), clock.clone());
    let registry = PackageRegistry::new(
        store.clone(),
        credentials.clone(),
        tokens.clone(),
        artifacts.clone(),
        comments.clone(),
        clock,
    );

    let mailer: Arc<dyn Mailer> = match &config.mail_outbox {
        Some(dir) => Arc::new(OutboxMailer::new(dir)),
        None => Arc::new(LogMailer),
    };
    let notifier = Notifier::new(mailer, &config.mail_from, &config.api_url, &config.site_url);

    Ok(AppState {
        config,
        store,
        credentials,
        tokens,
        artifacts,
        comments,
        registry,
        notifier,
    })
}

pub fn create_rocket() -> rocket::Rocket<rocket::Build> {
    create_rocket_with(AppConfig::from_env(), Arc::new(SystemClock))
}

pub fn create_rocket_with(
    config: AppConfig,
    clock: SharedClock,
) -> rocket::Rocket<rocket::Build> {
    // Open the key-value store
    let store = database::open_store(&config.database_url).expect("Failed to open data store");

    // Wire the components
    let state = build_state(config, store, clock).expect("Failed to initialize registry");

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .to_cors()
        .expect("Failed to create CORS configuration");

    // Configure Rocket with custom host and port
    let rocket_config = Config {
        port: state.config.port,
        address: state.config.host.parse().expect("Invalid host address"),
        ..Config::default()
    };

    rocket::custom(&rocket_config)
        .manage(state)
        .attach(cors)
        .attach(RequestLogger)
        .mount("/", routes::get_routes())
        .register("/", routes::get_catchers())
}
