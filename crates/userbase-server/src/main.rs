#![deny(clippy::unwrap_used)]

use userbase_db::migrate;
use userbase_server::{bootstrap, cli, runtime, settings};

#[tokio::main]
async fn main() {
    let run_mode = cli::parse_args();
    runtime::init_tracing();
    let settings = settings::Settings::from_env();

    match run_mode {
        cli::RunMode::Migrate => {
            let db = match bootstrap::connect_db(&settings).await {
                Ok(db) => db,
                Err(err) => {
                    tracing::error!(event = "db_connect_failed", error = %err);
                    std::process::exit(1);
                }
            };
            if let Err(err) = migrate(&db).await {
                tracing::error!(error = %err, "migration failed");
                std::process::exit(1);
            }
            tracing::info!("migrations applied");
        }
        cli::RunMode::Server { memory } => {
            if let Err(invalid) = settings::preflight(&settings) {
                tracing::error!(
                    event = "preflight_failed",
                    invalid = ?invalid,
                    "Configuration invalid"
                );
                std::process::exit(1);
            }
            bootstrap::log_startup(&settings, memory);
            let store = match bootstrap::build_store(&settings, memory).await {
                Ok(store) => store,
                Err(err) => {
                    tracing::error!(event = "db_connect_failed", error = %err);
                    std::process::exit(1);
                }
            };
            let state = bootstrap::build_state(&settings, store);
            let app = bootstrap::build_app(state);
            bootstrap::serve(&settings, app).await;
        }
    }
}
