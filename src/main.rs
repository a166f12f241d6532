//! NLQ Server - Main entry point.
//!
//! Serves natural-language questions about the purchase-order/invoice view
//! over HTTP.

use clap::Parser;
use nlq_server::agent::{AgentSettings, SqlAgent};
use nlq_server::config::Config;
use nlq_server::db::{ConnectionKeeper, DatabaseAccessor, DatabaseProbe, KeeperConfig, QueryExecutor};
use nlq_server::llm::{LanguageModel, OpenAiChatModel};
use nlq_server::models::{ConnectionConfig, ViewDefinition};
use nlq_server::policy::fuzzy::MAX_CANDIDATES;
use nlq_server::transport::{AppState, HttpTransport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let config = Config::parse();
    init_tracing(&config);

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    info!("Starting NLQ Server v{}", env!("CARGO_PKG_VERSION"));

    let connection = ConnectionConfig::from_database_config(config.parse_database()?)?;
    info!(
        db_type = %connection.db_type,
        url = %connection.masked_connection_string(),
        "Database configured"
    );
    let accessor = Arc::new(DatabaseAccessor::new(connection));

    // Candidate lookups for approximate matching read more rows than any answer.
    let executor = QueryExecutor::new(
        config.query_timeout_duration(),
        config.max_row_limit.max(MAX_CANDIDATES as u32),
    );

    let llm: Arc<dyn LanguageModel> = Arc::new(OpenAiChatModel::from_config(&config)?);
    let view = ViewDefinition::new(config.view_schema(), &config.view_name);
    info!(
        view = %view.qualified_name(),
        model = %llm.model_name(),
        "Agent configured"
    );

    let agent = Arc::new(SqlAgent::new(
        accessor.clone(),
        executor.clone(),
        llm,
        view,
        AgentSettings::from_config(&config),
    ));

    let keeper = Arc::new(ConnectionKeeper::start(
        DatabaseProbe::new(accessor.clone(), executor.clone()),
        KeeperConfig::from_config(&config),
    ));

    let state = AppState {
        agent,
        keeper,
        accessor,
        executor,
    };
    let transport = HttpTransport::new(state, &config.http_host, config.http_port);

    if let Err(e) = transport.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
