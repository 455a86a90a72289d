//! World engine binary for the Perpetua simulation.
//!
//! Wires together the tick engine, the decision oracle, and persistence,
//! then runs the tick loop until interrupted.
//!
//! # Startup sequence
//!
//! 1. Load configuration from `perpetua.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Select the oracle: HTTP backend when enabled, observe stub otherwise
//! 4. Select the repository: `PostgreSQL` when a URL is configured,
//!    in-memory otherwise
//! 5. Recover persisted state, or seed the genesis world
//! 6. Run the tick loop until ctrl-c, finishing the in-flight tick

mod error;
mod notify;
mod spawner;

use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use perpetua_core::{EngineConfig, MemoryRepository, Repository, TickEngine, admin};
use perpetua_db::{PgRepository, PostgresPool};
use perpetua_oracle::{
    BackendConfig, BackendKind, Decision, HttpOracle, ObserveOracle, Oracle, OracleError, Pricing,
};
use perpetua_types::Perception;

use crate::error::EngineError;
use crate::notify::{LogNotifier, WebhookNotifier};
use crate::spawner::genesis_seed;

/// The oracle selected at startup.
enum RuntimeOracle {
    /// No paid backend configured; every agent observes.
    Observe(ObserveOracle),
    /// LLM over HTTP.
    Http(HttpOracle),
}

impl Oracle for RuntimeOracle {
    async fn decide(&self, perception: &Perception) -> Result<Decision, OracleError> {
        match self {
            Self::Observe(oracle) => oracle.decide(perception).await,
            Self::Http(oracle) => oracle.decide(perception).await,
        }
    }

    async fn narrate(
        &self,
        prompt: &str,
    ) -> Result<(String, rust_decimal::Decimal), OracleError> {
        match self {
            Self::Observe(oracle) => oracle.narrate(prompt).await,
            Self::Http(oracle) => oracle.narrate(prompt).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Observe(oracle) => oracle.name(),
            Self::Http(oracle) => oracle.name(),
        }
    }
}

/// Application entry point for the world engine.
///
/// # Errors
///
/// Returns [`EngineError`] if any startup step fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    let config = load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.filter.clone())),
        )
        .with_target(true)
        .init();

    info!(
        tick_interval_ms = config.world.tick_interval_ms,
        era_length_ticks = config.world.era_length_ticks,
        oracle_enabled = config.oracle.enabled,
        "perpetua-engine starting"
    );

    let oracle = select_oracle(&config);
    info!(oracle = oracle.name(), "oracle selected");

    if config.database.url.is_empty() {
        info!("no database configured, running in-memory");
        run(oracle, MemoryRepository::new(), config).await
    } else {
        let pool = PostgresPool::connect(
            &perpetua_db::PostgresConfig::new(&config.database.url)
                .with_max_connections(config.database.max_connections),
        )
        .await?;
        pool.ensure_schema().await?;
        run(oracle, PgRepository::new(pool), config).await
    }
}

/// Load `perpetua.yaml` from the working directory, or defaults when the
/// file is absent.
fn load_config() -> Result<EngineConfig, EngineError> {
    let path = Path::new("perpetua.yaml");
    if path.exists() {
        Ok(EngineConfig::from_file(path)?)
    } else {
        Ok(EngineConfig::parse("{}")?)
    }
}

/// Pick the oracle implementation from configuration.
fn select_oracle(config: &EngineConfig) -> RuntimeOracle {
    if !config.oracle.enabled {
        return RuntimeOracle::Observe(ObserveOracle);
    }
    let kind = match config.oracle.kind.as_str() {
        "anthropic" => BackendKind::Anthropic,
        "open_ai" => BackendKind::OpenAi,
        other => {
            tracing::warn!(kind = other, "unknown oracle kind, defaulting to open_ai");
            BackendKind::OpenAi
        }
    };
    let backend = BackendConfig {
        kind,
        api_url: config.oracle.api_url.clone(),
        api_key: config.oracle.api_key.clone(),
        model: config.oracle.model.clone(),
    };
    let pricing = Pricing {
        input_rate: config.oracle.input_rate_per_million,
        output_rate: config.oracle.output_rate_per_million,
    };
    RuntimeOracle::Http(HttpOracle::new(&backend, pricing))
}

/// Recover or seed the world, then drive the tick loop until ctrl-c.
async fn run<R: Repository>(
    oracle: RuntimeOracle,
    repository: R,
    config: EngineConfig,
) -> Result<(), EngineError> {
    let genesis_agents = config.world.genesis_agents;
    let webhook_url = config.notify.webhook_url.clone();
    let mut engine = TickEngine::new(oracle, repository, config);

    if engine.recover().await? {
        info!(tick = engine.current_tick(), "resuming persisted world");
    } else {
        let seed = genesis_seed(genesis_agents);
        let template = seed.template;
        let mut drafts = admin::genesis(engine.world_mut(), seed.agents, seed.features)?;
        let (report, template_draft) =
            admin::apply_world_template(engine.world_mut(), &template, 0)?;
        drafts.extend(template_draft);
        engine.queue_drafts(drafts);
        info!(
            agents = genesis_agents,
            blocks_placed = report.placed,
            "genesis world seeded"
        );
    }

    engine.log_mut().subscribe(Box::new(LogNotifier));
    if !webhook_url.is_empty() {
        info!(url = %webhook_url, "event webhook enabled");
        engine
            .log_mut()
            .subscribe(Box::new(WebhookNotifier::new(webhook_url)));
    }

    let shutdown = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for ctrl-c, running until killed");
            std::future::pending::<()>().await;
        }
    };
    engine.run(shutdown).await;

    let spent = engine.budget().summary();
    info!(
        tick = engine.current_tick(),
        agents_alive = engine.world().agents.living_count(),
        events = engine.log().len(),
        spent_usd = %spent.spent,
        "perpetua-engine stopped"
    );
    Ok(())
}
