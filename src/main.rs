//! Rebate CLI

use std::{
    io::{self, Write},
    process::ExitCode,
};

use rebate::{
    config::{Config, LogFormat},
    fixtures::{Fixture, FixtureError},
    receipt::{Receipt, ReceiptError},
    scenario::ScenarioError,
};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Registry,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Fixture(#[from] FixtureError),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error(transparent)]
    Receipt(#[from] ReceiptError),

    #[error("failed to write receipts: {0}")]
    Io(#[from] io::Error),
}

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => error.exit(),
    };

    init_subscriber(&config);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "reconciliation failed");

            ExitCode::FAILURE
        }
    }
}

fn run(config: &Config) -> Result<(), RunError> {
    let now = config.now();
    let mut scenario = Fixture::with_base_path(&config.fixtures_dir)
        .load_set(&config.set)?
        .into_scenario();

    info!(
        set = %config.set,
        checkouts = scenario.checkouts.len(),
        orders = scenario.orders.len(),
        %now,
        "loaded fixture set"
    );

    scenario.reconcile(now)?;

    let mut out = io::stdout().lock();

    for (name, checkout) in &scenario.checkouts {
        Receipt::from_checkout(format!("Checkout {name}"), checkout, &scenario.catalogue)?
            .write_to(&mut out)?;
    }

    for (name, order) in &scenario.orders {
        Receipt::from_order(format!("Order {name}"), order, &scenario.catalogue)?
            .write_to(&mut out)?;
    }

    out.flush()?;

    Ok(())
}

fn init_subscriber(config: &Config) {
    match config.logging.log_format {
        LogFormat::Compact => init_with_layer(
            config,
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(io::stderr)
                .with_target(true),
        ),
        LogFormat::Json => init_with_layer(
            config,
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true),
        ),
    }
}

fn init_with_layer<L>(config: &Config, fmt_layer: L)
where
    L: Layer<Registry> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.log_level));

    _ = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init();
}
