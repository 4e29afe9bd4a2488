use std::{io::Write, process};

use livetable::{
    application::{error::AppError, replay, resources},
    cache::CacheConfig,
    config,
    domain::{error::DomainError, types::ResourceKind},
    infra::{error::InfraError, fixture::ReplayFixture, telemetry},
};
use serde::Serialize;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(error = %error, chain = %report.chain(), "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, chain = %report.chain(), "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to load configuration: {err}"
        )))
    })?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let cache_config = CacheConfig::from(&settings.cache);
    match cli_args.command {
        config::Command::Replay(args) => run_replay(&cache_config, args).await,
        config::Command::Schema(args) => run_schema(args),
    }
}

async fn run_replay(cache_config: &CacheConfig, args: config::ReplayArgs) -> Result<(), AppError> {
    info!(
        target = "livetable::replay",
        path = %args.fixture.display(),
        debounce_ms = cache_config.debounce_ms,
        max_views = cache_config.max_views,
        "Starting replay"
    );

    let fixture = ReplayFixture::load(&args.fixture).await?;
    let outcome = replay::replay(fixture, cache_config).await?;
    print_json(&outcome, args.pretty)
}

fn run_schema(args: config::SchemaArgs) -> Result<(), AppError> {
    let resource = args
        .resource
        .as_deref()
        .map(|name| {
            ResourceKind::try_from(name).map_err(|()| DomainError::unknown_resource(name))
        })
        .transpose()?;

    print_json(&resources::schemas(resource), true)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), AppError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{rendered}").map_err(|err| AppError::from(InfraError::from(err)))?;
    Ok(())
}
