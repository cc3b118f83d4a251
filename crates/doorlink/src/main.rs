mod cli;
mod error;

use std::sync::Arc;

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use doorlink_api::PlatformClient;
use doorlink_config::Config;
use doorlink_core::{
    CoreError, EAccessConnector, ElionaPlatform, InMemoryStore, MappingStore, Service,
};

use crate::cli::{Cli, Command, LogFormat, RunArgs, ValidateArgs};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose, cli.global.log_format);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, format: LogFormat) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = doorlink_config::load_config(cli.global.config.as_deref())?;

    match cli.command {
        Command::Validate(args) => validate(&config, &args),
        Command::Run(args) => serve(&config, &args).await,
    }
}

// ── validate ─────────────────────────────────────────────────────────

fn validate(config: &Config, args: &ValidateArgs) -> Result<(), CliError> {
    let settings = config.resolve()?;

    println!("platform: {}", settings.platform_url);
    println!(
        "poll interval: {}s, event listener: {}",
        settings.service.poll_interval.as_secs(),
        if settings.service.listen_events { "on" } else { "off" }
    );
    println!("configurations: {}", settings.configurations.len());
    for c in &settings.configurations {
        println!(
            "  [{}] {} user={} enabled={} refresh={}s projects=[{}]",
            c.id,
            c.url,
            c.username,
            c.enabled,
            c.refresh_interval_secs,
            c.project_ids.join(", ")
        );
    }

    if args.print_config {
        println!();
        print!("{}", config.redacted().to_toml()?);
    }
    Ok(())
}

// ── run ──────────────────────────────────────────────────────────────

async fn serve(config: &Config, args: &RunArgs) -> Result<(), CliError> {
    let mut settings = config.resolve()?;
    if args.no_listen {
        settings.service.listen_events = false;
    }

    let store = Arc::new(InMemoryStore::new());
    for configuration in settings.configurations {
        let config_id = configuration.id;
        store
            .upsert_config(configuration)
            .await
            .map_err(CoreError::from)?;
        debug!(config_id, "configuration seeded");
    }

    let client = PlatformClient::from_api_key(
        &settings.platform_url,
        &settings.api_token,
        &settings.platform_transport,
    )?;
    let platform = Arc::new(ElionaPlatform::new(client, settings.reconnect));
    let connector = Arc::new(EAccessConnector::new(settings.eaccess_tls));

    let service = Service::new(settings.service, store, platform, connector);
    service.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    service.shutdown().await;
    Ok(())
}
