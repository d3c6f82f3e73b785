//! CertBus - event-sourced TLS certificate lifecycle management.
//!
//! This is the main entry point for the CertBus CLI.

mod cli;
mod config;
mod example_server;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use certbus_acme::{CertShape, Manager};
use certbus_core::events::ChallengeType;
use certbus_core::store::ManagedCertificate;
use certbus_log::{EventLog, FileEventLog};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{CertCommand, Cli, Commands, ConfCommand};
use config::AppConfig;

const CONFIG_PATH: &str = "certbus.toml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let app_config = AppConfig::load(Path::new(CONFIG_PATH)).context("loading certbus.toml")?;
    let log = open_event_log(&app_config);

    match cli.command {
        Commands::Cert(cmd) => run_cert_command(cmd, log, &app_config).await,
        Commands::Conf(cmd) => run_conf_command(cmd, log).await,
        Commands::ExampleServer => example_server::run(log).await,
    }
}

fn open_event_log(app_config: &AppConfig) -> Arc<dyn EventLog> {
    let path = match app_config.resolved_stream_dir() {
        Some(dir) => PathBuf::from(dir).join("certbus.ndjson"),
        None => FileEventLog::default_path(),
    };
    Arc::new(FileEventLog::new(path))
}

async fn run_cert_command(cmd: CertCommand, log: Arc<dyn EventLog>, app_config: &AppConfig) -> Result<()> {
    let manager = Manager::new(log, app_config.acme_environment.directory_url());

    match cmd {
        CertCommand::Ls => {
            let certs = manager.list().await.context("listing certificates")?;
            print_table(&certs);
        }
        CertCommand::Mk {
            domain,
            wildcard,
            subdomain,
            dns,
        } => {
            let shape = match (wildcard, subdomain) {
                (true, true) => unreachable!("clap enforces --wildcard/--subdomain exclusivity"),
                (true, false) => CertShape::Wildcard,
                (false, true) => CertShape::Subdomain,
                (false, false) => CertShape::Basic,
            };
            let challenge_type = if dns { ChallengeType::Dns01 } else { ChallengeType::Http01 };
            manager
                .issue(&domain, shape, challenge_type)
                .await
                .context("issuing certificate")?;
            println!("issued certificate for {domain}");
        }
        CertCommand::Cat { id } => {
            let cert = manager.inspect(&id).await.context("inspecting certificate")?;
            println!("{}", serde_json::to_string_pretty(&cert)?);
        }
        CertCommand::Renewable { date, renew_first } => {
            let at = parse_renewable_at(date.as_deref())?;
            if renew_first {
                match manager
                    .renew_first_and_checkin(at, "certbus")
                    .await
                    .context("renewing first renewable certificate")?
                {
                    Some(cert) => println!("renewed {} ({})", cert.id, cert.domains.join(", ")),
                    None => println!("nothing renewable"),
                }
            } else {
                let certs = manager.renewable(at).await.context("listing renewable certificates")?;
                print_table(&certs);
            }
        }
        CertCommand::Renew { id } => {
            manager.renew(&id).await.context("renewing certificate")?;
            println!("renewed {id}");
        }
        CertCommand::Rm { id } => {
            manager.remove(&id).await.context("removing certificate")?;
            println!("removed {id}");
        }
    }
    Ok(())
}

async fn run_conf_command(cmd: ConfCommand, log: Arc<dyn EventLog>) -> Result<()> {
    // `conf` commands never talk to ACME, so the directory URL is unused.
    let manager = Manager::new(log, "");
    match cmd {
        ConfCommand::Update => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("reading configuration JSON from stdin")?;
            manager.update_config(&raw).await.context("updating configuration")?;
            println!("configuration updated");
        }
        ConfCommand::Display => {
            let config = manager.display_config().await.context("displaying configuration")?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

fn parse_renewable_at(date: Option<&str>) -> Result<DateTime<Utc>> {
    match date {
        None => Ok(Utc::now()),
        Some(raw) => {
            let naive = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .with_context(|| format!("parsing date '{raw}' (expected YYYY-MM-DD)"))?;
            Ok(Utc.from_utc_datetime(&naive.and_hms_opt(0, 0, 0).expect("midnight is always valid")))
        }
    }
}

fn print_table(certs: &[ManagedCertificate]) {
    println!("{:<16} {:<25} {:<10} DOMAINS", "ID", "NOT AFTER", "CHALLENGE");
    for cert in certs {
        println!(
            "{:<16} {:<25} {:<10} {}",
            cert.id,
            cert.certificate.not_after.to_rfc3339(),
            cert.resolved_challenge_type().as_str(),
            cert.domains.join(", ")
        );
    }
}
