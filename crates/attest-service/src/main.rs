//! Attest node: loads configuration, builds the identity service and runs a
//! subcommand against it.

use std::path::PathBuf;

use attest_core::{ClaimValue, Claims, Did, DidMethod, KeyType};
use attest_proof::Predicate;
use attest_service::{AttestConfig, IdentityService};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Attest identity node
#[derive(Parser, Debug)]
#[command(name = "attest", version, about = "DID resolution and ZK credential verification")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "attest.toml")]
    config: PathBuf,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Override the log format (text or json).
    #[arg(long)]
    log_format: Option<String>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the service from the configuration and print a summary.
    Check,
    /// Resolve a DID and print its document.
    Resolve {
        did: String,
    },
    /// Issue a credential, present it selectively and verify the presentation.
    Demo {
        /// Minimum age the presentation proves.
        #[arg(long, default_value_t = 21)]
        min_age: i64,
    },
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AttestConfig::load(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        config.logging.format = format;
    }
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    init_tracing(&config.logging.level, &config.logging.format);

    if args.init {
        config.save(&args.config)?;
        tracing::info!(path = %args.config.display(), "wrote config");
        return Ok(());
    }

    tracing::info!("Attest node v{}", env!("CARGO_PKG_VERSION"));
    let service = IdentityService::new(&config)?;

    match args.command.unwrap_or(Command::Check) {
        Command::Check => {
            println!("{}", serde_json::to_string_pretty(&service.summary())?);
        }
        Command::Resolve { did } => {
            let document = service.resolve_did(&did).await?;
            println!("{}", serde_json::to_string_pretty(&document)?);
        }
        Command::Demo { min_age } => demo(&service, min_age).await?,
    }
    Ok(())
}

async fn demo(service: &IdentityService, min_age: i64) -> anyhow::Result<()> {
    let issuer = service.create_did(&DidMethod::Ledger, KeyType::Ed25519).await?.id;
    let holder = service.create_did(&DidMethod::Key, KeyType::Ed25519).await?.id;
    let verifier: Did = service.create_did(&DidMethod::Web, KeyType::Ed25519).await?.id;
    tracing::info!(%issuer, %holder, %verifier, "created identities");

    let mut claims = Claims::new();
    claims.insert("age".into(), ClaimValue::Integer(34));
    claims.insert("country".into(), ClaimValue::String("US".into()));
    let credential = service.issue_credential(&issuer, &holder, claims, None).await?;
    tracing::info!(credential = %credential.id, "issued credential");

    let challenge = format!("demo-{}", rand::random::<u64>());
    let required = [Predicate::at_least("age", min_age)];
    let presentation = service
        .build_presentation(&credential.id, &["country"], required.to_vec(), &challenge, &verifier)
        .await?;
    println!("{}", serde_json::to_string_pretty(&presentation)?);

    let report = service
        .verify_presentation_requiring(&presentation, &challenge, &verifier, &required)
        .await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
