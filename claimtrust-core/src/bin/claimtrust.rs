//! claimtrust CLI
//!
//! Key generation, claim signing and verification, and registry checks for a
//! participant's own identity.
//!
//! # Usage
//!
//! ```bash
//! # Generate a key pair as PEM files
//! claimtrust keygen --out-dir deployment/
//!
//! # Sign the configured claims and print the agent token
//! claimtrust sign --config identity.yaml --participant-id did:web:provider
//!
//! # Check a detached signature
//! claimtrust verify --public-key ed25519_public.pem --claims creds.json --signature <b64>
//!
//! # Ask the registry whether it agrees with our identity
//! claimtrust verify-identity --config identity.yaml --participant-id did:web:provider
//!
//! # Evaluate a constraint against our own identity
//! claimtrust evaluate --config identity.yaml --participant-id did:web:provider \
//!     --left https://w3id.org/edc/v0.0.1/ns/location --operator EQ --right eu
//! ```

use claimtrust::policy::{Constraint, Operator, SystemClock};
use claimtrust::{
    ClaimSet, ConstraintEngine, HttpRegistryClient, IdentityConfig, KeyPair, ParticipantIdentity,
    Protocol, PublicKey, RegistryClient, DEFAULT_RESULT_NAMESPACE,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "claimtrust")]
#[command(about = "Participant claim signing and registry corroboration", long_about = None)]
struct Cli {
    /// Log filter (e.g. info, claimtrust=debug)
    #[arg(long, global = true, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 key pair as PKCS#8 / SPKI PEM files
    Keygen {
        /// Directory to write the key files to
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// File name prefix
        #[arg(short, long, default_value = "ed25519")]
        name: String,
    },

    /// Sign the configured claims and print the agent token
    Sign {
        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Check a detached claim signature
    Verify {
        /// Public key PEM file
        #[arg(long)]
        public_key: PathBuf,

        /// Claims JSON file
        #[arg(long)]
        claims: PathBuf,

        /// Base64 signature
        #[arg(long)]
        signature: String,
    },

    /// Verify this participant's identity with the registry
    VerifyIdentity {
        #[command(flatten)]
        identity: IdentityArgs,

        /// Key prefix of the printed result
        #[arg(long, default_value = DEFAULT_RESULT_NAMESPACE)]
        namespace: String,
    },

    /// Evaluate a constraint against this participant's own identity
    Evaluate {
        #[command(flatten)]
        identity: IdentityArgs,

        /// Left operand (claim key or namespaced IRI)
        #[arg(long)]
        left: String,

        /// Operator (EQ, NEQ, GT, GEQ, LT, LEQ, IN)
        #[arg(long)]
        operator: String,

        /// Right operand; parsed as JSON when possible, otherwise a string
        #[arg(long)]
        right: String,

        /// Override the configured corroboration protocol (bundle, per-key)
        #[arg(long)]
        protocol: Option<ProtocolArg>,
    },
}

#[derive(clap::Args)]
struct IdentityArgs {
    /// Identity configuration file (YAML)
    #[arg(short, long, env = "CLAIMTRUST_CONFIG")]
    config: Option<PathBuf>,

    /// This participant's id
    #[arg(short, long, env = "CLAIMTRUST_PARTICIPANT_ID")]
    participant_id: String,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ProtocolArg {
    Bundle,
    PerKey,
}

impl From<ProtocolArg> for Protocol {
    fn from(p: ProtocolArg) -> Self {
        match p {
            ProtocolArg::Bundle => Protocol::Bundle,
            ProtocolArg::PerKey => Protocol::PerKey,
        }
    }
}

impl IdentityArgs {
    fn load_config(&self) -> claimtrust::Result<IdentityConfig> {
        let mut config = match &self.config {
            Some(path) => IdentityConfig::from_file(path)?,
            None => IdentityConfig::default(),
        };
        config.apply_env();
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Keygen { out_dir, name } => keygen(&out_dir, &name)?,

        Commands::Sign { identity } => {
            let config = identity.load_config()?;
            let participant = ParticipantIdentity::load(&identity.participant_id, &config)?;
            println!("{}", serde_json::to_string_pretty(&participant.agent_token())?);
        }

        Commands::Verify {
            public_key,
            claims,
            signature,
        } => {
            let pem = std::fs::read_to_string(&public_key)?;
            let public_key = PublicKey::from_pem(&pem)?;
            let claims = ClaimSet::from_file(&claims)?;

            if claimtrust::verify_signature(&public_key, &signature, &claims) {
                println!("✓ Signature is valid");
                println!("  Key: {}", public_key.fingerprint());
            } else {
                eprintln!("✗ Signature invalid");
                std::process::exit(1);
            }
        }

        Commands::VerifyIdentity {
            identity,
            namespace,
        } => {
            let config = identity.load_config()?;
            let participant = ParticipantIdentity::load(&identity.participant_id, &config)?;
            let registry = HttpRegistryClient::from_config(&config.registry)?;

            let result = participant.verify_with_registry(&registry);
            println!(
                "{}",
                serde_json::to_string_pretty(&result.to_namespaced_json(&namespace))?
            );
            if !result.success() {
                std::process::exit(1);
            }
        }

        Commands::Evaluate {
            identity,
            left,
            operator,
            right,
            protocol,
        } => {
            let config = identity.load_config()?;
            let participant = ParticipantIdentity::load(&identity.participant_id, &config)?;
            let registry: Arc<dyn RegistryClient> =
                Arc::new(HttpRegistryClient::from_config(&config.registry)?);
            let protocol = protocol.map(Protocol::from).unwrap_or(config.registry.protocol);

            let operator: Operator = operator.parse()?;
            let right = serde_json::from_str(&right).unwrap_or(serde_json::Value::String(right));
            let constraint = Constraint::new(left, operator, right);

            let engine = ConstraintEngine::standard(registry, protocol, Arc::new(SystemClock));
            if engine.evaluate(&constraint, &participant.agent_token()) {
                println!("✓ Constraint satisfied");
            } else {
                println!("✗ Constraint not satisfied (see logs for the reason)");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn keygen(out_dir: &Path, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(out_dir)?;
    let keypair = KeyPair::generate();

    let private_path = out_dir.join(format!("{name}_private.pem"));
    let public_path = out_dir.join(format!("{name}_public.pem"));

    write_private(&private_path, &keypair.signing_key().to_pem()?)?;
    std::fs::write(&public_path, keypair.public_key().to_pem()?)?;

    info!(fingerprint = %keypair.public_key().fingerprint(), "generated key pair");
    println!("private key: {}", private_path.display());
    println!("public key:  {}", public_path.display());
    Ok(())
}

#[cfg(unix)]
fn write_private(path: &Path, pem: &str) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(pem.as_bytes())
}

#[cfg(not(unix))]
fn write_private(path: &Path, pem: &str) -> std::io::Result<()> {
    std::fs::write(path, pem)
}
