//! Sealfield CLI - encrypt and decrypt forum fields from the shell
//!
//! Usage:
//!   sealfield salt                         - print a fresh random salt
//!   sealfield encrypt <text>               - seal one value with the profile key
//!   sealfield decrypt <value>              - open one value (prints it unchanged on failure)
//!   sealfield seal-fields --fields a,b     - seal fields of a JSON object read from stdin
//!   sealfield open-fields --fields a,b     - open fields of a JSON object read from stdin
//!   sealfield partition-key <label>        - print the exported key of one partition
//!   sealfield seal-password <text>         - self-contained ENCP: envelope
//!   sealfield open-password <value>
//!
//! The password comes from `SEALFIELD_PASSWORD`. `--password` also works but
//! leaks into the process list and shell history; use it for testing only.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use sealfield_core::{FallbackPolicy, KeyManager, Record, SealConfig};
use sealfield_store::{FileStore, KeyValueStore, KeychainStore, MemoryStore};
use secrecy::{ExposeSecret, SecretString};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PASSWORD_ENV: &str = "SEALFIELD_PASSWORD";

#[derive(Parser)]
#[command(name = "sealfield")]
#[command(author = "HeyBattle1")]
#[command(version)]
#[command(about = "Field-level encryption for forum records", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Profile file holding the persistent salt (default ~/.sealfield/profile.json)
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    /// Keep the salt in the OS keychain instead of the profile file
    #[arg(long, global = true)]
    keychain: bool,

    /// Refuse to write plaintext when no key is available
    #[arg(long, global = true)]
    fail_closed: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct KeyArgs {
    /// Account password for testing only; visible in `ps` and shell history.
    /// Prefer SEALFIELD_PASSWORD
    #[arg(long)]
    password: Option<String>,

    /// Encrypt under the derived key of this room / topic
    #[arg(long)]
    partition: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a fresh random salt
    Salt,

    /// Encrypt one value
    Encrypt {
        #[command(flatten)]
        key: KeyArgs,
        text: String,
    },

    /// Decrypt one value
    Decrypt {
        #[command(flatten)]
        key: KeyArgs,
        value: String,
    },

    /// Encrypt fields of a JSON object read from stdin
    SealFields {
        #[command(flatten)]
        key: KeyArgs,
        /// Comma separated field names
        #[arg(long, value_delimiter = ',', required = true)]
        fields: Vec<String>,
    },

    /// Decrypt fields of a JSON object read from stdin
    OpenFields {
        #[command(flatten)]
        key: KeyArgs,
        #[arg(long, value_delimiter = ',', required = true)]
        fields: Vec<String>,
    },

    /// Print the exported key of one partition
    PartitionKey {
        /// Testing only; prefer SEALFIELD_PASSWORD
        #[arg(long)]
        password: Option<String>,
        label: String,
    },

    /// Encrypt with a password and an embedded per-value salt
    SealPassword {
        /// Testing only; prefer SEALFIELD_PASSWORD
        #[arg(long)]
        password: Option<String>,
        text: String,
    },

    /// Decrypt an ENCP: envelope
    OpenPassword {
        /// Testing only; prefer SEALFIELD_PASSWORD
        #[arg(long)]
        password: Option<String>,
        value: String,
    },
}

fn resolve_password(flag: Option<String>) -> anyhow::Result<SecretString> {
    match flag.or_else(|| std::env::var(PASSWORD_ENV).ok()) {
        Some(p) if !p.is_empty() => Ok(SecretString::new(p)),
        _ => bail!("no password given (set {PASSWORD_ENV})"),
    }
}

fn default_profile() -> anyhow::Result<PathBuf> {
    Ok(dirs::home_dir()
        .context("no home directory")?
        .join(".sealfield")
        .join("profile.json"))
}

fn read_record() -> anyhow::Result<Record> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;
    match serde_json::from_str(&input).context("stdin is not JSON")? {
        serde_json::Value::Object(map) => Ok(map),
        _ => bail!("stdin must hold a JSON object"),
    }
}

struct App {
    config: SealConfig,
    profile: Option<PathBuf>,
    keychain: bool,
}

impl App {
    fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => SealConfig::load(path)?,
            None => SealConfig::default(),
        };
        if cli.fail_closed {
            config.fallback = FallbackPolicy::FailClosed;
        }
        Ok(Self {
            config,
            profile: cli.profile.clone(),
            keychain: cli.keychain,
        })
    }

    fn persistent_store(&self) -> anyhow::Result<Arc<dyn KeyValueStore>> {
        if self.keychain {
            return Ok(Arc::new(KeychainStore::new(&self.config.keychain_service)));
        }
        let path = match &self.profile {
            Some(path) => path.clone(),
            None => default_profile()?,
        };
        tracing::debug!(path = %path.display(), "using profile file");
        Ok(Arc::new(FileStore::new(path)))
    }

    /// A manager for this process; the process is the session.
    async fn unlock(&self, password: Option<String>) -> anyhow::Result<KeyManager> {
        let manager = KeyManager::new(
            self.config.clone(),
            Arc::new(MemoryStore::new()),
            self.persistent_store()?,
        );
        let password = resolve_password(password)?;
        manager
            .initialize_from_password(&password)
            .await
            .context("could not derive the session key")?;
        Ok(manager)
    }
}

fn field_refs(fields: &[String]) -> Vec<&str> {
    fields.iter().map(String::as_str).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let app = App::from_cli(&cli)?;

    match cli.command {
        Commands::Salt => {
            let salt = sealfield_crypto::generate_salt()?;
            println!("{}", salt.to_base64());
        }

        Commands::Encrypt { key, text } => {
            let manager = app.unlock(key.password).await?;
            let out = match key.partition.as_deref() {
                Some(label) => manager.encrypt_for_partition(label, &text).await?,
                None => manager.encrypt_if_available(&text).await?,
            };
            println!("{out}");
        }

        Commands::Decrypt { key, value } => {
            let manager = app.unlock(key.password).await?;
            let out = match key.partition.as_deref() {
                Some(label) => manager.decrypt_for_partition(label, &value).await,
                None => manager.decrypt_if_available(&value).await,
            };
            println!("{out}");
        }

        Commands::SealFields { key, fields } => {
            let record = read_record()?;
            let manager = app.unlock(key.password).await?;
            let sealed = manager
                .encrypt_fields_if_available(&record, &field_refs(&fields), key.partition.as_deref())
                .await?;
            println!("{}", serde_json::to_string_pretty(&sealed)?);
        }

        Commands::OpenFields { key, fields } => {
            let record = read_record()?;
            let manager = app.unlock(key.password).await?;
            let opened = manager
                .decrypt_fields_if_available(&record, &field_refs(&fields), key.partition.as_deref())
                .await;
            println!("{}", serde_json::to_string_pretty(&opened)?);
        }

        Commands::PartitionKey { password, label } => {
            let manager = app.unlock(password).await?;
            let key = manager
                .derive_for_partition(&label)
                .await
                .context("no session key after unlock")?;
            println!("{}", key.export().expose_secret());
        }

        Commands::SealPassword { password, text } => {
            let password = resolve_password(password)?;
            let envelope = tokio::task::spawn_blocking(move || {
                sealfield_crypto::encrypt_with_password(&text, password.expose_secret())
            })
            .await??;
            println!("{envelope}");
        }

        Commands::OpenPassword { password, value } => {
            let password = resolve_password(password)?;
            let plaintext = tokio::task::spawn_blocking(move || {
                sealfield_crypto::decrypt_with_password(&value, password.expose_secret())
            })
            .await??;
            println!("{plaintext}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_fields_list() {
        let cli = Cli::try_parse_from([
            "sealfield",
            "seal-fields",
            "--password",
            "pw",
            "--fields",
            "title,content",
            "--partition",
            "topic-1",
        ])
        .unwrap();
        match cli.command {
            Commands::SealFields { key, fields } => {
                assert_eq!(fields, vec!["title", "content"]);
                assert_eq!(key.partition.as_deref(), Some("topic-1"));
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_fail_closed_flag_sets_policy() {
        let cli = Cli::try_parse_from(["sealfield", "--fail-closed", "salt"]).unwrap();
        let app = App::from_cli(&cli).unwrap();
        assert_eq!(app.config.fallback, FallbackPolicy::FailClosed);
    }

    #[test]
    fn test_password_flag_marked_testing_only() {
        use clap::CommandFactory;
        let cli = Cli::command();
        let subcommands = [
            "encrypt",
            "decrypt",
            "seal-fields",
            "open-fields",
            "partition-key",
            "seal-password",
            "open-password",
        ];
        for name in subcommands {
            let sub = cli.find_subcommand(name).unwrap();
            let arg = sub
                .get_arguments()
                .find(|a| a.get_id() == "password")
                .unwrap();
            let help = arg.get_help().unwrap().to_string();
            assert!(help.contains("SEALFIELD_PASSWORD"), "{name}: {help}");
            assert!(help.contains("esting only"), "{name}: {help}");
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
