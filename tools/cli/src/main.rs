//! IronVault CLI - Command line interface for vault operations.
//!
//! The caller's identity is taken from flags as an already-authenticated
//! principal; every access decision is made by the engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ironvault_common::{FileId, Principal, Role, SensitiveBytes, UserId};
use ironvault_crypto::KdfParams;
use ironvault_vault::{FileSelector, KeySource, VaultConfig, VaultEngine};

#[derive(Parser)]
#[command(name = "ironvault")]
#[command(about = "IronVault - Per-user encrypted file vault")]
#[command(version)]
struct Cli {
    /// Configuration file (default: <config dir>/ironvault/config.json).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Id of the authenticated caller.
    #[arg(short = 'u', long, global = true)]
    user_id: Option<String>,

    /// Display name of the caller (default: the user id).
    #[arg(long, global = true)]
    username: Option<String>,

    /// Role of the caller: user, manager, or admin.
    #[arg(short, long, global = true, default_value = "user")]
    role: Role,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum KeyMode {
    /// Random key per process; files are unreadable after exit.
    Generate,
    /// Random key stored in the configuration file.
    Raw,
    /// Key derived from a passphrase prompted at every run.
    Passphrase,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration for a vault stored on local disk.
    Init {
        /// Directory holding blobs and the metadata database.
        #[arg(short, long)]
        dir: PathBuf,

        /// Where the vault key comes from.
        #[arg(short, long, value_enum, default_value = "passphrase")]
        key: KeyMode,

        /// KDF strength: "interactive", "moderate", or "sensitive".
        #[arg(short, long, default_value = "moderate")]
        strength: String,

        /// Overwrite an existing configuration.
        #[arg(long)]
        force: bool,
    },

    /// Encrypt and store a file.
    Upload {
        /// Source file to upload.
        #[arg(short, long)]
        source: PathBuf,

        /// Filename to store under (default: the source file name).
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Decrypt a file and write it to disk.
    Download {
        /// File id.
        #[arg(long, conflicts_with = "name")]
        id: Option<FileId>,

        /// Filename; the most recent visible match is used.
        #[arg(short, long, required_unless_present = "id")]
        name: Option<String>,

        /// Restrict a filename lookup to this owner.
        #[arg(short, long, requires = "name")]
        owner: Option<String>,

        /// Destination file path.
        #[arg(short, long)]
        dest: PathBuf,
    },

    /// Delete a file.
    Delete {
        /// File id.
        #[arg(long, conflicts_with = "name")]
        id: Option<FileId>,

        /// Filename; the most recent visible match is deleted.
        #[arg(short, long, required_unless_present = "id")]
        name: Option<String>,
    },

    /// List visible files.
    List,

    /// Search visible files by filename substring.
    Search {
        /// Text to look for, case-insensitive.
        query: String,
    },

    /// Show the audit trail.
    Audit,
}

impl Cli {
    fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => dirs::config_dir()
                .map(|dir| dir.join("ironvault").join("config.json"))
                .context("Could not determine configuration directory; use --config"),
        }
    }

    fn principal(&self) -> Result<Principal> {
        let id = self
            .user_id
            .as_deref()
            .context("--user-id is required for this command")?;
        let id = UserId::new(id).context("Invalid user id")?;
        let username = self
            .username
            .clone()
            .unwrap_or_else(|| id.as_str().to_string());
        Ok(Principal::new(id, username, self.role))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config_path()?;

    if let Commands::Init {
        dir,
        key,
        strength,
        force,
    } = &cli.command
    {
        return cmd_init(&config_path, dir, *key, strength, *force);
    }

    let principal = cli.principal()?;
    let engine = open_engine(&config_path)?;

    match cli.command {
        Commands::Init { .. } => Ok(()),

        Commands::Upload { source, name } => {
            cmd_upload(&engine, &principal, &source, name.as_deref()).await
        }

        Commands::Download {
            id,
            name,
            owner,
            dest,
        } => {
            let selector = selector(id, name, owner)?;
            cmd_download(&engine, &principal, &selector, &dest).await
        }

        Commands::Delete { id, name } => cmd_delete(&engine, &principal, id, name).await,

        Commands::List => cmd_list(&engine, &principal).await,

        Commands::Search { query } => cmd_search(&engine, &principal, &query).await,

        Commands::Audit => cmd_audit(&engine, &principal).await,
    }
}

/// Prompt for passphrase securely.
fn prompt_passphrase(prompt: &str) -> Result<SensitiveBytes> {
    let passphrase = rpassword::prompt_password(prompt).context("Failed to read passphrase")?;
    Ok(SensitiveBytes::new(passphrase.into_bytes()))
}

fn selector(
    id: Option<FileId>,
    name: Option<String>,
    owner: Option<String>,
) -> Result<FileSelector> {
    match (id, name, owner) {
        (Some(id), _, _) => Ok(FileSelector::Id(id)),
        (None, Some(filename), Some(owner)) => Ok(FileSelector::Owned {
            owner: UserId::new(owner).context("Invalid owner id")?,
            filename,
        }),
        (None, Some(filename), None) => Ok(FileSelector::Named(filename)),
        (None, None, _) => anyhow::bail!("Either --id or --name is required"),
    }
}

/// Load the configuration and build the engine, prompting for the
/// passphrase when the key source needs one.
fn open_engine(config_path: &Path) -> Result<VaultEngine> {
    let config = VaultConfig::load(config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}; run `ironvault init` first",
            config_path.display()
        )
    })?;

    let passphrase = if config.key.requires_passphrase() {
        Some(prompt_passphrase("Enter vault passphrase: ")?)
    } else {
        None
    };

    config
        .build_engine(passphrase.as_ref().map(|p| p.as_bytes()))
        .context("Failed to open vault")
}

/// Write a new configuration.
fn cmd_init(config_path: &Path, dir: &Path, key: KeyMode, strength: &str, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration already exists at {}; use --force to overwrite",
            config_path.display()
        );
    }

    let kdf_params = KdfParams::from_strength(strength)?;

    let key_source = match key {
        KeyMode::Generate => KeySource::Generate,
        KeyMode::Raw => KeySource::random_raw(),
        KeyMode::Passphrase => {
            let passphrase = prompt_passphrase("Enter vault passphrase: ")?;
            let confirm = prompt_passphrase("Confirm vault passphrase: ")?;

            if passphrase.as_bytes() != confirm.as_bytes() {
                anyhow::bail!("Passphrases do not match");
            }

            if passphrase.is_empty() {
                anyhow::bail!("Passphrase cannot be empty");
            }

            KeySource::passphrase(passphrase.as_bytes(), kdf_params)
                .context("Failed to derive vault key")?
        }
    };

    let config = VaultConfig::local(dir, key_source);
    config
        .save(config_path)
        .context("Failed to write configuration")?;

    info!("Vault configured at {}", dir.display());
    println!("Vault configured successfully!");
    println!("  Config: {}", config_path.display());
    println!("  Data: {}", dir.display());

    Ok(())
}

/// Upload a file.
async fn cmd_upload(
    engine: &VaultEngine,
    principal: &Principal,
    source: &Path,
    name: Option<&str>,
) -> Result<()> {
    let filename = match name {
        Some(name) => name.to_string(),
        None => source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .context("Source path has no file name; use --name")?,
    };

    let content = tokio::fs::read(source)
        .await
        .context("Failed to read source file")?;

    let file = engine
        .upload(principal, &filename, &content)
        .await
        .context("Failed to upload file")?;

    println!("File uploaded: {} ({} bytes)", file.filename, file.size);
    println!("  ID: {}", file.id);

    Ok(())
}

/// Download a file.
async fn cmd_download(
    engine: &VaultEngine,
    principal: &Principal,
    selector: &FileSelector,
    dest: &Path,
) -> Result<()> {
    let content = engine
        .download(principal, selector)
        .await
        .with_context(|| format!("Failed to download {}", selector))?;

    tokio::fs::write(dest, &content)
        .await
        .context("Failed to write destination file")?;

    println!(
        "File downloaded to {} ({} bytes)",
        dest.display(),
        content.len()
    );

    Ok(())
}

/// Delete a file.
async fn cmd_delete(
    engine: &VaultEngine,
    principal: &Principal,
    id: Option<FileId>,
    name: Option<String>,
) -> Result<()> {
    match (id, name) {
        (Some(id), _) => {
            engine
                .delete_by_id(principal, &id)
                .await
                .context("Failed to delete file")?;
            println!("File deleted: {}", id);
        }
        (None, Some(name)) => {
            engine
                .delete(principal, &name)
                .await
                .context("Failed to delete file")?;
            println!("File deleted: {}", name);
        }
        (None, None) => anyhow::bail!("Either --id or --name is required"),
    }

    Ok(())
}

fn print_files(files: &[ironvault_vault::VaultFile]) {
    for file in files {
        println!(
            "  {}  {:<12} {:>10} bytes  {}  {}",
            file.id,
            file.owner_id.as_str(),
            file.size,
            file.created_at.format("%Y-%m-%d %H:%M:%S"),
            file.filename
        );
    }
}

/// List visible files.
async fn cmd_list(engine: &VaultEngine, principal: &Principal) -> Result<()> {
    let files = engine
        .list(principal)
        .await
        .context("Failed to list files")?;

    if files.is_empty() {
        println!("No files.");
    } else {
        println!("{} file(s):", files.len());
        print_files(&files);
    }

    Ok(())
}

/// Search visible files.
async fn cmd_search(engine: &VaultEngine, principal: &Principal, query: &str) -> Result<()> {
    let files = engine
        .search(principal, query)
        .await
        .context("Failed to search files")?;

    if files.is_empty() {
        println!("No files match '{}'.", query);
    } else {
        println!("{} file(s) match '{}':", files.len(), query);
        print_files(&files);
    }

    Ok(())
}

/// Show the audit trail.
async fn cmd_audit(engine: &VaultEngine, principal: &Principal) -> Result<()> {
    let records = engine
        .audit_trail(principal)
        .await
        .context("Failed to read audit trail")?;

    if records.is_empty() {
        println!("No audit records.");
        return Ok(());
    }

    for record in records {
        let file = record
            .file_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}  {:<8} {:<12} {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S%.6f"),
            record.action.as_str(),
            record.actor_id.as_str(),
            file
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_principal_from_flags() {
        let cli = Cli::parse_from(["ironvault", "--user-id", "alice", "--role", "manager", "list"]);
        let principal = cli.principal().unwrap();

        assert_eq!(principal.id.as_str(), "alice");
        assert_eq!(principal.username, "alice");
        assert_eq!(principal.role, Role::Manager);
    }

    #[test]
    fn test_user_id_required_outside_init() {
        let cli = Cli::parse_from(["ironvault", "list"]);
        assert!(cli.principal().is_err());
    }

    #[test]
    fn test_download_needs_id_or_name() {
        let missing = Cli::try_parse_from(["ironvault", "-u", "a", "download", "--dest", "out"]);
        assert!(missing.is_err());

        let both = Cli::try_parse_from([
            "ironvault", "-u", "a", "download", "--id",
            "67e55044-10b1-426f-9247-bb680e5fe0c8", "--name", "x", "--dest", "out",
        ]);
        assert!(both.is_err());
    }

    #[test]
    fn test_selector_from_flags() {
        let owned = selector(None, Some("a.txt".to_string()), Some("bob".to_string())).unwrap();
        assert_eq!(
            owned,
            FileSelector::Owned {
                owner: UserId::new("bob").unwrap(),
                filename: "a.txt".to_string(),
            }
        );

        let named = selector(None, Some("a.txt".to_string()), None).unwrap();
        assert_eq!(named, FileSelector::Named("a.txt".to_string()));
    }
}
