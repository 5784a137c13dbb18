//! Clusterboard - activation dashboard with dual-tier storage
//!
//! A CLI tool that aggregates activation records per cluster, role and
//! identity, keeps every dataset in a local cache and mirrors it to a
//! GitHub repository when a token is configured.
//!
//! Exit codes:
//!   0 - Success (remote failures that left the local copy intact included)
//!   1 - Runtime error (invalid input, unreadable cache, bad config, etc.)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod session;
mod storage;

use anyhow::{Context, Result};
use cli::{Args, Command, OutputArgs, OutputFormat, TokenAction};
use config::Config;
use indicatif::{ProgressBar, ProgressStyle};
use models::Row;
use report::ReportOptions;
use session::DashboardSession;
use std::path::{Path, PathBuf};
use std::time::Duration;
use storage::{
    mask_token, CredentialStore, GitHubStore, LocalCache, RemoteOutcome, RemoteStore,
    SyncCoordinator,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    // Load configuration first so its verbosity reaches the logger
    let (mut config, source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);
    let args = apply_config_verbosity(args, &config);

    // Initialize logging
    init_logging(&args);

    info!("Clusterboard v{}", env!("CARGO_PKG_VERSION"));
    source.log();

    if let Err(e) = run(args, config).await {
        error!("Command failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle init-config: generate a default .clusterboard.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  .clusterboard.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .clusterboard.toml")?;

    println!("✅ Created .clusterboard.toml with default settings.");
    println!("   Edit it to point at your repository and cache directory.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// `[general] verbose = true` raises the default level; `--quiet` still wins.
fn apply_config_verbosity(mut args: Args, config: &Config) -> Args {
    if config.general.verbose && !args.quiet {
        args.verbose = true;
    }
    args
}

/// Dispatch the parsed command.
async fn run(args: Args, config: Config) -> Result<()> {
    debug!("Cache directory: {}", config.cache.dir.display());

    let credentials = CredentialStore::new(config.token_path());

    if let Command::Token { ref action } = args.command {
        return handle_token(action, &config, &credentials, &args).await;
    }

    let token = resolve_token(&args, &credentials)?;
    let coordinator = build_coordinator(&config, token)?;
    let quiet = args.quiet;

    match args.command {
        Command::Ingest {
            ref files,
            ref name,
            ref output,
        } => handle_ingest(&coordinator, files, name.as_deref(), output, quiet).await,
        Command::List => handle_list(&coordinator, quiet).await,
        Command::Show {
            ref name,
            ref cluster,
            group,
            reaggregate,
            ref output,
        } => {
            let options = ReportOptions {
                cluster: cluster.clone(),
                group: group.map(Into::into),
                ..ReportOptions::default()
            };
            handle_show(&coordinator, name, reaggregate, &options, output, quiet).await
        }
        Command::Detail {
            ref dataset,
            ref id,
            ref user_name,
        } => handle_detail(&coordinator, dataset, id, user_name, quiet).await,
        Command::Delete { ref name } => handle_delete(&coordinator, name, quiet).await,
        Command::Clear => handle_clear(&coordinator, quiet).await,
        Command::Export { ref name, ref file } => {
            coordinator
                .cache()
                .export(name, file)
                .with_context(|| format!("Failed to export {}", name))?;
            println!("✅ Exported {} to {}", name, file.display());
            Ok(())
        }
        Command::Token { .. } | Command::InitConfig => Ok(()),
    }
}

/// Where the configuration came from. Logged once logging is initialized.
enum ConfigSource {
    Explicit(PathBuf),
    DefaultFile,
    Builtin,
    Fallback(String),
}

impl ConfigSource {
    fn log(&self) {
        match self {
            ConfigSource::Explicit(path) => info!("Loaded config from: {}", path.display()),
            ConfigSource::DefaultFile => {
                info!("Loaded default config from {}", config::CONFIG_FILE)
            }
            ConfigSource::Builtin => debug!("No config file found, using defaults"),
            ConfigSource::Fallback(e) => warn!("Failed to load config: {}", e),
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let loaded = Config::load(config_path)?;
        return Ok((loaded, ConfigSource::Explicit(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(loaded)) => Ok((loaded, ConfigSource::DefaultFile)),
        Ok(None) => Ok((Config::default(), ConfigSource::Builtin)),
        Err(e) => Ok((Config::default(), ConfigSource::Fallback(e.to_string()))),
    }
}

/// The token for this invocation: the override first, then the stored one.
fn resolve_token(args: &Args, credentials: &CredentialStore) -> Result<Option<String>> {
    if let Some(ref token) = args.token {
        return Ok(Some(token.trim().to_string()));
    }
    credentials.load().with_context(|| {
        format!(
            "Failed to read stored token: {}",
            credentials.path().display()
        )
    })
}

fn build_remote(config: &Config, token: &str) -> Result<GitHubStore> {
    GitHubStore::new(&config.remote, token).context("Failed to create remote client")
}

fn build_coordinator(config: &Config, token: Option<String>) -> Result<SyncCoordinator> {
    let cache = LocalCache::open(&config.cache.dir).with_context(|| {
        format!(
            "Failed to open local cache: {}",
            config.cache.dir.display()
        )
    })?;

    let remote: Option<Box<dyn RemoteStore>> = match token {
        Some(token) => Some(Box::new(build_remote(config, &token)?)),
        None => {
            info!("No token configured, remote storage disabled");
            None
        }
    };

    Ok(SyncCoordinator::new(cache, remote, &config.remote.folder))
}

/// Spinner shown while remote work runs.
fn spinner(message: &str, quiet: bool, remote_enabled: bool) -> Option<ProgressBar> {
    if quiet || !remote_enabled {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

fn finish(pb: Option<ProgressBar>) {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
}

/// Read and concatenate row files in order.
fn read_rows(files: &[PathBuf]) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    for file in files {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let mut batch: Vec<Row> = serde_json::from_str(&content).with_context(|| {
            format!(
                "{} is not a JSON array of row objects",
                file.display()
            )
        })?;
        debug!("Read {} rows from {}", batch.len(), file.display());
        rows.append(&mut batch);
    }
    Ok(rows)
}

/// Source name: the override, the single file's name, or "<n> files".
fn source_name(files: &[PathBuf], name: Option<&str>) -> String {
    if let Some(name) = name {
        return name.trim().to_string();
    }
    match files {
        [single] => single
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| single.display().to_string()),
        _ => format!("{} files", files.len()),
    }
}

fn emit(content: &str, output: &OutputArgs) -> Result<()> {
    match output.output {
        Some(ref path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("📝 Report saved to: {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn render(session: &DashboardSession, options: &ReportOptions, output: &OutputArgs) -> Result<()> {
    let content = match output.format {
        OutputFormat::Json => report::generate_json_report(session, options)?,
        OutputFormat::Markdown => report::generate_markdown_report(session, options),
    };
    emit(&content, output)
}

async fn handle_ingest(
    coordinator: &SyncCoordinator,
    files: &[PathBuf],
    name: Option<&str>,
    output: &OutputArgs,
    quiet: bool,
) -> Result<()> {
    let rows = read_rows(files)?;
    let source = source_name(files, name);
    println!("📥 Ingesting {} rows from {}", rows.len(), source);

    let pb = spinner("Saving dataset...", quiet, coordinator.is_remote_enabled());
    let result = coordinator.ingest(&source, rows).await;
    finish(pb);
    let saved = result.context("Failed to save dataset")?;

    print_outcome(&saved.remote, &saved.summary());

    let loaded = coordinator
        .cache()
        .get(&saved.entry.name)
        .context("Failed to reload saved dataset")?;
    let session = DashboardSession::from_dataset(loaded, false);
    render(&session, &ReportOptions::default(), output)
}

async fn handle_list(coordinator: &SyncCoordinator, quiet: bool) -> Result<()> {
    let pb = spinner("Synchronizing with remote...", quiet, coordinator.is_remote_enabled());
    let result = coordinator.list_datasets().await;
    finish(pb);
    let listing = result.context("Failed to list datasets")?;

    let reconcile = &listing.reconcile;
    match reconcile.remote {
        RemoteOutcome::Failed(ref e) => {
            println!("⚠️  Remote unavailable ({}); showing local datasets only.", e)
        }
        RemoteOutcome::Reconciled if !reconcile.downloaded.is_empty() => println!(
            "☁️  Pulled {} dataset(s) from remote.",
            reconcile.downloaded.len()
        ),
        _ => {}
    }
    for (name, reason) in &reconcile.failed {
        println!("⚠️  Could not pull {}: {}", name, reason);
    }

    println!("{}", report::render_listing(&listing.index));
    Ok(())
}

async fn handle_show(
    coordinator: &SyncCoordinator,
    name: &str,
    reaggregate: bool,
    options: &ReportOptions,
    output: &OutputArgs,
    quiet: bool,
) -> Result<()> {
    let pb = spinner("Loading dataset...", quiet, coordinator.is_remote_enabled());
    let result = coordinator.load_dataset(name).await;
    finish(pb);
    let loaded = result.with_context(|| format!("Failed to load {}", name))?;

    if !quiet {
        print_outcome(&loaded.remote, &loaded.summary());
    }

    let session = DashboardSession::from_dataset(loaded.dataset, reaggregate);
    render(&session, options, output)
}

async fn handle_detail(
    coordinator: &SyncCoordinator,
    dataset: &str,
    id: &str,
    user_name: &str,
    quiet: bool,
) -> Result<()> {
    let pb = spinner("Loading dataset...", quiet, coordinator.is_remote_enabled());
    let result = coordinator.load_dataset(dataset).await;
    finish(pb);
    let loaded = result.with_context(|| format!("Failed to load {}", dataset))?;

    let session = DashboardSession::from_dataset(loaded.dataset, false);
    let rows = session.retail_detail(id, user_name);
    println!(
        "{}",
        report::render_retail_detail(id.trim(), user_name.trim(), &rows)
    );
    Ok(())
}

async fn handle_delete(coordinator: &SyncCoordinator, name: &str, quiet: bool) -> Result<()> {
    let pb = spinner("Deleting dataset...", quiet, coordinator.is_remote_enabled());
    let result = coordinator.delete_dataset(name).await;
    finish(pb);
    let deleted = result.with_context(|| format!("Failed to delete {}", name))?;

    print_outcome(&deleted.remote, &deleted.summary(name));
    Ok(())
}

async fn handle_clear(coordinator: &SyncCoordinator, quiet: bool) -> Result<()> {
    let pb = spinner("Deleting all datasets...", quiet, coordinator.is_remote_enabled());
    let result = coordinator.clear_all().await;
    finish(pb);
    let cleared = result.context("Failed to clear datasets")?;

    for (name, e) in &cleared.remote_failures {
        println!("⚠️  Remote delete of {} failed: {}", name, e);
    }
    println!(
        "✅ Removed {} dataset(s) locally, {} remotely.",
        cleared.removed, cleared.remote_deleted
    );
    Ok(())
}

async fn handle_token(
    action: &TokenAction,
    config: &Config,
    credentials: &CredentialStore,
    args: &Args,
) -> Result<()> {
    match action {
        TokenAction::Set { value } => {
            credentials.set(value).with_context(|| {
                format!("Failed to store token: {}", credentials.path().display())
            })?;
            println!("🔑 Token stored: {}", mask_token(value.trim()));
            verify_access(config, value.trim(), args.quiet).await
        }
        TokenAction::Clear => {
            let existed = credentials.clear().context("Failed to remove stored token")?;
            if existed {
                println!("✅ Token removed. Remote storage is disabled.");
            } else {
                println!("No token was stored.");
            }
            Ok(())
        }
        TokenAction::Status => match resolve_token(args, credentials)? {
            Some(token) => {
                let source = if args.token.is_some() { "override" } else { "stored" };
                println!("🔑 Token ({}): {}", source, mask_token(&token));
                verify_access(config, &token, args.quiet).await
            }
            None => {
                println!("No token configured. Remote storage is disabled.");
                Ok(())
            }
        },
    }
}

/// Report remote connectivity. Failure is printed, not fatal.
async fn verify_access(config: &Config, token: &str, quiet: bool) -> Result<()> {
    let remote = build_remote(config, token)?;

    let pb = spinner("Checking repository access...", quiet, true);
    let result = remote.check_access().await;
    finish(pb);

    match result {
        Ok(access) => println!(
            "✅ Connected to {} (default branch: {})",
            access.repo, access.default_branch
        ),
        Err(e) => {
            warn!("Access check failed: {}", e);
            println!("⚠️  Could not verify access: {}", e);
        }
    }
    Ok(())
}

fn print_outcome(outcome: &RemoteOutcome, summary: &str) {
    if outcome.is_failure() {
        println!("⚠️  {}", summary);
    } else {
        println!("✅ {}", summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[test]
    fn test_source_name() {
        let one = vec![PathBuf::from("data/march.xlsx.json")];
        assert_eq!(source_name(&one, None), "march.xlsx.json");

        let many = vec![PathBuf::from("a.json"), PathBuf::from("b.json")];
        assert_eq!(source_name(&many, None), "2 files");
        assert_eq!(source_name(&many, Some(" march ")), "march");
    }

    #[test]
    fn test_read_rows_concatenates_in_order() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a.json");
        let second = dir.path().join("b.json");
        std::fs::write(&first, r#"[{"SUB CLUSTER": "1.3"}]"#).unwrap();
        std::fs::write(&second, r#"[{"SUB CLUSTER": "2.2"}, {"SUB CLUSTER": 7.1}]"#).unwrap();

        let rows = read_rows(&[first, second]).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["SUB CLUSTER"].to_string(), "1.3");
        assert_eq!(rows[2]["SUB CLUSTER"].to_string(), "7.1");
    }

    #[test]
    fn test_read_rows_rejects_non_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"SUB CLUSTER": "1.3"}"#).unwrap();
        assert!(read_rows(&[path]).is_err());
    }

    #[test]
    fn test_config_verbosity_raises_log_level() {
        let mut config = Config::default();
        config.general.verbose = true;

        let args = Args::try_parse_from(["clusterboard", "list"]).unwrap();
        let args = apply_config_verbosity(args, &config);
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        let quiet = Args::try_parse_from(["clusterboard", "list", "-q"]).unwrap();
        let quiet = apply_config_verbosity(quiet, &config);
        assert!(quiet.validate().is_ok());
        assert_eq!(quiet.log_level(), tracing::Level::ERROR);

        let plain = Args::try_parse_from(["clusterboard", "list"]).unwrap();
        let plain = apply_config_verbosity(plain, &Config::default());
        assert_eq!(plain.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_coordinator_without_token_is_local_only() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.cache.dir = dir.path().to_path_buf();

        let coordinator = build_coordinator(&config, None).unwrap();
        assert!(!coordinator.is_remote_enabled());

        let coordinator = build_coordinator(&config, Some("ghp_test".to_string())).unwrap();
        assert!(coordinator.is_remote_enabled());
    }
}
