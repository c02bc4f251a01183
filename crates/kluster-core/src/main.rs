//! kluster: create, inspect and destroy provisioned clusters
//!
//! Cluster documents are persisted to a local directory or an S3 bucket and
//! handed to a command provisioner (terraform by default) that runs in the
//! background while the command waits.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use kluster_common::defaults::{
    DEFAULT_DESTROY_COMMAND, DEFAULT_INIT_COMMAND, DEFAULT_PROVISION_TIMEOUT,
    DEFAULT_SETUP_COMMAND, DEFAULT_STORAGE, DEFAULT_STORAGE_REGION,
};
use kluster_core::cluster::{
    AwsCluster, ClusterConfig, ClusterManager, EksCluster, ProviderDocument, encode_document,
    parse_cluster_input,
};
use kluster_core::config::{self, ManagerConfig, OverwritePolicy, StoreSettings};
use kluster_core::executor::{ProvisionExecutor, ProvisionTask, TaskState};
use kluster_core::provisioner::{
    CommandProvisioner, CommandProvisionerConfig, CommandSpec, ProvisionerRegistry,
};
use kluster_core::store::StorageKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kluster")]
#[command(about = "Lifecycle management for provisioned clusters")]
#[command(version)]
struct Args {
    #[command(flatten)]
    storage: StorageArgs,

    #[command(flatten)]
    provisioner: ProvisionerArgs,

    /// What create does when the cluster already exists
    #[arg(long, value_enum, default_value_t = OverwritePolicy::Reject, global = true)]
    overwrite: OverwritePolicy,

    #[command(subcommand)]
    command: Command,
}

/// Where cluster documents are stored
#[derive(clap::Args, Debug)]
struct StorageArgs {
    /// Storage backend
    #[arg(
        long,
        env = "KLUSTER_STORAGE",
        value_enum,
        default_value = DEFAULT_STORAGE,
        global = true
    )]
    storage: StorageKind,

    /// Directory (local) or bucket[/prefix] (s3)
    /// (default: platform data dir)
    #[arg(long, env = "KLUSTER_STORAGE_PATH", global = true)]
    storage_path: Option<String>,

    /// Region of the storage bucket
    #[arg(
        long,
        env = "KLUSTER_STORAGE_REGION",
        default_value = DEFAULT_STORAGE_REGION,
        global = true
    )]
    storage_region: String,
}

impl StorageArgs {
    fn settings(&self) -> Result<StoreSettings> {
        let path = match &self.storage_path {
            Some(path) => path.clone(),
            None if self.storage == StorageKind::S3 => {
                bail!("--storage-path is required for s3 storage (bucket[/prefix])")
            }
            None => config::default_storage_path()?.display().to_string(),
        };
        Ok(StoreSettings {
            kind: self.storage,
            path,
            region: self.storage_region.clone(),
        })
    }
}

/// How the command provisioner runs
#[derive(clap::Args, Debug)]
struct ProvisionerArgs {
    /// Root of per-cluster working directories
    /// (default: platform data dir)
    #[arg(long, env = "KLUSTER_WORK_DIR", global = true)]
    work_dir: Option<PathBuf>,

    /// Command run on init
    #[arg(
        long,
        env = "KLUSTER_INIT_COMMAND",
        default_value = DEFAULT_INIT_COMMAND,
        global = true
    )]
    init_command: String,

    /// Command run on setup
    #[arg(
        long,
        env = "KLUSTER_SETUP_COMMAND",
        default_value = DEFAULT_SETUP_COMMAND,
        global = true
    )]
    setup_command: String,

    /// Command run on destroy
    #[arg(
        long,
        env = "KLUSTER_DESTROY_COMMAND",
        default_value = DEFAULT_DESTROY_COMMAND,
        global = true
    )]
    destroy_command: String,

    /// Per-command timeout in seconds
    #[arg(long, default_value_t = DEFAULT_PROVISION_TIMEOUT, global = true)]
    timeout: u64,
}

impl TryFrom<&ProvisionerArgs> for CommandProvisionerConfig {
    type Error = anyhow::Error;

    fn try_from(args: &ProvisionerArgs) -> Result<Self> {
        let work_dir = match &args.work_dir {
            Some(dir) => dir.clone(),
            None => config::default_work_dir()?,
        };
        Ok(Self {
            work_dir,
            init: CommandSpec::parse(&args.init_command),
            setup: CommandSpec::parse(&args.setup_command),
            destroy: CommandSpec::parse(&args.destroy_command),
            timeout: Duration::from_secs(args.timeout),
        })
    }
}

/// Providers this binary knows documents for
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Provider {
    Aws,
    Eks,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Persist a cluster document and provision it
    ///
    /// Waits for the provisioner to finish; the job runs inside this process
    /// and is lost if kluster exits first.
    Create {
        provider: Provider,

        /// YAML or JSON document, provider-keyed or bare
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print a persisted cluster document
    Get {
        provider: Provider,
        name: String,

        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Tear a cluster down and remove its document
    ///
    /// Waits for the provisioner to finish; the job runs inside this process
    /// and is lost if kluster exits first.
    Destroy { provider: Provider, name: String },

    /// Show the last recorded lifecycle state
    Status { provider: Provider, name: String },

    /// List persisted clusters of a provider
    List { provider: Provider },
}

/// Run a generic handler with the document type of a provider
macro_rules! with_provider {
    ($provider:expr, $handler:ident($($arg:expr),* $(,)?)) => {
        match $provider {
            Provider::Aws => $handler::<AwsCluster>($($arg),*).await,
            Provider::Eks => $handler::<EksCluster>($($arg),*).await,
        }
    };
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

/// Used when RUST_LOG is unset; the AWS SDK is noisy at info
const DEFAULT_LOG_FILTER: &str = "info,aws_config=warn,aws_smithy_runtime=warn,aws_sdk_s3=warn";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let settings = args.storage.settings()?;
    let provisioner_config = CommandProvisionerConfig::try_from(&args.provisioner)?;
    let registry = ProvisionerRegistry::builder()
        .register(
            AwsCluster::PROVIDER,
            CommandProvisioner::new(provisioner_config.clone()),
        )
        .register(EksCluster::PROVIDER, CommandProvisioner::new(provisioner_config))
        .build();

    info!(
        storage = %settings.kind,
        path = %settings.path,
        provisioners = ?registry.names(),
        "Starting kluster"
    );

    let (executor, worker) = ProvisionExecutor::spawn();
    let manager = ClusterManager::new(
        settings,
        registry,
        executor.clone(),
        ManagerConfig {
            overwrite: args.overwrite,
        },
    );

    let result = match args.command {
        Command::Create { provider, file } => {
            with_provider!(provider, handle_create(&manager, &file))
        }
        Command::Get {
            provider,
            name,
            format,
        } => with_provider!(provider, handle_get(&manager, &name, format)),
        Command::Destroy { provider, name } => {
            with_provider!(provider, handle_destroy(&manager, &name))
        }
        Command::Status { provider, name } => {
            with_provider!(provider, handle_status(&manager, &name))
        }
        Command::List { provider } => with_provider!(provider, handle_list(&manager)),
    };

    executor.shutdown();
    worker.await.context("provision executor panicked")?;

    result
}

/// Handle the create command
async fn handle_create<C: ClusterConfig>(manager: &ClusterManager, file: &Path) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let cluster: C = parse_cluster_input(&bytes)
        .with_context(|| format!("Failed to parse {}", file.display()))?;

    let task = manager.create(&cluster).await?;
    println!("{} persisted", task.cluster());

    finish(task).await
}

/// Handle the get command
async fn handle_get<C: ClusterConfig>(
    manager: &ClusterManager,
    name: &str,
    format: OutputFormat,
) -> Result<()> {
    let cluster: C = manager.get(name).await?;
    match format {
        OutputFormat::Yaml => print!("{}", encode_document(&cluster)?),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&ProviderDocument(&cluster))?
        ),
    }
    Ok(())
}

/// Handle the destroy command
async fn handle_destroy<C: ClusterConfig>(manager: &ClusterManager, name: &str) -> Result<()> {
    let task = manager.destroy::<C>(name).await?;
    println!("{} removed", task.cluster());

    finish(task).await
}

/// Handle the status command
async fn handle_status<C: ClusterConfig>(manager: &ClusterManager, name: &str) -> Result<()> {
    let state = manager.status::<C>(name).await?;
    let progress = if state.status.is_in_progress() {
        " (in progress)"
    } else {
        ""
    };
    println!(
        "{:<16} {}{progress}",
        state.status,
        state.updated_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(message) = state.message {
        println!("{message}");
    }
    Ok(())
}

/// Handle the list command
async fn handle_list<C: ClusterConfig>(manager: &ClusterManager) -> Result<()> {
    let names = manager.list::<C>().await?;
    if names.is_empty() {
        println!("No {} clusters found.", C::PROVIDER);
        return Ok(());
    }
    for name in &names {
        println!("{name}");
    }
    println!("\nTotal: {} clusters", names.len());
    Ok(())
}

/// Wait for the background job and report its outcome
async fn finish(mut task: ProvisionTask) -> Result<()> {
    info!(cluster = %task.cluster(), kind = %task.kind(), "Waiting for provisioner");
    match task.wait().await {
        TaskState::Succeeded => {
            println!("{} {} completed", task.cluster(), task.kind());
            Ok(())
        }
        TaskState::Failed(message) => bail!("{} {} failed: {message}", task.cluster(), task.kind()),
        state => bail!("{} {} ended as {state:?}", task.cluster(), task.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn lifecycle_commands_have_no_detach_flag() {
        let create = ["kluster", "create", "aws", "--file", "demo.yaml", "--no-wait"];
        assert!(Args::try_parse_from(create).is_err());

        let destroy = ["kluster", "destroy", "aws", "demo", "--no-wait"];
        assert!(Args::try_parse_from(destroy).is_err());

        let args = Args::try_parse_from(["kluster", "destroy", "eks", "demo"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Destroy { provider: Provider::Eks, ref name } if name == "demo"
        ));
    }
}
