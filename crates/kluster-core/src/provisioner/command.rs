//! Provisioner that runs external commands
//!
//! Each capability maps to one command line (for example `terraform apply`)
//! executed in a per-cluster working directory. What the commands do is
//! opaque to kluster; only the exit status matters.

use super::{Capability, ProvisionParams, Provisioner};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use kluster_common::defaults::{
    DEFAULT_DESTROY_COMMAND, DEFAULT_INIT_COMMAND, DEFAULT_PROVISION_TIMEOUT,
    DEFAULT_SETUP_COMMAND,
};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

/// Environment variable carrying the cluster name into commands
pub const ENV_CLUSTER_NAME: &str = "KLUSTER_CLUSTER_NAME";

/// Environment variable carrying the provider into commands
pub const ENV_PROVIDER: &str = "KLUSTER_PROVIDER";

/// A program and its arguments; an empty spec is a no-op
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    argv: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a command line on whitespace (no shell quoting)
    pub fn parse(line: &str) -> Self {
        Self::new(line.split_whitespace())
    }

    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }

    fn program(&self) -> Option<(&str, &[String])> {
        self.argv.split_first().map(|(p, args)| (p.as_str(), args))
    }
}

/// Configuration for a command provisioner
#[derive(Debug, Clone)]
pub struct CommandProvisionerConfig {
    /// Root under which per-cluster working directories are created
    pub work_dir: PathBuf,
    pub init: CommandSpec,
    pub setup: CommandSpec,
    pub destroy: CommandSpec,
    /// Per-command timeout (kills the process if exceeded)
    pub timeout: Duration,
}

impl CommandProvisionerConfig {
    /// Terraform-style defaults rooted at `work_dir`
    pub fn with_defaults(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            init: CommandSpec::parse(DEFAULT_INIT_COMMAND),
            setup: CommandSpec::parse(DEFAULT_SETUP_COMMAND),
            destroy: CommandSpec::parse(DEFAULT_DESTROY_COMMAND),
            timeout: Duration::from_secs(DEFAULT_PROVISION_TIMEOUT),
        }
    }
}

/// Runs configured commands for each capability
#[derive(Debug, Clone)]
pub struct CommandProvisioner {
    config: CommandProvisionerConfig,
}

impl CommandProvisioner {
    pub fn new(config: CommandProvisionerConfig) -> Self {
        Self { config }
    }

    /// Working directory for the cluster named in `params`
    pub fn cluster_dir(&self, params: Option<&ProvisionParams>) -> Result<PathBuf> {
        let params = params.context("command provisioner requires cluster parameters")?;
        let name = params
            .cluster_name()
            .context("missing cluster_name parameter")?;
        let dir = match params.provider() {
            Some(provider) => format!("{provider}-{name}"),
            None => name.to_string(),
        };
        Ok(self.config.work_dir.join(dir))
    }

    fn spec(&self, capability: Capability) -> &CommandSpec {
        match capability {
            Capability::Init => &self.config.init,
            Capability::Setup => &self.config.setup,
            Capability::Destroy => &self.config.destroy,
        }
    }

    async fn run(&self, capability: Capability, params: Option<&ProvisionParams>) -> Result<()> {
        let dir = self.cluster_dir(params)?;
        let Some((program, args)) = self.spec(capability).program() else {
            info!(%capability, "No command configured, skipping");
            return Ok(());
        };

        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create working directory {}", dir.display()))?;

        let success = run_command(program, args, &dir, params, self.config.timeout).await?;
        if !success {
            bail!("{capability} command '{program}' exited with failure");
        }
        Ok(())
    }
}

#[async_trait]
impl Provisioner for CommandProvisioner {
    async fn init(&self, params: Option<&ProvisionParams>) -> Result<()> {
        self.run(Capability::Init, params).await
    }

    async fn setup(&self, params: Option<&ProvisionParams>) -> Result<()> {
        self.run(Capability::Setup, params).await
    }

    async fn destroy(&self, params: Option<&ProvisionParams>) -> Result<()> {
        self.run(Capability::Destroy, params).await
    }
}

/// Run a command, streaming its output to the log
///
/// # Returns
/// * `Ok(true)` if the command succeeded
/// * `Ok(false)` if it exited non-zero
/// * `Err` on timeout or spawn failure
async fn run_command(
    program: &str,
    args: &[String],
    dir: &Path,
    params: Option<&ProvisionParams>,
    timeout: Duration,
) -> Result<bool> {
    info!(
        cmd = %program,
        args = ?args,
        dir = %dir.display(),
        timeout_secs = timeout.as_secs(),
        "Running command"
    );

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(params) = params {
        if let Some(name) = params.cluster_name() {
            command.env(ENV_CLUSTER_NAME, name);
        }
        if let Some(provider) = params.provider() {
            command.env(ENV_PROVIDER, provider);
        }
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to spawn command: {program}"))?;

    let stdout = child.stdout.take().context("Failed to capture stdout")?;
    let stderr = child.stderr.take().context("Failed to capture stderr")?;

    let cmd_out = program.to_string();
    let stdout_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(cmd = %cmd_out, "{line}");
        }
    });

    let cmd_err = program.to_string();
    let stderr_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            warn!(cmd = %cmd_err, "{line}");
        }
    });

    let success = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => return Err(e).context("Failed waiting for command"),
        Err(_) => {
            warn!(
                cmd = %program,
                timeout_secs = timeout.as_secs(),
                "Command timed out, killing process"
            );
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill timed-out process");
            }
            bail!("Command '{}' timed out after {}s", program, timeout.as_secs());
        }
    };

    let _ = stdout_handle.await;
    let _ = stderr_handle.await;

    Ok(success)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> CommandProvisionerConfig {
        CommandProvisionerConfig {
            work_dir: dir.path().to_path_buf(),
            init: CommandSpec::default(),
            setup: CommandSpec::new(["touch", "applied"]),
            destroy: CommandSpec::new(["false"]),
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_command_spec_parse() {
        let spec = CommandSpec::parse("terraform  apply -auto-approve");
        assert_eq!(spec, CommandSpec::new(["terraform", "apply", "-auto-approve"]));
        assert!(CommandSpec::parse("   ").is_empty());
    }

    #[test]
    fn test_cluster_dir() {
        let dir = TempDir::new().unwrap();
        let provisioner = CommandProvisioner::new(config(&dir));

        let params = ProvisionParams::for_cluster("aws", "demo");
        assert_eq!(
            provisioner.cluster_dir(Some(&params)).unwrap(),
            dir.path().join("aws-demo")
        );
        assert!(provisioner.cluster_dir(None).is_err());
        assert!(provisioner.cluster_dir(Some(&ProvisionParams::new())).is_err());
    }

    #[tokio::test]
    async fn test_empty_command_is_noop() {
        let dir = TempDir::new().unwrap();
        let provisioner = CommandProvisioner::new(config(&dir));
        let params = ProvisionParams::for_cluster("aws", "demo");

        provisioner.init(Some(&params)).await.unwrap();
        assert!(!dir.path().join("aws-demo").exists());
    }

    #[tokio::test]
    async fn test_setup_runs_in_cluster_dir() {
        let dir = TempDir::new().unwrap();
        let provisioner = CommandProvisioner::new(config(&dir));
        let params = ProvisionParams::for_cluster("aws", "demo");

        provisioner.setup(Some(&params)).await.unwrap();
        assert!(dir.path().join("aws-demo").join("applied").exists());
    }

    #[tokio::test]
    async fn test_failing_command_is_error() {
        let dir = TempDir::new().unwrap();
        let provisioner = CommandProvisioner::new(config(&dir));
        let params = ProvisionParams::for_cluster("aws", "demo");

        let err = provisioner.destroy(Some(&params)).await.unwrap_err();
        assert!(err.to_string().contains("destroy command 'false'"));
    }

    #[tokio::test]
    async fn test_timeout_kills_command() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.setup = CommandSpec::new(["sleep", "5"]);
        config.timeout = Duration::from_millis(100);
        let provisioner = CommandProvisioner::new(config);
        let params = ProvisionParams::for_cluster("aws", "demo");

        let err = provisioner.setup(Some(&params)).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.setup = CommandSpec::new(["this-command-does-not-exist-12345"]);
        let provisioner = CommandProvisioner::new(config);
        let params = ProvisionParams::for_cluster("aws", "demo");

        assert!(provisioner.setup(Some(&params)).await.is_err());
    }
}
