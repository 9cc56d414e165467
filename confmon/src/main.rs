use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::{error, info};

use confmon::{
    DialectSessionFactory, DialectTable, FleetOrchestrator, GitRepository, HostKeyVerification,
    Inventory, InventorySource, LineDiffer, SessionConfig,
};

/// Snapshot running configurations of network devices into a git archive.
#[derive(Debug, Parser)]
#[command(name = "confmon", version, about)]
struct Cli {
    /// Inventory YAML: a file path or an http(s) URL
    source: InventorySource,

    /// Devices captured at the same time
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: u16,

    /// Connect and prompt timeout in seconds (overrides the inventory)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Pause before waking the console, in seconds (overrides the inventory)
    #[arg(long, value_name = "SECS")]
    settle_delay: Option<u64>,

    /// Commit locally but do not push
    #[arg(long)]
    no_push: bool,

    /// SSH host key policy
    #[arg(long, value_enum, default_value_t = HostKeyPolicy::AcceptNew)]
    host_key_policy: HostKeyPolicy,

    /// known_hosts file (default: ~/.ssh/known_hosts)
    #[arg(long, value_name = "PATH")]
    known_hosts: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HostKeyPolicy {
    Strict,
    AcceptNew,
    Off,
}

impl From<HostKeyPolicy> for HostKeyVerification {
    fn from(policy: HostKeyPolicy) -> Self {
        match policy {
            HostKeyPolicy::Strict => HostKeyVerification::Strict,
            HostKeyPolicy::AcceptNew => HostKeyVerification::AcceptNew,
            HostKeyPolicy::Off => HostKeyVerification::Disabled,
        }
    }
}

impl Cli {
    /// Built-in defaults, then the inventory, then the command line.
    fn session_config(&self, inventory: &Inventory) -> SessionConfig {
        let mut config = SessionConfig::default();
        if let Some(timeout) = inventory.session.timeout {
            config.timeout = timeout;
        }
        if let Some(delay) = inventory.session.settle_delay {
            config.settle_delay = delay;
        }
        if let Some(secs) = self.timeout {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.settle_delay {
            config.settle_delay = Duration::from_secs(secs);
        }
        config.host_key_verification = self.host_key_policy.into();
        config.known_hosts_path = self.known_hosts.clone();
        config
    }

    fn repository(&self, inventory: &Inventory) -> GitRepository {
        let repository = GitRepository::new(&inventory.archive_root)
            .with_branch(&inventory.git_branch)
            .with_push(!self.no_push);
        match &inventory.git_remote {
            Some(remote) => repository.with_remote(remote),
            None => repository,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

async fn run(cli: &Cli) -> confmon::Result<()> {
    let inventory = confmon::inventory::load(&cli.source).await?;
    info!(
        "{} devices from {}, archive {}",
        inventory.devices.len(),
        cli.source,
        inventory.archive_root.display()
    );

    let factory = DialectSessionFactory::new(DialectTable::builtin()?, cli.session_config(&inventory));
    let differ = LineDiffer::standard().map_err(confmon::error::SessionError::from)?;
    let mut repository = cli.repository(&inventory);

    FleetOrchestrator::from_inventory(&inventory)
        .with_concurrency(usize::from(cli.concurrency))
        .run(&factory, &differ, &mut repository)
        .await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory(timeout: Option<u64>, remote: Option<&str>) -> Inventory {
        Inventory {
            devices: Vec::new(),
            archive_root: PathBuf::from("/srv/configs"),
            git_remote: remote.map(str::to_string),
            git_branch: "main".to_string(),
            session: confmon::inventory::SessionOverrides {
                timeout: timeout.map(Duration::from_secs),
                settle_delay: None,
            },
        }
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["confmon", "fleet.yml"]).unwrap();
        assert_eq!(cli.concurrency, 1);
        assert!(!cli.no_push);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.source, InventorySource::Path(PathBuf::from("fleet.yml")));
    }

    #[test]
    fn test_cli_rejects_zero_concurrency() {
        assert!(Cli::try_parse_from(["confmon", "--concurrency", "0", "fleet.yml"]).is_err());
    }

    #[test]
    fn test_config_precedence() {
        let cli = Cli::try_parse_from(["confmon", "fleet.yml"]).unwrap();
        let config = cli.session_config(&inventory(Some(10), None));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.settle_delay, SessionConfig::default().settle_delay);

        let cli = Cli::try_parse_from([
            "confmon",
            "--timeout",
            "3",
            "--settle-delay",
            "0",
            "-vv",
            "https://cmdb.example.net/fleet.yml",
        ])
        .unwrap();
        let config = cli.session_config(&inventory(Some(10), None));
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert!(config.settle_delay.is_zero());
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_repository_from_inventory() {
        let cli = Cli::try_parse_from(["confmon", "--no-push", "fleet.yml"]).unwrap();
        let repository = cli.repository(&inventory(None, Some("origin")));
        assert_eq!(repository.branch(), "main");
        assert_eq!(repository.root(), PathBuf::from("/srv/configs").as_path());
    }
}
