use clap::Parser;
use iosxr_sshkeys_lib::{
    load_keys_file, sync_ssh_keys, ConverterKind, DeviceProfile, SshKeysError, SshResult,
    SyncOptions, TargetOverrides,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Copy SSH public keys to an IOS-XR device and remove keys of users not listed.
#[derive(Debug, Parser)]
#[command(name = "iosxr-sshkeys", version)]
struct Cli {
    /// Device host or ~/.ssh/config alias
    #[arg(long)]
    host: String,

    /// JSON file mapping user names to OpenSSH public keys
    #[arg(long)]
    keys: PathBuf,

    /// Report what would change without touching the device
    #[arg(long)]
    check: bool,

    #[arg(long)]
    port: Option<u16>,

    /// Login user on the device
    #[arg(long)]
    user: Option<String>,

    #[arg(long)]
    identity_file: Option<PathBuf>,

    /// Name of an environment variable holding the login password
    #[arg(long)]
    password_env: Option<String>,

    /// Trust a host key that is not in known_hosts
    #[arg(long)]
    accept_unknown_host: bool,

    /// in-process or ssh-keygen
    #[arg(long, default_value = "in-process")]
    converter: ConverterKind,

    /// JSON file overriding device commands and paths
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Seconds
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Seconds
    #[arg(long)]
    command_timeout: Option<u64>,

    #[arg(short, long)]
    verbose: bool,
}

async fn build_options(cli: &Cli) -> SshResult<SyncOptions> {
    let keys = load_keys_file(&cli.keys).await?;

    let profile = match &cli.profile {
        Some(path) => serde_json::from_str(&tokio::fs::read_to_string(path).await?)?,
        None => DeviceProfile::default(),
    };

    let password = match &cli.password_env {
        Some(var) => Some(std::env::var(var).map_err(|_| SshKeysError::InvalidConfig {
            message: format!("Environment variable {} is not set", var),
        })?),
        None => None,
    };

    Ok(SyncOptions {
        host_alias: cli.host.clone(),
        target: TargetOverrides {
            port: cli.port,
            user: cli.user.clone(),
            identity_file: cli.identity_file.clone(),
            password,
            connect_timeout: cli.connect_timeout.map(Duration::from_secs),
            command_timeout: cli.command_timeout.map(Duration::from_secs),
            accept_unknown_host: cli.accept_unknown_host,
        },
        profile,
        keys,
        dry_run: cli.check,
        converter: cli.converter,
    })
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("[main] Cannot serialize output: {}", e),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let result = match build_options(&cli).await {
        Ok(options) => sync_ssh_keys(options).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(report) => {
            print_json(&report);
            if report.error.is_some() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            log::error!("[main] {}", e);
            print_json(&serde_json::json!({ "changed": false, "failed": true, "error": e }));
            ExitCode::FAILURE
        }
    }
}
