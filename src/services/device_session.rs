use crate::models::{DeviceTarget, SshKeysError, SshResult};
use crate::services::remote_session::RemoteSession;
use crate::utils::{expand_home, validate_hostname, SshConfigParser};
use async_trait::async_trait;
use russh::keys::key::PublicKey;
use russh::{client, Channel, ChannelMsg, Disconnect};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::Mutex;
use tokio::time::timeout;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_IDENTITIES: [&str; 3] = ["id_ed25519", "id_rsa", "id_ecdsa"];

/// Known hosts check result
#[derive(Debug, Clone, Copy, PartialEq)]
enum HostKeyStatus {
    /// Server key not checked yet
    Unchecked,
    Matched,
    /// Host is not in known_hosts
    Unknown,
    /// Host is in known_hosts with a different key
    Changed,
}

/// SSH client handler
struct DeviceHandler {
    hostname: String,
    port: u16,
    accept_unknown_host: bool,
    /// Shared state (readable after connect returns)
    status: Arc<Mutex<HostKeyStatus>>,
}

#[async_trait]
impl client::Handler for DeviceHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let known = russh_keys::check_known_hosts(&self.hostname, self.port, server_public_key);
        let status = match known {
            Ok(true) => HostKeyStatus::Matched,
            Ok(false) => HostKeyStatus::Unknown,
            Err(e) => {
                log::warn!(
                    "[device_session] Host key check failed for {}: {}",
                    self.hostname,
                    e
                );
                HostKeyStatus::Changed
            }
        };

        *self.status.lock().await = status;

        match status {
            HostKeyStatus::Matched => Ok(true),
            HostKeyStatus::Unknown if self.accept_unknown_host => {
                log::warn!(
                    "[device_session] Accepting unknown host key for {}",
                    self.hostname
                );
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Optional settings that take precedence over `~/.ssh/config`.
#[derive(Debug, Clone, Default)]
pub struct TargetOverrides {
    pub port: Option<u16>,
    pub user: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub password: Option<String>,
    pub connect_timeout: Option<Duration>,
    pub command_timeout: Option<Duration>,
    pub accept_unknown_host: bool,
}

/// Resolve a device alias through `~/.ssh/config`.
pub async fn resolve_target(
    host_alias: &str,
    overrides: TargetOverrides,
) -> SshResult<DeviceTarget> {
    let ssh_dir = dirs::home_dir()
        .map(|h| h.join(".ssh"))
        .unwrap_or_else(|| expand_home("~/.ssh"));
    let config_path = ssh_dir.join("config");

    let config = if config_path.exists() {
        fs::read_to_string(&config_path).await.unwrap_or_default()
    } else {
        String::new()
    };

    resolve_target_with(host_alias, &config, &ssh_dir, overrides)
}

/// Resolution against given config content and ssh directory.
pub fn resolve_target_with(
    host_alias: &str,
    config: &str,
    ssh_dir: &Path,
    overrides: TargetOverrides,
) -> SshResult<DeviceTarget> {
    let hosts = SshConfigParser::parse(config);
    let resolved = SshConfigParser::resolve(&hosts, host_alias);

    let hostname = resolved
        .hostname
        .clone()
        .unwrap_or_else(|| host_alias.to_string());
    validate_hostname(&hostname)?;

    let user = overrides
        .user
        .or(resolved.user.clone())
        .or_else(|| std::env::var("USER").ok())
        .ok_or_else(|| SshKeysError::InvalidConfig {
            message: format!("No login user configured for {}", host_alias),
        })?;

    let identity_file = overrides
        .identity_file
        .or(resolved.identity_file.clone())
        .or_else(|| {
            DEFAULT_IDENTITIES
                .iter()
                .map(|k| ssh_dir.join(k))
                .find(|p| p.exists())
        });

    if identity_file.is_none() && overrides.password.is_none() {
        return Err(SshKeysError::InvalidConfig {
            message: format!("No identity file or password for {}", host_alias),
        });
    }

    Ok(DeviceTarget {
        host_alias: host_alias.to_string(),
        hostname,
        port: overrides.port.unwrap_or_else(|| resolved.get_port()),
        user,
        identity_file,
        password: overrides.password,
        connect_timeout: overrides.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
        command_timeout: overrides.command_timeout.unwrap_or(DEFAULT_COMMAND_TIMEOUT),
        accept_unknown_host: overrides.accept_unknown_host,
    })
}

/// Collected output of one channel
#[derive(Debug, Default)]
struct ChannelOutput {
    text: String,
    exit_status: Option<u32>,
}

/// `RemoteSession` over a russh client connection.
pub struct DeviceSession {
    handle: client::Handle<DeviceHandler>,
    hostname: String,
    command_timeout: Duration,
}

impl DeviceSession {
    /// Connect, verify the host key and authenticate.
    pub async fn connect(target: &DeviceTarget) -> SshResult<Self> {
        log::info!(
            "[device_session] Connecting to {} ({}) as {}",
            target.host_alias,
            target.address(),
            target.user
        );

        let status = Arc::new(Mutex::new(HostKeyStatus::Unchecked));
        let handler = DeviceHandler {
            hostname: target.hostname.clone(),
            port: target.port,
            accept_unknown_host: target.accept_unknown_host,
            status: status.clone(),
        };

        let config = client::Config {
            inactivity_timeout: Some(target.command_timeout * 2),
            ..Default::default()
        };

        let connect_result = timeout(
            target.connect_timeout,
            client::connect(Arc::new(config), target.address(), handler),
        )
        .await;

        let mut handle = match connect_result {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                let hostname = target.hostname.clone();
                return Err(match *status.lock().await {
                    HostKeyStatus::Unknown => SshKeysError::HostKeyUnknown { hostname },
                    HostKeyStatus::Changed => SshKeysError::HostKeyChanged { hostname },
                    _ => SshKeysError::Connection {
                        message: e.to_string(),
                    },
                });
            }
            Err(_) => return Err(SshKeysError::ConnectionTimeout),
        };

        let mut authenticated = false;

        if let Some(path) = &target.identity_file {
            let key_content = fs::read_to_string(path).await.map_err(|e| {
                SshKeysError::InvalidConfig {
                    message: format!("Cannot read identity file {}: {}", path.display(), e),
                }
            })?;
            let key_pair = russh_keys::decode_secret_key(&key_content, None).map_err(|e| {
                SshKeysError::InvalidConfig {
                    message: format!("Cannot load identity file {}: {}", path.display(), e),
                }
            })?;
            authenticated = handle
                .authenticate_publickey(&target.user, Arc::new(key_pair))
                .await?;
            log::debug!(
                "[device_session] Public key authentication accepted: {}",
                authenticated
            );
        }

        if !authenticated {
            if let Some(password) = &target.password {
                authenticated = handle
                    .authenticate_password(&target.user, password)
                    .await?;
            }
        }

        if !authenticated {
            return Err(SshKeysError::AuthenticationFailed {
                user: target.user.clone(),
            });
        }

        log::info!("[device_session] Connected to {}", target.hostname);

        Ok(Self {
            handle,
            hostname: target.hostname.clone(),
            command_timeout: target.command_timeout,
        })
    }

    /// Disconnect politely.
    pub async fn close(self) -> SshResult<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;
        log::info!("[device_session] Disconnected from {}", self.hostname);
        Ok(())
    }

    async fn open_channel(&mut self) -> SshResult<Channel<client::Msg>> {
        Ok(self.handle.channel_open_session().await?)
    }

    /// Read until the channel closes.
    async fn collect(channel: &mut Channel<client::Msg>) -> ChannelOutput {
        let mut output = ChannelOutput::default();
        let mut eof = false;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => {
                    output.text.push_str(&String::from_utf8_lossy(&data));
                }
                ChannelMsg::ExtendedData { data, .. } => {
                    output.text.push_str(&String::from_utf8_lossy(&data));
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    output.exit_status = Some(exit_status);
                    if eof {
                        break;
                    }
                }
                ChannelMsg::Eof => {
                    eof = true;
                    if output.exit_status.is_some() {
                        break;
                    }
                }
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        output
    }

    fn check_exit(command: &str, output: &ChannelOutput) -> SshResult<()> {
        match output.exit_status {
            Some(code) if code != 0 => Err(SshKeysError::CommandFailed {
                command: command.to_string(),
                message: format!("exit status {}: {}", code, output.text.trim()),
            }),
            _ => Ok(()),
        }
    }

    /// Wait for an SCP acknowledgement byte.
    async fn read_scp_ack(channel: &mut Channel<client::Msg>, remote_path: &str) -> SshResult<()> {
        let failed = |message: String| SshKeysError::CommandFailed {
            command: format!("scp -t {}", remote_path),
            message,
        };

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => match data.first() {
                    None => continue,
                    Some(0) => return Ok(()),
                    Some(_) => {
                        return Err(failed(
                            String::from_utf8_lossy(&data[1..]).trim().to_string(),
                        ))
                    }
                },
                ChannelMsg::ExtendedData { data, .. } => {
                    log::debug!(
                        "[device_session] scp stderr: {}",
                        String::from_utf8_lossy(&data).trim()
                    );
                }
                ChannelMsg::ExitStatus { exit_status } if exit_status != 0 => {
                    return Err(failed(format!("exit status {}", exit_status)));
                }
                ChannelMsg::Eof | ChannelMsg::Close => break,
                _ => {}
            }
        }

        Err(failed("channel closed before acknowledgement".to_string()))
    }

    async fn send_scp(
        channel: &mut Channel<client::Msg>,
        contents: &[u8],
        remote_path: &str,
    ) -> SshResult<()> {
        let file_name = remote_path
            .rsplit(|c| c == '/' || c == ':')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or("publickey.raw");

        channel
            .exec(true, format!("scp -t {}", remote_path))
            .await?;
        Self::read_scp_ack(channel, remote_path).await?;

        let header = format!("C0644 {} {}\n", contents.len(), file_name);
        channel.data(header.as_bytes()).await?;
        Self::read_scp_ack(channel, remote_path).await?;

        channel.data(contents).await?;
        channel.data(&[0u8][..]).await?;
        Self::read_scp_ack(channel, remote_path).await?;

        channel.eof().await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteSession for DeviceSession {
    async fn run_command(&mut self, command: &str) -> SshResult<String> {
        log::debug!("[device_session] exec: {}", command);
        let mut channel = self.open_channel().await?;
        channel.exec(true, command).await?;

        let output = timeout(self.command_timeout, Self::collect(&mut channel))
            .await
            .map_err(|_| SshKeysError::ConnectionTimeout)?;

        Self::check_exit(command, &output)?;
        Ok(output.text)
    }

    async fn run_with_confirmation(
        &mut self,
        command: &str,
        expected_prompt: &str,
        answer: &str,
    ) -> SshResult<String> {
        log::debug!("[device_session] exec (interactive): {}", command);
        let mut channel = self.open_channel().await?;
        // The device only prompts on a terminal
        channel
            .request_pty(false, "vt100", 200, 24, 0, 0, &[])
            .await?;
        channel.exec(true, command).await?;

        let exchange = async {
            let mut output = ChannelOutput::default();
            let mut answered = false;

            while let Some(msg) = channel.wait().await {
                match msg {
                    ChannelMsg::Data { data } | ChannelMsg::ExtendedData { data, .. } => {
                        output.text.push_str(&String::from_utf8_lossy(&data));
                        if !answered && output.text.contains(expected_prompt) {
                            let reply = format!("{}\n", answer);
                            channel.data(reply.as_bytes()).await?;
                            answered = true;
                        }
                    }
                    ChannelMsg::ExitStatus { exit_status } => {
                        output.exit_status = Some(exit_status);
                    }
                    ChannelMsg::Close => break,
                    _ => {}
                }
            }

            Ok::<_, SshKeysError>((output, answered))
        };

        let (output, answered) = timeout(self.command_timeout, exchange)
            .await
            .map_err(|_| SshKeysError::ConnectionTimeout)??;

        if !answered {
            return Err(SshKeysError::ConfirmationMissing {
                command: command.to_string(),
                prompt: expected_prompt.to_string(),
            });
        }

        Self::check_exit(command, &output)?;
        Ok(output.text)
    }

    async fn stage_file(&mut self, contents: &[u8], remote_path: &str) -> SshResult<()> {
        log::debug!(
            "[device_session] scp {} bytes to {}",
            contents.len(),
            remote_path
        );
        let mut channel = self.open_channel().await?;

        timeout(
            self.command_timeout,
            Self::send_scp(&mut channel, contents, remote_path),
        )
        .await
        .map_err(|_| SshKeysError::ConnectionTimeout)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn overrides() -> TargetOverrides {
        TargetOverrides {
            user: Some("automation".to_string()),
            password: Some("secret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_target_from_config() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let config = "Host pe1\n    HostName 10.0.0.1\n    Port 2222\n    User netops\n";

        let target = resolve_target_with(
            "pe1",
            config,
            temp.path(),
            TargetOverrides {
                password: Some("secret".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(target.hostname, "10.0.0.1");
        assert_eq!(target.address(), "10.0.0.1:2222");
        assert_eq!(target.user, "netops");
        assert_eq!(target.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert!(target.identity_file.is_none());
    }

    #[test]
    fn test_overrides_take_precedence() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let config = "Host pe1\n    Port 2222\n    User netops\n";
        let target = resolve_target_with(
            "pe1",
            config,
            temp.path(),
            TargetOverrides {
                port: Some(22),
                ..overrides()
            },
        )
        .unwrap();

        assert_eq!(target.hostname, "pe1");
        assert_eq!(target.port, 22);
        assert_eq!(target.user, "automation");
    }

    #[test]
    fn test_default_identity_is_found() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let key_path = temp.path().join("id_rsa");
        std::fs::write(&key_path, "dummy").expect("Failed to write key");

        let target = resolve_target_with(
            "pe1",
            "",
            temp.path(),
            TargetOverrides {
                user: Some("automation".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(target.identity_file, Some(key_path));
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let err = resolve_target_with(
            "pe1",
            "",
            temp.path(),
            TargetOverrides {
                user: Some("automation".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.error_type(), "InvalidConfig");
    }

    #[test]
    fn test_bad_hostname_rejected() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let config = "Host pe1\n    HostName pe1;reboot\n";
        assert!(resolve_target_with("pe1", config, temp.path(), overrides()).is_err());
    }

    #[test]
    fn test_check_exit() {
        let ok = ChannelOutput {
            text: "done".to_string(),
            exit_status: Some(0),
        };
        assert!(DeviceSession::check_exit("show", &ok).is_ok());

        let failed = ChannelOutput {
            text: "denied".to_string(),
            exit_status: Some(1),
        };
        let err = DeviceSession::check_exit("show", &failed).unwrap_err();
        assert_eq!(err.error_type(), "CommandFailed");
    }
}
