use std::collections::HashMap;
use std::path::PathBuf;

/// SSH Host configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostConfig {
    /// Host patterns from the `Host` line
    pub host_patterns: Vec<String>,
    /// Actual hostname
    pub hostname: Option<String>,
    /// Port number
    pub port: Option<u16>,
    /// Login user on the device
    pub user: Option<String>,
    /// Identity file path
    pub identity_file: Option<PathBuf>,
    /// Other options
    pub options: HashMap<String, String>,
}

impl HostConfig {
    /// Port number (defaults to 22)
    pub fn get_port(&self) -> u16 {
        self.port.unwrap_or(22)
    }
}

/// OpenSSH client config parser, used to resolve a device alias the same way
/// `ssh <alias>` would.
pub struct SshConfigParser;

impl SshConfigParser {
    /// Parse SSH config file content
    pub fn parse(content: &str) -> Vec<HostConfig> {
        let mut hosts = Vec::new();
        let mut current_host: Option<HostConfig> = None;

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // key = value or key value
            let (key, value) = if let Some((k, v)) = line.split_once('=') {
                (k.trim().to_lowercase(), v.trim().to_string())
            } else if let Some((k, v)) = line.split_once(char::is_whitespace) {
                (k.trim().to_lowercase(), v.trim().to_string())
            } else {
                continue;
            };
            let value = value.trim_matches('"').to_string();

            if key == "host" {
                if let Some(host) = current_host.take() {
                    hosts.push(host);
                }
                current_host = Some(HostConfig {
                    host_patterns: value.split_whitespace().map(str::to_string).collect(),
                    ..Default::default()
                });
                continue;
            }

            // Options before the first Host line are ignored
            let Some(host) = current_host.as_mut() else {
                continue;
            };

            match key.as_str() {
                "hostname" => host.hostname = Some(value),
                "port" => host.port = value.parse().ok(),
                "user" => host.user = Some(value),
                "identityfile" => host.identity_file = Some(expand_home(&value)),
                _ => {
                    host.options.insert(key, value);
                }
            }
        }

        if let Some(host) = current_host {
            hosts.push(host);
        }

        hosts
    }

    /// Match one host pattern (supports `*` and `?` wildcards)
    fn match_pattern(pattern: &str, alias: &str) -> bool {
        fn matches(p: &[u8], s: &[u8]) -> bool {
            match (p.first(), s.first()) {
                (None, None) => true,
                (Some(b'*'), _) => matches(&p[1..], s) || (!s.is_empty() && matches(p, &s[1..])),
                (Some(b'?'), Some(_)) => matches(&p[1..], &s[1..]),
                (Some(a), Some(b)) if a.eq_ignore_ascii_case(b) => matches(&p[1..], &s[1..]),
                _ => false,
            }
        }
        matches(pattern.as_bytes(), alias.as_bytes())
    }

    /// A `Host` block applies when any pattern matches and no negated
    /// pattern (`!pattern`) does.
    fn host_applies(host: &HostConfig, alias: &str) -> bool {
        let mut matched = false;
        for pattern in &host.host_patterns {
            if let Some(negated) = pattern.strip_prefix('!') {
                if Self::match_pattern(negated, alias) {
                    return false;
                }
            } else if Self::match_pattern(pattern, alias) {
                matched = true;
            }
        }
        matched
    }

    /// Resolve the effective configuration for `alias`. As with OpenSSH,
    /// the first value obtained for each option wins.
    pub fn resolve(hosts: &[HostConfig], alias: &str) -> HostConfig {
        let mut merged = HostConfig {
            host_patterns: vec![alias.to_string()],
            ..Default::default()
        };

        for host in hosts.iter().filter(|h| Self::host_applies(h, alias)) {
            if merged.hostname.is_none() {
                merged.hostname = host.hostname.clone();
            }
            if merged.port.is_none() {
                merged.port = host.port;
            }
            if merged.user.is_none() {
                merged.user = host.user.clone();
            }
            if merged.identity_file.is_none() {
                merged.identity_file = host.identity_file.clone();
            }
            for (k, v) in &host.options {
                merged.options.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }

        merged
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(value),
        },
        None => PathBuf::from(value),
    }
}
