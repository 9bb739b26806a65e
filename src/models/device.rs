use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Command protocol of the target device. Defaults match IOS-XR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceProfile {
    /// Lists installed keys in the label/hex block format
    pub show_command: String,
    /// `{user}` and `{path}` are substituted
    pub import_template: String,
    /// `{user}` is substituted
    pub zeroize_template: String,
    /// Per-user staging location, `{user}` is substituted
    pub staging_path_template: String,
    pub confirm_prompt: String,
    pub confirm_answer: String,
    /// Output lines starting with this marker are device errors
    pub error_marker: String,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            show_command: "show crypto key authentication rsa all".to_string(),
            import_template: "admin crypto key import authentication rsa username {user} {path}"
                .to_string(),
            zeroize_template: "admin crypto key zeroize authentication rsa username {user}"
                .to_string(),
            staging_path_template: "/harddisk:/publickey_{user}.raw".to_string(),
            confirm_prompt: "yes/no".to_string(),
            confirm_answer: "yes".to_string(),
            error_marker: "%".to_string(),
        }
    }
}

impl DeviceProfile {
    pub fn staging_path(&self, user: &str) -> String {
        self.staging_path_template.replace("{user}", user)
    }

    pub fn import_command(&self, user: &str, path: &str) -> String {
        self.import_template
            .replace("{user}", user)
            .replace("{path}", path)
    }

    pub fn zeroize_command(&self, user: &str) -> String {
        self.zeroize_template.replace("{user}", user)
    }

    /// First error line in command output, if the device reported one.
    pub fn device_error<'a>(&self, output: &'a str) -> Option<&'a str> {
        output
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with(&self.error_marker))
    }
}

/// Where and how to reach the device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceTarget {
    /// Name given by the caller, resolved through `~/.ssh/config`
    pub host_alias: String,
    pub hostname: String,
    pub port: u16,
    pub user: String,
    pub identity_file: Option<PathBuf>,
    pub password: Option<String>,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub accept_unknown_host: bool,
}

impl DeviceTarget {
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}
