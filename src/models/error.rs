use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Deserialize, Clone, PartialEq)]
pub enum SshKeysError {
    // 密鑰錯誤
    #[error("Unable to convert key for {user}: {message}")]
    Conversion { user: String, message: String },

    #[error("Unsupported key type for {user}: {algorithm}")]
    UnsupportedKeyType { user: String, algorithm: String },

    #[error("Invalid user name: {message}")]
    InvalidUserName { message: String },

    // 設備輸出錯誤
    #[error("Unable to parse device output at line {line}: {message}")]
    Parse { line: usize, message: String },

    // 設備操作錯誤
    #[error("Failed to {operation} key for {user}: {message}")]
    Apply {
        user: String,
        operation: String,
        message: String,
    },

    #[error("Command failed: {command}: {message}")]
    CommandFailed { command: String, message: String },

    #[error("Confirmation prompt '{prompt}' not received for: {command}")]
    ConfirmationMissing { command: String, prompt: String },

    // 連線錯誤
    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Host key unknown: {hostname}")]
    HostKeyUnknown { hostname: String },

    #[error("Host key changed: {hostname}")]
    HostKeyChanged { hostname: String },

    #[error("Authentication failed for {user}")]
    AuthenticationFailed { user: String },

    // 系統錯誤
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("IO error: {message}")]
    IoError { message: String },
}

impl From<std::io::Error> for SshKeysError {
    fn from(e: std::io::Error) -> Self {
        SshKeysError::IoError {
            message: e.to_string(),
        }
    }
}

impl From<ssh_key::Error> for SshKeysError {
    fn from(e: ssh_key::Error) -> Self {
        SshKeysError::Conversion {
            user: String::new(),
            message: e.to_string(),
        }
    }
}

impl From<russh::Error> for SshKeysError {
    fn from(e: russh::Error) -> Self {
        SshKeysError::Connection {
            message: e.to_string(),
        }
    }
}

impl From<russh_keys::Error> for SshKeysError {
    fn from(e: russh_keys::Error) -> Self {
        SshKeysError::Connection {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for SshKeysError {
    fn from(e: serde_json::Error) -> Self {
        SshKeysError::InvalidConfig {
            message: e.to_string(),
        }
    }
}

pub type SshResult<T> = Result<T, SshKeysError>;

// 序列化為包含 type 和 message 的結構
impl serde::Serialize for SshKeysError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("SshKeysError", 2)?;
        state.serialize_field("type", &self.error_type())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

impl SshKeysError {
    pub fn error_type(&self) -> &'static str {
        match self {
            SshKeysError::Conversion { .. } => "Conversion",
            SshKeysError::UnsupportedKeyType { .. } => "UnsupportedKeyType",
            SshKeysError::InvalidUserName { .. } => "InvalidUserName",
            SshKeysError::Parse { .. } => "Parse",
            SshKeysError::Apply { .. } => "Apply",
            SshKeysError::CommandFailed { .. } => "CommandFailed",
            SshKeysError::ConfirmationMissing { .. } => "ConfirmationMissing",
            SshKeysError::Connection { .. } => "Connection",
            SshKeysError::ConnectionTimeout => "ConnectionTimeout",
            SshKeysError::HostKeyUnknown { .. } => "HostKeyUnknown",
            SshKeysError::HostKeyChanged { .. } => "HostKeyChanged",
            SshKeysError::AuthenticationFailed { .. } => "AuthenticationFailed",
            SshKeysError::InvalidConfig { .. } => "InvalidConfig",
            SshKeysError::IoError { .. } => "IoError",
        }
    }

    /// Transport-level failure: the device could not be reached, as opposed
    /// to the device rejecting an operation.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            SshKeysError::Connection { .. }
                | SshKeysError::ConnectionTimeout
                | SshKeysError::HostKeyUnknown { .. }
                | SshKeysError::HostKeyChanged { .. }
                | SshKeysError::AuthenticationFailed { .. }
        )
    }

    /// Attach the user a conversion failure belongs to.
    pub fn for_user(self, user: &str) -> Self {
        match self {
            SshKeysError::Conversion { message, .. } => SshKeysError::Conversion {
                user: user.to_string(),
                message,
            },
            SshKeysError::UnsupportedKeyType { algorithm, .. } => {
                SshKeysError::UnsupportedKeyType {
                    user: user.to_string(),
                    algorithm,
                }
            }
            other => other,
        }
    }
}
