use crate::models::{SshKeysError, SshResult};

/// Longest user name the device accepts as a key label.
const MAX_USER_NAME_LEN: usize = 64;

/// 驗證使用者名稱，防止命令注入與路徑遍歷
///
/// User names end up inside device commands and staging paths, so only the
/// characters the device itself reports in key labels are allowed.
pub fn validate_user_name(user: &str) -> SshResult<()> {
    if user.is_empty() {
        return Err(SshKeysError::InvalidUserName {
            message: "User name cannot be empty".to_string(),
        });
    }

    if user.len() > MAX_USER_NAME_LEN {
        return Err(SshKeysError::InvalidUserName {
            message: format!(
                "User name too long (max {} characters): {}",
                MAX_USER_NAME_LEN, user
            ),
        });
    }

    if let Some(c) = user
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(SshKeysError::InvalidUserName {
            message: format!("User name contains invalid character {:?}: {}", c, user),
        });
    }

    Ok(())
}

/// 驗證主機名，防止命令注入
pub fn validate_hostname(hostname: &str) -> SshResult<()> {
    if hostname.is_empty() {
        return Err(SshKeysError::InvalidConfig {
            message: "Hostname cannot be empty".to_string(),
        });
    }

    if hostname.len() > 255 {
        return Err(SshKeysError::InvalidConfig {
            message: "Hostname too long".to_string(),
        });
    }

    // 只允許安全字符：字母、數字、點、連字符、下劃線、冒號（IPv6）、方括號（IPv6）
    let is_valid = hostname.chars().all(|c| {
        c.is_ascii_alphanumeric()
            || c == '.'
            || c == '-'
            || c == '_'
            || c == ':'
            || c == '['
            || c == ']'
    });

    if !is_valid {
        return Err(SshKeysError::InvalidConfig {
            message: format!("Hostname contains invalid characters: {}", hostname),
        });
    }

    Ok(())
}
