pub mod ssh_config;
pub mod validators;

pub use ssh_config::{expand_home, HostConfig, SshConfigParser};
pub use validators::{validate_hostname, validate_user_name};
