//! Common test utilities and helpers
#![allow(dead_code)]

use async_trait::async_trait;
use base64::Engine;
use iosxr_sshkeys_lib::{
    DeviceProfile, InProcessConverter, KeyConverter, RemoteSession, SshKeysError, SshResult,
};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Get the fixtures directory path
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a specific fixture file path
pub fn fixture_path(relative_path: &str) -> PathBuf {
    fixtures_dir().join(relative_path)
}

/// Read fixture file content
pub fn read_fixture(relative_path: &str) -> String {
    std::fs::read_to_string(fixture_path(relative_path)).expect("Failed to read fixture file")
}

pub const BOB_RSA: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQDNkfSN6ClJ7BgV+Qvu9qLl8BJ2/TrNpLbCxfOc50FmJ9ttDZyGeXdRLVuEWzszESrc0zkXmk9WMMA60Sr0SYXXuTiq6alUhOzagyTaBMLq9HcVBrUhqBjripJFpIREuP92WdOmYX+AGDSKZpzE2IvBJtelW2ttNh5tpGKQX5y1OaFqujJkblrhjhnJPzZ0gx2c8Vi2w9mfqDad8k+pw/tzUL3ik14ZUobsWWgHjlshSm7n1rKfHBCECRF1oVPEkaDDjTWkY/s5zfjog7qcniVYKJwfQ0B0CucIwf8/ThhXwANEfZbT9rC9Owbld3/5z7kePHtb23eSHAS/kJKH+1BR bob@example";

pub const BOB_DEVICE_HEX: &str = "30820122300D06092A864886F70D01010105000382010F003082010A0282010100CD91F48DE82949EC1815F90BEEF6A2E5F01276FD3ACDA4B6C2C5F39CE7416627DB6D0D9C867977512D5B845B3B33112ADCD339179A4F5630C03AD12AF44985D7B938AAE9A95484ECDA8324DA04C2EAF4771506B521A818EB8A9245A48444B8FF7659D3A6617F8018348A669CC4D88BC126D7A55B6B6D361E6DA462905F9CB539A16ABA32646E5AE18E19C93F3674831D9CF158B6C3D99FA8369DF24FA9C3FB7350BDE2935E195286EC5968078E5B214A6EE7D6B29F1C1084091175A153C491A0C38D35A463FB39CDF8E883BA9C9E2558289C1F4340740AE708C1FF3F4E1857C003447D96D3F6B0BD3B06E5777FF9CFB91E3C7B5BDB77921C04BF909287FB50510203010001";

pub const ALICE_RSA: &str = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQDYCEAgWx0h2wE4FKRPg3fQb9wuGQ62nqBvotvRXMFyZyBtCAUJAakSEpQI4ocKfxNJZFS5qZer3exDEADMvehqrEU4GUKmIq8xUs5uD7ft3k67Gdvz/14I0DttSAQ5s2YpOXckSE8vnfIB7QKcLmDWWkZpyWcr6mdS8iUt0GVRvMTTK9DKfIyhg2QBdCkfhB5TaH1G3ecs3938IzGhk0HkaIpCbvFCo8Qs9lbKo643hkOOJG+0V8efUw7Reou+EllM3/v8+C2bcXnEfubcroubnFyh9fBswSCCfbvgkGBpoZTaE6Ec2R5ibGOb+9dQ6J0d0EDgpuOZAJz44Y0qlTMB alice@example";

pub const ALICE_DEVICE_HEX: &str = "30820122300D06092A864886F70D01010105000382010F003082010A0282010100D80840205B1D21DB013814A44F8377D06FDC2E190EB69EA06FA2DBD15CC17267206D08050901A912129408E2870A7F13496454B9A997ABDDEC431000CCBDE86AAC45381942A622AF3152CE6E0FB7EDDE4EBB19DBF3FF5E08D03B6D480439B36629397724484F2F9DF201ED029C2E60D65A4669C9672BEA6752F2252DD06551BCC4D32BD0CA7C8CA183640174291F841E53687D46DDE72CDFDDFC2331A19341E4688A426EF142A3C42CF656CAA3AE3786438E246FB457C79F530ED17A8BBE12594CDFFBFCF82D9B7179C47EE6DCAE8B9B9C5CA1F5F06CC120827DBBE0906069A194DA13A11CD91E626C639BFBD750E89D1DD040E0A6E399009CF8E18D2A9533010203010001";

/// One operation seen by the fake device
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Command(String),
    Confirm {
        command: String,
        prompt: String,
        answer: String,
    },
    Stage {
        path: String,
        len: usize,
    },
}

/// In-memory device speaking the IOS-XR key commands.
///
/// Imports read the staged blob, so a run that forgets to stage (or stages
/// the wrong bytes) ends up with the wrong key installed.
#[derive(Debug, Default)]
pub struct FakeDevice {
    /// User to device hex
    pub keys: BTreeMap<String, String>,
    pub staged: HashMap<String, Vec<u8>>,
    pub calls: Vec<Call>,
    /// Raw text returned by the show command instead of the rendered keys
    pub show_override: Option<String>,
    /// Users whose import the device rejects with a `%` error line
    pub reject_import_for: Vec<String>,
    /// User whose operation fails with a dropped connection
    pub drop_connection_on: Option<String>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(pairs: &[(&str, &str)]) -> Self {
        Self {
            keys: pairs
                .iter()
                .map(|(u, k)| (u.to_string(), k.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    /// Render keys the way the device prints them: 8 groups of 8 hex digits
    /// per line, one leading space, trailing space, blank line after a block.
    pub fn render_show_output(&self) -> String {
        let mut out = String::new();
        for (user, hex) in &self.keys {
            out.push_str(&format!("Key label: {}\n", user));
            out.push_str("Type     : RSA public key authentication\n");
            out.push_str(&format!("Size     : {}\n", hex.len() * 4));
            out.push_str("Imported : 16:17:08 UTC Tue Aug 11 2020\n");
            out.push_str("Data     : \n");
            let words: Vec<&str> = hex
                .as_bytes()
                .chunks(8)
                .map(|c| std::str::from_utf8(c).unwrap())
                .collect();
            for line in words.chunks(8) {
                out.push_str(&format!(" {} \n", line.join(" ")));
            }
            out.push('\n');
        }
        out
    }

    pub fn confirmations(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Confirm { .. }))
            .collect()
    }

    pub fn stages(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Stage { .. }))
            .collect()
    }

    fn check_connection(&self, user: &str) -> SshResult<()> {
        if self.drop_connection_on.as_deref() == Some(user) {
            return Err(SshKeysError::Connection {
                message: "connection reset by peer".to_string(),
            });
        }
        Ok(())
    }

    fn import(&mut self, user: &str, path: &str) -> String {
        if self.reject_import_for.iter().any(|u| u == user) {
            return "% Failed to import public key: invalid key format\n".to_string();
        }
        let Some(blob) = self.staged.get(path) else {
            return format!("% File {} not found\n", path);
        };
        let portable = format!(
            "ssh-rsa {}",
            base64::engine::general_purpose::STANDARD.encode(blob)
        );
        match InProcessConverter.convert(&portable) {
            Ok(hex) => {
                self.keys.insert(user.to_string(), hex);
                String::new()
            }
            Err(e) => format!("% Failed to import public key: {}\n", e),
        }
    }
}

#[async_trait]
impl RemoteSession for FakeDevice {
    async fn run_command(&mut self, command: &str) -> SshResult<String> {
        self.calls.push(Call::Command(command.to_string()));
        if command == DeviceProfile::default().show_command {
            return Ok(self
                .show_override
                .clone()
                .unwrap_or_else(|| self.render_show_output()));
        }
        Err(SshKeysError::CommandFailed {
            command: command.to_string(),
            message: "% Invalid input detected".to_string(),
        })
    }

    async fn run_with_confirmation(
        &mut self,
        command: &str,
        expected_prompt: &str,
        answer: &str,
    ) -> SshResult<String> {
        self.calls.push(Call::Confirm {
            command: command.to_string(),
            prompt: expected_prompt.to_string(),
            answer: answer.to_string(),
        });

        let tokens: Vec<&str> = command.split_whitespace().collect();
        let prompt = "Do you really want to continue? [yes/no]: ";

        if command.starts_with("admin crypto key import authentication rsa username ") {
            let (user, path) = (tokens[tokens.len() - 2], tokens[tokens.len() - 1]);
            self.check_connection(user)?;
            let result = if answer == "yes" {
                self.import(user, path)
            } else {
                String::new()
            };
            return Ok(format!("{}{}\n{}", prompt, answer, result));
        }

        if command.starts_with("admin crypto key zeroize authentication rsa username ") {
            let user = tokens[tokens.len() - 1];
            self.check_connection(user)?;
            if answer == "yes" {
                self.keys.remove(user);
            }
            return Ok(format!("{}{}\n", prompt, answer));
        }

        Err(SshKeysError::ConfirmationMissing {
            command: command.to_string(),
            prompt: expected_prompt.to_string(),
        })
    }

    async fn stage_file(&mut self, contents: &[u8], remote_path: &str) -> SshResult<()> {
        self.calls.push(Call::Stage {
            path: remote_path.to_string(),
            len: contents.len(),
        });
        self.staged
            .insert(remote_path.to_string(), contents.to_vec());
        Ok(())
    }
}
