use crate::models::{DesiredKey, DesiredKeys, KeyType, SshKeysError, SshResult};
use crate::utils::validate_user_name;
use base64::Engine;
use rsa::pkcs1::der::asn1::{BitStringRef, UintRef};
use rsa::pkcs1::der::Encode;
use rsa::pkcs8::spki::SubjectPublicKeyInfoRef;
use ssh_key::public::{KeyData, RsaPublicKey};
use ssh_key::PublicKey;
use std::collections::BTreeMap;
use std::io::Write;
use std::process::{Command, Stdio};

const PEM_BEGIN: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_END: &str = "-----END PUBLIC KEY-----";

/// Converts an OpenSSH public key line into the hex encoding the device's
/// import command expects and its show command reports: the key's
/// SubjectPublicKeyInfo DER, uppercase hex, no separators.
pub trait KeyConverter: Send + Sync {
    fn name(&self) -> &'static str;

    fn convert(&self, portable: &str) -> SshResult<String>;
}

/// Converter backed by `ssh-key` and `rsa`, no external process.
#[derive(Debug, Default, Clone, Copy)]
pub struct InProcessConverter;

impl KeyConverter for InProcessConverter {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn convert(&self, portable: &str) -> SshResult<String> {
        let public_key = PublicKey::from_openssh(portable.trim())?;

        let rsa_key = match public_key.key_data() {
            KeyData::Rsa(rsa_key) => rsa_key,
            _ => {
                return Err(SshKeysError::UnsupportedKeyType {
                    user: String::new(),
                    algorithm: public_key.algorithm().as_str().to_string(),
                })
            }
        };

        Ok(hex::encode_upper(Self::encode_spki(rsa_key)?))
    }
}

impl InProcessConverter {
    /// SubjectPublicKeyInfo DER of an RSA key, built from its modulus and
    /// exponent as-is. Any key size the portable format carries is accepted.
    fn encode_spki(key: &RsaPublicKey) -> SshResult<Vec<u8>> {
        let encode_failed = |e: rsa::pkcs1::der::Error| SshKeysError::Conversion {
            user: String::new(),
            message: format!("Failed to encode public key: {}", e),
        };
        let not_positive = |field: &str| SshKeysError::Conversion {
            user: String::new(),
            message: format!("RSA {} is not a positive integer", field),
        };

        let modulus = key
            .n
            .as_positive_bytes()
            .ok_or_else(|| not_positive("modulus"))?;
        let exponent = key
            .e
            .as_positive_bytes()
            .ok_or_else(|| not_positive("exponent"))?;

        let pkcs1 = rsa::pkcs1::RsaPublicKey {
            modulus: UintRef::new(modulus).map_err(encode_failed)?,
            public_exponent: UintRef::new(exponent).map_err(encode_failed)?,
        }
        .to_der()
        .map_err(encode_failed)?;

        SubjectPublicKeyInfoRef {
            algorithm: rsa::pkcs1::ALGORITHM_ID,
            subject_public_key: BitStringRef::from_bytes(&pkcs1).map_err(encode_failed)?,
        }
        .to_der()
        .map_err(encode_failed)
    }
}

/// Converter that shells out to `ssh-keygen -e -m PKCS8`.
#[derive(Debug, Clone)]
pub struct SshKeygenConverter {
    program: String,
}

impl Default for SshKeygenConverter {
    fn default() -> Self {
        Self {
            program: "ssh-keygen".to_string(),
        }
    }
}

impl SshKeygenConverter {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Extract the DER bytes from a `BEGIN PUBLIC KEY` PEM block.
    fn decode_pem(pem: &str) -> SshResult<Vec<u8>> {
        let body: String = pem
            .lines()
            .map(str::trim)
            .skip_while(|line| *line != PEM_BEGIN)
            .skip(1)
            .take_while(|line| *line != PEM_END)
            .collect();

        if body.is_empty() {
            return Err(SshKeysError::Conversion {
                user: String::new(),
                message: "ssh-keygen produced no PEM public key".to_string(),
            });
        }

        base64::engine::general_purpose::STANDARD
            .decode(body)
            .map_err(|e| SshKeysError::Conversion {
                user: String::new(),
                message: format!("Invalid PEM body from ssh-keygen: {}", e),
            })
    }
}

impl KeyConverter for SshKeygenConverter {
    fn name(&self) -> &'static str {
        "ssh-keygen"
    }

    fn convert(&self, portable: &str) -> SshResult<String> {
        let algorithm = portable.split_whitespace().next().unwrap_or("");
        if KeyType::from(algorithm) != KeyType::Rsa {
            return Err(SshKeysError::UnsupportedKeyType {
                user: String::new(),
                algorithm: algorithm.to_string(),
            });
        }

        let mut child = Command::new(&self.program)
            .args(["-f", "/dev/stdin", "-e", "-m", "PKCS8"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SshKeysError::Conversion {
                user: String::new(),
                message: format!("Failed to run {}: {}", self.program, e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(portable.trim().as_bytes())?;
            stdin.write_all(b"\n")?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(SshKeysError::Conversion {
                user: String::new(),
                message: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let der = Self::decode_pem(&String::from_utf8_lossy(&output.stdout))?;
        Ok(hex::encode_upper(der))
    }
}

/// Decode the base64 payload of a portable key: the raw blob staged on the
/// device before import.
pub fn decode_payload(portable: &str) -> SshResult<Vec<u8>> {
    let payload = portable
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| SshKeysError::Conversion {
            user: String::new(),
            message: "Key has no base64 payload".to_string(),
        })?;

    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| SshKeysError::Conversion {
            user: String::new(),
            message: format!("Invalid base64 payload: {}", e),
        })
}

/// Validate and convert every desired key before the device is contacted.
pub fn prepare_desired_keys(
    input: &BTreeMap<String, String>,
    converter: &dyn KeyConverter,
) -> SshResult<DesiredKeys> {
    let mut keys = Vec::with_capacity(input.len());

    for (user, portable) in input {
        validate_user_name(user)?;

        let device_hex = converter
            .convert(portable)
            .map_err(|e| e.for_user(user))?;
        let raw_blob = decode_payload(portable).map_err(|e| e.for_user(user))?;
        let key_type = KeyType::from(portable.split_whitespace().next().unwrap_or(""));

        log::debug!(
            "[key_converter] Converted {} key for {} via {} ({} hex chars)",
            key_type,
            user,
            converter.name(),
            device_hex.len()
        );

        keys.push(DesiredKey {
            user: user.clone(),
            key_type,
            portable: portable.trim().to_string(),
            device_hex,
            raw_blob,
        });
    }

    Ok(DesiredKeys::new(keys))
}
