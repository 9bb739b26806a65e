//! Parser for `show crypto key authentication rsa all`.
//!
//! The device prints one block per user:
//!
//! ```text
//! Key label: vincent
//! Type     : RSA public key authentication
//! Size     : 2048
//! Imported : 16:17:08 UTC Tue Aug 11 2020
//! Data     :
//!  30820122 300D0609 2A864886 F70D0101 01050003 82010F00 3082010A 02820101
//!  ...
//!  27020301 0001
//!
//! ```

use crate::models::{KeyRecord, KeySet, SshKeysError, SshResult};
use crate::utils::validate_user_name;

const LABEL_PREFIX: &str = "Key label:";
const DATA_FIELD: &str = "Data";

/// Parser state
#[derive(Debug)]
enum ParseState {
    /// Looking for the next label line
    Start,
    /// Label seen, waiting for the data header
    Labelled { label: String, line: usize },
    /// Accumulating hex fragments until a blank line
    Collecting {
        label: String,
        line: usize,
        hex: String,
    },
}

/// Device output parser
pub struct OutputParser;

impl OutputParser {
    /// Parse device output into the set of keys currently installed.
    ///
    /// Output without any label yields an empty set. A label whose block has
    /// no hex data, a data line that is not hex, or a repeated label is an
    /// error: current state cannot be determined from such output.
    pub fn parse(raw: &str) -> SshResult<KeySet> {
        let mut records = Vec::new();
        let mut state = ParseState::Start;

        for (idx, raw_line) in raw.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim_end();

            state = match state {
                ParseState::Start => match Self::label_of(line) {
                    Some(label) => Self::start_record(label, line_no)?,
                    None => ParseState::Start,
                },
                ParseState::Labelled { label, line: started } => {
                    if line.is_empty() || Self::label_of(line).is_some() {
                        return Err(Self::missing_data(&label, started));
                    }
                    match Self::data_header(line) {
                        Some(rest) => ParseState::Collecting {
                            label,
                            line: started,
                            hex: Self::hex_fragment(rest, line_no)?,
                        },
                        // Type, Size, Imported and similar fields
                        None => ParseState::Labelled {
                            label,
                            line: started,
                        },
                    }
                }
                ParseState::Collecting {
                    label,
                    line: started,
                    mut hex,
                } => {
                    if line.is_empty() {
                        records.push(Self::finish_record(label, hex, started)?);
                        ParseState::Start
                    } else if let Some(next) = Self::label_of(line) {
                        // Block not terminated by a blank line
                        records.push(Self::finish_record(label, hex, started)?);
                        Self::start_record(next, line_no)?
                    } else if line.starts_with(char::is_whitespace) {
                        hex.push_str(&Self::hex_fragment(line, line_no)?);
                        ParseState::Collecting {
                            label,
                            line: started,
                            hex,
                        }
                    } else {
                        return Err(SshKeysError::Parse {
                            line: line_no,
                            message: format!("unexpected line in data of '{}': {}", label, line),
                        });
                    }
                }
            };
        }

        match state {
            ParseState::Start => {}
            ParseState::Labelled { label, line } => return Err(Self::missing_data(&label, line)),
            ParseState::Collecting { label, line, hex } => {
                records.push(Self::finish_record(label, hex, line)?)
            }
        }

        log::debug!("[output_parser] Parsed {} key records", records.len());

        KeySet::try_from_records(records).map_err(|user| SshKeysError::Parse {
            line: 0,
            message: format!("duplicate key label: {}", user),
        })
    }

    fn label_of(line: &str) -> Option<&str> {
        line.strip_prefix(LABEL_PREFIX).map(str::trim)
    }

    fn start_record(label: &str, line: usize) -> SshResult<ParseState> {
        // Labels end up in zeroize commands, so they get the same check as
        // wanted user names
        validate_user_name(label).map_err(|e| SshKeysError::Parse {
            line,
            message: format!("invalid key label '{}': {}", label, e),
        })?;
        Ok(ParseState::Labelled {
            label: label.to_string(),
            line,
        })
    }

    /// `Data     :` header, returning whatever follows the colon.
    fn data_header(line: &str) -> Option<&str> {
        let (field, rest) = line.split_once(':')?;
        (field.trim() == DATA_FIELD).then_some(rest)
    }

    /// Strip embedded whitespace and check that only hex digits remain.
    fn hex_fragment(text: &str, line: usize) -> SshResult<String> {
        let fragment: String = text.split_whitespace().collect();
        if let Some(c) = fragment.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(SshKeysError::Parse {
                line,
                message: format!("invalid character {:?} in key data", c),
            });
        }
        Ok(fragment)
    }

    fn finish_record(label: String, hex: String, line: usize) -> SshResult<KeyRecord> {
        if hex.is_empty() {
            return Err(Self::missing_data(&label, line));
        }
        Ok(KeyRecord::new(label, hex))
    }

    fn missing_data(label: &str, line: usize) -> SshKeysError {
        SshKeysError::Parse {
            line,
            message: format!("key label '{}' has no data section", label),
        }
    }
}
