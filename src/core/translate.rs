//! Error translation
//!
//! Two directions:
//!
//! - **Inbound**: host failures arrive as text carrying an HRESULT
//!   (`0x80070005`, `-2147024891`, ...). [`classify_host_code`] maps them onto
//!   [`StoreError`].
//! - **Outbound**: the command surface returns a single string per call.
//!   [`ErrorToken`] encodes any [`Error`] into that string. Success is exactly
//!   `""`; access denied is exactly [`ACCESS_DENIED_TOKEN`]; everything else is
//!   `"<code>: <message>"` and is shown verbatim by the caller.
//!
//! Codes are Windows HRESULTs on every host so tokens stay stable across
//! backends and restarts.

use crate::core::error::{Error, StoreError};

/// The one token the presentation layer special-cases
pub const ACCESS_DENIED_TOKEN: &str = "0x80070005";

/// `HRESULT_FROM_WIN32(ERROR_NOT_FOUND)`
pub const NOT_FOUND_CODE: &str = "0x80070490";
/// `HRESULT_FROM_WIN32(ERROR_ALREADY_EXISTS)`
pub const ALREADY_EXISTS_CODE: &str = "0x800700B7";
/// `E_INVALIDARG`
pub const INVALID_ARGUMENT_CODE: &str = "0x80070057";
/// `HRESULT_FROM_WIN32(ERROR_INTERNAL_ERROR)`
pub const PARTIAL_FAILURE_CODE: &str = "0x8007054F";
/// `E_UNEXPECTED`
pub const INTERNAL_CODE: &str = "0x8000FFFF";
/// `E_FAIL`
pub const GENERIC_FAILURE_CODE: &str = "0x80004005";

/// Fixed vocabulary of failure kinds the boundary distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
pub enum ErrorKind {
    #[strum(serialize = "permission_denied")]
    PermissionDenied,
    #[strum(serialize = "not_found")]
    NotFound,
    #[strum(serialize = "already_exists")]
    AlreadyExists,
    #[strum(serialize = "invalid_input")]
    InvalidInput,
    #[strum(serialize = "partial_failure")]
    PartialFailure,
    #[strum(serialize = "unknown")]
    Unknown,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PermissionDenied => ErrorKind::PermissionDenied,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::InvalidPath { .. } | Error::InvalidRule { .. } => ErrorKind::InvalidInput,
            Error::PartialFailure { .. } => ErrorKind::PartialFailure,
            Error::Host { .. } | Error::Io(_) | Error::Serialization(_) | Error::Internal(_) => {
                ErrorKind::Unknown
            }
        }
    }

    /// Stable code for this error
    pub fn code(&self) -> String {
        match self {
            Error::PermissionDenied => ACCESS_DENIED_TOKEN.to_string(),
            Error::NotFound(_) => NOT_FOUND_CODE.to_string(),
            Error::AlreadyExists(_) => ALREADY_EXISTS_CODE.to_string(),
            Error::InvalidPath { .. } | Error::InvalidRule { .. } => {
                INVALID_ARGUMENT_CODE.to_string()
            }
            Error::PartialFailure { .. } => PARTIAL_FAILURE_CODE.to_string(),
            Error::Host { code, .. } => code
                .clone()
                .unwrap_or_else(|| GENERIC_FAILURE_CODE.to_string()),
            Error::Io(_) | Error::Serialization(_) => GENERIC_FAILURE_CODE.to_string(),
            Error::Internal(_) => INTERNAL_CODE.to_string(),
        }
    }

    /// Flat error token for the command surface; never empty
    pub fn token(&self) -> String {
        if self.kind() == ErrorKind::PermissionDenied {
            return ACCESS_DENIED_TOKEN.to_string();
        }
        let message = match self {
            Error::Host { message, .. } if !message.trim().is_empty() => message.clone(),
            Error::Host { .. } => "Unspecified firewall error".to_string(),
            other => other.to_string(),
        };
        format!("{}: {}", self.code(), message)
    }
}

/// Encoding of operation results into the single-string contract
pub struct ErrorToken;

impl ErrorToken {
    /// `""` on success, the error token otherwise
    pub fn from_result<T>(result: &crate::core::error::Result<T>) -> String {
        match result {
            Ok(_) => String::new(),
            Err(e) => e.token(),
        }
    }

    pub fn is_success(token: &str) -> bool {
        token.is_empty()
    }

    pub fn is_access_denied(token: &str) -> bool {
        token == ACCESS_DENIED_TOKEN
    }
}

/// Words of host failure text that may hold a code, with surrounding
/// punctuation removed (a leading `-` is kept for signed decimals)
fn code_candidates(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '(' | ')' | '[' | ']'))
        .map(|word| {
            word.trim_start_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-')
                .trim_end_matches(|c: char| !c.is_ascii_alphanumeric())
        })
        .filter(|word| !word.is_empty())
}

fn parse_code_word(word: &str) -> Option<u32> {
    if let Some(hex) = word
        .strip_prefix("0x")
        .or_else(|| word.strip_prefix("0X"))
    {
        return u32::from_str_radix(hex, 16).ok();
    }
    if word.len() >= 9 {
        if let Ok(signed) = word.parse::<i32>() {
            return Some(signed.cast_unsigned());
        }
        if let Ok(unsigned) = word.parse::<u32>() {
            return Some(unsigned);
        }
    }
    None
}

/// First HRESULT in `text` together with the word it was written as
fn find_hresult(text: &str) -> Option<(u32, &str)> {
    code_candidates(text).find_map(|word| parse_code_word(word).map(|code| (code, word)))
}

/// Extracts an HRESULT from host failure text and normalizes it to `0xXXXXXXXX`
///
/// Accepts hex (`0x80070005`, any case) and signed/unsigned decimal
/// (`-2147024891`, `2147942405`), with or without surrounding punctuation.
pub fn parse_hresult(text: &str) -> Option<u32> {
    find_hresult(text).map(|(code, _)| code)
}

pub fn format_hresult(code: u32) -> String {
    format!("0x{code:08X}")
}

/// Host text with the code word removed, so a token does not repeat it
fn strip_code(text: &str, word: &str) -> String {
    let without = text.replacen(word, "", 1);
    let message = without
        .split_whitespace()
        .filter(|w| w.chars().any(char::is_alphanumeric))
        .collect::<Vec<_>>()
        .join(" ");
    message
        .trim_end_matches([':', ',', ';', '-'])
        .trim_start_matches([':', ',', ';', '-', ' '])
        .to_string()
}

/// Maps host failure text onto the store error vocabulary
///
/// `name` is the rule the failed call targeted, used for `NotFound` and
/// `AlreadyExists`.
pub fn classify_host_code(text: &str, name: &str) -> StoreError {
    let lower = text.to_lowercase();

    match find_hresult(text) {
        // E_ACCESSDENIED, ERROR_PRIVILEGE_NOT_HELD
        Some((0x8007_0005 | 0x8007_0522, _)) => StoreError::PermissionDenied,
        // ERROR_FILE_NOT_FOUND, ERROR_NOT_FOUND
        Some((0x8007_0002 | 0x8007_0490, _)) => StoreError::NotFound(name.to_string()),
        // ERROR_ALREADY_EXISTS, ERROR_FILE_EXISTS
        Some((0x8007_00B7 | 0x8007_0050, _)) => StoreError::AlreadyExists(name.to_string()),
        Some((code, word)) => StoreError::Unknown {
            code: Some(format_hresult(code)),
            message: strip_code(text, word),
        },
        None if lower.contains("access is denied") || lower.contains("access denied") => {
            StoreError::PermissionDenied
        }
        None => StoreError::unknown(text.trim()),
    }
}

/// A translated error with help for a human reader
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// Produces the human-facing explanation for an error (CLI output)
pub fn translate(error: &Error) -> ErrorTranslation {
    match error {
        Error::PermissionDenied => ErrorTranslation::new(format!(
            "Access Denied. ({ACCESS_DENIED_TOKEN})"
        ))
        .with_suggestion("Run NetBlocker from an elevated (Administrator) prompt")
        .with_suggestion("For the JSON store, check write permission on the store file"),
        Error::NotFound(name) => ErrorTranslation::new(format!("No rule named '{name}'"))
            .with_suggestion("Run `netblocker list` to see current rule names")
            .with_suggestion("The rule may have been removed by another program"),
        Error::AlreadyExists(name) => {
            ErrorTranslation::new(format!("A rule named '{name}' already exists"))
                .with_suggestion("Remove the existing rule first, or use `enable` on it")
        }
        Error::InvalidPath { path, reason } => {
            ErrorTranslation::new(format!("Cannot block '{path}': {reason}"))
                .with_suggestion("Give the full path to the program's executable file")
        }
        Error::InvalidRule { field, message } => {
            ErrorTranslation::new(format!("Rule field '{field}' is invalid: {message}"))
        }
        Error::PartialFailure { name, .. } => ErrorTranslation::new(format!(
            "Changing direction of '{name}' failed and the original rule could not be restored"
        ))
        .with_suggestion("Block the application again to recreate the rule")
        .with_suggestion("Check the log file for the underlying host errors"),
        Error::Host { code, message } => {
            let base = match code {
                Some(code) => format!("Firewall error {code}: {message}"),
                None => format!("Firewall error: {message}"),
            };
            ErrorTranslation::new(base)
                .with_suggestion("Ensure the firewall service is running")
                .with_suggestion("Check the log file for details")
        }
        other => ErrorTranslation::new(other.to_string()),
    }
}
