//! JSON command surface over the page scanner.
//!
//! Commands and responses mirror the wire format of the page-decryption
//! protocol: a command is a JSON object whose `subject` field selects the
//! operation, and the response reports what happened. The bridge itself
//! holds no state and does no crypto; it dispatches to [`scanner`].

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::material::PrivateMaterial;
use crate::scanner;

/// A command addressed to the page scanner.
///
/// On the wire: `{"subject":"decrypt_page"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subject", rename_all = "snake_case")]
pub enum PageCommand {
    /// Scan a page text and substitute every decryptable ciphertext span.
    DecryptPage,
}

/// Response to a [`PageCommand`].
///
/// On the wire: `{"message":"decrypted","count":2}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResponse {
    /// Always `"decrypted"` for a completed decrypt-page command.
    pub message: String,
    /// Number of spans replaced, counting repeats separately.
    pub count: usize,
}

/// Execute a command against a page text.
///
/// Returns the response and the rewritten text. A page with no ciphertext
/// comes back unchanged with a count of zero; that is still a completed
/// command, not an error.
///
/// # Example
///
/// ```
/// use spotcrypt::{command_from_json, handle_command, response_to_json};
///
/// let command = command_from_json(r#"{"subject":"decrypt_page"}"#).unwrap();
/// let (response, text) = handle_command(command, "no ciphertext here", &[]);
///
/// assert_eq!(text, "no ciphertext here");
/// let json = response_to_json(&response).unwrap();
/// assert_eq!(json, r#"{"message":"decrypted","count":0}"#);
/// ```
pub fn handle_command(
    command: PageCommand,
    text: &str,
    private_keys: &[&PrivateMaterial],
) -> (PageResponse, String) {
    match command {
        PageCommand::DecryptPage => {
            let outcome = scanner::decrypt_and_substitute(text, private_keys);
            (
                PageResponse {
                    message: "decrypted".to_string(),
                    count: outcome.decrypted_count,
                },
                outcome.text,
            )
        }
    }
}

/// Parse a command from its JSON wire form.
pub fn command_from_json(json: &str) -> Result<PageCommand> {
    Ok(serde_json::from_str(json)?)
}

/// Serialize a response to its JSON wire form.
pub fn response_to_json(response: &PageResponse) -> Result<String> {
    Ok(serde_json::to_string(response)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        let command = command_from_json(r#"{"subject":"decrypt_page"}"#).unwrap();
        assert_eq!(command, PageCommand::DecryptPage);

        let json = serde_json::to_string(&command).unwrap();
        assert_eq!(json, r#"{"subject":"decrypt_page"}"#);
    }

    #[test]
    fn test_unknown_subject_rejected() {
        assert!(command_from_json(r#"{"subject":"encrypt_page"}"#).is_err());
        assert!(command_from_json(r#"{"other":"decrypt_page"}"#).is_err());
    }

    #[test]
    fn test_response_wire_format() {
        let response = PageResponse {
            message: "decrypted".to_string(),
            count: 3,
        };
        let json = response_to_json(&response).unwrap();
        assert_eq!(json, r#"{"message":"decrypted","count":3}"#);
    }
}
