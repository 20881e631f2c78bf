use crate::constants::MAX_MESSAGE_LENGTH;
use crate::error::ValidationError;

/// Trim a composed chat message and check it can be sent.
///
/// Returns the trimmed text. Length is counted in characters.
pub fn validate_chat_message(raw: &str) -> Result<&str, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Blank);
    }

    let length = trimmed.chars().count();
    if length > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::TooLong {
            length,
            max: MAX_MESSAGE_LENGTH,
        });
    }

    Ok(trimmed)
}
