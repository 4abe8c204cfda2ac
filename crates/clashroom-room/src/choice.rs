//! Participant choices and their validation.

use clashroom_rules::BUILTIN_OPTIONS;

use crate::RoomError;

/// Longest accepted custom option, in characters.
pub const MAX_CUSTOM_LEN: usize = 20;

/// A validated option submitted by a participant.
///
/// The option is lowercased, so "Rock" and "rock" are the same type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    option: String,
    custom: bool,
}

impl Choice {
    /// Validates a raw option.
    ///
    /// A built-in option must name one of the built-in types. A custom
    /// option is one or two words of letters (accents allowed) separated
    /// by a single space, at most [`MAX_CUSTOM_LEN`] characters long.
    pub fn parse(raw: &str, custom: bool) -> Result<Self, RoomError> {
        let option = raw.to_lowercase();

        if custom {
            validate_custom(raw)?;
        } else if !BUILTIN_OPTIONS.contains(&option.as_str()) {
            return Err(RoomError::InvalidChoice(format!(
                "'{raw}' is not one of {}",
                BUILTIN_OPTIONS.join(", ")
            )));
        }

        Ok(Self { option, custom })
    }

    pub fn option(&self) -> &str {
        &self.option
    }

    /// Whether this was submitted as a free-form option.
    pub fn is_custom(&self) -> bool {
        self.custom
    }
}

fn validate_custom(raw: &str) -> Result<(), RoomError> {
    let invalid = |reason: &str| Err(RoomError::InvalidChoice(format!("'{raw}' {reason}")));

    if raw.is_empty() {
        return invalid("is empty");
    }
    if raw.chars().count() > MAX_CUSTOM_LEN {
        return invalid("is longer than 20 characters");
    }

    let words: Vec<&str> = raw.split(' ').collect();
    if words.len() > 2 {
        return invalid("has more than two words");
    }
    if words.iter().any(|w| w.is_empty()) {
        return invalid("has a leading, trailing, or double space");
    }
    if !words.iter().all(|w| w.chars().all(char::is_alphabetic)) {
        return invalid("may only contain letters");
    }
    Ok(())
}
