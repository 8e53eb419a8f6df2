/// Validation of configured watch lists
use thiserror::Error;

/// Upper bound on configured watched players; keeps the status embed under
/// Discord's field size limit.
pub const MAX_WATCHED_PLAYERS: usize = 50;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Player name cannot be empty")]
    PlayerNameEmpty,

    #[error("Player name too long (max 16 characters, got {0})")]
    PlayerNameTooLong(usize),

    #[error("Player name '{0}' contains invalid characters (only alphanumeric and underscore allowed)")]
    PlayerNameInvalidChars(String),

    #[error("Nation name cannot be empty")]
    NationNameEmpty,

    #[error("Nation name too long (max 32 characters, got {0})")]
    NationNameTooLong(usize),

    #[error("Nation name '{0}' must not contain '/' or whitespace")]
    NationNameInvalidChars(String),

    #[error("Watch list too large (max {max} players, got {actual})")]
    WatchListTooLarge { max: usize, actual: usize },
}

/// Validates a Minecraft player name: 1 to 16 characters, alphanumeric or
/// underscore.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::PlayerNameEmpty);
    }

    if name.len() > 16 {
        return Err(ValidationError::PlayerNameTooLong(name.len()));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::PlayerNameInvalidChars(name.to_string()));
    }

    Ok(())
}

/// Validates a nation name. Nation names end up in a URL path segment.
pub fn validate_nation_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::NationNameEmpty);
    }

    if name.chars().count() > 32 {
        return Err(ValidationError::NationNameTooLong(name.chars().count()));
    }

    if name.chars().any(|c| c == '/' || c.is_whitespace()) {
        return Err(ValidationError::NationNameInvalidChars(name.to_string()));
    }

    Ok(())
}

pub fn validate_watch_list_size(len: usize) -> Result<(), ValidationError> {
    if len > MAX_WATCHED_PLAYERS {
        return Err(ValidationError::WatchListTooLarge {
            max: MAX_WATCHED_PLAYERS,
            actual: len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_player_names() {
        assert!(validate_player_name("Canisi").is_ok());
        assert!(validate_player_name("UFO_Thespoot").is_ok());
        assert!(validate_player_name("firecharge94").is_ok());
        assert!(validate_player_name("1234567890123456").is_ok()); // exactly 16 chars
    }

    #[test]
    fn test_empty_player_name() {
        assert_eq!(
            validate_player_name(""),
            Err(ValidationError::PlayerNameEmpty)
        );
    }

    #[test]
    fn test_player_name_too_long() {
        assert_eq!(
            validate_player_name("12345678901234567"),
            Err(ValidationError::PlayerNameTooLong(17))
        );
    }

    #[test]
    fn test_player_name_invalid_chars() {
        assert_eq!(
            validate_player_name("Dark-holess"),
            Err(ValidationError::PlayerNameInvalidChars("Dark-holess".to_string()))
        );
        assert!(validate_player_name("Olmat 38").is_err());
        assert!(validate_player_name("Frankÿ").is_err());
    }

    #[test]
    fn test_nation_names() {
        assert!(validate_nation_name("France").is_ok());
        assert!(validate_nation_name("Empire_Ottoman").is_ok());
        assert_eq!(
            validate_nation_name(""),
            Err(ValidationError::NationNameEmpty)
        );
        assert_eq!(
            validate_nation_name(&"a".repeat(33)),
            Err(ValidationError::NationNameTooLong(33))
        );
        assert!(validate_nation_name("../admin").is_err());
        assert!(validate_nation_name("New France").is_err());
    }

    #[test]
    fn test_watch_list_size() {
        assert!(validate_watch_list_size(0).is_ok());
        assert!(validate_watch_list_size(MAX_WATCHED_PLAYERS).is_ok());
        assert_eq!(
            validate_watch_list_size(MAX_WATCHED_PLAYERS + 1),
            Err(ValidationError::WatchListTooLarge {
                max: MAX_WATCHED_PLAYERS,
                actual: MAX_WATCHED_PLAYERS + 1
            })
        );
    }
}
