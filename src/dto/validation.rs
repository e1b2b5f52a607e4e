//! Validation helpers for DTOs.

use validator::ValidationError;

/// Maximum length of a team name, in characters.
pub const TEAM_NAME_MAX_CHARS: usize = 50;

/// Validates that a game code is exactly 6 upper-case ASCII alphanumerics.
///
/// # Examples
///
/// ```ignore
/// validate_game_code("ABC123") // Ok
/// validate_game_code("abc123") // Err - lowercase, normalise first
/// validate_game_code("ABC12")  // Err - too short
/// ```
pub fn validate_game_code(code: &str) -> Result<(), ValidationError> {
    if code.chars().count() != 6 {
        let mut err = ValidationError::new("game_code_length");
        err.message = Some(
            format!(
                "Game code must be exactly 6 characters (got {})",
                code.chars().count()
            )
            .into(),
        );
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
    {
        let mut err = ValidationError::new("game_code_format");
        err.message = Some("Game code must contain only letters and digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates an already trimmed team name.
pub fn validate_team_name(name: &str) -> Result<(), ValidationError> {
    let len = name.chars().count();
    if len == 0 || len > TEAM_NAME_MAX_CHARS {
        let mut err = ValidationError::new("team_name_length");
        err.message = Some(
            format!("Team name must be between 1 and {TEAM_NAME_MAX_CHARS} characters").into(),
        );
        return Err(err);
    }

    if name.chars().any(char::is_control) {
        let mut err = ValidationError::new("team_name_format");
        err.message = Some("Team name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}
