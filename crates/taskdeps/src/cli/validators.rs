//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time, providing immediate feedback for invalid values.

use crate::domain::MAX_ID_LENGTH;

/// Validate a task id.
///
/// Ids are opaque to the graph, so only their shape is checked:
/// - not empty
/// - no whitespace
/// - at most [`MAX_ID_LENGTH`] characters
pub fn validate_task_id(s: &str) -> Result<String, String> {
    validate_id("Task ID", s)
}

/// Validate a dependency id, with the same shape rules as task ids.
pub fn validate_dependency_id(s: &str) -> Result<String, String> {
    validate_id("Dependency ID", s)
}

fn validate_id(label: &str, s: &str) -> Result<String, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err(format!("{label} cannot be empty"));
    }

    let len = s.chars().count();
    if len > MAX_ID_LENGTH {
        return Err(format!(
            "{label} cannot exceed {MAX_ID_LENGTH} characters, got {len} characters"
        ));
    }

    if s.chars().any(char::is_whitespace) {
        return Err(format!("Invalid {label} '{s}': IDs cannot contain whitespace"));
    }

    if s.chars().any(char::is_control) {
        return Err(format!("{label} contains invalid control characters"));
    }

    Ok(s.to_string())
}

/// Validate a user id.
///
/// Delegates to the domain validator in `commands::init` to maintain
/// a single source of truth for validation rules.
pub fn validate_user_id(s: &str) -> Result<String, String> {
    use crate::commands::init;

    let trimmed = s.trim();
    init::validate_user(trimmed).map_err(|e| e.to_string())?;
    Ok(trimmed.to_string())
}
