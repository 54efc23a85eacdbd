//! Formatting utilities

/// Mask a secret value for display, keeping only its rough length
pub fn mask(value: &str) -> String {
    if value.is_empty() {
        return "\"\"".to_string();
    }
    "*".repeat(value.chars().count().min(8))
}

/// Format a name/value pair the way `list` prints it
pub fn pair(name: &str, value: &str) -> String {
    format!("{} = {}", name, value)
}

/// Truncate a string to max length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        "...".to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
