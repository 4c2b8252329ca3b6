//! Sensitive-Key Classifier
//!
//! Decides from a setting's name alone whether it holds a secret. Sensitive
//! settings are never written to disk; they are read from the environment.

/// Fragments that mark a key as sensitive (matched case-insensitively)
pub const SENSITIVE_FRAGMENTS: &[&str] = &["key", "secret", "token", "password", "passwd", "pass", "pwd"];

/// Check whether a configuration key names a secret.
///
/// Substring match, so `keyboard_shortcut` is sensitive and `credential` is not.
pub fn is_sensitive(key: &str) -> bool {
    let lowered = key.to_ascii_lowercase();
    SENSITIVE_FRAGMENTS
        .iter()
        .any(|fragment| lowered.contains(fragment))
}

/// Environment variable consulted for a missing sensitive setting.
///
/// `serperApiKey` -> `SERPER_API_KEY`, `serperAPIKey` -> `SERPER_API_KEY`,
/// `openai.api-key` -> `OPENAI_API_KEY`
pub fn env_var_name(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && i > 0 {
                let prev = chars[i - 1];
                let next = chars.get(i + 1).copied();
                // camelCase boundary, or the last capital of an acronym (`APIKey`)
                let word_start = prev.is_ascii_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_ascii_uppercase() && next.is_some_and(|n| n.is_ascii_lowercase()));
                if word_start {
                    out.push('_');
                }
            }
            out.push(c.to_ascii_uppercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }

    out.trim_matches('_').to_string()
}
