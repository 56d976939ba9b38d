//! Display-safe projections of credentials.

use secrecy::{ExposeSecret, Secret};

const VISIBLE_SUFFIX: usize = 4;

/// Mask a credential for display, keeping only the last four characters.
///
/// The prefix has a fixed width so the output does not reveal the length of
/// the original value. Values of four characters or fewer are fully hidden.
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= VISIBLE_SUFFIX {
        return "********".to_string();
    }
    let suffix: String = chars[chars.len() - VISIBLE_SUFFIX..].iter().collect();
    format!("****{}", suffix)
}

pub fn mask_secret(secret: &Secret<String>) -> String {
    mask(secret.expose_secret())
}
