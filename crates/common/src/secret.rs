//! Secret wrapper for credentials
//!
//! Tokens are held in a [`Secret`] for their whole lifetime. The only
//! rendering that ever leaves the process is [`Secret::masked`], which keeps
//! the first and last three characters for operator correlation.

use std::fmt;
use zeroize::Zeroize;

/// Number of leading and trailing characters left visible by [`mask`].
const VISIBLE_EDGE: usize = 3;

/// Sensitive value - redacted in Debug/Display/logs
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    /// Create a new secret value
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Partially redacted form for status output, see [`mask`].
    pub fn masked(&self) -> String {
        mask(&self.0)
    }
}

/// Replace every character except the first and last three with `*`.
///
/// Works on characters, not bytes. Values of six characters or fewer are
/// returned unmasked because every position falls inside a visible edge.
pub fn mask(value: &str) -> String {
    let len = value.chars().count();
    value
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if i < VISIBLE_EDGE || i + VISIBLE_EDGE >= len {
                c
            } else {
                '*'
            }
        })
        .collect()
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_redacts_debug() {
        let secret = Secret::new(String::from("ghp_personal_token"));
        let debug = format!("{:?}", secret);
        assert_eq!(debug, "[REDACTED]");
        assert!(!debug.contains("ghp_personal_token"));
        assert_eq!(secret.to_string(), "[REDACTED]");
    }

    #[test]
    fn test_secret_exposes_value() {
        let secret = Secret::new(String::from("ghp_personal_token"));
        assert_eq!(secret.expose(), "ghp_personal_token");
    }

    #[test]
    fn masked_keeps_three_chars_each_side() {
        let secret = Secret::new(String::from("abcdef123456"));
        assert_eq!(secret.masked(), "abc******456");
    }

    #[test]
    fn mask_short_values_stay_visible() {
        assert_eq!(mask("abcdef"), "abcdef");
        assert_eq!(mask("ab"), "ab");
        assert_eq!(mask(""), "");
    }

    #[test]
    fn mask_seven_chars_hides_middle_one() {
        assert_eq!(mask("abc1def"), "abc*def");
    }

    #[test]
    fn mask_counts_characters_not_bytes() {
        assert_eq!(mask("äöü12345üöä"), "äöü*****üöä");
    }
}
