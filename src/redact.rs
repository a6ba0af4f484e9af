//! Secret-shaped value redaction for logs and `config show` output.

use regex::Regex;
use std::sync::LazyLock;

static SECRET_KEY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)apikey",
        r"(?i)secret",
        r"(?i)password",
        r"(?i)token",
        r"(?i)credential",
        r"(?i)key$",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Whether a config/field key looks like it names a secret value.
pub fn is_secret_key(key: &str) -> bool {
    SECRET_KEY_PATTERNS.iter().any(|re| re.is_match(key))
}

/// Redact a secret value for display: `first4****last2` when long enough to
/// leave a meaningful fingerprint, otherwise a flat mask.
pub fn redact(value: &str) -> String {
    if value.chars().count() >= 8 {
        let chars: Vec<char> = value.chars().collect();
        let prefix: String = chars[..4].iter().collect();
        let suffix: String = chars[chars.len() - 2..].iter().collect();
        format!("{prefix}****{suffix}")
    } else {
        "******".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_common_secret_key_names() {
        assert!(is_secret_key("apiKey"));
        assert!(is_secret_key("OPENAI_API_KEY"));
        assert!(is_secret_key("password"));
        assert!(is_secret_key("authToken"));
        assert!(is_secret_key("clientSecret"));
        assert!(!is_secret_key("defaultProvider"));
    }

    #[test]
    fn redacts_long_values_with_fingerprint() {
        assert_eq!(redact("sk-ant-abcdef123456"), "sk-a****56");
    }

    #[test]
    fn redacts_short_values_fully() {
        assert_eq!(redact("abc123"), "******");
    }
}
