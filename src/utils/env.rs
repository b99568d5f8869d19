/// Environment variable prefix for ledger settings.
pub const ENV_PREFIX: &str = "SUBS_";

/// Get environment variable with SUBS_ prefix, falling back to unprefixed version
///
/// # Examples
///
/// ```rust
/// use subs_ledger::utils::get_env_with_prefix;
///
/// // Checks SUBS_LOG_LEVEL first, then LOG_LEVEL
/// let level = get_env_with_prefix("LOG_LEVEL");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Read a boolean flag, accepting `true`/`1` as set.
pub fn env_flag(key: &str) -> bool {
    get_env_with_prefix(key)
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_env_with_prefix() {
        unsafe {
            std::env::set_var("SUBS_LEDGER_TEST_VAR", "prefixed_value");
            std::env::set_var("LEDGER_TEST_VAR", "unprefixed_value");
        }
        assert_eq!(
            get_env_with_prefix("LEDGER_TEST_VAR"),
            Some("prefixed_value".to_string())
        );
        unsafe {
            std::env::remove_var("SUBS_LEDGER_TEST_VAR");
        }
        assert_eq!(
            get_env_with_prefix("LEDGER_TEST_VAR"),
            Some("unprefixed_value".to_string())
        );
        unsafe {
            std::env::remove_var("LEDGER_TEST_VAR");
        }

        assert_eq!(get_env_with_prefix("LEDGER_NON_EXISTENT_VAR"), None);
    }

    #[test]
    fn test_env_flag() {
        unsafe {
            std::env::set_var("SUBS_LEDGER_FLAG_ON", "1");
            std::env::set_var("SUBS_LEDGER_FLAG_OFF", "no");
        }
        assert!(env_flag("LEDGER_FLAG_ON"));
        assert!(!env_flag("LEDGER_FLAG_OFF"));
        assert!(!env_flag("LEDGER_FLAG_MISSING"));
        unsafe {
            std::env::remove_var("SUBS_LEDGER_FLAG_ON");
            std::env::remove_var("SUBS_LEDGER_FLAG_OFF");
        }
    }
}
