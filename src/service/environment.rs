/*!
 * Derived Environment
 * Variables the builder owns; declarations may not shadow them
 */

pub const APP_NAME: &str = "APP_NAME";
pub const SETTINGS_MODULE: &str = "SETTINGS_MODULE";
pub const ALLOWED_HOSTS: &str = "ALLOWED_HOSTS";
pub const DATABASE_NAME: &str = "DATABASE_NAME";
pub const DATABASE_USER: &str = "DATABASE_USER";
pub const DATABASE_HOST: &str = "DATABASE_HOST";
pub const STATIC_ROOT: &str = "STATIC_ROOT";
/// Path of the staged secret, never its content
pub const SECRETS_FILE: &str = "SECRETS_FILE";
pub const BIND: &str = "BIND";

pub const DERIVED_KEYS: [&str; 9] = [
    APP_NAME,
    SETTINGS_MODULE,
    ALLOWED_HOSTS,
    DATABASE_NAME,
    DATABASE_USER,
    DATABASE_HOST,
    STATIC_ROOT,
    SECRETS_FILE,
    BIND,
];

#[inline]
pub fn is_derived_key(key: &str) -> bool {
    DERIVED_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_keys() {
        assert!(is_derived_key("BIND"));
        assert!(is_derived_key("SECRETS_FILE"));
        assert!(!is_derived_key("bind"));
        assert!(!is_derived_key("DEBUG"));
    }
}
