use secrecy::SecretString;
use thiserror::Error;

/// An environment variable required by the application is not set.
#[derive(Debug, Error)]
#[error("Missing environment variable: {0}")]
pub struct MissingEnvVarError(pub String);

/// Reads an environment variable, returning a structured error if it's missing.
///
/// Empty or whitespace-only values count as missing.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, MissingEnvVarError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(MissingEnvVarError(name.to_string())),
    }
}

/// Reads a credential-bearing environment variable straight into a [`SecretString`]
/// so it never shows up in `Debug` output or logs.
pub fn get_secret_env_var(name: &str) -> Result<SecretString, MissingEnvVarError> {
    get_env_var(name).map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_var_names_the_variable() {
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_MISSING") };
        let err = get_env_var("SHARED_UTILS_TEST_MISSING").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing environment variable: SHARED_UTILS_TEST_MISSING"
        );
    }

    #[test]
    #[serial]
    fn blank_var_is_treated_as_missing() {
        unsafe { std::env::set_var("SHARED_UTILS_TEST_BLANK", "  ") };
        assert!(get_env_var("SHARED_UTILS_TEST_BLANK").is_err());
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_BLANK") };
    }

    #[test]
    #[serial]
    fn secret_var_round_trips_without_leaking_in_debug() {
        unsafe { std::env::set_var("SHARED_UTILS_TEST_SECRET", "sv=2024&sig=abc") };
        let secret = get_secret_env_var("SHARED_UTILS_TEST_SECRET").unwrap();
        assert_eq!(secret.expose_secret(), "sv=2024&sig=abc");
        assert!(!format!("{secret:?}").contains("sig=abc"));
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_SECRET") };
    }
}
