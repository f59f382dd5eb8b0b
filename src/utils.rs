use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Creates a truncated, salted hash of an identifier for safe logging.
///
/// # Arguments
/// * `id` - The identifier to hash (e.g., username, user_id, mobile).
/// * `salt` - A salt value from the application's configuration.
///
/// # Returns
/// A short, hexadecimal string representing the salted hash.
pub fn log_safe_id(id: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(id.as_bytes());
    let hash = hasher.finalize();

    // Take first 4 bytes and format each as hex
    hash[..4]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()
}

/// Validates username format and length requirements.
///
/// # Username Requirements
/// - Minimum length: 3 characters
/// - Maximum length: 64 characters
/// - Allowed characters: alphanumeric (a-z, A-Z, 0-9) and underscore (_)
/// - Must start with a letter (a-z, A-Z)
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.len() < 3 {
        return Err("Username must be at least 3 characters long".to_string());
    }

    if username.len() > 64 {
        return Err("Username must not exceed 64 characters".to_string());
    }

    if !username
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
    {
        return Err("Username must start with a letter".to_string());
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err("Username can only contain letters, numbers, and underscores".to_string());
    }

    Ok(())
}

/// Validates password complexity requirements.
///
/// # Password Requirements
/// - Minimum length: 10 characters
/// - At least one uppercase letter, one lowercase letter, and one digit
///
/// # Security Note
/// We intentionally do NOT require special characters; length + mixed case
/// + digits provides sufficient entropy without UX friction.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.len() < 10 {
        return Err("Password must be at least 10 characters long".to_string());
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        return Err("Password must contain at least one lowercase letter".to_string());
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }

    // bcrypt has a max input of 72 bytes, but we limit earlier for performance
    if password.len() > 128 {
        return Err("Password must not exceed 128 characters".to_string());
    }

    Ok(())
}

/// Validates a mobile number in E.164 format (e.g. "+919000000000").
pub fn validate_mobile(mobile: &str) -> Result<(), String> {
    let Some(digits) = mobile.strip_prefix('+') else {
        return Err("Mobile must be in E.164 format e.g. +91XXXXXXXXXX".to_string());
    };

    if digits.len() < 8 || digits.len() > 15 {
        return Err("Mobile must contain 8 to 15 digits".to_string());
    }

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err("Mobile may only contain digits after the '+'".to_string());
    }

    Ok(())
}

/// Validates secret key strength by checking entropy and patterns.
///
/// Checks for:
/// - Minimum length (must be at least min_length)
/// - Not all the same character (e.g., "aaaaa...")
/// - Not a simple pattern (e.g., "abcdabcd...")
/// - At least some character diversity
pub fn validate_secret_strength(secret: &str, min_length: usize) -> Result<(), String> {
    if secret.len() < min_length {
        return Err(format!(
            "Secret must be at least {} characters long",
            min_length
        ));
    }

    let first_char = secret.chars().next();
    if let Some(first) = first_char {
        if secret.chars().all(|c| c == first) {
            return Err("Secret must not consist of a single repeated character".to_string());
        }
    }

    // Check for simple repeating patterns (e.g., "ababab" or "123123")
    if secret.len() >= 4 {
        for pattern_len in 2..=(secret.len() / 2).min(8) {
            let pattern = &secret[..pattern_len];
            let repetitions = secret.len() / pattern_len;
            let repeated = pattern.repeat(repetitions);
            if secret.starts_with(&repeated) {
                return Err("Secret must not contain simple repeating patterns".to_string());
            }
        }
    }

    // Secrets of 32+ bytes should have at least 8 unique characters
    if secret.len() >= 32 {
        let unique_chars: HashSet<char> = secret.chars().collect();
        if unique_chars.len() < 8 {
            return Err("Secret must contain at least 8 different characters".to_string());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_too_short() {
        assert!(validate_password_strength("Short1").is_err());
    }

    #[test]
    fn test_password_no_uppercase() {
        assert!(validate_password_strength("lowercase123").is_err());
    }

    #[test]
    fn test_password_no_lowercase() {
        assert!(validate_password_strength("UPPERCASE123").is_err());
    }

    #[test]
    fn test_password_no_digit() {
        assert!(validate_password_strength("NoDigitsHere").is_err());
    }

    #[test]
    fn test_password_valid() {
        assert!(validate_password_strength("ValidPass123").is_ok());
        assert!(validate_password_strength("MySecurePassword2024").is_ok());
    }

    #[test]
    fn test_password_too_long() {
        let long_password = "A".repeat(129) + "a1";
        assert!(validate_password_strength(&long_password).is_err());
    }

    #[test]
    fn test_username_too_short() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("").is_err());
    }

    #[test]
    fn test_username_starts_with_digit() {
        assert!(validate_username("123user").is_err());
        assert!(validate_username("_user").is_err());
    }

    #[test]
    fn test_username_invalid_characters() {
        assert!(validate_username("user-name").is_err());
        assert!(validate_username("user name").is_err());
    }

    #[test]
    fn test_username_valid() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("bob123").is_ok());
        assert!(validate_username("user_name").is_ok());
        assert!(validate_username(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn test_mobile_missing_plus() {
        assert!(validate_mobile("919000000000").is_err());
    }

    #[test]
    fn test_mobile_too_short() {
        assert!(validate_mobile("+1234").is_err());
    }

    #[test]
    fn test_mobile_non_digits() {
        assert!(validate_mobile("+91abc000000").is_err());
    }

    #[test]
    fn test_mobile_valid() {
        assert!(validate_mobile("+919000000000").is_ok());
        assert!(validate_mobile("+14155552671").is_ok());
    }

    #[test]
    fn test_secret_all_same_char() {
        assert!(validate_secret_strength(&"a".repeat(32), 32).is_err());
    }

    #[test]
    fn test_secret_repeating_pattern() {
        assert!(validate_secret_strength(&"ab".repeat(16), 32).is_err());
    }

    #[test]
    fn test_secret_valid() {
        let good = "a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6";
        assert!(validate_secret_strength(good, 32).is_ok());
    }

    #[test]
    fn test_log_safe_id_is_stable_and_short() {
        let a = log_safe_id("user-1", "salt");
        let b = log_safe_id("user-1", "salt");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        // Different salt yields a different hash
        assert_ne!(a, log_safe_id("user-1", "other-salt"));
    }
}
