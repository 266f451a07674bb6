//! Shape-only checks applied before any remote call is made.
//!
//! These mirror what the backend enforces, but locally: a failed check here
//! must never produce network traffic. Semantic validity (is the code
//! correct, does the account exist) is always the backend's call.

use crate::error::ValidationError;

/// Characters rejected in free-form fields.
const UNSAFE_CHARS: &[char] = &['<', '>', '\'', '"', '`', ';', '\\'];

/// Special characters accepted (and one required) in passwords.
const PASSWORD_SPECIALS: &[char] = &['@', '$', '!', '%', '*', '?', '&', '#', '/'];

/// Length of every numeric verification code.
pub const CODE_LEN: usize = 6;

/// Strip non-digit characters and cap at [`CODE_LEN`] digits.
///
/// Applied as the user types, so a pasted "12 34-56" becomes "123456" instead
/// of being rejected at submit time.
pub fn sanitize_code(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).take(CODE_LEN).collect()
}

/// Whether `code` is exactly six ASCII digits.
pub fn is_valid_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.chars().all(|c| c.is_ascii_digit())
}

/// Whether `input` is free of the rejected character set.
pub fn is_input_safe(input: &str) -> bool {
    !input.contains(UNSAFE_CHARS)
}

/// Whether `email` looks like `local@domain.tld`.
pub fn is_valid_email(email: &str) -> bool {
    if !is_input_safe(email) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty()
        || !local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    if host.is_empty()
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
    {
        return false;
    }
    (2..=6).contains(&tld.len()) && tld.chars().all(|c| c.is_ascii_alphabetic())
}

/// Whether `phone` is exactly ten digits.
pub fn is_valid_phone(phone: &str) -> bool {
    phone.len() == 10 && phone.chars().all(|c| c.is_ascii_digit())
}

/// Whether `password` satisfies the strength rule: at least eight characters,
/// one lowercase, one uppercase, one digit and one special character, drawn
/// only from the accepted alphabet.
pub fn is_valid_password(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(&c))
        && password
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(&c))
}

/// Whether `name` is safe and 2-100 characters after trimming.
pub fn is_valid_name(name: &str) -> bool {
    if !is_input_safe(name) {
        return false;
    }
    let len = name.trim().chars().count();
    (2..=100).contains(&len)
}

/// Validate a security answer, returning the trimmed form.
pub fn validate_answer(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if !is_input_safe(trimmed) {
        return Err(ValidationError::UnsafeInput);
    }
    let len = trimmed.chars().count();
    if !(2..=100).contains(&len) {
        return Err(ValidationError::InvalidAnswer);
    }
    Ok(trimmed.to_string())
}

/// Sanitize and validate a numeric verification code.
pub fn validate_code(raw: &str) -> Result<String, ValidationError> {
    let code = sanitize_code(raw);
    if is_valid_code(&code) {
        Ok(code)
    } else {
        Err(ValidationError::InvalidCode)
    }
}

/// Password strength score, 0 through 5.
///
/// One point each for length >= 8, a lowercase letter, an uppercase letter, a
/// digit and a special character.
pub fn password_strength(password: &str) -> u8 {
    let mut strength = 0;
    if password.len() >= 8 {
        strength += 1;
    }
    if password.chars().any(|c| c.is_ascii_lowercase()) {
        strength += 1;
    }
    if password.chars().any(|c| c.is_ascii_uppercase()) {
        strength += 1;
    }
    if password.chars().any(|c| c.is_ascii_digit()) {
        strength += 1;
    }
    if password.chars().any(|c| PASSWORD_SPECIALS.contains(&c)) {
        strength += 1;
    }
    strength
}

/// Human-readable label for a strength score.
pub fn strength_label(strength: u8) -> &'static str {
    match strength {
        0 | 1 => "very weak",
        2 => "weak",
        3 => "fair",
        4 => "strong",
        _ => "very strong",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_non_digits() {
        assert_eq!(sanitize_code("12 34-56"), "123456");
        assert_eq!(sanitize_code("abc123def456789"), "123456");
        assert_eq!(sanitize_code(""), "");
    }

    #[test]
    fn test_code_must_be_six_digits() {
        assert!(is_valid_code("123456"));
        assert!(!is_valid_code("12345"));
        assert!(!is_valid_code("1234567"));
        assert!(!is_valid_code("12345a"));
        assert!(validate_code("  987654 ").is_ok());
        assert_eq!(validate_code("12"), Err(ValidationError::InvalidCode));
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("user.name-1@mail.example.mx"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a@b.c"));
        assert!(!is_valid_email("a@b.abcdefg"));
        assert!(!is_valid_email("a<script>@b.com"));
    }

    #[test]
    fn test_password_rule() {
        assert!(is_valid_password("Valid1!@"));
        assert!(!is_valid_password("short1!"));
        assert!(!is_valid_password("nouppercase1!"));
        assert!(!is_valid_password("NOLOWERCASE1!"));
        assert!(!is_valid_password("NoDigits!!"));
        assert!(!is_valid_password("NoSpecial11"));
        // space is outside the accepted alphabet
        assert!(!is_valid_password("Valid 1!@aa"));
    }

    #[test]
    fn test_strength_score() {
        assert_eq!(password_strength(""), 0);
        assert_eq!(password_strength("abc"), 1);
        assert_eq!(password_strength("Valid1!@"), 5);
        assert_eq!(strength_label(5), "very strong");
        assert_eq!(strength_label(0), "very weak");
    }

    #[test]
    fn test_answer_window() {
        assert_eq!(validate_answer("  fluffy  ").unwrap(), "fluffy");
        assert_eq!(validate_answer(" a "), Err(ValidationError::InvalidAnswer));
        assert_eq!(
            validate_answer(&"x".repeat(101)),
            Err(ValidationError::InvalidAnswer)
        );
        assert_eq!(
            validate_answer("rex; drop"),
            Err(ValidationError::UnsafeInput)
        );
    }

    #[test]
    fn test_phone_and_name() {
        assert!(is_valid_phone("5512345678"));
        assert!(!is_valid_phone("55123"));
        assert!(!is_valid_phone("55123456a8"));
        assert!(is_valid_name("Ana"));
        assert!(!is_valid_name(" a "));
        assert!(!is_valid_name("Bob\"y"));
    }
}
