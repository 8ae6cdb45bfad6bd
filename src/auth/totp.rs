use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::AuthError;

/// Generate a new TOTP secret for a user.
///
/// Returns `(secret_base32, otpauth_uri)` — the secret is stored on the user
/// as pending until confirmed, the URI is rendered to the user as a QR code.
pub fn generate_totp_secret(
    issuer: &str,
    account_name: &str,
) -> Result<(String, String), AuthError> {
    let secret = Secret::generate_secret();
    let totp = TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret.to_bytes().map_err(|e| {
            AuthError::Internal(format!("Failed to generate TOTP secret bytes: {}", e))
        })?,
        Some(issuer.to_string()),
        account_name.to_string(),
    )
    .map_err(|e| AuthError::Internal(format!("Failed to create TOTP: {}", e)))?;

    let secret_b32 = secret.to_encoded().to_string();
    let uri = totp.get_url();

    Ok((secret_b32, uri))
}

/// Verify a TOTP code against a stored secret.
///
/// Standard 30-second time step with one step of clock-skew tolerance.
pub fn verify_totp(secret_base32: &str, code: &str) -> Result<bool, AuthError> {
    let secret = Secret::Encoded(secret_base32.to_string());
    let totp = TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret
            .to_bytes()
            .map_err(|e| AuthError::Internal(format!("Failed to decode TOTP secret: {}", e)))?,
        None,
        String::new(),
    )
    .map_err(|e| AuthError::Internal(format!("Failed to create TOTP: {}", e)))?;

    let valid = totp
        .check_current(code)
        .map_err(|e| AuthError::Internal(format!("TOTP system time error: {}", e)))?;
    Ok(valid)
}

/// Compute the current code for a secret. Used by tests and tooling.
pub fn current_totp(secret_base32: &str) -> Result<String, AuthError> {
    let secret = Secret::Encoded(secret_base32.to_string());
    let totp = TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        secret
            .to_bytes()
            .map_err(|e| AuthError::Internal(format!("Failed to decode TOTP secret: {}", e)))?,
        None,
        String::new(),
    )
    .map_err(|e| AuthError::Internal(format!("Failed to create TOTP: {}", e)))?;

    totp.generate_current()
        .map_err(|e| AuthError::Internal(format!("TOTP system time error: {}", e)))
}
