//! Authentication service.
//!
//! Email and password accounts with argon2 hashes. A registration may carry
//! a referral code, which links the new account to its referrer.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use sqlx::PgPool;

use canopy_core::{Email, UserRole};

use crate::db::RepositoryError;
use crate::db::referrals::ReferralRepository;
use crate::db::users::{NewUser, UserRepository};
use crate::models::User;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Registration request body.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub referral_code: Option<String>,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    referrals: ReferralRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            referrals: ReferralRepository::new(pool),
        }
    }

    /// Register a customer account.
    ///
    /// An unknown referral code is logged and ignored so a typo never
    /// blocks sign-up.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    pub async fn register(&self, registration: &Registration) -> Result<User, AuthError> {
        let email = Email::parse(&registration.email)?;
        validate_password(&registration.password)?;
        let password_hash = hash_password(&registration.password)?;

        let referrer = match registration
            .referral_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            Some(code) => {
                let found = self.users.get_by_referral_code(code).await?;
                if found.is_none() {
                    tracing::warn!(code, "Ignoring unknown referral code at registration");
                }
                found
            }
            None => None,
        };

        let user = self
            .users
            .create(&NewUser {
                email: &email,
                password_hash: &password_hash,
                first_name: non_blank(registration.first_name.as_deref()),
                last_name: non_blank(registration.last_name.as_deref()),
                role: UserRole::Customer,
                referred_by: referrer.as_ref().map(|r| r.id),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })?;

        if let Some(referrer) = referrer {
            // The account exists either way; a failed link only costs the bonus.
            if let Err(e) = self.referrals.create(referrer.id, user.id).await {
                tracing::warn!(error = %e, user_id = %user.id, "Failed to record referral");
            } else {
                tracing::info!(referrer_id = %referrer.id, user_id = %user.id, "Referral recorded");
            }
        }

        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Check a password against the length policy.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` describing the failed rule.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored hash.
///
/// # Errors
///
/// Returns `AuthError::InvalidCredentials` if the password doesn't match.
/// Returns `AuthError::PasswordHash` if the stored hash cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::PasswordHash)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(
            verify_password("wrong horse", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_garbage_hash_is_server_error() {
        let err = verify_password("anything", "not-a-hash").unwrap_err();
        assert!(err.is_server_error());
    }

    #[test]
    fn test_password_length_rule() {
        assert!(validate_password("1234567").is_err());
        assert!(validate_password("12345678").is_ok());
        let err = validate_password("short").unwrap_err();
        assert_eq!(err.public_message(), "Password must be at least 8 characters");
    }

    #[test]
    fn test_client_errors_map_to_4xx() {
        use axum::http::StatusCode;

        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::UserAlreadyExists.status(), StatusCode::BAD_REQUEST);
        assert!(!AuthError::UserAlreadyExists.is_server_error());
    }
}
