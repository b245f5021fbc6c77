//! Admin account commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a new admin account
//! CANOPY_ADMIN_PASSWORD=... canopy admin create -e ops@canopy.shop -n Robin
//!
//! # Give an existing customer the admin role
//! canopy admin promote -e ops@canopy.shop
//! ```
//!
//! Credentials always come from arguments or the environment; nothing is
//! baked into the binary.

use canopy_core::{Email, UserRole};
use canopy_storefront::db::UserRepository;
use canopy_storefront::db::users::NewUser;
use canopy_storefront::services::auth::{AuthError, hash_password, validate_password};

use super::{CommandError, connect};

/// Create a new admin account.
///
/// # Errors
///
/// Returns `CommandError::Auth` for an invalid email, a weak password or an
/// email that is already registered.
pub async fn create_user(
    email: &str,
    password: &str,
    first_name: Option<&str>,
) -> Result<(), CommandError> {
    let email = Email::parse(email).map_err(AuthError::from)?;
    validate_password(password)?;
    let password_hash = hash_password(password)?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);
    if users.get_by_email(&email).await?.is_some() {
        return Err(AuthError::UserAlreadyExists.into());
    }

    let user = users
        .create(&NewUser {
            email: &email,
            password_hash: &password_hash,
            first_name,
            last_name: None,
            role: UserRole::Admin,
            referred_by: None,
        })
        .await?;

    tracing::info!(user_id = %user.id, email = %user.email, "Admin user created");
    Ok(())
}

/// Give an existing account the admin role.
///
/// # Errors
///
/// Returns `CommandError::UnknownUser` if no account has `email`.
pub async fn promote(email: &str) -> Result<(), CommandError> {
    let parsed = Email::parse(email).map_err(AuthError::from)?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);
    let user = users
        .get_by_email(&parsed)
        .await?
        .ok_or_else(|| CommandError::UnknownUser(email.to_owned()))?;

    if user.role.is_admin() {
        tracing::info!(user_id = %user.id, "User is already an admin");
        return Ok(());
    }

    users.set_role(user.id, UserRole::Admin).await?;
    tracing::info!(user_id = %user.id, email = %user.email, "User promoted to admin");
    tracing::warn!("The role applies from the user's next login");
    Ok(())
}
