//! Referral codes and the referrals they produce.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use sqlx::PgPool;

use canopy_core::ReferralCodeError;
use canopy_core::referral::{code_prefix, generate_unique};

use crate::db::{ReferralRepository, RepositoryError, UserRepository};
use crate::models::{Referral, User};

/// What `GET /api/referrals/me` returns.
#[derive(Debug, Clone, Serialize)]
pub struct ReferralSummary {
    pub referral_code: String,
    pub referrals: Vec<Referral>,
}

pub struct ReferralService<'a> {
    users: UserRepository<'a>,
    referrals: ReferralRepository<'a>,
}

impl<'a> ReferralService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            referrals: ReferralRepository::new(pool),
        }
    }

    /// The user's referral code, generating one on first use.
    ///
    /// # Errors
    ///
    /// Returns `ReferralCodeError::Exhausted` if no unused code was found.
    pub async fn ensure_code(
        &self,
        user: &User,
    ) -> Result<String, ReferralCodeError<RepositoryError>> {
        if let Some(code) = &user.referral_code {
            return Ok(code.clone());
        }

        let prefix = code_prefix(user.first_name.as_deref(), user.email.as_str());
        let code = generate_unique(&mut StdRng::from_os_rng(), &prefix, |candidate| async move {
            self.users.referral_code_exists(&candidate).await
        })
        .await?;

        let assigned = self
            .users
            .assign_referral_code(user.id, &code)
            .await
            .map_err(ReferralCodeError::Lookup)?;
        if assigned == code {
            tracing::info!(user_id = %user.id, code = %assigned, "Referral code generated");
        }
        Ok(assigned)
    }

    /// Code plus the referrals the user has made.
    ///
    /// # Errors
    ///
    /// See [`Self::ensure_code`].
    pub async fn summary(
        &self,
        user: &User,
    ) -> Result<ReferralSummary, ReferralCodeError<RepositoryError>> {
        let referral_code = self.ensure_code(user).await?;
        let referrals = self
            .referrals
            .list_by_referrer(user.id)
            .await
            .map_err(ReferralCodeError::Lookup)?;
        Ok(ReferralSummary {
            referral_code,
            referrals,
        })
    }
}
