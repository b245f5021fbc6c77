//! User repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use canopy_core::{Email, UserId, UserRole};

use super::{Listing, RepositoryError};
use crate::models::{LoyaltyCoupon, Paging, User};

const USER_COLUMNS: &str = "id, email, first_name, last_name, role, loyalty_points, \
     loyalty_coupons, referral_code, referred_by, created_at, updated_at";

const DUPLICATE_EMAIL: &str = "A user with this email already exists";

#[derive(FromRow)]
struct UserRow {
    id: UserId,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    role: String,
    loyalty_points: i64,
    loyalty_coupons: Json<Vec<LoyaltyCoupon>>,
    referral_code: Option<String>,
    referred_by: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            email: Email::parse(&row.email).map_err(|e| RepositoryError::corrupt("email", e))?,
            first_name: row.first_name,
            last_name: row.last_name,
            role: row
                .role
                .parse()
                .map_err(|e| RepositoryError::corrupt("role", e))?,
            loyalty_points: row.loyalty_points,
            loyalty_coupons: row.loyalty_coupons.0,
            referral_code: row.referral_code,
            referred_by: row.referred_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct UserWithHashRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Fields for a new account.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub email: &'a Email,
    pub password_hash: &'a str,
    pub first_name: Option<&'a str>,
    pub last_name: Option<&'a str>,
    pub role: UserRole,
    pub referred_by: Option<UserId>,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    /// Get a user by their email address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(email.as_str())
                .fetch_optional(self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    /// Get the owner of a referral code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_referral_code(&self, code: &str) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE referral_code = $1"
        ))
        .bind(code.trim().to_uppercase())
        .fetch_optional(self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    /// Get a user together with their password hash, for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row: Option<UserWithHashRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some((User::try_from(row.user)?, row.password_hash)))
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&self, new: &NewUser<'_>) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(&format!(
            r"
            INSERT INTO users (email, password_hash, first_name, last_name, role, referred_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(new.email.as_str())
        .bind(new.password_hash)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.role.as_str())
        .bind(new.referred_by)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, DUPLICATE_EMAIL))?;

        User::try_from(row)
    }

    /// List users, newest first, optionally filtered by email or name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        paging: Paging,
        search: Option<&str>,
    ) -> Result<Listing<User>, RepositoryError> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", super::escape_like(s)));

        let filter = "($1::text IS NULL OR email ILIKE $1 OR first_name ILIKE $1 OR last_name ILIKE $1)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users WHERE {filter}"))
            .bind(pattern.as_deref())
            .fetch_one(self.pool)
            .await?;

        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {filter} ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(pattern.as_deref())
        .bind(i64::from(paging.limit()))
        .bind(paging.offset())
        .fetch_all(self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<_, _>>()?;
        Ok(Listing { items, total })
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn set_role(&self, id: UserId, role: UserRole) -> Result<User, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from)
            .transpose()?
            .ok_or(RepositoryError::NotFound)
    }

    /// Add `delta` (possibly negative) to a user's points balance.
    ///
    /// Returns `None` when the user does not exist or the balance would go
    /// below zero; the balance is left untouched in both cases.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn adjust_points(
        &self,
        id: UserId,
        delta: i64,
    ) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r"
            UPDATE users
            SET loyalty_points = loyalty_points + $2, updated_at = NOW()
            WHERE id = $1 AND loyalty_points + $2 >= 0
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(delta)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Spend `cost` points and append `coupon` in one statement.
    ///
    /// Returns `None` when the balance is below `cost`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn redeem_points(
        &self,
        id: UserId,
        cost: i64,
        coupon: &LoyaltyCoupon,
    ) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            r"
            UPDATE users
            SET loyalty_points = loyalty_points - $2,
                loyalty_coupons = loyalty_coupons || jsonb_build_array($3::jsonb),
                updated_at = NOW()
            WHERE id = $1 AND loyalty_points >= $2
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(cost)
        .bind(Json(coupon))
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Whether any user already holds `code`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn referral_code_exists(&self, code: &str) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE referral_code = $1)")
                .bind(code)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Give a user `code` unless they already have one.
    ///
    /// Returns the code the user ends up with, which is the existing one if
    /// another request assigned it first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if another user holds `code`.
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    pub async fn assign_referral_code(
        &self,
        id: UserId,
        code: &str,
    ) -> Result<String, RepositoryError> {
        let assigned: Option<String> = sqlx::query_scalar(
            r"
            UPDATE users SET referral_code = $2, updated_at = NOW()
            WHERE id = $1 AND referral_code IS NULL
            RETURNING referral_code
            ",
        )
        .bind(id)
        .bind(code)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "Referral code already exists"))?;

        if let Some(code) = assigned {
            return Ok(code);
        }

        self.get_by_id(id)
            .await?
            .and_then(|u| u.referral_code)
            .ok_or(RepositoryError::NotFound)
    }
}
