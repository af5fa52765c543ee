use crate::db::models::{Persona, User};
use crate::error::DbError;
use sqlx::PgPool;
use uuid::Uuid;

pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn by_platform_id(&self, platform_id: &str) -> Result<Option<User>, DbError> {
        sqlx::query_as::<_, User>(
            "SELECT id, platform_id, display_handle, created_at FROM users WHERE platform_id = $1",
        )
        .bind(platform_id)
        .fetch_optional(self.pool)
        .await
        .map_err(Into::into)
    }

    /// Users are created the first time they're observed rather than
    /// through an explicit signup step.
    pub async fn get_or_create(
        &self,
        platform_id: &str,
        display_handle: &str,
    ) -> Result<User, DbError> {
        if let Some(existing) = self.by_platform_id(platform_id).await? {
            return Ok(existing);
        }

        sqlx::query_as::<_, User>(
            "INSERT INTO users (platform_id, display_handle)
             VALUES ($1, $2)
             ON CONFLICT (platform_id) DO UPDATE SET platform_id = EXCLUDED.platform_id
             RETURNING id, platform_id, display_handle, created_at",
        )
        .bind(platform_id)
        .bind(display_handle)
        .fetch_one(self.pool)
        .await
        .map_err(Into::into)
    }
}

pub struct PersonaRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PersonaRepository<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn by_id(&self, id: Uuid) -> Result<Option<Persona>, DbError> {
        sqlx::query_as::<_, Persona>(
            "SELECT id, user_id, preferred_name, pronouns, bio FROM personas WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(Into::into)
    }

    /// A user's single active persona ("A user has one active
    /// persona at a time, globally or per-personality"); this returns the
    /// first persona row owned by the user as the global default, which
    /// callers override with `UserPersonalityConfig.persona_override` when a
    /// per-personality persona is set.
    pub async fn default_for_user(&self, user_id: Uuid) -> Result<Option<Persona>, DbError> {
        sqlx::query_as::<_, Persona>(
            "SELECT id, user_id, preferred_name, pronouns, bio
             FROM personas WHERE user_id = $1 ORDER BY id LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await
        .map_err(Into::into)
    }

    /// Create-on-first-observation per Persona lifecycle, seeded
    /// from the user's platform display handle, so a turn never has to fall
    /// back to a non-persona id when nothing has been set up yet.
    pub async fn get_or_create_default(
        &self,
        user_id: Uuid,
        display_handle: &str,
    ) -> Result<Persona, DbError> {
        if let Some(existing) = self.default_for_user(user_id).await? {
            return Ok(existing);
        }

        sqlx::query_as::<_, Persona>(
            "INSERT INTO personas (user_id, preferred_name, pronouns, bio)
             VALUES ($1, $2, NULL, NULL)
             RETURNING id, user_id, preferred_name, pronouns, bio",
        )
        .bind(user_id)
        .bind(display_handle)
        .fetch_one(self.pool)
        .await
        .map_err(Into::into)
    }
}
