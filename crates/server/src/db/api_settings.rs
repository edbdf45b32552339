//! Integration credentials stored through the settings API.

use chrono::NaiveDateTime;
use sqlx::SqlitePool;

use super::RepositoryError;
use crate::models::ApiSetting;

#[derive(Debug, sqlx::FromRow)]
struct ApiSettingRow {
    platform: String,
    setting_key: String,
    setting_value: String,
    is_active: bool,
    updated_at: NaiveDateTime,
}

impl From<ApiSettingRow> for ApiSetting {
    fn from(row: ApiSettingRow) -> Self {
        Self {
            platform: row.platform,
            setting_key: row.setting_key,
            setting_value: row.setting_value,
            is_active: row.is_active,
            updated_at: row.updated_at.and_utc(),
        }
    }
}

pub struct ApiSettingsRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ApiSettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Every active setting, ordered by platform and key.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<ApiSetting>, RepositoryError> {
        let rows = sqlx::query_as::<_, ApiSettingRow>(
            "SELECT platform, setting_key, setting_value, is_active, updated_at
             FROM api_settings WHERE is_active = 1
             ORDER BY platform, setting_key",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Active `(key, value)` pairs for one platform.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn for_platform(
        &self,
        platform: &str,
    ) -> Result<Vec<(String, String)>, RepositoryError> {
        Ok(sqlx::query_as(
            "SELECT setting_key, setting_value FROM api_settings
             WHERE platform = ? AND is_active = 1",
        )
        .bind(platform)
        .fetch_all(self.pool)
        .await?)
    }

    /// Insert or replace a setting, reactivating it if it was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn upsert(
        &self,
        platform: &str,
        key: &str,
        value: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO api_settings (platform, setting_key, setting_value)
             VALUES (?, ?, ?)
             ON CONFLICT (platform, setting_key) DO UPDATE SET
                setting_value = excluded.setting_value,
                is_active = 1,
                updated_at = CURRENT_TIMESTAMP",
        )
        .bind(platform)
        .bind(key)
        .bind(value)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Soft delete.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if there is no active setting with that key.
    pub async fn deactivate(&self, platform: &str, key: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE api_settings SET is_active = 0, updated_at = CURRENT_TIMESTAMP
             WHERE platform = ? AND setting_key = ? AND is_active = 1",
        )
        .bind(platform)
        .bind(key)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
