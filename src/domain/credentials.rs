//! Platform credential queries

use sqlx::{Executor, Postgres};

use super::models::{Platform, PlatformCredential};

pub async fn get_credential<'e, E>(
    executor: E,
    account_id: i64,
    platform: Platform,
) -> Result<Option<PlatformCredential>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT access_token, platform_user_id, token_obtained_at, token_expires_in
        FROM platform_credentials
        WHERE account_id = $1 AND platform = $2
        "#,
    )
    .bind(account_id)
    .bind(platform)
    .fetch_optional(executor)
    .await
}

/// Write a complete credential, replacing any previous one for the platform
pub async fn upsert_credential<'e, E>(
    executor: E,
    account_id: i64,
    platform: Platform,
    credential: &PlatformCredential,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO platform_credentials
            (account_id, platform, access_token, platform_user_id, token_obtained_at, token_expires_in)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (account_id, platform) DO UPDATE SET
            access_token = $3,
            platform_user_id = $4,
            token_obtained_at = $5,
            token_expires_in = $6,
            updated_at = NOW()
        "#,
    )
    .bind(account_id)
    .bind(platform)
    .bind(&credential.access_token)
    .bind(&credential.platform_user_id)
    .bind(credential.token_obtained_at)
    .bind(credential.token_expires_in)
    .execute(executor)
    .await?;
    Ok(())
}
