//! OAuth `state` bookkeeping between the authorize redirect and the callback

use sqlx::{Executor, Postgres};

use super::models::Platform;

pub async fn save_oauth_state<'e, E>(
    executor: E,
    state: &str,
    account_id: i64,
    platform: Platform,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO oauth_states (state, account_id, platform)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(state)
    .bind(account_id)
    .bind(platform)
    .execute(executor)
    .await?;
    Ok(())
}

/// Consume a state value, returning the account it was issued for
pub async fn take_oauth_state<'e, E>(
    executor: E,
    state: &str,
) -> Result<Option<(i64, Platform)>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    // Atomic DELETE + RETURNING so a state can only be redeemed once
    sqlx::query_as(
        r#"
        DELETE FROM oauth_states
        WHERE state = $1 AND created_at > NOW() - INTERVAL '10 minutes'
        RETURNING account_id, platform
        "#,
    )
    .bind(state)
    .fetch_optional(executor)
    .await
}
