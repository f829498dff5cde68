//! Content item queries
//!
//! All functions use the generic Executor pattern, allowing them to work with
//! both `&PgPool` and `&mut PgConnection` (transactions).
//!
//! State transitions are conditional updates: each one only applies when the
//! row is still in the state the caller observed, so two overlapping passes
//! cannot both win the same transition. Callers get `true` when their write
//! was applied.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};

use super::models::ContentItem;

const ITEM_COLUMNS: &str = r#"
    id, account_id, platform, status, publish_state, scheduled_publish_time,
    caption_text, media_url, remote_container_id, remote_media_id,
    rejection_reason, published_at
"#;

/// Items that need orchestrator action.
///
/// `creation_horizon` limits which container-less items are picked up; `None`
/// means every pending item regardless of its schedule.
pub async fn list_actionable_items<'e, E>(
    executor: E,
    now: DateTime<Utc>,
    creation_horizon: Option<DateTime<Utc>>,
) -> Result<Vec<ContentItem>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!(
        r#"
        SELECT {ITEM_COLUMNS}
        FROM content_items
        WHERE status = 'approved'
          AND publish_state IN ('pending', 'container_created')
          AND (
                (remote_container_id IS NULL
                    AND ($2::timestamptz IS NULL OR scheduled_publish_time <= $2))
             OR (remote_container_id IS NOT NULL AND scheduled_publish_time <= $1)
          )
        ORDER BY scheduled_publish_time ASC
        "#
    );

    sqlx::query_as(&query)
        .bind(now)
        .bind(creation_horizon)
        .fetch_all(executor)
        .await
}

pub async fn get_item<'e, E>(executor: E, item_id: i64) -> Result<Option<ContentItem>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let query = format!("SELECT {ITEM_COLUMNS} FROM content_items WHERE id = $1");

    sqlx::query_as(&query)
        .bind(item_id)
        .fetch_optional(executor)
        .await
}

/// Attach a remote container. Only succeeds while the item has none and no
/// other item holds the same id.
pub async fn set_container_id<'e, E>(
    executor: E,
    item_id: i64,
    container_id: &str,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE content_items
        SET remote_container_id = $2,
            publish_state = 'container_created',
            updated_at = NOW()
        WHERE id = $1
          AND remote_container_id IS NULL
          AND publish_state = 'pending'
        "#,
    )
    .bind(item_id)
    .bind(container_id)
    .execute(executor)
    .await;

    match result {
        Ok(result) => Ok(result.rows_affected() > 0),
        // Container id already belongs to another item
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Mark an item published. Only succeeds if the item is not already terminal.
pub async fn mark_published<'e, E>(
    executor: E,
    item_id: i64,
    remote_media_id: &str,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE content_items
        SET publish_state = 'published',
            remote_media_id = $2,
            published_at = NOW(),
            updated_at = NOW()
        WHERE id = $1 AND publish_state NOT IN ('published', 'rejected')
        "#,
    )
    .bind(item_id)
    .bind(remote_media_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Reject an item with a reason visible to its owner.
/// Only succeeds if the item is not already terminal.
pub async fn mark_rejected<'e, E>(
    executor: E,
    item_id: i64,
    reason: &str,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE content_items
        SET publish_state = 'rejected',
            status = 'rejected',
            rejection_reason = $2,
            updated_at = NOW()
        WHERE id = $1 AND publish_state NOT IN ('published', 'rejected')
        "#,
    )
    .bind(item_id)
    .bind(reason)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
