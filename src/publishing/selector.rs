//! Due-item selection

use chrono::{DateTime, Duration, Utc};

use crate::domain::ContentItem;
use crate::store::{ContentStore, StoreResult};

/// Items a pass at `now` should act on.
///
/// Container-less items qualify when they are scheduled within `lookahead`
/// of `now` (any time if there is no window). Items that already have a
/// container qualify once they are due. Read only.
pub async fn select_due_items(
    store: &dyn ContentStore,
    now: DateTime<Utc>,
    lookahead: Option<Duration>,
) -> StoreResult<Vec<ContentItem>> {
    let horizon = lookahead.map(|window| now + window);
    store.list_actionable_items(now, horizon).await
}
