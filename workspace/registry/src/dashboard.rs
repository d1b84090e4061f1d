use chrono::{DateTime, Duration, Utc};
use tracing::{instrument, trace};

use common::{ActivityEvent, DashboardSummary, TopUser};

use crate::error::Result;
use crate::store::{AccountFilter, AccountStore, DatasetFilter, DatasetStore, Page, StatusFilter};

/// Window for "recent" sign-ups and uploads.
pub const RECENT_DAYS: i64 = 7;
/// Window for sign-ups "this month".
pub const MONTH_DAYS: i64 = 30;
pub const TOP_USERS_LIMIT: u64 = 5;
pub const ACTIVITY_LIMIT: usize = 10;

/// Read-only aggregation over the registry as seen at `now`.
#[instrument(skip(store))]
pub async fn summarize<S>(store: &S, now: DateTime<Utc>) -> Result<DashboardSummary>
where
    S: AccountStore + DatasetStore + ?Sized,
{
    let recent_since = now - Duration::days(RECENT_DAYS);
    let month_since = now - Duration::days(MONTH_DAYS);

    let total_users = store.count_accounts(&AccountFilter::default()).await?;
    let active_users = store
        .count_accounts(&AccountFilter {
            status: StatusFilter::Active,
            ..Default::default()
        })
        .await?;
    let total_datasets = store.count_datasets(&DatasetFilter::default()).await?;

    let recent_users = store
        .count_accounts(&AccountFilter {
            joined_since: Some(recent_since),
            ..Default::default()
        })
        .await?;
    let users_this_month = store
        .count_accounts(&AccountFilter {
            joined_since: Some(month_since),
            ..Default::default()
        })
        .await?;
    let recent_datasets = store
        .count_datasets(&DatasetFilter {
            uploaded_since: Some(recent_since),
            ..Default::default()
        })
        .await?;

    let top_users = store
        .top_uploaders(TOP_USERS_LIMIT)
        .await?
        .into_iter()
        .map(|(account, dataset_count)| TopUser {
            id: account.id,
            username: account.username,
            dataset_count,
        })
        .collect();

    // Newest of each kind, merged and cut to the limit
    let newest = Some(Page::new(1, ACTIVITY_LIMIT as u64));
    let signups = store
        .list_accounts(&AccountFilter {
            page: newest,
            ..Default::default()
        })
        .await?;
    let uploads = store
        .list_datasets(&DatasetFilter {
            page: newest,
            ..Default::default()
        })
        .await?;

    let mut recent_activity: Vec<ActivityEvent> = signups
        .into_iter()
        .map(|account| ActivityEvent::user_joined(account.username, account.date_joined))
        .chain(uploads.into_iter().map(|(dataset, owner)| {
            ActivityEvent::dataset_uploaded(
                dataset.name,
                owner.map(|o| o.username),
                dataset.uploaded_at,
            )
        }))
        .collect();
    recent_activity.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    recent_activity.truncate(ACTIVITY_LIMIT);

    trace!(
        "Dashboard: {} users, {} datasets, {} events",
        total_users,
        total_datasets,
        recent_activity.len()
    );

    Ok(DashboardSummary {
        total_users,
        active_users,
        total_datasets,
        recent_users,
        recent_datasets,
        users_this_month,
        top_users,
        recent_activity,
    })
}
