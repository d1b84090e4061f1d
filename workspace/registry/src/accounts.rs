//! Account side of the registry: the SeaORM [`AccountStore`] implementation
//! and the admin policies built on top of it.

use std::collections::HashMap;

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set, SqlErr, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use model::entities::{admin_session, dataset, user};

use crate::auth::AuthContext;
use crate::error::{RegistryError, Result};
use crate::storage::MediaStorage;
use crate::store::{
    AccountFilter, AccountFlags, AccountStore, DatasetFilter, DatasetStore, NewAccount, Registry,
    StatusFilter, contains_ignore_case,
};

fn account_condition(filter: &AccountFilter) -> Condition {
    let mut condition = Condition::all();

    if let Some(term) = filter.search_term() {
        condition = condition.add(
            Condition::any()
                .add(contains_ignore_case(user::Column::Username, term))
                .add(contains_ignore_case(user::Column::Email, term))
                .add(contains_ignore_case(user::Column::FirstName, term))
                .add(contains_ignore_case(user::Column::LastName, term)),
        );
    }

    condition = match filter.status {
        StatusFilter::Any => condition,
        StatusFilter::Active => condition.add(user::Column::IsActive.eq(true)),
        StatusFilter::Inactive => condition.add(user::Column::IsActive.eq(false)),
        StatusFilter::Staff => condition.add(user::Column::IsStaff.eq(true)),
        StatusFilter::Superuser => condition.add(user::Column::IsSuperuser.eq(true)),
    };

    if let Some(since) = filter.joined_since {
        condition = condition.add(user::Column::DateJoined.gte(since));
    }

    condition
}

#[async_trait]
impl AccountStore for Registry {
    async fn list_accounts(&self, filter: &AccountFilter) -> Result<Vec<user::Model>> {
        let mut query = user::Entity::find()
            .filter(account_condition(filter))
            .order_by_desc(user::Column::DateJoined)
            .order_by_desc(user::Column::Id);

        if let Some(page) = filter.page {
            query = query.offset(page.offset()).limit(page.size);
        }

        Ok(query.all(&self.db).await?)
    }

    async fn count_accounts(&self, filter: &AccountFilter) -> Result<u64> {
        Ok(user::Entity::find()
            .filter(account_condition(filter))
            .count(&self.db)
            .await?)
    }

    async fn get_account(&self, id: i32) -> Result<Option<user::Model>> {
        Ok(user::Entity::find_by_id(id).one(&self.db).await?)
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?)
    }

    async fn create_account(&self, account: NewAccount) -> Result<user::Model> {
        let username = account.username.clone();
        let active = user::ActiveModel {
            username: Set(account.username),
            email: Set(account.email),
            first_name: Set(account.first_name),
            last_name: Set(account.last_name),
            password_hash: Set(account.password_hash),
            is_active: Set(account.is_active),
            is_staff: Set(account.is_staff),
            is_superuser: Set(account.is_superuser),
            date_joined: Set(chrono::Utc::now()),
            last_login: Set(None),
            ..Default::default()
        };

        match active.insert(&self.db).await {
            Ok(created) => {
                debug!("Created account {} ('{}')", created.id, created.username);
                Ok(created)
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Err(
                RegistryError::Validation(format!("Username '{username}' already exists")),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_account_flags(&self, id: i32, flags: AccountFlags) -> Result<user::Model> {
        let txn = self.db.begin().await?;

        let account = user::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| RegistryError::user_not_found(id))?;

        if flags == AccountFlags::default() {
            return Ok(account);
        }

        let mut active: user::ActiveModel = account.into();
        if let Some(is_active) = flags.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(is_staff) = flags.is_staff {
            active.is_staff = Set(is_staff);
        }
        if let Some(is_superuser) = flags.is_superuser {
            active.is_superuser = Set(is_superuser);
        }
        let updated = active.update(&txn).await?;

        if flags.is_active == Some(false) {
            let ended = admin_session::Entity::delete_many()
                .filter(admin_session::Column::UserId.eq(id))
                .exec(&txn)
                .await?;
            debug!("Ended {} sessions of account {}", ended.rows_affected, id);
        }

        txn.commit().await?;
        Ok(updated)
    }

    async fn delete_account(&self, id: i32) -> Result<Vec<dataset::Model>> {
        let txn = self.db.begin().await?;

        // Re-checked inside the transaction, the account may have been promoted
        let account = user::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| RegistryError::user_not_found(id))?;
        if account.is_superuser {
            return Err(RegistryError::Protected(format!(
                "Cannot delete superuser '{}'",
                account.username
            )));
        }

        let datasets = dataset::Entity::find()
            .filter(dataset::Column::UserId.eq(id))
            .all(&txn)
            .await?;

        dataset::Entity::delete_many()
            .filter(dataset::Column::UserId.eq(id))
            .exec(&txn)
            .await?;
        admin_session::Entity::delete_many()
            .filter(admin_session::Column::UserId.eq(id))
            .exec(&txn)
            .await?;

        let result = user::Entity::delete_many()
            .filter(user::Column::Id.eq(id))
            .filter(user::Column::IsSuperuser.eq(false))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            // Dropping the transaction rolls it back.
            return Err(RegistryError::user_not_found(id));
        }

        txn.commit().await?;
        Ok(datasets)
    }

    async fn top_uploaders(&self, limit: u64) -> Result<Vec<(user::Model, u64)>> {
        let rows: Vec<(i32, i64)> = user::Entity::find()
            .select_only()
            .column(user::Column::Id)
            .column_as(dataset::Column::Id.count(), "dataset_count")
            .join(JoinType::LeftJoin, user::Relation::Dataset.def())
            .group_by(user::Column::Id)
            .order_by_desc(dataset::Column::Id.count())
            .order_by_asc(user::Column::Id)
            .limit(limit)
            .into_tuple()
            .all(&self.db)
            .await?;

        let ids: Vec<i32> = rows.iter().map(|(id, _)| *id).collect();
        let mut accounts: HashMap<i32, user::Model> = user::Entity::find()
            .filter(user::Column::Id.is_in(ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|account| (account.id, account))
            .collect();

        Ok(rows
            .into_iter()
            .filter_map(|(id, count)| accounts.remove(&id).map(|a| (a, count.max(0) as u64)))
            .collect())
    }
}

/// An account with the datasets it owns, newest upload first.
#[derive(Debug, Clone)]
pub struct AccountDetail {
    pub account: user::Model,
    pub datasets: Vec<dataset::Model>,
}

/// Result of a successful account deletion.
#[derive(Debug, Clone)]
pub struct DeletedAccount {
    pub account: user::Model,
    pub datasets_removed: usize,
    pub files_removed: u64,
}

#[instrument(skip(store))]
pub async fn account_detail<S>(store: &S, id: i32) -> Result<AccountDetail>
where
    S: AccountStore + DatasetStore + ?Sized,
{
    let account = store
        .get_account(id)
        .await?
        .ok_or_else(|| RegistryError::user_not_found(id))?;

    let filter = DatasetFilter {
        owner_id: Some(id),
        ..Default::default()
    };
    let datasets = store
        .list_datasets(&filter)
        .await?
        .into_iter()
        .map(|(dataset, _)| dataset)
        .collect();

    Ok(AccountDetail { account, datasets })
}

/// Flips `is_active`. An admin may not toggle their own account, which
/// would lock them out of the panel.
#[instrument(skip(store, actor), fields(actor = %actor.username))]
pub async fn toggle_active<S>(store: &S, actor: &AuthContext, id: i32) -> Result<user::Model>
where
    S: AccountStore + ?Sized,
{
    let account = store
        .get_account(id)
        .await?
        .ok_or_else(|| RegistryError::user_not_found(id))?;

    if account.id == actor.user_id {
        warn!("'{}' tried to toggle their own account", actor.username);
        return Err(RegistryError::Protected(
            "You cannot change the status of your own account".to_string(),
        ));
    }

    let flags = AccountFlags {
        is_active: Some(!account.is_active),
        ..Default::default()
    };
    let updated = store.update_account_flags(id, flags).await?;
    info!(
        "Account '{}' is now {}",
        updated.username,
        if updated.is_active { "active" } else { "inactive" }
    );
    Ok(updated)
}

/// Deletes a non-superuser account, its sessions and its datasets, then
/// removes the dataset files from the media root.
#[instrument(skip(store, media))]
pub async fn delete_account<S>(store: &S, media: &MediaStorage, id: i32) -> Result<DeletedAccount>
where
    S: AccountStore + ?Sized,
{
    let account = store
        .get_account(id)
        .await?
        .ok_or_else(|| RegistryError::user_not_found(id))?;

    if account.is_superuser {
        warn!("Refusing to delete superuser '{}'", account.username);
        return Err(RegistryError::Protected(format!(
            "Cannot delete superuser '{}'",
            account.username
        )));
    }

    let datasets = store.delete_account(id).await?;
    let files_removed = media.remove_dataset_files(&datasets).await;

    info!(
        "Deleted account '{}' with {} datasets",
        account.username,
        datasets.len()
    );
    Ok(DeletedAccount {
        account,
        datasets_removed: datasets.len(),
        files_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Page;
    use crate::testing::{insert_account, insert_dataset, new_account, new_dataset, setup_registry};
    use chrono::{Duration, Utc};
    use sea_orm::EntityTrait;

    fn actor(account: &user::Model) -> AuthContext {
        AuthContext::authorize(Some(account.clone())).unwrap()
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let registry = setup_registry().await;
        let now = Utc::now();
        insert_account(&registry, "old", false, now - Duration::days(3)).await;
        insert_account(&registry, "new", false, now).await;
        insert_account(&registry, "mid", false, now - Duration::days(1)).await;

        let names: Vec<_> = registry
            .list_accounts(&AccountFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_over_names_and_email() {
        let registry = setup_registry().await;
        let alice = new_account(&registry, "alice").await;
        new_account(&registry, "bob").await;

        let mut active: user::ActiveModel = alice.into();
        active.first_name = Set("Wonder".to_string());
        active.update(registry.connection()).await.unwrap();

        let search = |term: &str| AccountFilter {
            search: Some(term.to_string()),
            ..Default::default()
        };

        assert_eq!(registry.count_accounts(&search("ALI")).await.unwrap(), 1);
        assert_eq!(registry.count_accounts(&search("wonder")).await.unwrap(), 1);
        assert_eq!(
            registry.count_accounts(&search("salespulse.test")).await.unwrap(),
            2
        );
        assert_eq!(registry.count_accounts(&search("zed")).await.unwrap(), 0);
        // LIKE wildcards are literal
        assert_eq!(registry.count_accounts(&search("%")).await.unwrap(), 0);
        assert_eq!(registry.count_accounts(&search("")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_status_filter() {
        let registry = setup_registry().await;
        insert_account(&registry, "root", true, Utc::now()).await;
        let bob = new_account(&registry, "bob").await;
        new_account(&registry, "carol").await;
        registry
            .update_account_flags(
                bob.id,
                AccountFlags {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let count = |status| {
            let filter = AccountFilter {
                status,
                ..Default::default()
            };
            let registry = registry.clone();
            async move { registry.count_accounts(&filter).await.unwrap() }
        };

        assert_eq!(count(StatusFilter::Any).await, 3);
        assert_eq!(count(StatusFilter::Active).await, 2);
        assert_eq!(count(StatusFilter::Inactive).await, 1);
        assert_eq!(count(StatusFilter::Staff).await, 1);
        assert_eq!(count(StatusFilter::Superuser).await, 1);
    }

    #[tokio::test]
    async fn test_pagination() {
        let registry = setup_registry().await;
        let now = Utc::now();
        for i in 0..5 {
            insert_account(&registry, &format!("user{i}"), false, now - Duration::days(i)).await;
        }

        let filter = AccountFilter {
            page: Some(Page::new(2, 2)),
            ..Default::default()
        };
        let names: Vec<_> = registry
            .list_accounts(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["user2", "user3"]);
        assert_eq!(registry.count_accounts(&filter).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_create_account_rejects_duplicate_username() {
        let registry = setup_registry().await;
        new_account(&registry, "alice").await;

        let result = registry
            .create_account(NewAccount {
                username: "alice".to_string(),
                email: String::new(),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: "!".to_string(),
                is_active: true,
                is_staff: false,
                is_superuser: false,
            })
            .await;
        assert!(matches!(result, Err(RegistryError::Validation(_))));
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let registry = setup_registry().await;
        let admin = insert_account(&registry, "root", true, Utc::now()).await;
        let bob = new_account(&registry, "bob").await;

        let toggled = toggle_active(&registry, &actor(&admin), bob.id).await.unwrap();
        assert!(!toggled.is_active);
        let restored = toggle_active(&registry, &actor(&admin), bob.id).await.unwrap();
        assert!(restored.is_active);
        assert_eq!(restored, registry.get_account(bob.id).await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_toggle_own_account_is_protected() {
        let registry = setup_registry().await;
        let admin = insert_account(&registry, "root", true, Utc::now()).await;

        let result = toggle_active(&registry, &actor(&admin), admin.id).await;
        assert!(matches!(result, Err(RegistryError::Protected(_))));
        assert!(registry.get_account(admin.id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_toggle_missing_account() {
        let registry = setup_registry().await;
        let admin = insert_account(&registry, "root", true, Utc::now()).await;

        let result = toggle_active(&registry, &actor(&admin), 999).await;
        assert!(matches!(
            result,
            Err(RegistryError::NotFound { entity: "User", id: 999 })
        ));
    }

    #[tokio::test]
    async fn test_delete_superuser_is_noop() {
        let registry = setup_registry().await;
        let media = MediaStorage::new(tempfile::tempdir().unwrap().path());
        let admin = insert_account(&registry, "root", true, Utc::now()).await;
        new_dataset(&registry, &admin).await;

        let result = delete_account(&registry, &media, admin.id).await;
        assert!(matches!(result, Err(RegistryError::Protected(_))));
        assert!(registry.get_account(admin.id).await.unwrap().is_some());
        assert_eq!(
            dataset::Entity::find().all(registry.connection()).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_store_delete_refuses_account_promoted_meanwhile() {
        let registry = setup_registry().await;
        let bob = new_account(&registry, "bob").await;
        new_dataset(&registry, &bob).await;

        // Promoted after the policy looked at the account
        registry
            .update_account_flags(bob.id, AccountFlags::admin())
            .await
            .unwrap();

        let result = AccountStore::delete_account(&registry, bob.id).await;
        assert!(matches!(result, Err(RegistryError::Protected(_))));
        assert!(registry.get_account(bob.id).await.unwrap().is_some());
        assert_eq!(
            dataset::Entity::find().all(registry.connection()).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_delete_cascades_to_datasets_and_files() {
        let registry = setup_registry().await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("datasets")).unwrap();
        std::fs::write(dir.path().join("datasets/sales.csv"), b"a,b\n1,2\n").unwrap();
        let media = MediaStorage::new(dir.path());

        let bob = new_account(&registry, "bob").await;
        let carol = new_account(&registry, "carol").await;
        insert_dataset(&registry, &bob, "sales.csv", Utc::now()).await;
        new_dataset(&registry, &carol).await;

        let deleted = delete_account(&registry, &media, bob.id).await.unwrap();
        assert_eq!(deleted.datasets_removed, 1);
        assert_eq!(deleted.files_removed, 1);
        assert!(!dir.path().join("datasets/sales.csv").exists());

        assert!(registry.get_account(bob.id).await.unwrap().is_none());
        assert!(matches!(
            account_detail(&registry, bob.id).await,
            Err(RegistryError::NotFound { .. })
        ));
        // Other accounts keep their datasets
        assert_eq!(
            dataset::Entity::find().all(registry.connection()).await.unwrap().len(),
            1
        );

        let again = delete_account(&registry, &media, bob.id).await;
        assert!(matches!(again, Err(RegistryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_account_detail_lists_owned_datasets() {
        let registry = setup_registry().await;
        let bob = new_account(&registry, "bob").await;
        let now = Utc::now();
        insert_dataset(&registry, &bob, "older.csv", now - Duration::hours(2)).await;
        insert_dataset(&registry, &bob, "newer.csv", now).await;

        let detail = account_detail(&registry, bob.id).await.unwrap();
        assert_eq!(detail.account.username, "bob");
        let names: Vec<_> = detail.datasets.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["newer.csv", "older.csv"]);
    }

    #[tokio::test]
    async fn test_top_uploaders_order_and_ties() {
        let registry = setup_registry().await;
        let alice = new_account(&registry, "alice").await;
        let bob = new_account(&registry, "bob").await;
        let carol = new_account(&registry, "carol").await;
        new_account(&registry, "dave").await;

        for _ in 0..2 {
            new_dataset(&registry, &bob).await;
            new_dataset(&registry, &carol).await;
        }
        new_dataset(&registry, &alice).await;

        let top: Vec<_> = registry
            .top_uploaders(3)
            .await
            .unwrap()
            .into_iter()
            .map(|(u, count)| (u.username, count))
            .collect();
        assert_eq!(
            top,
            vec![
                ("bob".to_string(), 2),
                ("carol".to_string(), 2),
                ("alice".to_string(), 1)
            ]
        );
    }
}
