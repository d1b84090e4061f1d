//! Dataset side of the registry: the SeaORM [`DatasetStore`] implementation,
//! admin policies and bulk registration of files found on disk.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, JoinType, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use model::entities::{dataset, user};

use crate::error::{RegistryError, Result};
use crate::storage::MediaStorage;
use crate::store::{
    AccountFilter, AccountStore, DatasetFilter, DatasetStore, DatasetWithOwner, NewDataset,
    Registry, contains_ignore_case,
};

fn dataset_condition(filter: &DatasetFilter) -> Condition {
    let mut condition = Condition::all();

    if let Some(term) = filter.search_term() {
        condition = condition.add(
            Condition::any()
                .add(contains_ignore_case(
                    (dataset::Entity, dataset::Column::Name),
                    term,
                ))
                .add(contains_ignore_case(
                    (user::Entity, user::Column::Username),
                    term,
                )),
        );
    }
    if let Some(owner_id) = filter.owner_id {
        condition = condition.add(dataset::Column::UserId.eq(owner_id));
    }
    if let Some(since) = filter.uploaded_since {
        condition = condition.add(dataset::Column::UploadedAt.gte(since));
    }
    if let Some(name) = &filter.name {
        condition = condition.add(dataset::Column::Name.eq(name.as_str()));
    }

    condition
}

#[async_trait]
impl DatasetStore for Registry {
    async fn list_datasets(&self, filter: &DatasetFilter) -> Result<Vec<DatasetWithOwner>> {
        let mut query = dataset::Entity::find()
            .find_also_related(user::Entity)
            .filter(dataset_condition(filter))
            .order_by_desc(dataset::Column::UploadedAt)
            .order_by_desc(dataset::Column::Id);

        if let Some(page) = filter.page {
            query = query.offset(page.offset()).limit(page.size);
        }

        Ok(query.all(&self.db).await?)
    }

    async fn count_datasets(&self, filter: &DatasetFilter) -> Result<u64> {
        Ok(dataset::Entity::find()
            .join(JoinType::LeftJoin, dataset::Relation::User.def())
            .filter(dataset_condition(filter))
            .count(&self.db)
            .await?)
    }

    async fn get_dataset(&self, id: i32) -> Result<Option<DatasetWithOwner>> {
        Ok(dataset::Entity::find_by_id(id)
            .find_also_related(user::Entity)
            .one(&self.db)
            .await?)
    }

    async fn create_dataset(&self, new: NewDataset) -> Result<dataset::Model> {
        let txn = self.db.begin().await?;

        if user::Entity::find_by_id(new.user_id).one(&txn).await?.is_none() {
            return Err(RegistryError::user_not_found(new.user_id));
        }

        let latest = dataset::Entity::find()
            .filter(dataset::Column::UserId.eq(new.user_id))
            .order_by_desc(dataset::Column::Version)
            .one(&txn)
            .await?;
        let version = latest.map_or(1, |d| d.version + 1);

        dataset::Entity::update_many()
            .col_expr(dataset::Column::IsCurrent, Expr::value(false))
            .filter(dataset::Column::UserId.eq(new.user_id))
            .exec(&txn)
            .await?;

        let created = dataset::ActiveModel {
            user_id: Set(new.user_id),
            name: Set(new.name),
            file: Set(new.file),
            file_size: Set(new.file_size),
            uploaded_at: Set(new.uploaded_at),
            version: Set(version),
            is_current: Set(true),
            schema_signature: Set(new.schema_signature),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        debug!(
            "Registered dataset {} v{} for account {}",
            created.id, created.version, created.user_id
        );
        Ok(created)
    }

    async fn delete_dataset(&self, id: i32) -> Result<Option<dataset::Model>> {
        let txn = self.db.begin().await?;

        let Some(existing) = dataset::Entity::find_by_id(id).one(&txn).await? else {
            return Ok(None);
        };
        dataset::Entity::delete_by_id(id).exec(&txn).await?;

        if existing.is_current {
            let successor = dataset::Entity::find()
                .filter(dataset::Column::UserId.eq(existing.user_id))
                .order_by_desc(dataset::Column::Version)
                .order_by_desc(dataset::Column::Id)
                .one(&txn)
                .await?;
            if let Some(successor) = successor {
                debug!("Dataset {} becomes current", successor.id);
                let mut active: dataset::ActiveModel = successor.into();
                active.is_current = Set(true);
                active.update(&txn).await?;
            }
        }

        txn.commit().await?;
        Ok(Some(existing))
    }
}

#[instrument(skip(store))]
pub async fn dataset_detail<S>(store: &S, id: i32) -> Result<DatasetWithOwner>
where
    S: DatasetStore + ?Sized,
{
    store
        .get_dataset(id)
        .await?
        .ok_or_else(|| RegistryError::dataset_not_found(id))
}

/// Deletes a dataset row and then its file. A file that is already gone is
/// not an error.
#[instrument(skip(store, media))]
pub async fn delete_dataset<S>(store: &S, media: &MediaStorage, id: i32) -> Result<dataset::Model>
where
    S: DatasetStore + ?Sized,
{
    let deleted = store
        .delete_dataset(id)
        .await?
        .ok_or_else(|| RegistryError::dataset_not_found(id))?;

    media.remove_dataset_files(std::slice::from_ref(&deleted)).await;
    info!("Deleted dataset '{}' ({})", deleted.name, deleted.id);
    Ok(deleted)
}

/// Registers a file that already sits under the media root.
///
/// `file` is relative to the media root. The name defaults to the file base
/// name; size and schema signature are read from disk.
#[instrument(skip(store, media))]
pub async fn register_dataset<S>(
    store: &S,
    media: &MediaStorage,
    owner_id: i32,
    file: &str,
    name: Option<String>,
) -> Result<dataset::Model>
where
    S: DatasetStore + ?Sized,
{
    let path = media.resolve(file)?;
    let file_size = media.file_size(&path).await?;
    let schema_signature = read_schema_signature(&path).await?;

    let name = name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string())
    });

    store
        .create_dataset(NewDataset {
            user_id: owner_id,
            name,
            file: file.to_string(),
            file_size: i64::try_from(file_size).unwrap_or(i64::MAX),
            schema_signature,
            uploaded_at: Utc::now(),
        })
        .await
}

/// Sorted, lower-cased, comma separated column names of a CSV header line.
pub fn schema_signature_from_header(header: &str) -> String {
    let mut columns: Vec<String> = header
        .trim_start_matches('\u{feff}')
        .split(',')
        .map(|column| column.trim().trim_matches('"').trim().to_lowercase())
        .filter(|column| !column.is_empty())
        .collect();
    columns.sort();
    columns.join(",")
}

async fn read_schema_signature(path: &Path) -> Result<String> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Ok(String::new());
    }

    let path = path.to_path_buf();
    let header = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
        use std::io::BufRead;

        let file = std::fs::File::open(path)?;
        let mut line = String::new();
        std::io::BufReader::new(file).read_line(&mut line)?;
        Ok(line)
    })
    .await??;

    Ok(schema_signature_from_header(&header))
}

/// Outcome of [`import_directory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub migrated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub total: u64,
}

/// Picks the owner for imported datasets: the named account, or the first
/// account by id.
pub async fn resolve_import_owner<S>(store: &S, username: Option<&str>) -> Result<user::Model>
where
    S: AccountStore + ?Sized,
{
    match username {
        Some(username) => store
            .find_account_by_username(username)
            .await?
            .ok_or_else(|| RegistryError::Validation(format!("User '{username}' does not exist"))),
        None => store
            .list_accounts(&AccountFilter::default())
            .await?
            .into_iter()
            .min_by_key(|account| account.id)
            .ok_or_else(|| {
                RegistryError::Validation("No accounts exist to own the datasets".to_string())
            }),
    }
}

/// Registers every regular file directly under `dir` that is not yet
/// registered by name. Files outside the media datasets directory are
/// copied into it first.
#[instrument(skip(store, media, owner), fields(owner = %owner.username))]
pub async fn import_directory<S>(
    store: &S,
    media: &MediaStorage,
    dir: &Path,
    owner: &user::Model,
) -> Result<ImportReport>
where
    S: DatasetStore + ?Sized,
{
    let files = media.scan(dir).await?;
    let target_dir = media.datasets_dir();
    let in_place = same_directory(dir, &target_dir).await;
    if !in_place {
        tokio::fs::create_dir_all(&target_dir).await?;
    }

    let mut report = ImportReport {
        total: files.len() as u64,
        ..Default::default()
    };

    for path in files {
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };

        let filter = DatasetFilter {
            name: Some(file_name.clone()),
            ..Default::default()
        };
        if store.count_datasets(&filter).await? > 0 {
            debug!("Skipping '{}', already registered", file_name);
            report.skipped += 1;
            continue;
        }

        if !in_place {
            if let Err(e) = tokio::fs::copy(&path, target_dir.join(&file_name)).await {
                warn!("Could not copy {}: {}", path.display(), e);
                report.failed += 1;
                continue;
            }
        }

        let relative = MediaStorage::dataset_path(&file_name);
        match register_dataset(store, media, owner.id, &relative, None).await {
            Ok(dataset) => {
                info!("Imported '{}' as dataset {}", file_name, dataset.id);
                report.migrated += 1;
            }
            Err(e) => {
                warn!("Could not import '{}': {}", file_name, e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

async fn same_directory(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
