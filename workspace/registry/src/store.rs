//! Repository interface over the account/dataset registry.
//!
//! Handlers and CLI commands never talk to SeaORM directly for registry
//! data; they go through [`AccountStore`] and [`DatasetStore`], which
//! [`Registry`] implements on top of a [`DatabaseConnection`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use model::entities::{dataset, user};
use sea_orm::DatabaseConnection;
use sea_orm::sea_query::{Expr, Func, IntoColumnRef, LikeExpr, SimpleExpr};

use crate::error::Result;

/// Account status filter of the user list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    Any,
    Active,
    Inactive,
    Staff,
    Superuser,
}

impl StatusFilter {
    /// Parses the `status` query value. Empty and unknown values do not filter.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => StatusFilter::Active,
            "inactive" => StatusFilter::Inactive,
            "staff" => StatusFilter::Staff,
            "superuser" => StatusFilter::Superuser,
            _ => StatusFilter::Any,
        }
    }
}

/// One-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u64,
    pub size: u64,
}

impl Page {
    pub fn new(number: u64, size: u64) -> Self {
        Self {
            number: number.max(1),
            size: size.max(1),
        }
    }

    pub fn offset(&self) -> u64 {
        (self.number - 1) * self.size
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    /// Case-insensitive substring over username, email, first and last name.
    pub search: Option<String>,
    pub status: StatusFilter,
    pub joined_since: Option<DateTime<Utc>>,
    pub page: Option<Page>,
}

impl AccountFilter {
    pub fn search_term(&self) -> Option<&str> {
        normalized_search(self.search.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatasetFilter {
    /// Case-insensitive substring over dataset name and owner username.
    pub search: Option<String>,
    pub owner_id: Option<i32>,
    pub uploaded_since: Option<DateTime<Utc>>,
    /// Exact dataset name match, used to skip already registered files.
    pub name: Option<String>,
    pub page: Option<Page>,
}

impl DatasetFilter {
    pub fn search_term(&self) -> Option<&str> {
        normalized_search(self.search.as_deref())
    }
}

/// Values for a new account. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Partial update of the privilege flags; `None` leaves a flag unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountFlags {
    pub is_active: Option<bool>,
    pub is_staff: Option<bool>,
    pub is_superuser: Option<bool>,
}

impl AccountFlags {
    pub fn admin() -> Self {
        Self {
            is_active: Some(true),
            is_staff: Some(true),
            is_superuser: Some(true),
        }
    }
}

/// Values for a new dataset; the version is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewDataset {
    pub user_id: i32,
    pub name: String,
    pub file: String,
    pub file_size: i64,
    pub schema_signature: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A dataset together with its owner.
pub type DatasetWithOwner = (dataset::Model, Option<user::Model>);

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Ordered newest `date_joined` first.
    async fn list_accounts(&self, filter: &AccountFilter) -> Result<Vec<user::Model>>;

    async fn count_accounts(&self, filter: &AccountFilter) -> Result<u64>;

    async fn get_account(&self, id: i32) -> Result<Option<user::Model>>;

    async fn find_account_by_username(&self, username: &str) -> Result<Option<user::Model>>;

    /// Fails with `Validation` when the username is taken.
    async fn create_account(&self, account: NewAccount) -> Result<user::Model>;

    /// Deactivation also ends every admin session of the account.
    async fn update_account_flags(&self, id: i32, flags: AccountFlags) -> Result<user::Model>;

    /// Removes a non-superuser account together with its sessions and
    /// datasets. Returns the removed datasets so their files can be cleaned up.
    async fn delete_account(&self, id: i32) -> Result<Vec<dataset::Model>>;

    /// Accounts with the most datasets, descending, ties by id.
    async fn top_uploaders(&self, limit: u64) -> Result<Vec<(user::Model, u64)>>;
}

#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Ordered newest `uploaded_at` first.
    async fn list_datasets(&self, filter: &DatasetFilter) -> Result<Vec<DatasetWithOwner>>;

    async fn count_datasets(&self, filter: &DatasetFilter) -> Result<u64>;

    async fn get_dataset(&self, id: i32) -> Result<Option<DatasetWithOwner>>;

    /// Assigns the next per-owner version and marks the dataset current.
    async fn create_dataset(&self, dataset: NewDataset) -> Result<dataset::Model>;

    /// Returns the removed row, or `None` when the id does not exist.
    async fn delete_dataset(&self, id: i32) -> Result<Option<dataset::Model>>;
}

/// SeaORM-backed registry.
#[derive(Clone, Debug)]
pub struct Registry {
    pub(crate) db: DatabaseConnection,
}

impl Registry {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn normalized_search(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|term| !term.is_empty())
}

/// `LOWER(column) LIKE '%term%'` with LIKE wildcards in the term escaped.
pub(crate) fn contains_ignore_case<C: IntoColumnRef>(column: C, term: &str) -> SimpleExpr {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.to_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');

    Expr::expr(Func::lower(Expr::col(column))).like(LikeExpr::new(escaped).escape('\\'))
}
