//! Fixtures shared by the registry tests.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, Set};

use model::entities::{dataset, user};

use crate::store::Registry;

/// Marks accounts that cannot log in; fixtures do not need real hashes.
pub const UNUSABLE_PASSWORD: &str = "!";

pub async fn setup_registry() -> Registry {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");

    Migrator::up(&db, None).await.expect("Migrations failed.");
    Registry::new(db)
}

pub async fn new_account(registry: &Registry, username: &str) -> user::Model {
    insert_account(registry, username, false, Utc::now()).await
}

pub async fn new_superuser(registry: &Registry, username: &str, password: &str) -> user::Model {
    let hash = crate::auth::hash_password(password).expect("Failed to hash password");
    let mut active: user::ActiveModel = insert_account(registry, username, true, Utc::now())
        .await
        .into();
    active.password_hash = Set(hash);
    active
        .update(registry.connection())
        .await
        .expect("Failed to set password")
}

pub async fn insert_account(
    registry: &Registry,
    username: &str,
    superuser: bool,
    date_joined: DateTime<Utc>,
) -> user::Model {
    user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{username}@salespulse.test")),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        password_hash: Set(UNUSABLE_PASSWORD.to_string()),
        is_active: Set(true),
        is_staff: Set(superuser),
        is_superuser: Set(superuser),
        date_joined: Set(date_joined),
        last_login: Set(None),
        ..Default::default()
    }
    .insert(registry.connection())
    .await
    .expect("Failed to create account")
}

pub async fn new_dataset(registry: &Registry, owner: &user::Model) -> dataset::Model {
    static DATASET_ID: AtomicU64 = AtomicU64::new(0);

    let current_id = DATASET_ID.fetch_add(1, Ordering::SeqCst);
    insert_dataset(registry, owner, &format!("dataset_{current_id}.csv"), Utc::now()).await
}

pub async fn insert_dataset(
    registry: &Registry,
    owner: &user::Model,
    name: &str,
    uploaded_at: DateTime<Utc>,
) -> dataset::Model {
    dataset::ActiveModel {
        user_id: Set(owner.id),
        name: Set(name.to_string()),
        file: Set(format!("datasets/{name}")),
        file_size: Set(0),
        uploaded_at: Set(uploaded_at),
        version: Set(1),
        is_current: Set(false),
        schema_signature: Set(String::new()),
        ..Default::default()
    }
    .insert(registry.connection())
    .await
    .expect("Failed to create dataset")
}
