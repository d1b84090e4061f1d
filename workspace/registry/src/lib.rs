//! Account and dataset registry behind the SalesPulse admin panel.
//!
//! Everything the admin surface reads or mutates goes through this crate:
//! the [`AccountStore`]/[`DatasetStore`] repository traits, the access gate
//! in [`auth`], credential provisioning, dashboard aggregation and media
//! storage accounting.

pub mod accounts;
pub mod auth;
pub mod dashboard;
pub mod datasets;
pub mod error;
pub mod provisioning;
pub mod storage;
pub mod store;

#[cfg(test)]
pub mod testing;

pub use auth::{AuthContext, LoginSession};
pub use error::{RegistryError, Result};
pub use storage::MediaStorage;
pub use store::{
    AccountFilter, AccountFlags, AccountStore, DatasetFilter, DatasetStore, DatasetWithOwner,
    NewAccount, NewDataset, Page, Registry, StatusFilter,
};
