//! Root for all SeaORM entity modules of the admin console.
//! Accounts own datasets; admin sessions bind a cookie to an account.

pub mod admin_session;
pub mod dataset;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::admin_session::Entity as AdminSession;
    pub use super::dataset::Entity as Dataset;
    pub use super::user::Entity as User;
}
