pub mod create_admin;
pub mod import_datasets;
pub mod initdb;
pub mod serve;

pub use create_admin::{CreateAdminArgs, Prompter, TerminalPrompter, create_admin};
pub use import_datasets::import_datasets;
pub use initdb::init_database;
pub use serve::serve;
