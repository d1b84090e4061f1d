//! Transport-layer types shared between the registry and the HTTP layer.
//! The registry builds these directly so handlers can serialize them
//! without another mapping step.

mod dashboard;
mod system;

pub use dashboard::{ActivityEvent, ActivityKind, DashboardSummary, TopUser};
pub use system::{StorageUsage, SystemInfo, bytes_to_megabytes};
