use sea_orm::entity::prelude::*;

/// An uploaded data file owned by exactly one user.
///
/// The file itself lives under the configured media root; `file` stores the
/// path relative to that root.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "datasets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// The user who uploaded this dataset.
    pub user_id: i32,
    pub name: String,
    pub file: String,
    /// Size in bytes recorded when the dataset was registered.
    pub file_size: i64,
    pub uploaded_at: DateTimeUtc,
    /// Per-owner version, newer uploads get higher versions.
    pub version: i32,
    /// Marks which dataset is currently active on the owner's dashboard.
    #[sea_orm(default_value = "false")]
    pub is_current: bool,
    /// Sorted, lower-cased column names used to check that datasets share a structure.
    pub schema_signature: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// File name without the directory part.
    pub fn file_name(&self) -> &str {
        self.file.rsplit('/').next().unwrap_or(&self.file)
    }
}
