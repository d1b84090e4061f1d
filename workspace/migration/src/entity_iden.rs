//! Table and column identifiers taken from the SeaORM entities, so later
//! migrations cannot drift from the model crate's names.

use model::entities::prelude::*;
use sea_orm::Iden;
use sea_orm::entity::prelude::*;

pub trait EntityIden: EntityTrait {
    fn table() -> EntityName {
        EntityName(Self::default().table_name().to_string())
    }

    fn column<C: ColumnTrait + Iden>(column: C) -> EntityName {
        EntityName(column_name(&column))
    }

    /// `fk_<table>_<column>`
    fn foreign_key_name<C: ColumnTrait + Iden>(column: C) -> String {
        format!("fk_{}_{}", Self::default().table_name(), column_name(&column))
    }
}

fn column_name<C: Iden>(column: &C) -> String {
    let mut name = String::new();
    column.unquoted(&mut name);
    name
}

impl EntityIden for User {}
impl EntityIden for Dataset {}
impl EntityIden for AdminSession {}

#[derive(Debug, Clone)]
pub struct EntityName(String);

impl Iden for EntityName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}
