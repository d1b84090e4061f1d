use crate::entity_iden::EntityIden;
use model::entities::prelude::*;
use model::entities::{admin_session, user};
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AdminSession::table())
                    .if_not_exists()
                    .col(
                        string_len(
                            AdminSession::column(admin_session::Column::SessionKey),
                            64,
                        )
                        .primary_key(),
                    )
                    .col(integer(AdminSession::column(admin_session::Column::UserId)))
                    .col(timestamp_with_time_zone(AdminSession::column(
                        admin_session::Column::CreatedAt,
                    )))
                    .col(timestamp_with_time_zone(AdminSession::column(
                        admin_session::Column::ExpiresAt,
                    )))
                    .foreign_key(
                        ForeignKey::create()
                            .name(AdminSession::foreign_key_name(
                                admin_session::Column::UserId,
                            ))
                            .from(
                                AdminSession::table(),
                                AdminSession::column(admin_session::Column::UserId),
                            )
                            .to(User::table(), User::column(user::Column::Id))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_admin_sessions_expires_at")
                    .table(AdminSession::table())
                    .col(AdminSession::column(admin_session::Column::ExpiresAt))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AdminSession::table()).to_owned())
            .await?;

        Ok(())
    }
}
