use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string_len(Users::Username, 150).unique_key())
                    .col(string(Users::Email).default(""))
                    .col(string(Users::FirstName).default(""))
                    .col(string(Users::LastName).default(""))
                    .col(string(Users::PasswordHash))
                    .col(boolean(Users::IsActive).default(true))
                    .col(boolean(Users::IsStaff).default(false))
                    .col(boolean(Users::IsSuperuser).default(false))
                    .col(timestamp_with_time_zone(Users::DateJoined))
                    .col(timestamp_with_time_zone_null(Users::LastLogin))
                    .to_owned(),
            )
            .await?;

        // Create datasets table
        manager
            .create_table(
                Table::create()
                    .table(Datasets::Table)
                    .if_not_exists()
                    .col(pk_auto(Datasets::Id))
                    .col(integer(Datasets::UserId))
                    .col(string_len(Datasets::Name, 255))
                    .col(string(Datasets::File))
                    .col(big_integer(Datasets::FileSize).default(0))
                    .col(timestamp_with_time_zone(Datasets::UploadedAt))
                    .col(integer(Datasets::Version).default(1))
                    .col(boolean(Datasets::IsCurrent).default(false))
                    .col(string_len(Datasets::SchemaSignature, 1024).default(""))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_dataset_owner")
                            .from(Datasets::Table, Datasets::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_datasets_user_id")
                    .table(Datasets::Table)
                    .col(Datasets::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_datasets_uploaded_at")
                    .table(Datasets::Table)
                    .col(Datasets::UploadedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Datasets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Email,
    FirstName,
    LastName,
    PasswordHash,
    IsActive,
    IsStaff,
    IsSuperuser,
    DateJoined,
    LastLogin,
}

#[derive(DeriveIden)]
enum Datasets {
    Table,
    Id,
    UserId,
    Name,
    File,
    FileSize,
    UploadedAt,
    Version,
    IsCurrent,
    SchemaSignature,
}
