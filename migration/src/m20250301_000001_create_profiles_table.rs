use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Profile::Profiles)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Profile::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Profile::Username).string().not_null().unique_key())
                    .col(ColumnDef::new(Profile::Password).string().not_null())
                    .col(ColumnDef::new(Profile::FirstName).string())
                    .col(ColumnDef::new(Profile::LastName).string())
                    .col(ColumnDef::new(Profile::Email).string())
                    .col(ColumnDef::new(Profile::Role).string().not_null())
                    .col(ColumnDef::new(Profile::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Profile::Profiles).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Profile {
    Profiles,
    Id,
    Username,
    Password,
    FirstName,
    LastName,
    Email,
    Role,
    CreatedAt,
}
