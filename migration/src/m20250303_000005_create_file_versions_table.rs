use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FileVersion::FileVersions)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FileVersion::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FileVersion::FileId).integer().not_null())
                    .col(ColumnDef::new(FileVersion::VersionNumber).integer().not_null())
                    .col(ColumnDef::new(FileVersion::FilePath).string().not_null())
                    .col(ColumnDef::new(FileVersion::FileSize).big_integer().not_null())
                    .col(ColumnDef::new(FileVersion::FileType).string().not_null())
                    .col(ColumnDef::new(FileVersion::UploadedBy).integer().not_null())
                    .col(ColumnDef::new(FileVersion::Notes).string())
                    .col(ColumnDef::new(FileVersion::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FileVersion::FileVersions).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum FileVersion {
    FileVersions,
    Id,
    FileId,
    VersionNumber,
    FilePath,
    FileSize,
    FileType,
    UploadedBy,
    Notes,
    CreatedAt,
}
