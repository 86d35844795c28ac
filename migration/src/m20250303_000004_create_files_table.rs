use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(File::Files)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(File::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(File::ProjectId).integer())
                    .col(ColumnDef::new(File::AuthorId).integer().not_null())
                    .col(ColumnDef::new(File::FilePath).string().not_null().unique_key())
                    .col(ColumnDef::new(File::FileName).string().not_null())
                    .col(ColumnDef::new(File::FileSize).big_integer().not_null())
                    .col(ColumnDef::new(File::FileType).string().not_null())
                    .col(ColumnDef::new(File::Title).string())
                    .col(ColumnDef::new(File::Comments).string())
                    .col(ColumnDef::new(File::BucketName).string().not_null())
                    .col(ColumnDef::new(File::TargetLocation).string().not_null())
                    .col(ColumnDef::new(File::TargetId).integer())
                    .col(
                        ColumnDef::new(File::VersionNumber)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(File::PreviousVersionId).integer())
                    .col(
                        ColumnDef::new(File::IsCurrentVersion)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(File::IsPrivate).boolean())
                    .col(ColumnDef::new(File::CheckedOutBy).integer())
                    .col(ColumnDef::new(File::CheckedOutAt).timestamp())
                    .col(ColumnDef::new(File::AssignedTo).integer())
                    .col(ColumnDef::new(File::AssignedAt).timestamp())
                    .col(ColumnDef::new(File::CheckoutNotes).string())
                    .col(ColumnDef::new(File::UploadedAt).timestamp().not_null())
                    .col(ColumnDef::new(File::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_files_project_id")
                            .from(File::Files, File::ProjectId)
                            .to(Project::Projects, Project::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Lookups during version resolution and project listings hit this triple.
        manager
            .create_index(
                Index::create()
                    .name("idx_files_project_location_name")
                    .table(File::Files)
                    .col(File::ProjectId)
                    .col(File::TargetLocation)
                    .col(File::FileName)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(File::Files).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum File {
    Files,
    Id,
    ProjectId,
    AuthorId,
    FilePath,
    FileName,
    FileSize,
    FileType,
    Title,
    Comments,
    BucketName,
    TargetLocation,
    TargetId,
    VersionNumber,
    PreviousVersionId,
    IsCurrentVersion,
    IsPrivate,
    CheckedOutBy,
    CheckedOutAt,
    AssignedTo,
    AssignedAt,
    CheckoutNotes,
    UploadedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Project {
    Projects,
    Id,
}
