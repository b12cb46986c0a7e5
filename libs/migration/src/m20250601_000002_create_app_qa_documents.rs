use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250601_000001_create_app_model_configs::AppModelConfigs;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AppQaDocuments::Table)
                    .if_not_exists()
                    .col(pk_uuid(AppQaDocuments::Id))
                    .col(uuid(AppQaDocuments::AppId))
                    .col(text(AppQaDocuments::Question))
                    .col(text(AppQaDocuments::Answer))
                    .col(integer(AppQaDocuments::Position))
                    .col(boolean(AppQaDocuments::Enabled).default(true))
                    .col(text_null(AppQaDocuments::Error))
                    .col(
                        timestamp_with_time_zone(AppQaDocuments::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(AppQaDocuments::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_app_qa_documents_app_id")
                            .from(AppQaDocuments::Table, AppQaDocuments::AppId)
                            .to(AppModelConfigs::Table, AppModelConfigs::AppId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Positions are handed out from the owner's high-water mark, never reused
        manager
            .create_index(
                Index::create()
                    .name("idx_app_qa_documents_app_id_position")
                    .table(AppQaDocuments::Table)
                    .col(AppQaDocuments::AppId)
                    .col(AppQaDocuments::Position)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_app_qa_documents_created_at")
                    .table(AppQaDocuments::Table)
                    .col(AppQaDocuments::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER app_qa_documents_touch_updated_at
                    BEFORE UPDATE ON app_qa_documents
                    FOR EACH ROW
                    EXECUTE FUNCTION util.touch_updated_at()
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                "DROP TRIGGER IF EXISTS app_qa_documents_touch_updated_at ON app_qa_documents",
            )
            .await?;

        manager
            .drop_table(Table::drop().table(AppQaDocuments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AppQaDocuments {
    Table,
    Id,
    AppId,
    Question,
    Answer,
    Position,
    Enabled,
    Error,
    CreatedAt,
    UpdatedAt,
}
