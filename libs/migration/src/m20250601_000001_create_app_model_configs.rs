use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per owner (application or dataset). qa_index_struct holds the index
        // descriptor JSON, NULL until the first index is created.
        manager
            .create_table(
                Table::create()
                    .table(AppModelConfigs::Table)
                    .if_not_exists()
                    .col(pk_uuid(AppModelConfigs::Id))
                    .col(uuid(AppModelConfigs::AppId).unique_key())
                    .col(text_null(AppModelConfigs::QaIndexStruct))
                    .col(integer(AppModelConfigs::QaPositionHighWater).default(0))
                    .col(
                        timestamp_with_time_zone(AppModelConfigs::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(AppModelConfigs::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TRIGGER app_model_configs_touch_updated_at
                    BEFORE UPDATE ON app_model_configs
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
                "DROP TRIGGER IF EXISTS app_model_configs_touch_updated_at ON app_model_configs",
            )
            .await?;

        manager
            .drop_table(Table::drop().table(AppModelConfigs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum AppModelConfigs {
    Table,
    Id,
    AppId,
    QaIndexStruct,
    QaPositionHighWater,
    CreatedAt,
    UpdatedAt,
}
