use sea_orm::entity::prelude::*;

/// Owner configuration row. Only the columns the QA index reads are mapped.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "app_model_configs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub app_id: Uuid,
    /// Index descriptor JSON
    #[sea_orm(column_type = "Text", nullable)]
    pub qa_index_struct: Option<String>,
    pub qa_position_high_water: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
