use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::QaDocument;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "app_qa_documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub app_id: Uuid,
    #[sea_orm(column_type = "Text")]
    pub question: String,
    #[sea_orm(column_type = "Text")]
    pub answer: String,
    pub position: i32,
    pub enabled: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub error: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for QaDocument {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            app_id: model.app_id,
            question: model.question,
            answer: model.answer,
            position: model.position,
            enabled: model.enabled,
            error: model.error,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

impl From<QaDocument> for ActiveModel {
    fn from(doc: QaDocument) -> Self {
        ActiveModel {
            id: Set(doc.id),
            app_id: Set(doc.app_id),
            question: Set(doc.question),
            answer: Set(doc.answer),
            position: Set(doc.position),
            enabled: Set(doc.enabled),
            error: Set(doc.error),
            created_at: Set(doc.created_at.into()),
            updated_at: Set(doc.updated_at.into()),
        }
    }
}
