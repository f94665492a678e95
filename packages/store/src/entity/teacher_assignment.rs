use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Binds a video library to a (stage, section, subject) with revenue terms.
/// `section_id` is null for common subjects of a stage without sections.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "teacher_assignments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub library_id: i64,
    #[sea_orm(column_type = "Text")]
    pub library_name: String,
    pub stage_id: i32,
    pub section_id: Option<i32>,
    pub subject_id: i32,
    pub tax_rate: f64,
    pub revenue_percentage: f64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stage::Entity",
        from = "Column::StageId",
        to = "super::stage::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Stage,
    #[sea_orm(
        belongs_to = "super::subject::Entity",
        from = "Column::SubjectId",
        to = "super::subject::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Subject,
}

impl Related<super::stage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stage.def()
    }
}

impl Related<super::subject::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subject.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for watchpay::Assignment {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            library_id: model.library_id,
            library_name: model.library_name,
            stage_id: model.stage_id,
            section_id: model.section_id,
            subject_id: model.subject_id,
            tax_rate: model.tax_rate,
            revenue_percentage: model.revenue_percentage,
        }
    }
}
