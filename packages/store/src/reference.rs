//! Stages, sections and subjects.

use schemars::JsonSchema;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, prelude::Expr,
};
use serde::{Deserialize, Serialize};
use watchpay::{Section, Stage, Subject};

use crate::{
    Store, bad_request, conflict,
    entity::{section, section_revenue, stage, subject, teacher_assignment, teacher_payment},
    error::StoreResult,
    not_found,
};

/// Codes are matched against classifier output, which is upper case.
pub(crate) fn normalize_code(field: &str, code: &str) -> StoreResult<String> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        return Err(bad_request!("{} must not be empty", field));
    }
    Ok(code)
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewStage {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub display_order: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct StageUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewSection {
    pub stage_id: i32,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewSubject {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub is_common: bool,
}

impl Store {
    #[tracing::instrument(name = "create stage", skip(self))]
    pub async fn create_stage(&self, input: NewStage) -> StoreResult<Stage> {
        let code = normalize_code("stage code", &input.code)?;
        let existing = stage::Entity::find()
            .filter(stage::Column::Code.eq(&code))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(conflict!("stage {} already exists", code));
        }

        let model = stage::ActiveModel {
            code: Set(code),
            name: Set(input.name),
            display_order: Set(input.display_order),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(model.into())
    }

    pub async fn list_stages(&self) -> StoreResult<Vec<Stage>> {
        let stages = stage::Entity::find()
            .order_by_asc(stage::Column::DisplayOrder)
            .order_by_asc(stage::Column::Id)
            .all(&self.db)
            .await?;
        Ok(stages.into_iter().map(Into::into).collect())
    }

    pub async fn get_stage(&self, stage_id: i32) -> StoreResult<Stage> {
        stage::Entity::find_by_id(stage_id)
            .one(&self.db)
            .await?
            .map(Into::into)
            .ok_or_else(|| not_found!("stage {} not found", stage_id))
    }

    #[tracing::instrument(name = "update stage", skip(self))]
    pub async fn update_stage(&self, stage_id: i32, update: StageUpdate) -> StoreResult<Stage> {
        let model = stage::Entity::find_by_id(stage_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| not_found!("stage {} not found", stage_id))?;

        let mut active: stage::ActiveModel = model.into();
        if let Some(code) = update.code {
            let code = normalize_code("stage code", &code)?;
            let taken = stage::Entity::find()
                .filter(stage::Column::Code.eq(&code))
                .filter(stage::Column::Id.ne(stage_id))
                .one(&self.db)
                .await?;
            if taken.is_some() {
                return Err(conflict!("stage {} already exists", code));
            }
            active.code = Set(code);
        }
        if let Some(name) = update.name {
            active.name = Set(name);
        }
        if let Some(display_order) = update.display_order {
            active.display_order = Set(display_order);
        }

        let model = active.update(&self.db).await?;
        Ok(model.into())
    }

    /// Removes the stage together with its sections, assignments, revenues
    /// and payments.
    #[tracing::instrument(name = "delete stage", skip(self))]
    pub async fn delete_stage(&self, stage_id: i32) -> StoreResult<()> {
        let txn = self.db.begin().await?;

        let deleted = stage::Entity::delete_by_id(stage_id).exec(&txn).await?;
        if deleted.rows_affected == 0 {
            return Err(not_found!("stage {} not found", stage_id));
        }

        teacher_payment::Entity::delete_many()
            .filter(teacher_payment::Column::StageId.eq(stage_id))
            .exec(&txn)
            .await?;
        section_revenue::Entity::delete_many()
            .filter(section_revenue::Column::StageId.eq(stage_id))
            .exec(&txn)
            .await?;
        teacher_assignment::Entity::delete_many()
            .filter(teacher_assignment::Column::StageId.eq(stage_id))
            .exec(&txn)
            .await?;
        section::Entity::delete_many()
            .filter(section::Column::StageId.eq(stage_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }

    #[tracing::instrument(name = "create section", skip(self))]
    pub async fn create_section(&self, input: NewSection) -> StoreResult<Section> {
        let code = normalize_code("section code", &input.code)?;
        stage::Entity::find_by_id(input.stage_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| not_found!("stage {} not found", input.stage_id))?;

        let existing = section::Entity::find()
            .filter(section::Column::StageId.eq(input.stage_id))
            .filter(section::Column::Code.eq(&code))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(conflict!(
                "section {} already exists in stage {}",
                code,
                input.stage_id
            ));
        }

        let model = section::ActiveModel {
            stage_id: Set(input.stage_id),
            code: Set(code),
            name: Set(input.name),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(model.into())
    }

    pub async fn list_sections(&self, stage_id: Option<i32>) -> StoreResult<Vec<Section>> {
        let mut query = section::Entity::find();
        if let Some(stage_id) = stage_id {
            query = query.filter(section::Column::StageId.eq(stage_id));
        }
        let sections = query
            .order_by_asc(section::Column::StageId)
            .order_by_asc(section::Column::Id)
            .all(&self.db)
            .await?;
        Ok(sections.into_iter().map(Into::into).collect())
    }

    /// Removes the section with its revenues and payments. Assignments bound
    /// to it are removed as well.
    #[tracing::instrument(name = "delete section", skip(self))]
    pub async fn delete_section(&self, section_id: i32) -> StoreResult<()> {
        let txn = self.db.begin().await?;

        let deleted = section::Entity::delete_by_id(section_id).exec(&txn).await?;
        if deleted.rows_affected == 0 {
            return Err(not_found!("section {} not found", section_id));
        }

        teacher_payment::Entity::delete_many()
            .filter(teacher_payment::Column::SectionId.eq(section_id))
            .exec(&txn)
            .await?;
        section_revenue::Entity::delete_many()
            .filter(section_revenue::Column::SectionId.eq(section_id))
            .exec(&txn)
            .await?;
        teacher_assignment::Entity::delete_many()
            .filter(teacher_assignment::Column::SectionId.eq(section_id))
            .exec(&txn)
            .await?;

        txn.commit().await?;
        Ok(())
    }

    #[tracing::instrument(name = "create subject", skip(self))]
    pub async fn create_subject(&self, input: NewSubject) -> StoreResult<Subject> {
        let code = normalize_code("subject code", &input.code)?;
        let existing = subject::Entity::find()
            .filter(subject::Column::Code.eq(&code))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(conflict!("subject {} already exists", code));
        }

        let model = subject::ActiveModel {
            code: Set(code),
            name: Set(input.name),
            is_common: Set(input.is_common),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(model.into())
    }

    pub async fn list_subjects(&self) -> StoreResult<Vec<Subject>> {
        let subjects = subject::Entity::find()
            .order_by_asc(subject::Column::Code)
            .all(&self.db)
            .await?;
        Ok(subjects.into_iter().map(Into::into).collect())
    }

    /// Refused while assignments still reference the subject.
    #[tracing::instrument(name = "delete subject", skip(self))]
    pub async fn delete_subject(&self, subject_id: i32) -> StoreResult<()> {
        let in_use = teacher_assignment::Entity::find()
            .filter(teacher_assignment::Column::SubjectId.eq(subject_id))
            .count(&self.db)
            .await?;
        if in_use > 0 {
            return Err(conflict!(
                "subject {} is used by {} assignments",
                subject_id,
                in_use
            ));
        }

        let deleted = subject::Entity::delete_by_id(subject_id)
            .exec(&self.db)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(not_found!("subject {} not found", subject_id));
        }
        Ok(())
    }

    /// Marks subjects common or section-specific in bulk, by code.
    #[tracing::instrument(name = "set subjects common", skip(self))]
    pub async fn set_subjects_common(&self, codes: &[String], is_common: bool) -> StoreResult<u64> {
        let codes: Vec<String> = codes.iter().map(|c| c.trim().to_uppercase()).collect();
        let result = subject::Entity::update_many()
            .col_expr(subject::Column::IsCommon, Expr::value(is_common))
            .filter(subject::Column::Code.is_in(codes))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
