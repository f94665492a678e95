//! Teacher assignments and their revenue terms.

use schemars::JsonSchema;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, sea_query::Condition,
};
use serde::{Deserialize, Serialize};
use watchpay::{Assignment, AssignmentDraft, LibraryId, error::validate_rate};

use crate::{
    Store, bad_request, conflict,
    entity::{section, stage, subject, teacher_assignment},
    error::StoreResult,
    not_found, now,
};

fn default_revenue_percentage() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewAssignment {
    pub library_id: LibraryId,
    pub library_name: String,
    pub stage_id: i32,
    pub section_id: Option<i32>,
    pub subject_id: i32,
    #[serde(default)]
    pub tax_rate: f64,
    #[serde(default = "default_revenue_percentage")]
    pub revenue_percentage: f64,
}

impl From<AssignmentDraft> for NewAssignment {
    fn from(draft: AssignmentDraft) -> Self {
        Self {
            library_id: draft.library_id,
            library_name: draft.library_name,
            stage_id: draft.stage_id,
            section_id: draft.section_id,
            subject_id: draft.subject_id,
            tax_rate: draft.tax_rate,
            revenue_percentage: draft.revenue_percentage,
        }
    }
}

/// `section_id: Some(None)` detaches the assignment from its section.
#[derive(Debug, Clone, Default)]
pub struct AssignmentUpdate {
    pub tax_rate: Option<f64>,
    pub revenue_percentage: Option<f64>,
    pub section_id: Option<Option<i32>>,
}

fn key_condition(
    library_id: LibraryId,
    stage_id: i32,
    subject_id: i32,
    section_id: Option<i32>,
) -> Condition {
    let section = match section_id {
        Some(id) => teacher_assignment::Column::SectionId.eq(id),
        None => teacher_assignment::Column::SectionId.is_null(),
    };
    Condition::all()
        .add(teacher_assignment::Column::LibraryId.eq(library_id))
        .add(teacher_assignment::Column::StageId.eq(stage_id))
        .add(teacher_assignment::Column::SubjectId.eq(subject_id))
        .add(section)
}

async fn ensure_section_in_stage<C: ConnectionTrait>(
    db: &C,
    section_id: i32,
    stage_id: i32,
) -> StoreResult<()> {
    let section = section::Entity::find_by_id(section_id)
        .one(db)
        .await?
        .ok_or_else(|| not_found!("section {} not found", section_id))?;
    if section.stage_id != stage_id {
        return Err(bad_request!(
            "section {} does not belong to stage {}",
            section_id,
            stage_id
        ));
    }
    Ok(())
}

/// A section-specific subject may only go without a section while its stage
/// has no sections yet.
async fn ensure_section_allowed<C: ConnectionTrait>(
    db: &C,
    subject: &subject::Model,
    stage_id: i32,
    section_id: Option<i32>,
) -> StoreResult<()> {
    match section_id {
        Some(id) => ensure_section_in_stage(db, id, stage_id).await,
        None if subject.is_common => Ok(()),
        None => {
            let sections = section::Entity::find()
                .filter(section::Column::StageId.eq(stage_id))
                .count(db)
                .await?;
            if sections > 0 {
                return Err(bad_request!(
                    "subject {} needs a section because stage {} has sections",
                    subject.code,
                    stage_id
                ));
            }
            Ok(())
        }
    }
}

/// Validates and inserts one assignment. Shared by the single-item path and
/// the auto-match batch, which runs it inside a transaction.
pub(crate) async fn insert_assignment<C: ConnectionTrait>(
    db: &C,
    input: NewAssignment,
) -> StoreResult<Assignment> {
    validate_rate("tax_rate", input.tax_rate)?;
    validate_rate("revenue_percentage", input.revenue_percentage)?;

    stage::Entity::find_by_id(input.stage_id)
        .one(db)
        .await?
        .ok_or_else(|| not_found!("stage {} not found", input.stage_id))?;
    let subject = subject::Entity::find_by_id(input.subject_id)
        .one(db)
        .await?
        .ok_or_else(|| not_found!("subject {} not found", input.subject_id))?;
    ensure_section_allowed(db, &subject, input.stage_id, input.section_id).await?;

    let existing = teacher_assignment::Entity::find()
        .filter(key_condition(
            input.library_id,
            input.stage_id,
            input.subject_id,
            input.section_id,
        ))
        .one(db)
        .await?;
    if existing.is_some() {
        return Err(conflict!(
            "library {} is already assigned to stage {}, subject {}, section {:?}",
            input.library_id,
            input.stage_id,
            input.subject_id,
            input.section_id
        ));
    }

    let now = now();
    let model = teacher_assignment::ActiveModel {
        library_id: Set(input.library_id),
        library_name: Set(input.library_name),
        stage_id: Set(input.stage_id),
        section_id: Set(input.section_id),
        subject_id: Set(input.subject_id),
        tax_rate: Set(input.tax_rate),
        revenue_percentage: Set(input.revenue_percentage),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(model.into())
}

pub(crate) async fn assignments_for_stage<C: ConnectionTrait>(
    db: &C,
    stage_id: Option<i32>,
) -> StoreResult<Vec<Assignment>> {
    let mut query = teacher_assignment::Entity::find();
    if let Some(stage_id) = stage_id {
        query = query.filter(teacher_assignment::Column::StageId.eq(stage_id));
    }
    let assignments = query
        .order_by_asc(teacher_assignment::Column::Id)
        .all(db)
        .await?;
    Ok(assignments.into_iter().map(Into::into).collect())
}

impl Store {
    #[tracing::instrument(name = "create assignment", skip(self))]
    pub async fn create_assignment(&self, input: NewAssignment) -> StoreResult<Assignment> {
        insert_assignment(&self.db, input).await
    }

    pub async fn list_assignments(&self, stage_id: Option<i32>) -> StoreResult<Vec<Assignment>> {
        assignments_for_stage(&self.db, stage_id).await
    }

    #[tracing::instrument(name = "update assignment", skip(self))]
    pub async fn update_assignment(
        &self,
        assignment_id: i32,
        update: AssignmentUpdate,
    ) -> StoreResult<Assignment> {
        let model = teacher_assignment::Entity::find_by_id(assignment_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| not_found!("assignment {} not found", assignment_id))?;

        let (library_id, stage_id, subject_id) =
            (model.library_id, model.stage_id, model.subject_id);
        let mut active: teacher_assignment::ActiveModel = model.into();

        if let Some(tax_rate) = update.tax_rate {
            active.tax_rate = Set(validate_rate("tax_rate", tax_rate)?);
        }
        if let Some(revenue_percentage) = update.revenue_percentage {
            active.revenue_percentage =
                Set(validate_rate("revenue_percentage", revenue_percentage)?);
        }
        if let Some(section_id) = update.section_id {
            let subject = subject::Entity::find_by_id(subject_id)
                .one(&self.db)
                .await?
                .ok_or_else(|| not_found!("subject {} not found", subject_id))?;
            ensure_section_allowed(&self.db, &subject, stage_id, section_id).await?;
            let taken = teacher_assignment::Entity::find()
                .filter(key_condition(library_id, stage_id, subject_id, section_id))
                .filter(teacher_assignment::Column::Id.ne(assignment_id))
                .one(&self.db)
                .await?;
            if taken.is_some() {
                return Err(conflict!(
                    "library {} is already assigned to section {:?}",
                    library_id,
                    section_id
                ));
            }
            active.section_id = Set(section_id);
        }
        active.updated_at = Set(now());

        let model = active.update(&self.db).await?;
        Ok(model.into())
    }

    #[tracing::instrument(name = "delete assignment", skip(self))]
    pub async fn delete_assignment(&self, assignment_id: i32) -> StoreResult<()> {
        let deleted = teacher_assignment::Entity::delete_by_id(assignment_id)
            .exec(&self.db)
            .await?;
        if deleted.rows_affected == 0 {
            return Err(not_found!("assignment {} not found", assignment_id));
        }
        Ok(())
    }
}
