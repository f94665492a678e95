//! Creates the payout tables from the entity definitions.

use sea_orm::{
    ConnectionTrait, DbErr, EntityTrait, Schema,
    sea_query::{Index, IndexCreateStatement},
};

use crate::entity::{
    financial_period, library_watch_stat, section, section_revenue, stage, subject,
    teacher_assignment, teacher_payment,
};

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

fn indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("ux_sections_stage_code")
            .table(section::Entity)
            .col(section::Column::StageId)
            .col(section::Column::Code)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_assignments_key")
            .table(teacher_assignment::Entity)
            .col(teacher_assignment::Column::LibraryId)
            .col(teacher_assignment::Column::StageId)
            .col(teacher_assignment::Column::SubjectId)
            .col(teacher_assignment::Column::SectionId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_section_revenues_key")
            .table(section_revenue::Entity)
            .col(section_revenue::Column::PeriodId)
            .col(section_revenue::Column::StageId)
            .col(section_revenue::Column::SectionId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_watch_stats_key")
            .table(library_watch_stat::Entity)
            .col(library_watch_stat::Column::LibraryId)
            .col(library_watch_stat::Column::Year)
            .col(library_watch_stat::Column::Month)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ux_payments_period_assignment")
            .table(teacher_payment::Entity)
            .col(teacher_payment::Column::PeriodId)
            .col(teacher_payment::Column::AssignmentId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("ix_payments_period_stage")
            .table(teacher_payment::Entity)
            .col(teacher_payment::Column::PeriodId)
            .col(teacher_payment::Column::StageId)
            .if_not_exists()
            .to_owned(),
    ]
}

/// Idempotent: existing tables and indexes are left untouched.
#[tracing::instrument(name = "bootstrap schema", skip(db))]
pub async fn bootstrap<C: ConnectionTrait>(db: &C) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    // Referenced tables first so foreign keys resolve.
    create_table(db, &schema, stage::Entity).await?;
    create_table(db, &schema, subject::Entity).await?;
    create_table(db, &schema, section::Entity).await?;
    create_table(db, &schema, financial_period::Entity).await?;
    create_table(db, &schema, teacher_assignment::Entity).await?;
    create_table(db, &schema, section_revenue::Entity).await?;
    create_table(db, &schema, library_watch_stat::Entity).await?;
    create_table(db, &schema, teacher_payment::Entity).await?;

    for index in indexes() {
        db.execute(backend.build(&index)).await?;
    }

    tracing::info!("Schema ready");
    Ok(())
}
