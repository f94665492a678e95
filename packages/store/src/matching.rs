use sea_orm::{EntityTrait, TransactionTrait};
use watchpay::{LibraryRef, MatchReport, Section, Stage, Subject, match_libraries};

use crate::{
    Store,
    assignments::{assignments_for_stage, insert_assignment},
    entity::{section, stage, subject},
    error::StoreResult,
};

impl Store {
    /// Matches platform libraries to assignments and persists the new ones.
    ///
    /// Reference data is read and drafts are written in one transaction, so
    /// either every proposed assignment is created or none is.
    #[tracing::instrument(
        name = "auto match libraries",
        skip(self, libraries),
        fields(count = libraries.len())
    )]
    pub async fn auto_match(&self, libraries: &[LibraryRef]) -> StoreResult<MatchReport> {
        let txn = self.db.begin().await?;

        let stages: Vec<Stage> = stage::Entity::find()
            .all(&txn)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        let sections: Vec<Section> = section::Entity::find()
            .all(&txn)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        let subjects: Vec<Subject> = subject::Entity::find()
            .all(&txn)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        let existing = assignments_for_stage(&txn, None).await?;

        let report = match_libraries(libraries, &stages, &sections, &subjects, &existing);
        for draft in &report.drafts {
            insert_assignment(&txn, draft.clone().into()).await?;
        }
        txn.commit().await?;

        Ok(report)
    }

    /// Matching preview without writing anything.
    pub async fn preview_match(&self, libraries: &[LibraryRef]) -> StoreResult<MatchReport> {
        let stages: Vec<Stage> = self.list_stages().await?;
        let sections = self.list_sections(None).await?;
        let subjects = self.list_subjects().await?;
        let existing = self.list_assignments(None).await?;
        Ok(match_libraries(libraries, &stages, &sections, &subjects, &existing))
    }
}
