//! Auto-matching of video libraries to teacher assignments.

use std::collections::{HashMap, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    classify::classify,
    model::{Assignment, LibraryId, Section, Stage, Subject},
};

/// A library as listed by the video platform.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq, Eq)]
pub struct LibraryRef {
    pub id: LibraryId,
    pub name: String,
}

/// An assignment that matching wants created.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct AssignmentDraft {
    pub library_id: LibraryId,
    pub library_name: String,
    pub stage_id: i32,
    pub section_id: Option<i32>,
    pub subject_id: i32,
    pub tax_rate: f64,
    pub revenue_percentage: f64,
}

impl AssignmentDraft {
    fn new(
        library: &LibraryRef,
        stage_id: i32,
        section_id: Option<i32>,
        subject_id: i32,
    ) -> Self {
        Self {
            library_id: library.id,
            library_name: library.name.clone(),
            stage_id,
            section_id,
            subject_id,
            tax_rate: 0.0,
            revenue_percentage: 1.0,
        }
    }

    fn key(&self) -> AssignmentKey {
        (self.library_id, self.stage_id, self.subject_id, self.section_id)
    }
}

type AssignmentKey = (LibraryId, i32, i32, Option<i32>);

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub library_id: LibraryId,
    pub library_name: String,
    pub stage_code: Option<String>,
    pub section_code: Option<String>,
    pub subject_code: Option<String>,
    pub matched: bool,
    pub message: String,
    pub assignments_created: usize,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct MatchReport {
    pub total_libraries: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub results: Vec<MatchResult>,
    pub drafts: Vec<AssignmentDraft>,
}

struct ReferenceData<'a> {
    stages: HashMap<&'a str, &'a Stage>,
    subjects: HashMap<&'a str, &'a Subject>,
    sections: HashMap<(i32, &'a str), &'a Section>,
    sections_by_stage: HashMap<i32, Vec<&'a Section>>,
}

impl<'a> ReferenceData<'a> {
    fn new(stages: &'a [Stage], sections: &'a [Section], subjects: &'a [Subject]) -> Self {
        let mut sections_by_stage: HashMap<i32, Vec<&Section>> = HashMap::new();
        for section in sections {
            sections_by_stage.entry(section.stage_id).or_default().push(section);
        }
        for stage_sections in sections_by_stage.values_mut() {
            stage_sections.sort_by_key(|s| s.id);
        }

        Self {
            stages: stages.iter().map(|s| (s.code.as_str(), s)).collect(),
            subjects: subjects.iter().map(|s| (s.code.as_str(), s)).collect(),
            sections: sections
                .iter()
                .map(|s| ((s.stage_id, s.code.as_str()), s))
                .collect(),
            sections_by_stage,
        }
    }
}

/// Classifies every library and proposes the assignments it implies.
///
/// Common subjects get one assignment per section of their stage (or a
/// single section-less one while the stage has no sections). Libraries
/// that cannot be matched are reported, never dropped silently.
pub fn match_libraries(
    libraries: &[LibraryRef],
    stages: &[Stage],
    sections: &[Section],
    subjects: &[Subject],
    existing: &[Assignment],
) -> MatchReport {
    let reference = ReferenceData::new(stages, sections, subjects);
    let mut known: HashSet<AssignmentKey> = existing
        .iter()
        .map(|a| (a.library_id, a.stage_id, a.subject_id, a.section_id))
        .collect();

    let mut report = MatchReport {
        total_libraries: libraries.len(),
        ..Default::default()
    };

    for library in libraries {
        let classification = classify(&library.name);
        let mut result = MatchResult {
            library_id: library.id,
            library_name: library.name.clone(),
            stage_code: classification.stage_code.clone(),
            section_code: classification.section_code.clone(),
            subject_code: classification.subject_code.clone(),
            matched: false,
            message: String::new(),
            assignments_created: 0,
        };

        let (Some(stage_code), Some(subject_code)) = (
            classification.stage_code.as_deref(),
            classification.subject_code.as_deref(),
        ) else {
            result.message = "could not parse library name".to_string();
            report.results.push(result);
            continue;
        };

        let Some(stage) = reference.stages.get(stage_code) else {
            result.message = format!("stage {} not found", stage_code);
            report.results.push(result);
            continue;
        };

        let Some(subject) = reference.subjects.get(subject_code) else {
            result.message = format!("subject {} not found", subject_code);
            report.results.push(result);
            continue;
        };

        let drafts: Vec<AssignmentDraft> = if subject.is_common {
            match reference.sections_by_stage.get(&stage.id) {
                Some(stage_sections) if !stage_sections.is_empty() => stage_sections
                    .iter()
                    .map(|section| {
                        AssignmentDraft::new(library, stage.id, Some(section.id), subject.id)
                    })
                    .collect(),
                _ => vec![AssignmentDraft::new(library, stage.id, None, subject.id)],
            }
        } else {
            let Some(section_code) = classification.section_code.as_deref() else {
                result.message = format!("no section indicator for subject {}", subject_code);
                report.results.push(result);
                continue;
            };
            let Some(section) = reference.sections.get(&(stage.id, section_code)) else {
                result.message = format!(
                    "section {} not found for stage {}",
                    section_code, stage_code
                );
                report.results.push(result);
                continue;
            };
            vec![AssignmentDraft::new(library, stage.id, Some(section.id), subject.id)]
        };

        let fresh: Vec<AssignmentDraft> = drafts
            .into_iter()
            .filter(|draft| known.insert(draft.key()))
            .collect();

        result.matched = true;
        result.assignments_created = fresh.len();
        result.message = if fresh.is_empty() {
            "already assigned".to_string()
        } else {
            format!("matched ({} assignments)", fresh.len())
        };
        report.drafts.extend(fresh);
        report.results.push(result);
    }

    report.matched = report.results.iter().filter(|r| r.matched).count();
    report.unmatched = report.total_libraries - report.matched;

    tracing::info!(
        "Matched {}/{} libraries, {} new assignments",
        report.matched,
        report.total_libraries,
        report.drafts.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stages() -> Vec<Stage> {
        vec![Stage {
            id: 1,
            code: "S1".into(),
            name: "Senior 1".into(),
            display_order: 1,
        }]
    }

    fn sections() -> Vec<Section> {
        vec![
            Section {
                id: 10,
                stage_id: 1,
                code: "GEN".into(),
                name: "General".into(),
            },
            Section {
                id: 11,
                stage_id: 1,
                code: "LANG".into(),
                name: "Language".into(),
            },
        ]
    }

    fn subjects() -> Vec<Subject> {
        vec![
            Subject {
                id: 1,
                code: "AR".into(),
                name: "Arabic".into(),
                is_common: true,
            },
            Subject {
                id: 2,
                code: "MATH".into(),
                name: "Mathematics".into(),
                is_common: false,
            },
        ]
    }

    fn lib(id: LibraryId, name: &str) -> LibraryRef {
        LibraryRef {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_common_subject_creates_one_assignment_per_section() {
        let report = match_libraries(
            &[lib(1, "S1-AR-P0046-Zakaria")],
            &stages(),
            &sections(),
            &subjects(),
            &[],
        );
        assert_eq!(report.matched, 1);
        let sections: Vec<Option<i32>> = report.drafts.iter().map(|d| d.section_id).collect();
        assert_eq!(sections, vec![Some(10), Some(11)]);
        assert!(report.drafts.iter().all(|d| d.tax_rate == 0.0 && d.revenue_percentage == 1.0));
    }

    #[test]
    fn test_common_subject_without_sections_is_section_less() {
        let report = match_libraries(&[lib(1, "S1-AR-X")], &stages(), &[], &subjects(), &[]);
        assert_eq!(report.drafts.len(), 1);
        assert_eq!(report.drafts[0].section_id, None);
    }

    #[test]
    fn test_section_specific_uses_indicator() {
        let report = match_libraries(
            &[lib(2, "(OLD)S1-MATH-EN--Name")],
            &stages(),
            &sections(),
            &subjects(),
            &[],
        );
        assert_eq!(report.drafts.len(), 1);
        assert_eq!(report.drafts[0].section_id, Some(11));
        assert_eq!(report.drafts[0].subject_id, 2);
    }

    #[test]
    fn test_unmatched_libraries_are_reported() {
        let report = match_libraries(
            &[
                lib(1, "garbage"),
                lib(2, "M2-AR-X"),
                lib(3, "S1-BIO-AR-X"),
                lib(4, "S1-MATH-X"),
            ],
            &stages(),
            &sections(),
            &subjects(),
            &[],
        );
        assert_eq!(report.total_libraries, 4);
        assert_eq!(report.matched, 0);
        assert_eq!(report.unmatched, 4);
        let messages: Vec<&str> = report.results.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "could not parse library name",
                "stage M2 not found",
                "subject BIO not found",
                "no section indicator for subject MATH",
            ]
        );
        assert!(report.drafts.is_empty());
    }

    #[test]
    fn test_missing_section_for_stage() {
        let only_gen: Vec<Section> = sections().into_iter().filter(|s| s.code == "GEN").collect();
        let report = match_libraries(
            &[lib(5, "S1-MATH-EN-X")],
            &stages(),
            &only_gen,
            &subjects(),
            &[],
        );
        assert_eq!(report.results[0].message, "section LANG not found for stage S1");
    }

    #[test]
    fn test_existing_assignments_are_not_duplicated() {
        let existing = vec![Assignment {
            id: 1,
            library_id: 2,
            library_name: "S1-MATH-AR-X".into(),
            stage_id: 1,
            section_id: Some(10),
            subject_id: 2,
            tax_rate: 0.1,
            revenue_percentage: 0.9,
        }];
        let report = match_libraries(
            &[lib(2, "S1-MATH-AR-X"), lib(2, "S1-MATH-AR-X")],
            &stages(),
            &sections(),
            &subjects(),
            &existing,
        );
        assert_eq!(report.matched, 2);
        assert!(report.drafts.is_empty());
        assert_eq!(report.results[0].message, "already assigned");
    }
}
