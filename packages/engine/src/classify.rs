//! Library display-name classifier.
//!
//! Library names follow `<stage>-<subject>[-<section indicator>]-<rest>`,
//! e.g. `S1-MATH-EN-P0046-Teacher`. The classifier turns them into
//! `(stage, section, subject)` codes. It never fails loudly: anything it
//! cannot read comes back as `None` fields so the caller can report the
//! library as unmatched.

use std::sync::LazyLock;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Leading `(OLD)`, `[0LD]`, ... qualifier.
static BRACKET_QUALIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[\(\[][^\)\]]*[\)\]]\s*").expect("valid regex"));

/// Bare leading retired marker, e.g. `OLD-S1-...` or `0ld S1-...`.
static BARE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:OLD|0LD)(?:[\s_]+|-+)").expect("valid regex"));

static HYPHEN_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-+").expect("valid regex"));

static STAGE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][0-9]+$").expect("valid regex"));

/// Spelling variants seen in library names, mapped to canonical codes.
const SUBJECT_ALIASES: &[(&str, &str)] = &[
    ("ARABIC", "AR"),
    ("ENGLISH", "EN"),
    ("HISTORY", "HX"),
    ("HIST", "HX"),
    ("S.S", "SS"),
    ("SOCIAL", "SS"),
    ("SOC", "SS"),
    ("GEOGRAPHY", "GEO"),
    ("CHEM", "CH"),
    ("CHEMISTRY", "CH"),
    ("BIOLOGY", "BIO"),
    ("PHYSICS", "PHYS"),
    ("PHY", "PHYS"),
    ("MATHS", "MATH"),
    ("SCIENCE", "ISC"),
    ("SCI", "ISC"),
];

/// Subjects with one shared library per stage.
pub const COMMON_SUBJECTS: &[&str] = &["AR", "EN", "HX", "SS", "GEO"];

/// Subjects with one library per (stage, section).
pub const SECTION_SUBJECTS: &[&str] = &["MATH", "ISC", "BIO", "CH", "PHYS"];

/// Subjects spelled across two tokens, e.g. `PURE-MATH`.
const TWO_PART_SUBJECTS: &[(&str, &str, &str)] = &[
    ("PURE", "MATH", "PURE_MATH"),
    ("APPLIED", "MATH", "APPLIED_MATH"),
];

/// Token following a section-specific subject that names the section.
const SECTION_INDICATORS: &[(&str, &str)] = &[("AR", "GEN"), ("EN", "LANG")];

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Common,
    SectionSpecific,
    /// Subject token not in any known list; returned best-effort.
    Unknown,
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryClassification {
    pub stage_code: Option<String>,
    pub section_code: Option<String>,
    pub subject_code: Option<String>,
    pub subject_kind: Option<SubjectKind>,
}

impl LibraryClassification {
    fn unmatched() -> Self {
        Self::default()
    }

    fn matched(stage: &str, section: Option<&str>, subject: &str, kind: SubjectKind) -> Self {
        Self {
            stage_code: Some(stage.to_string()),
            section_code: section.map(str::to_string),
            subject_code: Some(subject.to_string()),
            subject_kind: Some(kind),
        }
    }

    /// Both stage and subject were recognised.
    pub fn is_complete(&self) -> bool {
        self.stage_code.is_some() && self.subject_code.is_some()
    }
}

pub fn canonical_subject(token: &str) -> &str {
    SUBJECT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == token)
        .map(|(_, code)| *code)
        .unwrap_or(token)
}

pub fn is_common_subject(code: &str) -> bool {
    COMMON_SUBJECTS.contains(&code)
}

pub fn section_for_indicator(token: &str) -> Option<&'static str> {
    SECTION_INDICATORS
        .iter()
        .find(|(indicator, _)| *indicator == token)
        .map(|(_, section)| *section)
}

fn two_part_subject(first: &str, second: &str) -> Option<&'static str> {
    let second = canonical_subject(second);
    TWO_PART_SUBJECTS
        .iter()
        .find(|(a, b, _)| *a == first && *b == second)
        .map(|(_, _, code)| *code)
}

fn tokenize(name: &str) -> Vec<String> {
    let name = BRACKET_QUALIFIER.replace(name.trim(), "");
    let name = BARE_MARKER.replace(&name, "");
    HYPHEN_RUN
        .split(&name)
        .map(|token| token.trim().to_uppercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Classifies a library display name into stage, section and subject codes.
pub fn classify(display_name: &str) -> LibraryClassification {
    let tokens = tokenize(display_name);

    if tokens.len() < 2 {
        tracing::warn!("Too few parts to classify '{}': {:?}", display_name, tokens);
        return LibraryClassification::unmatched();
    }

    let stage = tokens[0].as_str();
    if !STAGE_CODE.is_match(stage) {
        tracing::warn!("'{}' is not a stage code in '{}'", stage, display_name);
        return LibraryClassification::unmatched();
    }

    let subject = canonical_subject(&tokens[1]);
    let indicator_at = |index: usize| {
        tokens
            .get(index)
            .and_then(|token| section_for_indicator(token))
    };

    let classification = if is_common_subject(subject) {
        LibraryClassification::matched(stage, None, subject, SubjectKind::Common)
    } else if let Some(joined) = tokens
        .get(2)
        .and_then(|second| two_part_subject(subject, second))
    {
        LibraryClassification::matched(stage, indicator_at(3), joined, SubjectKind::SectionSpecific)
    } else if SECTION_SUBJECTS.contains(&subject) {
        LibraryClassification::matched(
            stage,
            indicator_at(2),
            subject,
            SubjectKind::SectionSpecific,
        )
    } else {
        tracing::warn!(
            "Unknown subject '{}' in '{}', returning it unverified",
            subject,
            display_name
        );
        LibraryClassification::matched(stage, None, subject, SubjectKind::Unknown)
    };

    tracing::debug!(
        "'{}' -> stage={:?}, section={:?}, subject={:?}",
        display_name,
        classification.stage_code,
        classification.section_code,
        classification.subject_code
    );
    classification
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(name: &str) -> (Option<String>, Option<String>, Option<String>) {
        let c = classify(name);
        (c.stage_code, c.section_code, c.subject_code)
    }

    fn some(
        stage: &str,
        section: Option<&str>,
        subject: &str,
    ) -> (Option<String>, Option<String>, Option<String>) {
        (
            Some(stage.to_string()),
            section.map(str::to_string),
            Some(subject.to_string()),
        )
    }

    #[test]
    fn test_common_subjects_have_no_section() {
        assert_eq!(codes("S1-AR-P0046-Zakaria"), some("S1", None, "AR"));
        assert_eq!(codes("S1-EN-P0046-Teacher"), some("S1", None, "EN"));
        assert_eq!(codes("S1-HX-P0046-Teacher"), some("S1", None, "HX"));
        assert_eq!(codes("M2-S.S-Teacher"), some("M2", None, "SS"));
        assert_eq!(codes("J4-history-Teacher"), some("J4", None, "HX"));
        assert_eq!(codes("S2-HIST-Teacher"), some("S2", None, "HX"));
        assert_eq!(codes("S3-SOC-Teacher"), some("S3", None, "SS"));

        for common in COMMON_SUBJECTS {
            let name = format!("S3-{common}-AR-Someone");
            assert_eq!(codes(&name), some("S3", None, common));
            assert_eq!(classify(&name).subject_kind, Some(SubjectKind::Common));
        }
    }

    #[test]
    fn test_section_indicator_follows_subject() {
        assert_eq!(codes("S1-ISC-AR-P0022-Mohamed Sakr"), some("S1", Some("GEN"), "ISC"));
        assert_eq!(codes("S2-BIO-AR-Menna Gamal"), some("S2", Some("GEN"), "BIO"));
        assert_eq!(codes("S1-MATH-EN-Teacher"), some("S1", Some("LANG"), "MATH"));
        assert_eq!(codes("S2-CHEM-EN-Teacher"), some("S2", Some("LANG"), "CH"));

        for subject in SECTION_SUBJECTS {
            assert_eq!(codes(&format!("S1-{subject}-AR-X")), some("S1", Some("GEN"), subject));
            assert_eq!(codes(&format!("S1-{subject}-EN-X")), some("S1", Some("LANG"), subject));
        }
    }

    #[test]
    fn test_section_specific_without_indicator() {
        let c = classify("S1-MATH-P0046-Teacher");
        assert_eq!(c.section_code, None);
        assert_eq!(c.subject_code.as_deref(), Some("MATH"));
        assert_eq!(c.subject_kind, Some(SubjectKind::SectionSpecific));
    }

    #[test]
    fn test_old_prefixes_are_stripped() {
        assert_eq!(codes("(OLD)S1-MATH-EN--Name"), some("S1", Some("LANG"), "MATH"));
        assert_eq!(codes("(0LD)S1-MATH-EN--Shady"), some("S1", Some("LANG"), "MATH"));
        assert_eq!(codes("[old] S2-BIO-AR-Name"), some("S2", Some("GEN"), "BIO"));
        assert_eq!(codes("OLD-S1-AR-Name"), some("S1", None, "AR"));
        assert_eq!(codes("old S1-AR-Name"), some("S1", None, "AR"));
    }

    #[test]
    fn test_two_part_subjects() {
        assert_eq!(codes("S3-PURE-MATH-EN-Teacher"), some("S3", Some("LANG"), "PURE_MATH"));
        assert_eq!(codes("S3-Applied-Maths-AR-Teacher"), some("S3", Some("GEN"), "APPLIED_MATH"));
        assert_eq!(codes("S3-PURE-MATH-Teacher"), some("S3", None, "PURE_MATH"));
    }

    #[test]
    fn test_unknown_subject_is_best_effort() {
        let c = classify("S1-ART-EN-Teacher");
        assert_eq!(c.stage_code.as_deref(), Some("S1"));
        assert_eq!(c.subject_code.as_deref(), Some("ART"));
        assert_eq!(c.section_code, None);
        assert_eq!(c.subject_kind, Some(SubjectKind::Unknown));
    }

    #[test]
    fn test_unparseable_names_return_nothing() {
        for name in ["", "   ", "S1", "Teacher-Name", "1S-MATH-EN", "(OLD)", "---", "SS1-AR-X"] {
            let c = classify(name);
            assert_eq!(c, LibraryClassification::default(), "{name:?}");
            assert!(!c.is_complete());
        }
    }

    #[test]
    fn test_lowercase_and_whitespace_tolerated() {
        assert_eq!(codes("  s1 - math - en - teacher "), some("S1", Some("LANG"), "MATH"));
    }
}
