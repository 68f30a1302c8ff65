//! Response classification.
//!
//! Maps a raw server payload onto exactly one reply variant, in strict
//! precedence order:
//! 1. `question` present -> Question (all other fields ignored)
//! 2. `diagnosis` and `home_remedy` present -> Diagnosis
//! 3. `diagnosis` absent and `diet_plan` present -> DietPlan
//! 4. anything else -> Inconclusive
//!
//! A payload carrying `diagnosis` and `diet_plan` but no `home_remedy` is
//! Inconclusive.

use std::fmt;

use triage_core::error::TriageError;
use triage_core::types::{RawDiagnosis, RawResponse, UNKNOWN_CONDITION};

/// A diagnosis as shown to the user, with list fields normalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnosis {
    pub condition: Option<String>,
    /// Confidence in `[0, 1]`.
    pub probability: Option<f64>,
    pub severity_score: Option<f64>,
    pub recommendations: Vec<String>,
    pub medical_tests: Vec<String>,
    pub medication: Vec<String>,
    pub lifestyle: Vec<String>,
    pub precautions: Vec<String>,
}

impl Diagnosis {
    fn from_raw(raw: RawDiagnosis, severity_score: Option<f64>) -> Self {
        Self {
            condition: raw.condition.filter(|c| !c.trim().is_empty()),
            probability: raw.probability,
            severity_score,
            recommendations: non_blank(raw.recommendations),
            medical_tests: non_blank(raw.medical_tests),
            medication: non_blank(raw.medication),
            lifestyle: non_blank(raw.lifestyle),
            precautions: non_blank(raw.precautions),
        }
    }

    /// The condition name, or `"Unknown"` when the server omitted it.
    pub fn condition_label(&self) -> &str {
        self.condition.as_deref().unwrap_or(UNKNOWN_CONDITION)
    }
}

fn non_blank(items: Option<Vec<String>>) -> Vec<String> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// A classified server reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerResponse {
    /// The server needs more information.
    Question(String),
    /// Intake finished with a diagnosis.
    Diagnosis {
        diagnosis: Diagnosis,
        home_remedy: String,
    },
    /// The diet sub-dialogue finished.
    DietPlan(String),
    /// No usable branch was populated.
    Inconclusive,
}

/// Discriminant of [`ServerResponse`], carried in events and state decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Question,
    Diagnosis,
    DietPlan,
    Inconclusive,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseKind::Question => write!(f, "question"),
            ResponseKind::Diagnosis => write!(f, "diagnosis"),
            ResponseKind::DietPlan => write!(f, "diet_plan"),
            ResponseKind::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

impl ServerResponse {
    pub fn kind(&self) -> ResponseKind {
        match self {
            ServerResponse::Question(_) => ResponseKind::Question,
            ServerResponse::Diagnosis { .. } => ResponseKind::Diagnosis,
            ServerResponse::DietPlan(_) => ResponseKind::DietPlan,
            ServerResponse::Inconclusive => ResponseKind::Inconclusive,
        }
    }
}

/// Classify a raw payload. Deterministic.
///
/// Only the fields of the branch being taken are decoded. A value of the wrong
/// shape in one of those fields is a `MalformedResponse`; the same value in a
/// field the branch never reads is ignored.
pub fn classify(raw: RawResponse) -> Result<ServerResponse, TriageError> {
    if let Some(question) = raw.question()? {
        return Ok(ServerResponse::Question(question));
    }

    let has_diagnosis = raw.is_present(RawResponse::DIAGNOSIS);
    if has_diagnosis && raw.is_present(RawResponse::HOME_REMEDY) {
        if let (Some(diagnosis), Some(home_remedy)) = (raw.diagnosis()?, raw.home_remedy()?) {
            return Ok(ServerResponse::Diagnosis {
                diagnosis: Diagnosis::from_raw(diagnosis, raw.severity_score()?),
                home_remedy,
            });
        }
    }

    if !has_diagnosis {
        if let Some(plan) = raw.diet_plan()? {
            return Ok(ServerResponse::DietPlan(plan));
        }
    }

    Ok(ServerResponse::Inconclusive)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diag(condition: Option<&str>) -> RawDiagnosis {
        RawDiagnosis {
            condition: condition.map(str::to_string),
            probability: Some(0.82),
            ..Default::default()
        }
    }

    fn json(body: &str) -> RawResponse {
        serde_json::from_str(body).unwrap()
    }

    // =====================================================================
    // Precedence
    // =====================================================================

    #[test]
    fn test_question_only() {
        let raw = RawResponse::new().with_question("How long have you had these symptoms?");
        assert_eq!(
            classify(raw).unwrap(),
            ServerResponse::Question("How long have you had these symptoms?".into())
        );
    }

    #[test]
    fn test_question_wins_over_everything() {
        let raw = RawResponse::new()
            .with_question("Any fever?")
            .with_diagnosis(diag(Some("Influenza")))
            .with_severity_score(3.0)
            .with_home_remedy("Rest")
            .with_diet_plan("Soup");
        assert_eq!(classify(raw).unwrap().kind(), ResponseKind::Question);
    }

    #[test]
    fn test_question_ignores_badly_shaped_fields() {
        for body in [
            r#"{"question": "How long?", "diagnosis": {"condition": "Flu", "probability": "high"}}"#,
            r#"{"question": "How long?", "diagnosis": "pending"}"#,
            r#"{"question": "How long?", "severity_score": "moderate"}"#,
        ] {
            assert_eq!(
                classify(json(body)).unwrap(),
                ServerResponse::Question("How long?".into()),
                "{}",
                body
            );
        }
    }

    #[test]
    fn test_non_string_question_is_malformed() {
        let err = classify(json(r#"{"question": 7, "diet_plan": "Soup"}"#)).unwrap_err();
        assert!(matches!(err, TriageError::MalformedResponse(ref m) if m.starts_with("question")));
    }

    #[test]
    fn test_empty_question_string_still_a_question() {
        let raw = RawResponse::new().with_question("").with_home_remedy("Rest");
        assert_eq!(classify(raw).unwrap(), ServerResponse::Question(String::new()));
    }

    #[test]
    fn test_diagnosis_with_remedy() {
        let raw = RawResponse::new()
            .with_diagnosis(diag(Some("Influenza")))
            .with_home_remedy("Rest and fluids");
        match classify(raw).unwrap() {
            ServerResponse::Diagnosis {
                diagnosis,
                home_remedy,
            } => {
                assert_eq!(diagnosis.condition_label(), "Influenza");
                assert_eq!(diagnosis.probability, Some(0.82));
                assert_eq!(home_remedy, "Rest and fluids");
            }
            other => panic!("expected diagnosis, got {:?}", other),
        }
    }

    #[test]
    fn test_badly_shaped_diagnosis_is_malformed_when_used() {
        for body in [
            r#"{"diagnosis": {"condition": "Flu", "probability": "high"}, "home_remedy": "Rest"}"#,
            r#"{"diagnosis": "pending", "home_remedy": "Rest"}"#,
            r#"{"diagnosis": {"condition": "Flu"}, "home_remedy": "Rest", "severity_score": "moderate"}"#,
        ] {
            assert!(
                matches!(classify(json(body)), Err(TriageError::MalformedResponse(_))),
                "{}",
                body
            );
        }
    }

    #[test]
    fn test_badly_shaped_diagnosis_without_remedy_is_inconclusive() {
        let raw = json(r#"{"diagnosis": "pending", "severity_score": "moderate"}"#);
        assert_eq!(classify(raw).unwrap(), ServerResponse::Inconclusive);
    }

    #[test]
    fn test_diagnosis_wins_over_diet_plan_when_remedy_present() {
        let raw = RawResponse::new()
            .with_diagnosis(diag(Some("Influenza")))
            .with_home_remedy("Rest")
            .with_diet_plan("Soup");
        assert_eq!(classify(raw).unwrap().kind(), ResponseKind::Diagnosis);
    }

    #[test]
    fn test_diagnosis_without_remedy_is_inconclusive() {
        let raw = RawResponse::new().with_diagnosis(diag(Some("Influenza")));
        assert_eq!(classify(raw).unwrap(), ServerResponse::Inconclusive);
    }

    #[test]
    fn test_diagnosis_and_diet_plan_without_remedy_is_inconclusive() {
        let raw = RawResponse::new()
            .with_diagnosis(diag(Some("Influenza")))
            .with_diet_plan("Soup");
        assert_eq!(classify(raw).unwrap(), ServerResponse::Inconclusive);
    }

    #[test]
    fn test_diet_plan() {
        let raw = RawResponse::new()
            .with_diet_plan("Light meals")
            .with_home_remedy("ignored");
        assert_eq!(
            classify(raw).unwrap(),
            ServerResponse::DietPlan("Light meals".into())
        );
    }

    #[test]
    fn test_diet_plan_ignores_bad_severity() {
        let raw = json(r#"{"diet_plan": "Light meals", "severity_score": "moderate"}"#);
        assert_eq!(
            classify(raw).unwrap(),
            ServerResponse::DietPlan("Light meals".into())
        );
    }

    #[test]
    fn test_all_absent_is_inconclusive() {
        assert_eq!(classify(RawResponse::new()).unwrap(), ServerResponse::Inconclusive);
    }

    #[test]
    fn test_remedy_alone_is_inconclusive() {
        let raw = RawResponse::new().with_home_remedy("Ginger tea");
        assert_eq!(classify(raw).unwrap(), ServerResponse::Inconclusive);
    }

    // =====================================================================
    // Normalization
    // =====================================================================

    #[test]
    fn test_missing_or_blank_condition_reads_unknown() {
        for condition in [None, Some("  ")] {
            let raw = RawResponse::new()
                .with_diagnosis(diag(condition))
                .with_home_remedy("Rest");
            match classify(raw).unwrap() {
                ServerResponse::Diagnosis { diagnosis, .. } => {
                    assert_eq!(diagnosis.condition_label(), "Unknown");
                }
                other => panic!("expected diagnosis, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_lists_normalized_and_severity_carried() {
        let raw = RawResponse::new()
            .with_diagnosis(RawDiagnosis {
                condition: Some("Migraine".into()),
                medical_tests: Some(vec![" MRI ".into(), "".into()]),
                medication: None,
                precautions: Some(vec!["Avoid bright light".into()]),
                ..Default::default()
            })
            .with_severity_score(6.5)
            .with_home_remedy("Cold compress");
        match classify(raw).unwrap() {
            ServerResponse::Diagnosis { diagnosis, .. } => {
                assert_eq!(diagnosis.medical_tests, vec!["MRI".to_string()]);
                assert!(diagnosis.medication.is_empty());
                assert_eq!(diagnosis.precautions, vec!["Avoid bright light".to_string()]);
                assert_eq!(diagnosis.severity_score, Some(6.5));
            }
            other => panic!("expected diagnosis, got {:?}", other),
        }
    }

    #[test]
    fn test_response_kind_display() {
        assert_eq!(ResponseKind::Question.to_string(), "question");
        assert_eq!(ResponseKind::DietPlan.to_string(), "diet_plan");
    }
}
