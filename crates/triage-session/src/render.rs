//! Deterministic text rendering of classified replies.
//!
//! Diagnosis field order: condition, probability, severity, then the
//! recommendation, test, medication, lifestyle, and precaution lists, then the
//! home remedy. Empty lists are left out.

use std::fmt::Write;

use crate::classify::{Diagnosis, ServerResponse};

/// Shown when the server could not reach a conclusion.
pub const INCONCLUSIVE_ADVISORY: &str = "Unable to determine the condition conclusively. \
Please consult a qualified doctor for further evaluation.";

/// Render a classified reply as the text revealed to the user.
pub fn render(response: &ServerResponse) -> String {
    match response {
        ServerResponse::Question(question) => question.clone(),
        ServerResponse::Diagnosis {
            diagnosis,
            home_remedy,
        } => render_diagnosis(diagnosis, home_remedy),
        ServerResponse::DietPlan(plan) => format!("Diet plan:\n{}", plan.trim()),
        ServerResponse::Inconclusive => INCONCLUSIVE_ADVISORY.to_string(),
    }
}

fn render_diagnosis(diagnosis: &Diagnosis, home_remedy: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Condition: {}", diagnosis.condition_label());
    if let Some(p) = diagnosis.probability {
        let _ = writeln!(out, "Probability: {}%", percent(p));
    }
    if let Some(score) = diagnosis.severity_score {
        let _ = writeln!(out, "Severity score: {}", trim_float(score));
    }

    let sections: [(&str, &[String]); 5] = [
        ("Recommendations", diagnosis.recommendations.as_slice()),
        ("Medical tests", diagnosis.medical_tests.as_slice()),
        ("Medication", diagnosis.medication.as_slice()),
        ("Lifestyle", diagnosis.lifestyle.as_slice()),
        ("Precautions", diagnosis.precautions.as_slice()),
    ];
    for (label, items) in sections {
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{}:", label);
        for item in items {
            let _ = writeln!(out, "  - {}", item);
        }
    }

    let _ = write!(out, "Home remedy: {}", home_remedy.trim());
    out
}

/// Probability in `[0, 1]` as a whole percentage.
fn percent(probability: f64) -> u32 {
    (probability.clamp(0.0, 1.0) * 100.0).round() as u32
}

fn trim_float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.1}", value)
    }
}
