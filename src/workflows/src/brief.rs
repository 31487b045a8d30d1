//! Brief construction (§4.4 VOICE variant, GLOSSARY "Brief"): a map of
//! question-id → free-text answer is normalized into a structured brief
//! before it drives template matching and context construction.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::context::ContactInfo;

static SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;]").unwrap());

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Brief {
    pub business_name: Option<String>,
    pub industry: Option<String>,
    pub tagline: Option<String>,
    pub services: Vec<String>,
    pub target_audience: Option<String>,
    pub unique_selling_points: Vec<String>,
    pub contact_info: ContactInfo,
    pub team: Vec<String>,
    pub location: Option<String>,
}

/// Recognized voice-interview question ids. Anything outside this set is
/// ignored rather than rejected, so new interview questions degrade
/// gracefully instead of failing the whole brief.
const Q_BUSINESS_NAME: &str = "business_name";
const Q_INDUSTRY: &str = "industry";
const Q_TAGLINE: &str = "tagline";
const Q_SERVICES: &str = "services";
const Q_TARGET_AUDIENCE: &str = "target_audience";
const Q_UNIQUE_SELLING_POINTS: &str = "unique_selling_points";
const Q_PHONE: &str = "phone";
const Q_EMAIL: &str = "email";
const Q_ADDRESS: &str = "address";
const Q_TEAM: &str = "team";
const Q_LOCATION: &str = "location";

impl Brief {
    /// Processes voice-interview answers into a structured brief (§4.4):
    /// services/USPs/team are split on `[,;]`.
    pub fn from_answers(answers: &HashMap<String, String>) -> Self {
        let get = |id: &str| answers.get(id).map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let split = |id: &str| -> Vec<String> {
            answers
                .get(id)
                .map(|s| {
                    SPLIT_RE
                        .split(s)
                        .map(str::trim)
                        .filter(|part| !part.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        Self {
            business_name: get(Q_BUSINESS_NAME),
            industry: get(Q_INDUSTRY),
            tagline: get(Q_TAGLINE),
            services: split(Q_SERVICES),
            target_audience: get(Q_TARGET_AUDIENCE),
            unique_selling_points: split(Q_UNIQUE_SELLING_POINTS),
            contact_info: ContactInfo {
                phone: get(Q_PHONE),
                email: get(Q_EMAIL),
                address: get(Q_ADDRESS),
            },
            team: split(Q_TEAM),
            location: get(Q_LOCATION),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn services_split_on_comma_and_semicolon() {
        let mut answers = HashMap::new();
        answers.insert(Q_SERVICES.to_string(), "Plumbing, Heating; Electrical".to_string());
        let brief = Brief::from_answers(&answers);
        assert_eq!(brief.services, vec!["Plumbing", "Heating", "Electrical"]);
    }

    #[test]
    fn missing_answers_leave_fields_empty() {
        let answers = HashMap::new();
        let brief = Brief::from_answers(&answers);
        assert!(brief.business_name.is_none());
        assert!(brief.services.is_empty());
    }

    #[test]
    fn blank_answer_is_treated_as_missing() {
        let mut answers = HashMap::new();
        answers.insert(Q_BUSINESS_NAME.to_string(), "   ".to_string());
        let brief = Brief::from_answers(&answers);
        assert!(brief.business_name.is_none());
    }
}
