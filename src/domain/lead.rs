use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

pub const UNKNOWN: &str = "unknown";

pub fn is_unknown(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(UNKNOWN)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateBusiness {
    pub name: String,
    pub industry: String,
    pub location: String,
    pub phone: Vec<String>,
    pub website: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    pub email: String,
    pub decision_maker_name: Option<String>,
    pub decision_maker_role: Option<String>,
    pub profile_url: Option<String>,
}

impl Default for EnrichmentResult {
    fn default() -> Self {
        EnrichmentResult {
            email: UNKNOWN.to_string(),
            decision_maker_name: None,
            decision_maker_role: None,
            profile_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EmailStatus {
    Valid,
    Risky,
    Invalid,
    Missing,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Valid => "VALID",
            EmailStatus::Risky => "RISKY",
            EmailStatus::Invalid => "INVALID",
            EmailStatus::Missing => "MISSING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationOutcome {
    pub status: EmailStatus,
    pub confidence: f64,
}

impl VerificationOutcome {
    pub fn new(status: EmailStatus, confidence: f64) -> Self {
        VerificationOutcome {
            status,
            confidence: confidence.clamp(0.0, 100.0),
        }
    }

    pub fn missing() -> Self {
        VerificationOutcome::new(EmailStatus::Missing, 0.0)
    }

    pub fn invalid() -> Self {
        VerificationOutcome::new(EmailStatus::Invalid, 0.0)
    }

    pub fn risky() -> Self {
        VerificationOutcome::new(EmailStatus::Risky, 30.0)
    }

    pub fn valid() -> Self {
        VerificationOutcome::new(EmailStatus::Valid, 100.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeadRecord {
    pub requester_id: Uuid,
    pub company_name: String,
    pub industry: String,
    pub location: String,
    pub phone: String,
    pub website: String,
    pub email: String,
    pub email_status: EmailStatus,
    pub confidence_score: f64,
    pub decision_maker_name: Option<String>,
    pub decision_maker_role: Option<String>,
    pub profile_url: Option<String>,
}

impl LeadRecord {
    /// Industry comes from the run keyword. Location falls back to the run location
    /// when the collector could not read one.
    pub fn assemble(
        request: &SearchRequest,
        candidate: CandidateBusiness,
        enrichment: EnrichmentResult,
        verification: VerificationOutcome,
    ) -> Self {
        let location = match candidate.location.trim().is_empty() {
            true => request.location.clone(),
            false => candidate.location,
        };
        let phone = match candidate.phone.is_empty() {
            true => UNKNOWN.to_string(),
            false => candidate.phone.join(" | "),
        };
        // Missing iff the email is the sentinel, whatever the verifier said.
        let (email_status, confidence_score) = match is_unknown(&enrichment.email) {
            true => (EmailStatus::Missing, 0.0),
            false if verification.status == EmailStatus::Missing => (EmailStatus::Invalid, 0.0),
            false => (verification.status, verification.confidence.clamp(0.0, 100.0)),
        };

        LeadRecord {
            requester_id: request.requester_id,
            company_name: candidate.name,
            industry: request.keyword.clone(),
            location,
            phone,
            website: candidate.website,
            email: enrichment.email,
            email_status,
            confidence_score,
            decision_maker_name: enrichment.decision_maker_name,
            decision_maker_role: enrichment.decision_maker_role,
            profile_url: enrichment.profile_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub keyword: String,
    pub location: String,
    pub requester_id: Uuid,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRun {
    pub requester_id: Uuid,
    pub keyword: String,
    pub location: String,
    pub results_count: i32,
    pub searched_at: DateTime<Utc>,
}

impl SearchRun {
    pub fn finished(request: &SearchRequest, results_count: usize) -> Self {
        SearchRun {
            requester_id: request.requester_id,
            keyword: request.keyword.clone(),
            location: request.location.clone(),
            results_count: i32::try_from(results_count).unwrap_or(i32::MAX),
            searched_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn request() -> SearchRequest {
        SearchRequest {
            keyword: "dentist".to_string(),
            location: "Cairo".to_string(),
            requester_id: Uuid::new_v4(),
            limit: 5,
        }
    }

    fn candidate() -> CandidateBusiness {
        CandidateBusiness {
            name: "Smile Clinic".to_string(),
            industry: "dentist".to_string(),
            location: "".to_string(),
            phone: vec!["01012345678".to_string(), "0223456789".to_string()],
            website: UNKNOWN.to_string(),
        }
    }

    #[test]
    fn unknown_sentinel_detection() {
        assert!(is_unknown("unknown"));
        assert!(is_unknown(" UNKNOWN "));
        assert!(is_unknown(""));
        assert!(!is_unknown("info@smile.com"));
    }

    #[test]
    fn assemble_falls_back_to_request_location_and_joins_phones() {
        let record = LeadRecord::assemble(
            &request(),
            candidate(),
            EnrichmentResult {
                email: "info@smile.com".to_string(),
                ..EnrichmentResult::default()
            },
            VerificationOutcome::valid(),
        );

        assert_eq!(record.location, "Cairo");
        assert_eq!(record.industry, "dentist");
        assert_eq!(record.phone, "01012345678 | 0223456789");
        assert_eq!(record.email_status, EmailStatus::Valid);
        assert_eq!(record.confidence_score, 100.0);
    }

    #[test]
    fn assemble_marks_sentinel_email_missing() {
        let record = LeadRecord::assemble(
            &request(),
            CandidateBusiness {
                phone: vec![],
                ..candidate()
            },
            EnrichmentResult::default(),
            VerificationOutcome::risky(),
        );

        assert_eq!(record.email, UNKNOWN);
        assert_eq!(record.phone, UNKNOWN);
        assert_eq!(record.email_status, EmailStatus::Missing);
        assert_eq!(record.confidence_score, 0.0);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(
            VerificationOutcome::new(EmailStatus::Valid, 140.0).confidence,
            100.0
        );
        assert_eq!(
            VerificationOutcome::new(EmailStatus::Risky, -3.0).confidence,
            0.0
        );
    }
}
