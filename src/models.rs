use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

// ============ Database Models ============

/// Lifecycle status of a case. Transitions are strictly forward:
/// draft -> ready_for_assessment -> escalated. The storage layer rejects
/// any attempt to move a case backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "case_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Draft,
    ReadyForAssessment,
    Escalated,
}

impl CaseStatus {
    /// Forward-only ordering check used by the storage layer.
    pub fn can_advance_to(self, next: CaseStatus) -> bool {
        next >= self
    }
}

/// A person who opened a case. Created anonymously when the case is started
/// and filled in by the identify step.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// CRM-side contact id, set after a successful upsert.
    pub crm_contact_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A persisted lead record tracking one intake session through to potential
/// lawyer escalation. Never deleted by this system.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Case {
    pub id: Uuid,
    pub contact_id: Uuid,
    /// Where the lead came from (currently always "chat").
    pub source: String,
    pub status: CaseStatus,
    pub fine_type: Option<String>,
    pub date_time: Option<String>,
    pub location: Option<String>,
    pub amount: Option<String>,
    pub points: Option<String>,
    pub law_section: Option<String>,
    pub vehicle_plate: Option<String>,
    pub issuing_authority: Option<String>,
    /// Relative URL of the uploaded report file, if any.
    pub report_file_url: Option<String>,
    /// SHA-256 of the stored upload, hex encoded.
    pub report_checksum: Option<String>,
    /// Raw JSON snapshot of the last extracted/confirmed field set.
    pub extracted_summary_json: Option<String>,
    pub user_confirmed: bool,
    pub escalation_requested: bool,
    /// Outcome of the last CRM deal sync ("success" / "failed").
    pub crm_sync_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

// ============ Extracted Fields ============

/// Best-effort structured record of case facts pulled out of document text.
///
/// Every field is independently optional; absence means "not found", not
/// "empty". A human confirmation step always follows before any field is
/// persisted as confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fine_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub law_section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_plate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuing_authority: Option<String>,
    /// Set for image uploads where no text extraction was attempted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_ocr: bool,
}

impl ExtractedFields {
    pub fn is_empty(&self) -> bool {
        self.fine_type.is_none()
            && self.date_time.is_none()
            && self.location.is_none()
            && self.amount.is_none()
            && self.points.is_none()
            && self.law_section.is_none()
            && self.vehicle_plate.is_none()
            && self.issuing_authority.is_none()
            && !self.needs_ocr
    }

    /// Overlay non-empty values from `other` on top of `self`.
    /// Used by the confirm step: user edits win over extracted values.
    pub fn merged_with(&self, other: &ExtractedFields) -> ExtractedFields {
        fn pick(edit: &Option<String>, stored: &Option<String>) -> Option<String> {
            match edit {
                Some(v) if !v.trim().is_empty() => Some(v.clone()),
                _ => stored.clone(),
            }
        }
        ExtractedFields {
            fine_type: pick(&other.fine_type, &self.fine_type),
            date_time: pick(&other.date_time, &self.date_time),
            location: pick(&other.location, &self.location),
            amount: pick(&other.amount, &self.amount),
            points: pick(&other.points, &self.points),
            law_section: pick(&other.law_section, &self.law_section),
            vehicle_plate: pick(&other.vehicle_plate, &self.vehicle_plate),
            issuing_authority: pick(&other.issuing_authority, &self.issuing_authority),
            needs_ocr: self.needs_ocr || other.needs_ocr,
        }
    }
}

// ============ Chat API Models ============

/// Role of a chat message on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message in the conversation sent to the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Request payload for POST /api/chat.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(rename = "topicId")]
    pub topic_id: Option<String>,
    /// Ordered map of question-id -> answer from the scripted intake.
    #[serde(rename = "intakeAnswers")]
    pub intake_answers: Option<BTreeMap<String, String>>,
}

// ============ Case API Models ============

#[derive(Debug, Deserialize)]
pub struct ConfirmFieldsRequest {
    pub fields: ExtractedFields,
}

#[derive(Debug, Deserialize)]
pub struct IdentifyRequest {
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EscalateRequest {
    pub phone: String,
    #[serde(default)]
    pub consent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ordering_is_forward_only() {
        assert!(CaseStatus::Draft.can_advance_to(CaseStatus::ReadyForAssessment));
        assert!(CaseStatus::Draft.can_advance_to(CaseStatus::Escalated));
        assert!(CaseStatus::ReadyForAssessment.can_advance_to(CaseStatus::Escalated));
        assert!(!CaseStatus::ReadyForAssessment.can_advance_to(CaseStatus::Draft));
        assert!(!CaseStatus::Escalated.can_advance_to(CaseStatus::ReadyForAssessment));
        // Re-applying the current status is allowed (idempotent updates)
        assert!(CaseStatus::Escalated.can_advance_to(CaseStatus::Escalated));
    }

    #[test]
    fn extracted_fields_serialize_omits_absent() {
        let fields = ExtractedFields {
            amount: Some("1000".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json, serde_json::json!({"amount": "1000"}));
    }

    #[test]
    fn merged_with_prefers_user_edits() {
        let stored = ExtractedFields {
            amount: Some("1000".to_string()),
            points: Some("4".to_string()),
            ..Default::default()
        };
        let edits = ExtractedFields {
            amount: Some("750".to_string()),
            location: Some("כביש 4".to_string()),
            ..Default::default()
        };
        let merged = stored.merged_with(&edits);
        assert_eq!(merged.amount.as_deref(), Some("750"));
        assert_eq!(merged.points.as_deref(), Some("4"));
        assert_eq!(merged.location.as_deref(), Some("כביש 4"));
    }
}
