use crate::assistant::AssistantClient;
use crate::config::Config;
use crate::crm::{is_valid_israeli_phone, normalize_israeli_phone, CrmClient, DealSync};
use crate::documents::{DocumentProcessor, MAX_UPLOAD_BYTES};
use crate::errors::AppError;
use crate::models::*;
use crate::storage::CaseStore;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Case and contact persistence.
    pub store: CaseStore,
    /// Upload storage and field extraction.
    pub documents: DocumentProcessor,
    /// Reasoning-service client.
    pub assistant: AssistantClient,
    /// Best-effort HubSpot sync.
    pub crm: CrmClient,
}

/// Raises axum's built-in body cap (2 MB out of the box) to the upload
/// limit; without this the multipart extractor rejects mid-size PDFs before
/// the tower-http limit layer or the handler's own size check ever run.
pub fn upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(MAX_UPLOAD_BYTES)
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "message": "Server is running",
        })),
    )
}

/// POST /api/chat
///
/// Forwards the conversation to the reasoning service. Failures never leave
/// the 200 envelope: the front end renders `errorMessage` inline and keeps
/// the session interactive, so assistant errors carry the fixed Hebrew
/// notice instead of raw upstream detail.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if request.messages.is_empty() {
        return Err(AppError::Validation(
            "messages array is required and must not be empty".to_string(),
        ));
    }
    if request.messages.iter().any(|m| m.content.is_empty()) {
        return Err(AppError::Validation(
            "Each message must have role and content fields".to_string(),
        ));
    }

    let result = state
        .assistant
        .ask(
            &request.messages,
            request.topic_id.as_deref(),
            request.intake_answers.as_ref(),
        )
        .await;

    match result {
        Ok(content) => Ok(Json(json!({ "ok": true, "content": content }))),
        Err(err) => {
            tracing::error!("assistant call failed: {}", err);
            Ok(Json(json!({
                "ok": false,
                "errorCode": err.error_code(),
                "errorMessage": crate::conversation::SERVICE_UNAVAILABLE_MESSAGE,
            })))
        }
    }
}

/// POST /api/cases
///
/// Starts a draft case with an anonymous contact; identity arrives later.
pub async fn create_case(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (contact, case) = state.store.create_case().await?;
    tracing::info!(case_id = %case.id, "case created");
    Ok(Json(json!({
        "ok": true,
        "caseId": case.id,
        "contactId": contact.id,
    })))
}

/// POST /api/cases/:id/upload
///
/// Accepts one multipart file field, stores it, extracts fields from PDFs
/// and flags images for OCR, then records everything on the case.
pub async fn upload_report(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, AppError> {
    // Existence check first so a missing case beats a missing file
    let case = state.store.get_case(case_id).await?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart: {}", e)))?
    {
        let is_file = field.name() == Some("file") || field.file_name().is_some();
        if !is_file {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.bin").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("failed to read upload: {}", e)))?;
        upload = Some((name, bytes.to_vec()));
        break;
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| AppError::Validation("No file provided".to_string()))?;

    let processed = state
        .documents
        .process_upload(case.id, &file_name, bytes)
        .await?;

    state
        .store
        .attach_report(
            case.id,
            &processed.file_url,
            &processed.checksum,
            &processed.fields,
        )
        .await?;

    Ok(Json(json!({
        "ok": true,
        "fileUrl": processed.file_url,
        "extractedFields": processed.fields,
    })))
}

/// POST /api/cases/:id/confirm
///
/// Persists the user-approved field set and moves the case to
/// ready_for_assessment. User edits win over extracted values.
pub async fn confirm_fields(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<Uuid>,
    Json(request): Json<ConfirmFieldsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let case = state.store.confirm_fields(case_id, &request.fields).await?;
    tracing::info!(case_id = %case.id, "fields confirmed");
    Ok(Json(json!({ "ok": true, "message": "Fields confirmed" })))
}

/// POST /api/cases/:id/identify
///
/// Stores the user's identity, then syncs to the CRM best-effort: contact
/// upsert, and a deal carrying the fine fields once the case is ready for
/// assessment. CRM failures are recorded on the case but never fail the
/// request.
pub async fn identify(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<Uuid>,
    Json(request): Json<IdentifyRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if request.full_name.trim().is_empty() {
        return Err(AppError::Validation("Full name is required".to_string()));
    }

    let case = state.store.get_case(case_id).await?;
    let contact = state
        .store
        .update_identity(
            case.contact_id,
            request.full_name.trim(),
            request.email.as_deref(),
        )
        .await?;

    let crm_contact_id = state
        .crm
        .upsert_contact(contact.email.as_deref(), &contact.full_name, None)
        .await;

    if let Some(crm_id) = &crm_contact_id {
        if let Err(err) = state.store.set_crm_contact_id(contact.id, crm_id).await {
            tracing::error!("failed to persist CRM contact id: {}", err);
        }
    }

    if case.status == CaseStatus::ReadyForAssessment {
        if let Some(crm_id) = &crm_contact_id {
            let deal_name = format!(
                "Wallmans AI תעבורה - {}{} - {}",
                contact.full_name,
                contact
                    .email
                    .as_deref()
                    .map(|e| format!(" - {}", e))
                    .unwrap_or_default(),
                case.fine_type.as_deref().unwrap_or("Unknown"),
            );
            let deal = DealSync {
                deal_name,
                contact_id: crm_id.clone(),
                case_id: case.id.to_string(),
                fine_type: case.fine_type.clone(),
                fine_date_time: case.date_time.clone(),
                fine_location: case.location.clone(),
                fine_amount: case.amount.clone(),
                fine_points: case.points.clone(),
                law_section: case.law_section.clone(),
                report_file_url: case.report_file_url.clone(),
                extracted_summary: case.extracted_summary_json.clone(),
            };
            let sync_status = if state.crm.create_deal(&deal).await.is_some() {
                "success"
            } else {
                "failed"
            };
            if let Err(err) = state.store.set_crm_sync_status(case.id, sync_status).await {
                tracing::error!("failed to persist CRM sync status: {}", err);
            }
        }
    }

    Ok(Json(json!({
        "ok": true,
        "contactId": contact.id,
        "crmContactId": crm_contact_id,
    })))
}

/// POST /api/cases/:id/escalate
///
/// Records the escalation request: phone (normalized to E.164) on the
/// contact, forward status transition on the case, best-effort CRM update.
pub async fn escalate(
    State(state): State<Arc<AppState>>,
    Path(case_id): Path<Uuid>,
    Json(request): Json<EscalateRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let raw_phone = request.phone.trim();
    if raw_phone.is_empty() {
        return Err(AppError::Validation("Phone number is required".to_string()));
    }
    if !request.consent {
        return Err(AppError::Validation("Consent is required".to_string()));
    }
    if !is_valid_israeli_phone(raw_phone) {
        return Err(AppError::Validation(
            "Invalid Israeli phone number".to_string(),
        ));
    }

    let case = state.store.get_case(case_id).await?;
    let contact = state.store.get_contact(case.contact_id).await?;

    let phone = normalize_israeli_phone(raw_phone);
    state.store.set_contact_phone(contact.id, &phone).await?;
    state.store.escalate(case.id).await?;

    if contact.crm_contact_id.is_some() {
        state
            .crm
            .upsert_contact(contact.email.as_deref(), &contact.full_name, Some(&phone))
            .await;
        tracing::info!(case_id = %case.id, "escalation synced to CRM contact");
    }

    tracing::info!(case_id = %case.id, "escalation requested");
    Ok(Json(json!({
        "ok": true,
        "message": "Escalation requested successfully",
    })))
}
