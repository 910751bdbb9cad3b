//! Postgres persistence for contacts and cases.
//!
//! Sequential runtime-checked queries, no compile-time macros, matching the
//! rest of the sqlx usage in this codebase. The forward-only case status
//! invariant is enforced here, not in handlers.

use crate::errors::{AppError, ResultExt};
use crate::models::{Case, CaseStatus, Contact, ExtractedFields};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Create the schema on startup. Every statement is idempotent.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DO $$ BEGIN
                CREATE TYPE case_status AS ENUM ('draft', 'ready_for_assessment', 'escalated');
            EXCEPTION WHEN duplicate_object THEN NULL; END $$
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS contacts (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                full_name TEXT NOT NULL,
                email TEXT,
                phone TEXT,
                crm_contact_id TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cases (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                contact_id UUID NOT NULL REFERENCES contacts(id),
                source TEXT NOT NULL DEFAULT 'chat',
                status case_status NOT NULL DEFAULT 'draft',
                fine_type TEXT,
                date_time TEXT,
                location TEXT,
                amount TEXT,
                points TEXT,
                law_section TEXT,
                vehicle_plate TEXT,
                issuing_authority TEXT,
                report_file_url TEXT,
                report_checksum TEXT,
                extracted_summary_json TEXT,
                user_confirmed BOOLEAN NOT NULL DEFAULT FALSE,
                escalation_requested BOOLEAN NOT NULL DEFAULT FALSE,
                crm_sync_status TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Case and contact store.
pub struct CaseStore {
    pool: PgPool,
}

impl CaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Start a case: anonymous contact plus a draft case pointing at it.
    /// Identity is filled in later by the identify step.
    pub async fn create_case(&self) -> Result<(Contact, Case), AppError> {
        let contact = sqlx::query_as::<_, Contact>(
            "INSERT INTO contacts (full_name) VALUES ('Anonymous') RETURNING *",
        )
        .fetch_one(&self.pool)
        .await
        .context("failed to create contact")?;

        let case = sqlx::query_as::<_, Case>(
            "INSERT INTO cases (contact_id, source, status) VALUES ($1, 'chat', 'draft') RETURNING *",
        )
        .bind(contact.id)
        .fetch_one(&self.pool)
        .await
        .context("failed to create case")?;

        Ok((contact, case))
    }

    pub async fn get_case(&self, id: Uuid) -> Result<Case, AppError> {
        sqlx::query_as::<_, Case>("SELECT * FROM cases WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load case")?
            .ok_or_else(|| AppError::NotFound("Case not found".to_string()))
    }

    pub async fn get_contact(&self, id: Uuid) -> Result<Contact, AppError> {
        sqlx::query_as::<_, Contact>("SELECT * FROM contacts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load contact")?
            .ok_or_else(|| AppError::NotFound("Contact not found".to_string()))
    }

    /// Record an uploaded report and the fields extracted from it.
    pub async fn attach_report(
        &self,
        case_id: Uuid,
        file_url: &str,
        checksum: &str,
        fields: &ExtractedFields,
    ) -> Result<Case, AppError> {
        let summary_json = serde_json::to_string(fields)
            .map_err(|e| AppError::InternalError(format!("field serialization failed: {}", e)))?;

        sqlx::query_as::<_, Case>(
            r#"
            UPDATE cases SET
                report_file_url = $2,
                report_checksum = $3,
                extracted_summary_json = $4,
                fine_type = COALESCE($5, fine_type),
                date_time = COALESCE($6, date_time),
                location = COALESCE($7, location),
                amount = COALESCE($8, amount),
                points = COALESCE($9, points),
                law_section = COALESCE($10, law_section),
                vehicle_plate = COALESCE($11, vehicle_plate),
                issuing_authority = COALESCE($12, issuing_authority),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(case_id)
        .bind(file_url)
        .bind(checksum)
        .bind(summary_json)
        .bind(&fields.fine_type)
        .bind(&fields.date_time)
        .bind(&fields.location)
        .bind(&fields.amount)
        .bind(&fields.points)
        .bind(&fields.law_section)
        .bind(&fields.vehicle_plate)
        .bind(&fields.issuing_authority)
        .fetch_optional(&self.pool)
        .await
        .context("failed to attach report")?
        .ok_or_else(|| AppError::NotFound("Case not found".to_string()))
    }

    /// Persist the user-approved field set and advance to
    /// ready_for_assessment.
    pub async fn confirm_fields(
        &self,
        case_id: Uuid,
        fields: &ExtractedFields,
    ) -> Result<Case, AppError> {
        let current = self.get_case(case_id).await?;
        self.check_transition(&current, CaseStatus::ReadyForAssessment)?;

        let merged = current_fields(&current).merged_with(fields);
        let summary_json = serde_json::to_string(&merged)
            .map_err(|e| AppError::InternalError(format!("field serialization failed: {}", e)))?;

        sqlx::query_as::<_, Case>(
            r#"
            UPDATE cases SET
                fine_type = $2,
                date_time = $3,
                location = $4,
                amount = $5,
                points = $6,
                law_section = $7,
                vehicle_plate = $8,
                issuing_authority = $9,
                extracted_summary_json = $10,
                user_confirmed = TRUE,
                status = 'ready_for_assessment',
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(case_id)
        .bind(&merged.fine_type)
        .bind(&merged.date_time)
        .bind(&merged.location)
        .bind(&merged.amount)
        .bind(&merged.points)
        .bind(&merged.law_section)
        .bind(&merged.vehicle_plate)
        .bind(&merged.issuing_authority)
        .bind(summary_json)
        .fetch_one(&self.pool)
        .await
        .context("failed to confirm fields")
    }

    pub async fn update_identity(
        &self,
        contact_id: Uuid,
        full_name: &str,
        email: Option<&str>,
    ) -> Result<Contact, AppError> {
        sqlx::query_as::<_, Contact>(
            r#"
            UPDATE contacts SET
                full_name = $2,
                email = COALESCE($3, email),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(contact_id)
        .bind(full_name)
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("failed to update identity")?
        .ok_or_else(|| AppError::NotFound("Contact not found".to_string()))
    }

    pub async fn set_crm_contact_id(
        &self,
        contact_id: Uuid,
        crm_contact_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE contacts SET crm_contact_id = $2, updated_at = now() WHERE id = $1")
            .bind(contact_id)
            .bind(crm_contact_id)
            .execute(&self.pool)
            .await
            .context("failed to store CRM contact id")?;
        Ok(())
    }

    pub async fn set_contact_phone(&self, contact_id: Uuid, phone: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE contacts SET phone = $2, updated_at = now() WHERE id = $1")
            .bind(contact_id)
            .bind(phone)
            .execute(&self.pool)
            .await
            .context("failed to store phone")?;
        Ok(())
    }

    pub async fn set_crm_sync_status(&self, case_id: Uuid, status: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE cases SET crm_sync_status = $2, updated_at = now() WHERE id = $1")
            .bind(case_id)
            .bind(status)
            .execute(&self.pool)
            .await
            .context("failed to store CRM sync status")?;
        Ok(())
    }

    /// Mark the case escalated. Already-escalated cases are a no-op update;
    /// this transition is always forward from any live status.
    pub async fn escalate(&self, case_id: Uuid) -> Result<Case, AppError> {
        let current = self.get_case(case_id).await?;
        self.check_transition(&current, CaseStatus::Escalated)?;

        sqlx::query_as::<_, Case>(
            r#"
            UPDATE cases SET
                escalation_requested = TRUE,
                status = 'escalated',
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(case_id)
        .fetch_one(&self.pool)
        .await
        .context("failed to escalate case")
    }

    fn check_transition(&self, case: &Case, next: CaseStatus) -> Result<(), AppError> {
        if case.status.can_advance_to(next) {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "case {} cannot move from {:?} back to {:?}",
                case.id, case.status, next
            )))
        }
    }
}

/// The current field set persisted on a case row.
fn current_fields(case: &Case) -> ExtractedFields {
    ExtractedFields {
        fine_type: case.fine_type.clone(),
        date_time: case.date_time.clone(),
        location: case.location.clone(),
        amount: case.amount.clone(),
        points: case.points.clone(),
        law_section: case.law_section.clone(),
        vehicle_plate: case.vehicle_plate.clone(),
        issuing_authority: case.issuing_authority.clone(),
        needs_ocr: false,
    }
}
