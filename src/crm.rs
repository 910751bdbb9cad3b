//! HubSpot lead sync, best-effort by design.
//!
//! Every function here swallows its own failures: a CRM outage must never
//! block the user-facing flow, so errors are logged and `None`/`false` is
//! returned instead of propagating. The case record in our own database is
//! the source of truth; HubSpot only mirrors it.

use crate::config::Config;
use phonenumber::{country, Mode};
use serde::Deserialize;
use serde_json::json;

/// Deal payload carrying the confirmed fine fields.
#[derive(Debug, Clone)]
pub struct DealSync {
    pub deal_name: String,
    pub contact_id: String,
    pub case_id: String,
    pub fine_type: Option<String>,
    pub fine_date_time: Option<String>,
    pub fine_location: Option<String>,
    pub fine_amount: Option<String>,
    pub fine_points: Option<String>,
    pub law_section: Option<String>,
    pub report_file_url: Option<String>,
    pub extracted_summary: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ObjectResponse>,
}

/// True when the input parses as a valid Israeli number.
pub fn is_valid_israeli_phone(raw: &str) -> bool {
    phonenumber::parse(Some(country::Id::IL), raw)
        .map(|number| phonenumber::is_valid(&number))
        .unwrap_or(false)
}

/// Normalize an Israeli phone number to E.164 (+972...). Falls back to the
/// raw digits when parsing fails, so a lead is never dropped over formatting.
pub fn normalize_israeli_phone(raw: &str) -> String {
    match phonenumber::parse(Some(country::Id::IL), raw) {
        Ok(number) if phonenumber::is_valid(&number) => {
            number.format().mode(Mode::E164).to_string()
        }
        _ => raw
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect(),
    }
}

#[derive(Clone)]
pub struct CrmClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl CrmClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.hubspot_base_url.clone(),
            token: config.hubspot_token.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    /// Upsert a contact by email: search first, update on hit, create on
    /// miss. Returns the HubSpot contact id, or `None` on any failure.
    pub async fn upsert_contact(
        &self,
        email: Option<&str>,
        full_name: &str,
        phone: Option<&str>,
    ) -> Option<String> {
        let token = self.token.as_deref()?;

        let mut properties = serde_json::Map::new();
        let name = full_name.trim();
        let mut parts = name.split_whitespace();
        let first = parts.next().unwrap_or_default();
        let last = parts.collect::<Vec<_>>().join(" ");
        if !first.is_empty() {
            properties.insert("firstname".to_string(), json!(first));
        }
        if !last.is_empty() {
            properties.insert("lastname".to_string(), json!(last));
        }
        if let Some(phone) = phone {
            properties.insert("phone".to_string(), json!(normalize_israeli_phone(phone)));
        }
        if let Some(email) = email {
            properties.insert("email".to_string(), json!(email));
        }

        if let Some(email) = email {
            match self.search_contact_by_email(token, email).await {
                Ok(Some(existing_id)) => {
                    let url = format!("{}/crm/v3/objects/contacts/{}", self.base_url, existing_id);
                    let mut with_stage = properties.clone();
                    with_stage.insert("lifecyclestage".to_string(), json!("lead"));
                    let result = self
                        .client
                        .patch(&url)
                        .bearer_auth(token)
                        .json(&json!({ "properties": with_stage }))
                        .send()
                        .await;
                    match result {
                        Ok(resp) if resp.status().is_success() => return Some(existing_id),
                        Ok(resp) => {
                            tracing::error!(status = %resp.status(), "contact update failed");
                            return None;
                        }
                        Err(e) => {
                            tracing::error!("contact update failed: {}", e);
                            return None;
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    // Search failure falls through to plain creation
                    tracing::warn!("contact search failed: {}", e);
                }
            }
        }

        properties.insert("lifecyclestage".to_string(), json!("lead"));
        let url = format!("{}/crm/v3/objects/contacts", self.base_url);
        let result = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "properties": properties }))
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => resp
                .json::<ObjectResponse>()
                .await
                .map(|o| o.id)
                .map_err(|e| tracing::error!("contact create parse failed: {}", e))
                .ok(),
            Ok(resp) => {
                tracing::error!(status = %resp.status(), "contact create failed");
                None
            }
            Err(e) => {
                tracing::error!("contact create failed: {}", e);
                None
            }
        }
    }

    async fn search_contact_by_email(
        &self,
        token: &str,
        email: &str,
    ) -> Result<Option<String>, reqwest::Error> {
        let url = format!("{}/crm/v3/objects/contacts/search", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({
                "query": email,
                "limit": 1,
                "sorts": [{ "propertyName": "createdate", "direction": "DESCENDING" }],
                "properties": ["id", "email"],
            }))
            .send()
            .await?
            .error_for_status()?;
        let search: SearchResponse = response.json().await?;
        Ok(search.results.into_iter().next().map(|r| r.id))
    }

    /// Create a deal associated with the contact, then attach a note with the
    /// full case detail. Note failure is tolerated; the deal id still counts.
    pub async fn create_deal(&self, deal: &DealSync) -> Option<String> {
        let token = self.token.as_deref()?;

        let mut properties = serde_json::Map::new();
        properties.insert("dealname".to_string(), json!(deal.deal_name));
        properties.insert("case_id".to_string(), json!(deal.case_id));
        let optional = [
            ("fine_type", &deal.fine_type),
            ("fine_date_time", &deal.fine_date_time),
            ("fine_location", &deal.fine_location),
            ("fine_amount", &deal.fine_amount),
            ("fine_points", &deal.fine_points),
            ("law_section", &deal.law_section),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                properties.insert(key.to_string(), json!(v));
            }
        }

        let url = format!("{}/crm/v3/objects/deals", self.base_url);
        let result = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({
                "properties": properties,
                "associations": [{
                    "to": { "id": deal.contact_id },
                    "types": [{ "associationCategory": "HUBSPOT_DEFINED", "associationTypeId": 3 }],
                }],
            }))
            .send()
            .await;

        let deal_id = match result {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<ObjectResponse>().await {
                    Ok(o) => o.id,
                    Err(e) => {
                        tracing::error!("deal create parse failed: {}", e);
                        return None;
                    }
                }
            }
            Ok(resp) => {
                tracing::error!(status = %resp.status(), "deal create failed");
                return None;
            }
            Err(e) => {
                tracing::error!("deal create failed: {}", e);
                return None;
            }
        };

        if let Err(e) = self.attach_note(token, &deal_id, deal).await {
            tracing::warn!("note creation failed for deal {}: {}", deal_id, e);
        }

        Some(deal_id)
    }

    async fn attach_note(
        &self,
        token: &str,
        deal_id: &str,
        deal: &DealSync,
    ) -> Result<(), reqwest::Error> {
        let mut lines = vec![format!("Case ID: {}", deal.case_id)];
        let labeled = [
            ("Fine Type", &deal.fine_type),
            ("Date/Time", &deal.fine_date_time),
            ("Location", &deal.fine_location),
            ("Amount", &deal.fine_amount),
            ("Points", &deal.fine_points),
            ("Law Section", &deal.law_section),
            ("Report File", &deal.report_file_url),
        ];
        for (label, value) in labeled {
            if let Some(v) = value {
                lines.push(format!("{}: {}", label, v));
            }
        }
        if let Some(summary) = &deal.extracted_summary {
            lines.push(format!("\nExtracted Summary:\n{}", summary));
        }

        let url = format!("{}/crm/v3/objects/notes", self.base_url);
        self.client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({
                "properties": {
                    "hs_note_body": lines.join("\n"),
                    "hs_timestamp": chrono::Utc::now().to_rfc3339(),
                },
                "associations": [{
                    "to": { "id": deal_id },
                    "types": [{ "associationCategory": "HUBSPOT_DEFINED", "associationTypeId": 214 }],
                }],
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Move a deal to a new pipeline stage. No caller yet: the deal id is not
    /// persisted on the case after creation.
    /// TODO: store the deal id on the case so escalation can advance the stage.
    pub async fn update_deal_stage(&self, deal_id: &str, stage: &str) -> bool {
        let Some(token) = self.token.as_deref() else {
            return false;
        };
        let url = format!("{}/crm/v3/objects/deals/{}", self.base_url, deal_id);
        let result = self
            .client
            .patch(&url)
            .bearer_auth(token)
            .json(&json!({ "properties": { "dealstage": stage } }))
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::error!(status = %resp.status(), "deal stage update failed");
                false
            }
            Err(e) => {
                tracing::error!("deal stage update failed: {}", e);
                false
            }
        }
    }
}
