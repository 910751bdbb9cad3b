/// Integration tests with mocked external APIs
/// Exercises the assistant and CRM clients against wiremock without hitting
/// real services.
use legal_intake_api::assistant::{AssistantClient, AssistantError};
use legal_intake_api::config::Config;
use legal_intake_api::crm::{CrmClient, DealSync};
use legal_intake_api::models::{ChatMessage, ChatRole};
use std::collections::BTreeMap;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config
fn create_test_config(base_url: String) -> Config {
    Config {
        database_url: "postgresql://test".to_string(),
        port: 5175,
        openai_api_key: Some("test-key".to_string()),
        openai_base_url: base_url.clone(),
        openai_model: "gpt-4o-mini".to_string(),
        hubspot_token: Some("test-token".to_string()),
        hubspot_base_url: base_url,
        upload_dir: "uploads".to_string(),
    }
}

fn user_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: ChatRole::User,
        content: content.to_string(),
    }
}

// ============ Assistant client ============

#[tokio::test]
async fn assistant_returns_reply_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o-mini",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [
                { "message": { "role": "assistant", "content": "מה השעה המדויקת של האירוע?" } }
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = AssistantClient::new(&create_test_config(mock_server.uri()));
    let mut answers = BTreeMap::new();
    answers.insert("q1".to_string(), "לפני שבוע".to_string());

    let reply = client
        .ask(&[user_message("שלום")], Some("traffic"), Some(&answers))
        .await
        .unwrap();

    assert_eq!(reply, "מה השעה המדויקת של האירוע?");
}

#[tokio::test]
async fn assistant_upstream_error_maps_to_request_failed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&mock_server)
        .await;

    let client = AssistantClient::new(&create_test_config(mock_server.uri()));
    let err = client
        .ask(&[user_message("שלום")], None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, AssistantError::RequestFailed(_)));
    assert_eq!(err.error_code(), "OPENAI_REQUEST_FAILED");
}

#[tokio::test]
async fn assistant_empty_choices_is_a_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
        )
        .mount(&mock_server)
        .await;

    let client = AssistantClient::new(&create_test_config(mock_server.uri()));
    let err = client
        .ask(&[user_message("שלום")], None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AssistantError::RequestFailed(_)));
}

#[tokio::test]
async fn assistant_without_api_key_degrades_without_calling_upstream() {
    let mock_server = MockServer::start().await;
    // No mock mounted: any request would 404 and the expect below would fail

    let mut config = create_test_config(mock_server.uri());
    config.openai_api_key = None;

    let client = AssistantClient::new(&config);
    let err = client
        .ask(&[user_message("שלום")], None, None)
        .await
        .unwrap_err();

    assert_eq!(err, AssistantError::NotConfigured);
    assert_eq!(err.error_code(), "OPENAI_NOT_CONFIGURED");
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

// ============ CRM client ============

#[tokio::test]
async fn crm_upsert_updates_existing_contact_found_by_email() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "id": "30401" }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/crm/v3/objects/contacts/30401"))
        .and(body_partial_json(serde_json::json!({
            "properties": { "firstname": "דנה", "lastname": "כהן", "lifecyclestage": "lead" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "30401" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = CrmClient::new(&create_test_config(mock_server.uri()));
    let contact_id = client
        .upsert_contact(Some("dana@example.com"), "דנה כהן", None)
        .await;

    assert_eq!(contact_id.as_deref(), Some("30401"));
}

#[tokio::test]
async fn crm_upsert_creates_contact_when_search_is_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": [] })),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts"))
        .and(body_partial_json(serde_json::json!({
            "properties": { "lifecyclestage": "lead", "phone": "+972521234567" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "id": "777" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = CrmClient::new(&create_test_config(mock_server.uri()));
    let contact_id = client
        .upsert_contact(Some("new@example.com"), "ישראל ישראלי", Some("052-123-4567"))
        .await;

    assert_eq!(contact_id.as_deref(), Some("777"));
}

#[tokio::test]
async fn crm_upsert_without_token_is_a_silent_none() {
    let mut config = create_test_config("http://localhost:1".to_string());
    config.hubspot_token = None;

    let client = CrmClient::new(&config);
    assert!(!client.is_configured());
    let contact_id = client.upsert_contact(Some("a@b.com"), "דנה", None).await;
    assert!(contact_id.is_none());
}

fn sample_deal() -> DealSync {
    DealSync {
        deal_name: "Wallmans AI תעבורה - דנה כהן - חריגת מהירות".to_string(),
        contact_id: "30401".to_string(),
        case_id: "c0ffee00-0000-0000-0000-000000000001".to_string(),
        fine_type: Some("חריגת מהירות".to_string()),
        fine_date_time: Some("12/03/2024".to_string()),
        fine_location: Some("כביש 4".to_string()),
        fine_amount: Some("1,000".to_string()),
        fine_points: Some("4".to_string()),
        law_section: Some("62".to_string()),
        report_file_url: Some("/uploads/report.pdf".to_string()),
        extracted_summary: Some("{\"amount\":\"1,000\"}".to_string()),
    }
}

#[tokio::test]
async fn crm_deal_creation_attaches_note() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/deals"))
        .and(body_partial_json(serde_json::json!({
            "properties": {
                "fine_type": "חריגת מהירות",
                "fine_amount": "1,000",
                "law_section": "62"
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "id": "555" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/notes"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "id": "9" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = CrmClient::new(&create_test_config(mock_server.uri()));
    let deal_id = client.create_deal(&sample_deal()).await;
    assert_eq!(deal_id.as_deref(), Some("555"));
}

#[tokio::test]
async fn crm_deal_survives_note_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/deals"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({ "id": "556" })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/notes"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let client = CrmClient::new(&create_test_config(mock_server.uri()));
    let deal_id = client.create_deal(&sample_deal()).await;
    // The note is best-effort; the deal id still comes back
    assert_eq!(deal_id.as_deref(), Some("556"));
}

#[tokio::test]
async fn crm_deal_failure_returns_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/deals"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let client = CrmClient::new(&create_test_config(mock_server.uri()));
    assert!(client.create_deal(&sample_deal()).await.is_none());
}

#[tokio::test]
async fn crm_deal_stage_update() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/crm/v3/objects/deals/555"))
        .and(body_partial_json(serde_json::json!({
            "properties": { "dealstage": "qualifiedtobuy" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "555" })))
        .mount(&mock_server)
        .await;

    let client = CrmClient::new(&create_test_config(mock_server.uri()));
    assert!(client.update_deal_stage("555", "qualifiedtobuy").await);
}
