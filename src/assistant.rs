//! Reasoning-service client (OpenAI-compatible chat completions).
//!
//! The backend never interprets the model's output; it forwards the
//! conversation with a Hebrew legal-assistant system prompt and hands the
//! text back to the caller.

use crate::config::Config;
use crate::models::{ChatMessage, ChatRole};
use crate::topics::topic_by_id;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;

/// Errors surfaced to the chat endpoint, keyed by wire error code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantError {
    /// No API key configured; the endpoint degrades gracefully.
    NotConfigured,
    /// The upstream call failed or returned no content.
    RequestFailed(String),
}

impl AssistantError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AssistantError::NotConfigured => "OPENAI_NOT_CONFIGURED",
            AssistantError::RequestFailed(_) => "OPENAI_REQUEST_FAILED",
        }
    }
}

impl std::fmt::Display for AssistantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssistantError::NotConfigured => write!(f, "OPENAI_API_KEY is not configured"),
            AssistantError::RequestFailed(msg) => write!(f, "assistant request failed: {}", msg),
        }
    }
}

const BASE_SYSTEM_PROMPT: &str = "אתה עוזר משפטי מקצועי בישראל. תפקידך לספק מידע כללי וסטטיסטי על מקרים משפטיים, מבלי לתת ייעוץ משפטי אישי.

חשוב:
- תמיד ציין שהמידע הוא כללי וסטטיסטי בלבד
- תמיד הזכר שזה לא מהווה ייעוץ משפטי אישי
- תמיד המליץ לפנות לעורך דין מומחה לבדיקה פרטנית
- השתמש בעברית בלבד
- היה מקצועי, ברור וסבלני";

const TWO_PHASE_INSTRUCTIONS: &str = "=== הוראות חשובות להתנהגות ===

אתה עובד בשני שלבים:

שלב 1 - בדיקת שלמות המידע:
קודם כל, בדוק האם יש לך מספיק מידע כדי לתת תשובה מועילה ואחראית. שקול:
- האם כל הפרטים החיוניים קיימים? (למשל: זמן מדויק, מיקום, סוג העבירה, מספר נקודות, האם יש צילום/ראיות, וכו')
- האם יש פרטים חסרים שעלולים להשפיע משמעותית על ההערכה?

אם חסר מידע קריטי:
- אל תתן תשובה סופית בשלב זה
- שאל שאלת הבהרה אחת קצרה וברורה בעברית
- התמקד רק במה שבאמת חסר (למשל: \"מה השעה המדויקת שבה קיבלת את הדוח?\" או \"האם יש לך צילום מהמקום?\")
- אל תשאל שאלות כלליות - רק מה שבאמת חסר
- לאחר שהמשתמש יענה, תוכל לתת את התשובה הסופית

אם יש לך מספיק מידע:
- המשך לשלב 2

שלב 2 - מתן תשובה סופית:
אם יש לך מספיק מידע, ספק תשובה סופית מובנית בעברית הכוללת:
1. סיכום קצר של המצב
2. הסבר על הגורמים העיקריים שמשפיעים על סיכויי הערעור/הצלחה
3. הערכה איכותית גסה (למשל: נמוכה / בינונית / גבוהה - אם זה רלוונטי)
4. הצעה מה לעשות הלאה (למשל: האם לשקול לערער, לשלם, לפנות לעו״ד)
5. תזכורת עדינה שזה מידע כללי בלבד ולא ייעוץ משפטי רשמי

חשוב: תמיד הדגש שזה מידע כללי וסטטיסטי בלבד.";

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Client for the chat-completions API.
#[derive(Clone)]
pub struct AssistantClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl AssistantClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
        }
    }

    /// Send the conversation and return the assistant's Hebrew reply.
    pub async fn ask(
        &self,
        messages: &[ChatMessage],
        topic_id: Option<&str>,
        intake_answers: Option<&BTreeMap<String, String>>,
    ) -> Result<String, AssistantError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AssistantError::NotConfigured)?;

        let system_prompt = build_system_prompt(topic_id, intake_answers);

        let mut payload_messages = vec![json!({
            "role": "system",
            "content": system_prompt,
        })];
        for msg in messages {
            let role = match msg.role {
                ChatRole::System => "system",
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            payload_messages.push(json!({
                "role": role,
                "content": msg.content,
            }));
        }

        let url = format!("{}/v1/chat/completions", self.base_url);
        tracing::debug!(model = %self.model, messages = payload_messages.len(), "calling assistant");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&json!({
                "model": self.model,
                "messages": payload_messages,
                "temperature": 0.7,
                "max_tokens": 1000,
            }))
            .send()
            .await
            .map_err(|e| AssistantError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "assistant returned error: {}", body);
            return Err(AssistantError::RequestFailed(format!(
                "upstream status {}",
                status
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::RequestFailed(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AssistantError::RequestFailed("no content in response".to_string()))
    }
}

/// Base legal-assistant prompt, extended with the topic name, the intake
/// answer list, and the two-phase behavior instructions when both a topic and
/// answers are present.
fn build_system_prompt(
    topic_id: Option<&str>,
    intake_answers: Option<&BTreeMap<String, String>>,
) -> String {
    let mut prompt = BASE_SYSTEM_PROMPT.to_string();

    if let (Some(topic_id), Some(answers)) = (topic_id, intake_answers) {
        let topic_name = topic_by_id(topic_id)
            .map(|t| t.title)
            .unwrap_or(topic_id);

        prompt.push_str(&format!("\n\nהנושא הוא: {}", topic_name));
        prompt.push_str("\n\nתשובות המשתמש לשאלות הקבלה:");
        for (question_id, answer) in answers {
            prompt.push_str(&format!("\n- {}: {}", question_id, answer));
        }
        prompt.push_str("\n\n");
        prompt.push_str(TWO_PHASE_INSTRUCTIONS);
    }

    prompt
}
