//! Intake conversation state machine.
//!
//! Drives one chat session from the scripted welcome through the per-category
//! intake questions and into the reasoning-service loop. The machine is pure
//! and synchronous: callers feed it user input and service outcomes, and it
//! hands back the next request to send (if any). All transport lives elsewhere.
//!
//! Every message is tagged with an origin at creation time, so transcript
//! filtering never has to guess from text shape or id prefixes which messages
//! were scripted and which were generated.

use crate::models::{ChatMessage, ChatRole};
use crate::topics::{topic_by_id, ChatTopic};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Shown while a reasoning-service call is in flight.
pub const THINKING_PLACEHOLDER: &str = "מנתח את התשובות שלך...";

/// Fixed user-facing text for any reasoning-service failure.
pub const SERVICE_UNAVAILABLE_MESSAGE: &str = "לא הצלחתי להתחבר ל-AI כרגע, נסו שוב מאוחר יותר";

/// Prefix of the synthesized summary sent on the first call after intake.
pub const INTAKE_SUMMARY_PREFIX: &str = "על בסיס התשובות לשאלות הקבלה, אנא ספק הערכה ראשונית:\n\n";

const WELCOME_FOLLOW_UP: &str =
    "כדי שאוכל להבין את המקרה שלכם, אצטרך לשאול אתכם 4 שאלות קצרות. בואו נתחיל:";

/// Who produced a message and in what capacity.
///
/// Only `User` and `GeneratedResponse` messages are forwarded to the reasoning
/// service; everything else is UI scaffolding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrigin {
    Welcome,
    ScriptedQuestion,
    User,
    /// Transient placeholder, inserted when a call starts, removed when it ends.
    Thinking,
    GeneratedResponse,
    /// Error notices and other bot-side asides, never sent upstream.
    Notice,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub origin: MessageOrigin,
    pub content: String,
    /// Set on generated responses classified as conclusive.
    pub final_answer: bool,
}

impl Message {
    fn new(origin: MessageOrigin, content: impl Into<String>) -> Self {
        Self {
            origin,
            content: content.into(),
            final_answer: false,
        }
    }
}

/// Classification of a reasoning-service reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    FollowUpQuestion,
    FinalAnswer,
}

/// Shape heuristic distinguishing clarifying questions from final assessments.
///
/// A reply is a follow-up question when it ends with `?`, opens with a Hebrew
/// interrogative, or is shorter than 200 characters. Known-approximate by
/// product decision; do not tighten without one.
pub fn classify_response(text: &str) -> ResponseKind {
    const INTERROGATIVES: &[&str] = &["מה", "איפה", "מתי", "איך", "למה", "האם", "כמה"];
    let trimmed = text.trim();
    let is_question = trimmed.ends_with('?')
        || INTERROGATIVES.iter().any(|w| trimmed.starts_with(w))
        || trimmed.chars().count() < 200;
    if is_question {
        ResponseKind::FollowUpQuestion
    } else {
        ResponseKind::FinalAnswer
    }
}

/// Where a session currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The i-th scripted question is the last message; waiting for a reply.
    AskingQuestion(usize),
    /// A reasoning-service request is outstanding; input disabled.
    CallingService,
    /// Last reply was a clarifying question; free text re-enters the loop.
    AwaitingFollowUp,
    /// Last reply was a final answer; escalation is on offer, but further
    /// messages still restart the service loop.
    Terminal,
}

/// The request the caller should send to the reasoning service.
#[derive(Debug, Clone)]
pub struct ServiceCall {
    pub messages: Vec<ChatMessage>,
    pub topic_id: String,
    pub intake_answers: BTreeMap<String, String>,
}

/// One scripted-intake chat session.
#[derive(Debug)]
pub struct Conversation {
    topic: &'static ChatTopic,
    phase: Phase,
    messages: Vec<Message>,
    answers: BTreeMap<String, String>,
    intake_complete: bool,
}

impl Conversation {
    /// Open a session for a category. Emits the welcome pair and the first
    /// scripted question. Unknown category ids are rejected.
    pub fn new(topic_id: &str) -> Option<Self> {
        let topic = topic_by_id(topic_id)?;
        let mut messages = vec![
            Message::new(
                MessageOrigin::Welcome,
                format!("ברוכים הבאים ל-Wallmans AI – {}", topic.title),
            ),
            Message::new(MessageOrigin::Welcome, WELCOME_FOLLOW_UP),
        ];
        messages.push(Message::new(
            MessageOrigin::ScriptedQuestion,
            topic.intake_questions[0].label,
        ));
        Some(Self {
            topic,
            phase: Phase::AskingQuestion(0),
            messages,
            answers: BTreeMap::new(),
            intake_complete: false,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn answers(&self) -> &BTreeMap<String, String> {
        &self.answers
    }

    /// Feed one user message. Returns the service request to dispatch when the
    /// input completes the intake or continues a follow-up exchange.
    ///
    /// Whitespace-only input is a strict no-op in every phase, and all input
    /// is ignored while a call is outstanding.
    pub fn handle_user_input(&mut self, input: &str) -> Option<ServiceCall> {
        if self.phase == Phase::CallingService {
            return None;
        }
        let text = input.trim();
        if text.is_empty() {
            return None;
        }

        self.messages
            .push(Message::new(MessageOrigin::User, text.to_string()));

        match self.phase {
            Phase::AskingQuestion(i) => {
                let question = &self.topic.intake_questions[i];
                self.answers.insert(question.id.to_string(), text.to_string());
                if i + 1 < self.topic.intake_questions.len() {
                    self.messages.push(Message::new(
                        MessageOrigin::ScriptedQuestion,
                        self.topic.intake_questions[i + 1].label,
                    ));
                    self.phase = Phase::AskingQuestion(i + 1);
                    None
                } else {
                    Some(self.begin_call())
                }
            }
            Phase::AwaitingFollowUp | Phase::Terminal => Some(self.begin_call()),
            Phase::CallingService => None,
        }
    }

    /// Reasoning service answered. Removes the thinking placeholder, appends
    /// the classified reply, and settles into the matching phase.
    pub fn handle_service_success(&mut self, content: &str) {
        self.remove_thinking_placeholder();
        let kind = classify_response(content);
        let mut message = Message::new(MessageOrigin::GeneratedResponse, content.to_string());
        message.final_answer = kind == ResponseKind::FinalAnswer;
        self.messages.push(message);
        self.phase = match kind {
            ResponseKind::FollowUpQuestion => Phase::AwaitingFollowUp,
            ResponseKind::FinalAnswer => Phase::Terminal,
        };
    }

    /// Reasoning service failed. Removes the thinking placeholder, shows the
    /// provided (or fixed) Hebrew notice, and returns to the pre-call phase so
    /// the user can retry by sending again. No automatic retry.
    pub fn handle_service_failure(&mut self, error_message: Option<&str>) {
        self.remove_thinking_placeholder();
        self.messages.push(Message::new(
            MessageOrigin::Notice,
            error_message.unwrap_or(SERVICE_UNAVAILABLE_MESSAGE).to_string(),
        ));
        self.phase = if self.intake_complete {
            Phase::AwaitingFollowUp
        } else {
            // Resume at the first unanswered scripted question
            let next = self
                .topic
                .intake_questions
                .iter()
                .position(|q| !self.answers.contains_key(q.id))
                .unwrap_or(0);
            Phase::AskingQuestion(next)
        };
    }

    /// Insert the thinking placeholder and build the outgoing request.
    fn begin_call(&mut self) -> ServiceCall {
        let first_call =
            !self.intake_complete && self.answers.len() == self.topic.intake_questions.len();

        let mut outgoing: Vec<ChatMessage> = self
            .messages
            .iter()
            .filter_map(|m| match m.origin {
                MessageOrigin::User => Some(ChatMessage {
                    role: ChatRole::User,
                    content: m.content.clone(),
                }),
                MessageOrigin::GeneratedResponse => Some(ChatMessage {
                    role: ChatRole::Assistant,
                    content: m.content.clone(),
                }),
                _ => None,
            })
            .collect();

        if first_call {
            outgoing.push(ChatMessage {
                role: ChatRole::User,
                content: format!("{}{}", INTAKE_SUMMARY_PREFIX, self.intake_summary()),
            });
            self.intake_complete = true;
        }

        self.messages
            .push(Message::new(MessageOrigin::Thinking, THINKING_PLACEHOLDER));
        self.phase = Phase::CallingService;

        ServiceCall {
            messages: outgoing,
            topic_id: self.topic.id.to_string(),
            intake_answers: self.answers.clone(),
        }
    }

    /// One "label: answer" line per question, in scripted order.
    pub fn intake_summary(&self) -> String {
        self.topic
            .intake_questions
            .iter()
            .filter_map(|q| {
                self.answers
                    .get(q.id)
                    .map(|a| format!("{}: {}", q.label, a))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn remove_thinking_placeholder(&mut self) {
        self.messages
            .retain(|m| m.origin != MessageOrigin::Thinking);
    }
}

// ============ Resume state ============

/// Session-resume handle for the upload sub-flow: carries the case id across
/// a page reload. Explicitly expiring state passed into the controller, not a
/// process-wide slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeState {
    pub case_id: Uuid,
    pub issued_at: DateTime<Utc>,
}

impl ResumeState {
    /// Resume handles expire 24 hours after issue.
    pub const TTL_HOURS: i64 = 24;

    pub fn new(case_id: Uuid) -> Self {
        Self {
            case_id,
            issued_at: Utc::now(),
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now - self.issued_at < Duration::hours(Self::TTL_HOURS)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}
