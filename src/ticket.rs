//! Branching intake flow for the traffic-ticket category.
//!
//! Unlike the generic scripted intake, this flow first offers a choice between
//! uploading the ticket (server-side extraction, then a field-confirmation
//! step) and answering a fixed secondary question list manually. Both paths
//! collect identity before the first reasoning-service call, and a final
//! answer here leads to a phone + consent capture instead of the generic
//! lawyer-recommendation modal.

use crate::conversation::{ResumeState, ServiceCall, INTAKE_SUMMARY_PREFIX};
use crate::models::{ChatMessage, ChatRole, ExtractedFields};
use std::collections::BTreeMap;

/// One manually-asked ticket question with its inline validation rules.
#[derive(Debug, Clone, Copy)]
pub struct TicketQuestion {
    pub id: &'static str,
    pub label: &'static str,
    empty_error: &'static str,
    /// Minimum trimmed length and the message shown below it, when applicable.
    min_len: Option<(usize, &'static str)>,
}

impl TicketQuestion {
    /// Validate an answer before it is accepted. Errors are rendered inline;
    /// no state transition happens until the answer passes.
    pub fn validate(&self, answer: &str) -> Result<(), &'static str> {
        let trimmed = answer.trim();
        if trimmed.is_empty() {
            return Err(self.empty_error);
        }
        if let Some((min, message)) = self.min_len {
            if trimmed.chars().count() < min {
                return Err(message);
            }
        }
        Ok(())
    }
}

pub const TICKET_QUESTIONS: &[TicketQuestion] = &[
    TicketQuestion {
        id: "date",
        label: "מתי קרה האירוע שבגינו קיבלת את הדוח?",
        empty_error: "יש להזין תאריך",
        min_len: Some((3, "יש להזין תיאור תקין של התאריך")),
    },
    TicketQuestion {
        id: "location",
        label: "איפה זה קרה? (מיקום מדויק)",
        empty_error: "יש להזין מיקום",
        min_len: Some((2, "יש להזין מיקום תקין")),
    },
    TicketQuestion {
        id: "violation",
        label: "מה הדוח טוען? (למשל: חריגת מהירות, עצירה אסורה)",
        empty_error: "יש לתאר את העבירה",
        min_len: Some((3, "יש להזין תיאור תקין")),
    },
    TicketQuestion {
        id: "points",
        label: "כמה נקודות רשום בדוח?",
        empty_error: "יש להזין מספר נקודות",
        min_len: None,
    },
    TicketQuestion {
        id: "defense",
        label: "מה ההגנה שלך? (תאר בקצרה למה אתה חושב שהדוח לא צודק)",
        empty_error: "יש לתאר את ההגנה",
        min_len: Some((5, "יש להרחיב בתיאור ההגנה")),
    },
];

/// Collected identity, required before the first assessment call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub full_name: String,
    pub email: Option<String>,
}

/// Phase of the ticket flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketPhase {
    /// Initial "upload or manual?" choice.
    ChoosingFlow,
    /// Upload selected; waiting for the extraction result from the server.
    AwaitingUpload,
    /// Extracted fields shown for user edit/approval.
    ConfirmingFields(ExtractedFields),
    /// Manual path: the i-th secondary question is pending.
    AskingQuestion(usize),
    /// Name + optional email capture; gates the first service call.
    CollectingIdentity,
    CallingService,
    AwaitingFollowUp,
    Terminal,
    /// Post-final-answer phone + consent capture.
    CapturingEscalation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryPath {
    Upload,
    Manual,
}

/// State machine for one traffic-ticket intake session.
#[derive(Debug)]
pub struct TicketIntake {
    phase: TicketPhase,
    path: Option<EntryPath>,
    answers: BTreeMap<String, String>,
    confirmed_fields: Option<ExtractedFields>,
    identity: Option<Identity>,
    transcript: Vec<ChatMessage>,
    first_call_done: bool,
    resume: Option<ResumeState>,
}

impl TicketIntake {
    /// Start a fresh session, or resume the upload sub-flow from a prior case
    /// id. Expired resume handles are discarded and the session starts over.
    pub fn new(resume: Option<ResumeState>) -> Self {
        let resume = resume.filter(|r| r.is_valid());
        Self {
            phase: TicketPhase::ChoosingFlow,
            path: None,
            answers: BTreeMap::new(),
            confirmed_fields: None,
            identity: None,
            transcript: Vec::new(),
            first_call_done: false,
            resume,
        }
    }

    pub fn phase(&self) -> &TicketPhase {
        &self.phase
    }

    /// Case id to reuse for the upload sub-flow, when a valid resume handle
    /// was supplied.
    pub fn resumed_case_id(&self) -> Option<uuid::Uuid> {
        self.resume.map(|r| r.case_id)
    }

    pub fn choose_upload(&mut self) {
        if self.phase == TicketPhase::ChoosingFlow {
            self.path = Some(EntryPath::Upload);
            self.phase = TicketPhase::AwaitingUpload;
        }
    }

    pub fn choose_manual(&mut self) {
        if self.phase == TicketPhase::ChoosingFlow {
            self.path = Some(EntryPath::Manual);
            self.phase = TicketPhase::AskingQuestion(0);
        }
    }

    /// Server-side extraction finished; move to the confirmation step.
    pub fn extraction_ready(&mut self, fields: ExtractedFields) {
        if self.phase == TicketPhase::AwaitingUpload {
            self.phase = TicketPhase::ConfirmingFields(fields);
        }
    }

    /// User approved (possibly edited) the extracted record.
    pub fn confirm_fields(&mut self, edits: ExtractedFields) {
        if let TicketPhase::ConfirmingFields(extracted) = &self.phase {
            self.confirmed_fields = Some(extracted.merged_with(&edits));
            self.phase = TicketPhase::CollectingIdentity;
        }
    }

    /// Answer the current manual question. Validation failures leave the
    /// phase untouched and return the inline message.
    pub fn answer_question(&mut self, text: &str) -> Result<(), &'static str> {
        let TicketPhase::AskingQuestion(i) = self.phase.clone() else {
            return Ok(());
        };
        let question = &TICKET_QUESTIONS[i];
        question.validate(text)?;
        let trimmed = text.trim().to_string();
        self.transcript.push(ChatMessage {
            role: ChatRole::User,
            content: trimmed.clone(),
        });
        self.answers.insert(question.id.to_string(), trimmed);
        self.phase = if i + 1 < TICKET_QUESTIONS.len() {
            TicketPhase::AskingQuestion(i + 1)
        } else {
            TicketPhase::CollectingIdentity
        };
        Ok(())
    }

    /// Submit identity and produce the first assessment request. Name is
    /// required; email is optional but must look like an address when given.
    pub fn submit_identity(
        &mut self,
        full_name: &str,
        email: Option<&str>,
    ) -> Result<ServiceCall, &'static str> {
        if self.phase != TicketPhase::CollectingIdentity {
            return Err("לא ניתן לשלוח פרטים בשלב זה");
        }
        let name = full_name.trim();
        if name.is_empty() {
            return Err("יש להזין שם מלא");
        }
        let email = match email.map(str::trim) {
            Some(e) if !e.is_empty() => {
                if !e.contains('@') || !e.contains('.') {
                    return Err("כתובת האימייל אינה תקינה");
                }
                Some(e.to_string())
            }
            _ => None,
        };
        self.identity = Some(Identity {
            full_name: name.to_string(),
            email,
        });
        Ok(self.begin_call())
    }

    /// Follow-up message after the first assessment.
    pub fn handle_user_input(&mut self, input: &str) -> Option<ServiceCall> {
        match self.phase {
            TicketPhase::AwaitingFollowUp | TicketPhase::Terminal => {
                let text = input.trim();
                if text.is_empty() {
                    return None;
                }
                self.transcript.push(ChatMessage {
                    role: ChatRole::User,
                    content: text.to_string(),
                });
                Some(self.begin_call())
            }
            _ => None,
        }
    }

    pub fn handle_service_success(&mut self, content: &str) {
        if self.phase != TicketPhase::CallingService {
            return;
        }
        self.transcript.push(ChatMessage {
            role: ChatRole::Assistant,
            content: content.to_string(),
        });
        self.phase = match crate::conversation::classify_response(content) {
            crate::conversation::ResponseKind::FollowUpQuestion => TicketPhase::AwaitingFollowUp,
            crate::conversation::ResponseKind::FinalAnswer => TicketPhase::Terminal,
        };
    }

    pub fn handle_service_failure(&mut self) {
        if self.phase == TicketPhase::CallingService {
            self.phase = TicketPhase::AwaitingFollowUp;
        }
    }

    /// User accepted the escalation call-to-action after a final answer.
    pub fn request_escalation(&mut self) {
        if self.phase == TicketPhase::Terminal {
            self.phase = TicketPhase::CapturingEscalation;
        }
    }

    /// Validate the phone + consent capture. Accepts local 05X numbers and
    /// the +972 international form; consent is mandatory.
    pub fn submit_escalation(
        &mut self,
        phone: &str,
        consent: bool,
    ) -> Result<(String, bool), &'static str> {
        if self.phase != TicketPhase::CapturingEscalation {
            return Err("לא ניתן לשלוח פרטים בשלב זה");
        }
        if !consent {
            return Err("יש לאשר את תנאי השימוש");
        }
        let digits: String = phone
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect();
        let plausible = (digits.starts_with("05") && digits.chars().count() == 10)
            || (digits.starts_with("+9725") && digits.chars().count() == 13);
        if !plausible {
            return Err("יש להזין מספר טלפון תקין");
        }
        self.phase = TicketPhase::Terminal;
        Ok((digits, consent))
    }

    fn begin_call(&mut self) -> ServiceCall {
        let mut messages = self.transcript.clone();
        if !self.first_call_done {
            messages.push(ChatMessage {
                role: ChatRole::User,
                content: format!("{}{}", INTAKE_SUMMARY_PREFIX, self.case_summary()),
            });
            self.first_call_done = true;
        }
        self.phase = TicketPhase::CallingService;
        ServiceCall {
            messages,
            topic_id: "traffic".to_string(),
            intake_answers: self.effective_answers(),
        }
    }

    /// The answer map sent upstream: manual answers on the manual path, the
    /// confirmed field set rendered as answers on the upload path.
    fn effective_answers(&self) -> BTreeMap<String, String> {
        match self.path {
            Some(EntryPath::Manual) | None => self.answers.clone(),
            Some(EntryPath::Upload) => {
                let mut map = BTreeMap::new();
                if let Some(fields) = &self.confirmed_fields {
                    let pairs = [
                        ("date", &fields.date_time),
                        ("location", &fields.location),
                        ("violation", &fields.fine_type),
                        ("points", &fields.points),
                    ];
                    for (id, value) in pairs {
                        if let Some(v) = value {
                            map.insert(id.to_string(), v.clone());
                        }
                    }
                }
                map
            }
        }
    }

    fn case_summary(&self) -> String {
        match self.path {
            Some(EntryPath::Manual) | None => TICKET_QUESTIONS
                .iter()
                .filter_map(|q| {
                    self.answers
                        .get(q.id)
                        .map(|a| format!("{}: {}", q.label, a))
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Some(EntryPath::Upload) => {
                let mut lines = Vec::new();
                if let Some(fields) = &self.confirmed_fields {
                    let labeled = [
                        ("סוג העבירה", &fields.fine_type),
                        ("תאריך ושעה", &fields.date_time),
                        ("מיקום", &fields.location),
                        ("סכום הקנס", &fields.amount),
                        ("נקודות", &fields.points),
                        ("סעיף חוק", &fields.law_section),
                        ("מספר רכב", &fields.vehicle_plate),
                        ("הרשות המנפיקה", &fields.issuing_authority),
                    ];
                    for (label, value) in labeled {
                        if let Some(v) = value {
                            lines.push(format!("{}: {}", label, v));
                        }
                    }
                }
                lines.join("\n")
            }
        }
    }
}
