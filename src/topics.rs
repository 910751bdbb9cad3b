//! Static intake-question catalog, one entry per legal category.
//!
//! The catalog is fixed at compile time; the controller looks topics up by id
//! and walks the questions in order before any reasoning-service call is made.

/// One scripted intake question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeQuestion {
    pub id: &'static str,
    pub label: &'static str,
}

/// A legal category with its ordered intake script.
#[derive(Debug, Clone, Copy)]
pub struct ChatTopic {
    pub id: &'static str,
    pub title: &'static str,
    pub intake_questions: &'static [IntakeQuestion],
}

pub const CHAT_TOPICS: &[ChatTopic] = &[
    ChatTopic {
        id: "traffic",
        title: "תעבורה",
        intake_questions: &[
            IntakeQuestion {
                id: "q1",
                label: "מתי קרה האירוע שבגינו קיבלת את הדוח?",
            },
            IntakeQuestion {
                id: "q2",
                label: "איפה זה קרה? (מיקום מדויק)",
            },
            IntakeQuestion {
                id: "q3",
                label: "מה הדוח טוען? (למשל: חריגת מהירות, עצירה אסורה)",
            },
            IntakeQuestion {
                id: "q4",
                label: "כמה נקודות רשום בדוח?",
            },
        ],
    },
    ChatTopic {
        id: "torts",
        title: "נזיקין",
        intake_questions: &[
            IntakeQuestion {
                id: "q1",
                label: "מתי קרה האירוע שגרם לנזק?",
            },
            IntakeQuestion {
                id: "q2",
                label: "איפה זה קרה? (מיקום מדויק)",
            },
            IntakeQuestion {
                id: "q3",
                label: "איזה סוג נזק נגרם לך? (פציעה, נזק לרכוש, וכו')",
            },
            IntakeQuestion {
                id: "q4",
                label: "האם פנית לרופא או טיפלת בנזק? תאר בקצרה",
            },
        ],
    },
    ChatTopic {
        id: "small-claims",
        title: "תביעות קטנות",
        intake_questions: &[
            IntakeQuestion {
                id: "q1",
                label: "מה קנית או איזה שירות קיבלת?",
            },
            IntakeQuestion {
                id: "q2",
                label: "מה הבעיה? תאר בקצרה מה לא תקין",
            },
            IntakeQuestion {
                id: "q3",
                label: "כמה שילמת? (סכום משוער)",
            },
            IntakeQuestion {
                id: "q4",
                label: "האם יש לך מסמכים שמעידים על הבעיה? (חשבונית, תמונות, התכתבות)",
            },
        ],
    },
    ChatTopic {
        id: "labor",
        title: "דיני עבודה",
        intake_questions: &[
            IntakeQuestion {
                id: "q1",
                label: "כמה זמן עבדת במקום העבודה?",
            },
            IntakeQuestion {
                id: "q2",
                label: "מה היה תפקידך?",
            },
            IntakeQuestion {
                id: "q3",
                label: "מה קרה? (פיטורים, שכר שלא שולם, זכויות, וכו')",
            },
            IntakeQuestion {
                id: "q4",
                label: "האם קיבלת מכתב פיטורים רשמי או מסמכים רלוונטיים?",
            },
        ],
    },
    ChatTopic {
        id: "housing",
        title: "דיור ושכירות",
        intake_questions: &[
            IntakeQuestion {
                id: "q1",
                label: "האם אתה שוכר או משכיר?",
            },
            IntakeQuestion {
                id: "q2",
                label: "מה הבעיה? תאר בקצרה",
            },
            IntakeQuestion {
                id: "q3",
                label: "מתי זה התחיל?",
            },
            IntakeQuestion {
                id: "q4",
                label: "האם יש חוזה שכירות רשום? מה מצב הדירה כיום?",
            },
        ],
    },
];

/// Look a topic up by its id. Unknown ids return `None`; callers surface
/// a validation error rather than guessing a category.
pub fn topic_by_id(id: &str) -> Option<&'static ChatTopic> {
    CHAT_TOPICS.iter().find(|t| t.id == id)
}
