//! Pattern-based field extraction from fine/report text.
//!
//! Each field is extracted independently with a first-match-wins pass over an
//! ordered pattern list. This is deliberately simple: the results are only a
//! pre-fill for the confirmation step, never authoritative data.

use crate::models::ExtractedFields;
use regex::Regex;

/// Location nouns scanned in order; the first hit anchors the captured span.
const LOCATION_KEYWORDS: &[&str] = &["רחוב", "כביש", "מחלף", "צומת", "שדרות", "רח׳"];

/// Known violation phrases, matched as literal substrings.
const FINE_TYPES: &[&str] = &[
    "חריגת מהירות",
    "עצירה אסורה",
    "אי ציות לתמרור",
    "נהיגה מסוכנת",
    "אי ציות לרמזור",
];

const AUTHORITY_KEYWORDS: &[&str] = &["משטרת ישראל", "רשות הרישוי", "משטרה"];

/// Run every field extractor over `text` and collect whatever matched.
/// Fields that match nothing stay `None`; the result may be entirely empty.
pub fn extract_fields(text: &str) -> ExtractedFields {
    ExtractedFields {
        fine_type: extract_fine_type(text),
        date_time: extract_date_time(text),
        location: extract_location(text),
        amount: extract_amount(text),
        points: extract_points(text),
        law_section: extract_law_section(text),
        vehicle_plate: extract_vehicle_plate(text),
        issuing_authority: extract_issuing_authority(text),
        needs_ocr: false,
    }
}

/// First match wins across the pattern list; the captured group is preferred
/// over the whole match when one exists.
fn first_capture(text: &str, patterns: &[&str]) -> Option<String> {
    for pattern in patterns {
        let re = Regex::new(pattern).ok()?;
        if let Some(caps) = re.captures(text) {
            let value = caps
                .get(1)
                .or_else(|| caps.get(0))
                .map(|m| m.as_str().to_string());
            if value.is_some() {
                return value;
            }
        }
    }
    None
}

fn extract_date_time(text: &str) -> Option<String> {
    // Numeric DD/MM/YY(YY), numeric YYYY-MM-DD, then a Hebrew day-of-month phrase
    first_capture(
        text,
        &[
            r"\d{1,2}[/\-.]\d{1,2}[/\-.]\d{2,4}",
            r"\d{4}[/\-.]\d{1,2}[/\-.]\d{1,2}",
            r"יום\s+\d{1,2}\s+ב\s+\w+",
        ],
    )
}

fn extract_amount(text: &str) -> Option<String> {
    first_capture(
        text,
        &[
            "(\\d[\\d,]*)\\s*ש\"ח",
            r"(\d[\d,]*)\s*₪",
            r"(\d[\d,]*)\s*NIS",
            r"סכום[:\s]+(\d[\d,]*)",
        ],
    )
}

fn extract_points(text: &str) -> Option<String> {
    first_capture(
        text,
        &[
            r"(\d+)\s*נקודות",
            r"נקודות[:\s]+(\d+)",
            r"(?i)points[:\s]+(\d+)",
        ],
    )
}

fn extract_location(text: &str) -> Option<String> {
    for keyword in LOCATION_KEYWORDS {
        let pattern = format!("{}[^\\n]{{0,50}}", regex::escape(keyword));
        if let Ok(re) = Regex::new(&pattern) {
            if let Some(m) = re.find(text) {
                return Some(m.as_str().trim().to_string());
            }
        }
    }
    None
}

fn extract_vehicle_plate(text: &str) -> Option<String> {
    // Israeli plate groupings: 123-45-678 / 12-345-67 and space-separated variants
    first_capture(text, &[r"\d{2,3}[-\s]\d{2,3}[-\s]\d{2,3}"])
}

fn extract_law_section(text: &str) -> Option<String> {
    first_capture(
        text,
        &[
            r"סעיף[:\s]+(\d+[א-ת]?)",
            r"(?i)section[:\s]+(\d+)",
            r"(\d+[א-ת]?)\s*לחוק",
        ],
    )
}

fn extract_fine_type(text: &str) -> Option<String> {
    FINE_TYPES
        .iter()
        .find(|t| text.contains(*t))
        .map(|t| t.to_string())
}

fn extract_issuing_authority(text: &str) -> Option<String> {
    AUTHORITY_KEYWORDS
        .iter()
        .find(|k| text.contains(*k))
        .map(|k| k.to_string())
}
