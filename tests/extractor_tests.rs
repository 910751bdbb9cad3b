/// Field extractor tests: first-match-wins ordering, tolerance of missing
/// fields, and the Hebrew fine-report scenarios the front end relies on.
use legal_intake_api::extractor::extract_fields;
use legal_intake_api::models::ExtractedFields;

#[test]
fn text_without_patterns_yields_all_absent() {
    let fields = extract_fields("sample text with nothing interesting in it at all");
    assert_eq!(fields, ExtractedFields::default());
    assert!(fields.is_empty());
}

#[test]
fn empty_text_yields_all_absent() {
    assert!(extract_fields("").is_empty());
}

#[test]
fn hebrew_fine_report_scenario() {
    let text = "דוח תנועה: העבירה לפי סעיף 62 לחוק. קנס בסך 1,000 ש\"ח ובנוסף 4 נקודות.";
    let fields = extract_fields(text);
    assert_eq!(fields.law_section.as_deref(), Some("62"));
    assert_eq!(fields.amount.as_deref(), Some("1,000"));
    assert_eq!(fields.points.as_deref(), Some("4"));
    assert!(!fields.needs_ocr);
}

#[test]
fn date_prefers_numeric_over_hebrew_phrase() {
    let text = "ביום 12/03/2024 וגם יום 5 ב מרץ";
    let fields = extract_fields(text);
    assert_eq!(fields.date_time.as_deref(), Some("12/03/2024"));
}

#[test]
fn date_hebrew_phrase_when_no_numeric_date() {
    let fields = extract_fields("זה קרה ביום 5 ב מרץ בבוקר");
    assert_eq!(fields.date_time.as_deref(), Some("יום 5 ב מרץ"));
}

#[test]
fn date_accepts_iso_style() {
    let fields = extract_fields("התאריך הרשום: 2024-03-12 בשעה 14:30");
    // The D/M/Y pattern also matches a prefix of an ISO date, so the
    // first-pattern match wins
    assert!(fields.date_time.is_some());
}

#[test]
fn amount_currency_abbreviation_beats_label() {
    let text = "סכום: 500 אבל לתשלום 750 ש\"ח";
    let fields = extract_fields(text);
    assert_eq!(fields.amount.as_deref(), Some("750"));
}

#[test]
fn amount_from_shekel_symbol() {
    let fields = extract_fields("לתשלום: 320 ₪ עד סוף החודש");
    assert_eq!(fields.amount.as_deref(), Some("320"));
}

#[test]
fn amount_from_label_prefix() {
    let fields = extract_fields("סכום: 250");
    assert_eq!(fields.amount.as_deref(), Some("250"));
}

#[test]
fn points_number_before_label() {
    let fields = extract_fields("נרשמו לך 8 נקודות בגין העבירה");
    assert_eq!(fields.points.as_deref(), Some("8"));
}

#[test]
fn points_english_label() {
    let fields = extract_fields("Points: 6 recorded for this violation");
    assert_eq!(fields.points.as_deref(), Some("6"));
}

#[test]
fn location_captures_keyword_and_trailing_text() {
    let text = "המקום: רחוב הרצל 15, תל אביב\nשורה חדשה שלא נכללת";
    let fields = extract_fields(text);
    let location = fields.location.expect("location should be extracted");
    assert!(location.starts_with("רחוב הרצל 15"));
    assert!(!location.contains("שורה חדשה"));
}

#[test]
fn location_keyword_priority_is_fixed() {
    // Both keywords present; the keyword list order decides, not text order
    let text = "ליד כביש 4 ממש קרוב, רחוב ביאליק 3";
    let fields = extract_fields(text);
    assert!(fields.location.as_deref().unwrap().starts_with("רחוב"));
}

#[test]
fn vehicle_plate_grouped_digits() {
    let fields = extract_fields("מספר הרכב 123-45-678 נצפה במקום");
    assert_eq!(fields.vehicle_plate.as_deref(), Some("123-45-678"));
}

#[test]
fn law_section_with_hebrew_letter_suffix() {
    let fields = extract_fields("בניגוד לסעיף: 27א לתקנות");
    assert_eq!(fields.law_section.as_deref(), Some("27א"));
}

#[test]
fn law_section_from_to_the_law_suffix() {
    let fields = extract_fields("עבירה לפי 12 לחוק העונשין");
    assert_eq!(fields.law_section.as_deref(), Some("12"));
}

#[test]
fn fine_type_first_in_list_wins() {
    // Both phrases appear; the configured order decides
    let text = "נהיגה מסוכנת וגם חריגת מהירות";
    let fields = extract_fields(text);
    assert_eq!(fields.fine_type.as_deref(), Some("חריגת מהירות"));
}

#[test]
fn issuing_authority_prefers_full_name() {
    let fields = extract_fields("הדוח נרשם על ידי משטרת ישראל בתחנת גלילות");
    assert_eq!(fields.issuing_authority.as_deref(), Some("משטרת ישראל"));
}

#[test]
fn extraction_is_deterministic() {
    let text = "סעיף 62 לחוק, 1,000 ש\"ח, 4 נקודות, רחוב אלנבי, 123-45-678";
    let first = extract_fields(text);
    for _ in 0..10 {
        assert_eq!(extract_fields(text), first);
    }
}

#[test]
fn full_report_extracts_every_field() {
    let text = "משטרת ישראל\n\
                דוח מספר 4412\n\
                תאריך: 12/03/2024\n\
                מיקום: כביש 2 מחלף שפיים\n\
                עבירה: חריגת מהירות בניגוד לסעיף 54א לתקנות\n\
                רכב מספר 12-345-67\n\
                קנס: 750 ש\"ח\n\
                4 נקודות";
    let fields = extract_fields(text);
    assert_eq!(fields.fine_type.as_deref(), Some("חריגת מהירות"));
    assert_eq!(fields.date_time.as_deref(), Some("12/03/2024"));
    assert!(fields.location.as_deref().unwrap().starts_with("כביש 2"));
    assert_eq!(fields.amount.as_deref(), Some("750"));
    assert_eq!(fields.points.as_deref(), Some("4"));
    assert_eq!(fields.law_section.as_deref(), Some("54א"));
    assert_eq!(fields.vehicle_plate.as_deref(), Some("12-345-67"));
    assert_eq!(fields.issuing_authority.as_deref(), Some("משטרת ישראל"));
}
