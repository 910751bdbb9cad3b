/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs: the extractor never
/// panics and stays deterministic, the classification heuristic honors its
/// boundaries, and whitespace input never mutates a conversation.
use legal_intake_api::conversation::{classify_response, Conversation, Phase, ResponseKind};
use legal_intake_api::crm::normalize_israeli_phone;
use legal_intake_api::extractor::extract_fields;
use proptest::prelude::*;

proptest! {
    #[test]
    fn extractor_never_panics(text in "\\PC*") {
        let _ = extract_fields(&text);
    }

    #[test]
    fn extractor_is_deterministic(text in "\\PC*") {
        prop_assert_eq!(extract_fields(&text), extract_fields(&text));
    }

    #[test]
    fn latin_text_without_digits_yields_all_absent(text in "[a-zA-Z ,.]{0,300}") {
        // No digits, no Hebrew keywords, no currency markers: nothing to find
        prop_assume!(!text.to_lowercase().contains("section"));
        prop_assume!(!text.to_lowercase().contains("points"));
        let fields = extract_fields(&text);
        prop_assert!(fields.is_empty());
    }
}

proptest! {
    #[test]
    fn short_responses_always_classify_as_questions(text in ".{1,100}") {
        prop_assume!(text.trim().chars().count() < 200);
        prop_assert_eq!(classify_response(&text), ResponseKind::FollowUpQuestion);
    }

    #[test]
    fn question_mark_terminated_responses_are_questions(body in "[a-zא-ת ]{0,400}") {
        let text = format!("{}?", body);
        prop_assert_eq!(classify_response(&text), ResponseKind::FollowUpQuestion);
    }

    #[test]
    fn classification_never_panics(text in "\\PC*") {
        let _ = classify_response(&text);
    }
}

proptest! {
    #[test]
    fn whitespace_never_mutates_a_conversation(input in "[ \\t\\n\\r]{0,40}") {
        let mut conversation = Conversation::new("traffic").unwrap();
        let before = conversation.messages().len();

        let call = conversation.handle_user_input(&input);

        prop_assert!(call.is_none());
        prop_assert_eq!(conversation.messages().len(), before);
        prop_assert_eq!(conversation.phase(), Phase::AskingQuestion(0));
        prop_assert!(conversation.answers().is_empty());
    }

    #[test]
    fn nonempty_answers_always_advance_the_intake(answer in "[a-zא-ת]{1,50}") {
        let mut conversation = Conversation::new("torts").unwrap();
        let call = conversation.handle_user_input(&answer);
        prop_assert!(call.is_none());
        prop_assert_eq!(conversation.phase(), Phase::AskingQuestion(1));
        prop_assert_eq!(conversation.answers().len(), 1);
    }
}

proptest! {
    #[test]
    fn phone_normalization_never_panics(phone in "\\PC*") {
        let _ = normalize_israeli_phone(&phone);
    }

    #[test]
    fn israeli_mobile_numbers_normalize_to_e164(
        prefix in prop::sample::select(vec!["50", "52", "53", "54", "58"]),
        rest in 1_000_000u32..=9_999_999u32,
    ) {
        let local = format!("0{}{}", prefix, rest);
        let normalized = normalize_israeli_phone(&local);
        prop_assert_eq!(normalized, format!("+972{}{}", prefix, rest));
    }
}
