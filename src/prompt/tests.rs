use super::*;

const CONTEXT: &str = "## Caching Layer\nReduced latency by 40% using caching.";
const QUESTION: &str = "What latency improvement was achieved?";

#[test]
fn render_places_parts_in_order() {
    for persona in Persona::ALL {
        let prompt = persona.render(CONTEXT, QUESTION);

        let rules_pos = prompt.find("STAR method").expect("rules are present");
        let context_pos = prompt.find("Reduced latency by 40%").expect("context is present");
        let question_pos = prompt.find(QUESTION).expect("question is present");

        assert!(rules_pos < context_pos, "{persona}: rules must precede context");
        assert!(
            context_pos < question_pos,
            "{persona}: context must precede question"
        );
    }
}

#[test]
fn render_is_deterministic() {
    let first = Persona::InterviewCoach.render(CONTEXT, QUESTION);
    let second = Persona::InterviewCoach.render(CONTEXT, QUESTION);
    assert_eq!(first, second);
}

#[test]
fn render_leaves_no_slots() {
    for persona in Persona::ALL {
        let prompt = persona.render(CONTEXT, QUESTION);
        assert!(!prompt.contains("{context}"));
        assert!(!prompt.contains("{question}"));
        assert!(!prompt.contains("{rules}"));
    }
}

#[test]
fn braces_in_inputs_are_not_substituted() {
    let context = "Config used `{question}` as a literal key and {\"a\": 1}.";
    let question = "What does {context} mean?";

    let prompt = Persona::Assistant.render(context, question);

    assert!(prompt.contains("Config used `{question}` as a literal key"));
    assert!(prompt.contains("What does {context} mean?"));
    assert_eq!(prompt.matches("What does {context} mean?").count(), 1);
}

#[test]
fn empty_context_still_renders() {
    let prompt = Persona::CareerAdvocate.render("", QUESTION);
    assert!(prompt.contains(QUESTION));
    assert!(prompt.contains("say that you don't know"));
}

#[test]
fn personas_differ() {
    let assistant = Persona::Assistant.render(CONTEXT, QUESTION);
    let coach = Persona::InterviewCoach.render(CONTEXT, QUESTION);
    let advocate = Persona::CareerAdvocate.render(CONTEXT, QUESTION);

    assert_ne!(assistant, coach);
    assert_ne!(coach, advocate);
    assert!(coach.contains("interview coach"));
    assert!(advocate.contains("Career Advocate"));
}

#[test]
fn persona_labels_round_trip_through_serde() {
    for persona in Persona::ALL {
        let json = serde_json::to_string(&persona).expect("can serialize persona");
        assert_eq!(json, format!("\"{}\"", persona.label()));
        let parsed: Persona = serde_json::from_str(&json).expect("can parse persona");
        assert_eq!(parsed, persona);
    }
}

#[test]
fn persona_parses_from_cli_value() {
    let parsed = Persona::from_str("interview-coach", false).expect("valid persona");
    assert_eq!(parsed, Persona::InterviewCoach);
    assert!(Persona::from_str("pirate", false).is_err());
}
