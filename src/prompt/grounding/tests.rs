use super::*;

#[test]
fn extracts_numbers_with_units() {
    let metrics = extract_metrics("Cut p99 from 800ms to 120 ms, a 40% drop and 6x throughput.");
    let texts: Vec<&str> = metrics.iter().map(|m| m.text.as_str()).collect();

    assert!(texts.contains(&"800ms"));
    assert!(texts.contains(&"120 ms"));
    assert!(texts.contains(&"40%"));
    assert!(texts.contains(&"6x"));
    assert!(metrics.iter().all(|m| m.has_unit || m.text == "99"));
}

#[test]
fn ignores_digits_inside_identifiers() {
    let metrics = extract_metrics("Deployed llama3 on HoloLens2 with python3.11");
    assert!(metrics.is_empty(), "found {:?}", metrics);
}

#[test]
fn normalizes_thousands_separators() {
    let metrics = extract_metrics("Served 12,000 users");
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].value, "12000");
    assert!(metrics[0].has_unit);
}

#[test]
fn supported_metrics_pass() {
    let context = "Reduced latency by 40% using caching.";
    let answer = "Situation: slow pages. Action: added caching. Result: latency dropped 40%.";
    assert!(unsupported_metrics(answer, context).is_empty());
}

#[test]
fn fabricated_metrics_are_flagged() {
    let context = "Reduced latency by 40% using caching.";
    let answer = "Latency dropped 40% and throughput improved 3x, saving $5,000 per month.";

    let unsupported = unsupported_metrics(answer, context);
    assert_eq!(unsupported, vec!["3x".to_string(), "$5,000".to_string()]);
}

#[test]
fn list_markers_are_not_metrics() {
    let context = "Migrated the build to Bazel.";
    let answer = "1. Situation\n2. Task\n3. Action\n4. Result";
    assert!(unsupported_metrics(answer, context).is_empty());
}

#[test]
fn duplicates_reported_once() {
    let unsupported = unsupported_metrics("It was 75% faster, truly 75% faster.", "");
    assert_eq!(unsupported, vec!["75%".to_string()]);
}

#[test]
fn missing_information_answer_has_no_metrics() {
    let answer = "I don't know; the project notes don't mention the team size.";
    assert!(unsupported_metrics(answer, "Built a Kafka pipeline.").is_empty());
}
