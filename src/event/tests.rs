use rstest::rstest;
use serde_json::json;

use super::payload::language_tag;
use super::*;

#[test]
fn custom_event_defaults_title_to_name() {
    let payload = Payload::builder("site", "checkout").build().expect("payload");
    assert_eq!(payload.name(), Some("checkout"));
    assert_eq!(payload.title(), Some("checkout"));
    assert_eq!(payload.url(), Some("/"));
    assert_eq!(payload.referrer(), Some(""));
    assert_eq!(payload.screen(), Some(DEFAULT_SCREEN));
    assert!(payload.hostname().is_some_and(|h| !h.is_empty()));
    assert!(!payload.id().is_empty());
}

#[test]
fn pageview_has_no_name_and_empty_title() {
    let payload = Payload::pageview("site").build().expect("payload");
    assert!(payload.is_pageview());
    assert_eq!(payload.name(), None);
    assert_eq!(payload.title(), Some(""));
}

#[rstest]
#[case::blank_website(Payload::builder("  ", "click"), PayloadError::MissingWebsite)]
#[case::blank_name(Payload::builder("site", ""), PayloadError::MissingName)]
#[case::blank_id(Payload::pageview("site").id(""), PayloadError::MissingId)]
fn invalid_payloads_are_rejected(#[case] builder: PayloadBuilder, #[case] expected: PayloadError) {
    assert_eq!(builder.build().expect_err("must fail"), expected);
}

#[test]
fn data_map_is_owned_by_payload() {
    let mut data = std::collections::BTreeMap::new();
    data.insert("amount".to_string(), json!(99.5));
    let payload = Payload::builder("site", "buy")
        .data(data.clone())
        .build()
        .expect("payload");
    data.insert("currency".to_string(), json!("USD"));
    assert_eq!(payload.data().len(), 1);
    assert_eq!(payload.data()["amount"], json!(99.5));
}

#[test]
fn add_data_accumulates_entries() {
    let payload = Payload::builder("site", "buy")
        .add_data("amount", 10)
        .add_data("note", serde_json::Value::Null)
        .build()
        .expect("payload");
    assert_eq!(payload.data().len(), 2);
    assert!(payload.data()["note"].is_null());
}

#[test]
fn new_event_starts_without_retries() {
    let mut event = Event::new(Payload::pageview("site").build().expect("payload"));
    assert_eq!(event.kind(), EventKind::Event);
    assert_eq!(event.retry_count(), 0);
    event.increment_retry_count();
    event.increment_retry_count();
    assert_eq!(event.retry_count(), 2);
}

#[test]
fn event_label_falls_back_to_pageview() {
    let page = Event::new(Payload::pageview("site").build().expect("payload"));
    let custom = Event::identify(Payload::builder("site", "identify").build().expect("payload"));
    assert_eq!(page.label(), "pageview");
    assert_eq!(custom.label(), "identify");
    assert_eq!(custom.kind().as_str(), "identify");
}

#[rstest]
#[case("en_GB.UTF-8", Some("en-GB"))]
#[case("de_DE@euro", Some("de-DE"))]
#[case("fr", Some("fr"))]
#[case("C", None)]
#[case("POSIX", None)]
#[case("", None)]
fn locale_strings_map_to_language_tags(#[case] locale: &str, #[case] expected: Option<&str>) {
    assert_eq!(language_tag(locale).as_deref(), expected);
}
