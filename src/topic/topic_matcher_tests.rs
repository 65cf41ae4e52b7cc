use super::topic_matcher::{TopicPattern, matches};
use super::topic_pattern_item::TopicPatternError;

fn pattern(s: &str) -> TopicPattern {
	TopicPattern::try_from(s).expect("Pattern should be valid")
}

// Helper: checks the raw-pattern shorthand and the parsed pattern on every case
fn assert_matches(cases: &[(&str, &str, bool)]) {
	for (pattern_str, topic, expected) in cases {
		assert_eq!(
			matches(pattern_str, topic),
			*expected,
			"matches('{pattern_str}', '{topic}') should be {expected}"
		);
		assert_eq!(
			pattern(pattern_str).matches(topic),
			*expected,
			"TopicPattern('{pattern_str}').matches('{topic}') should be \
			 {expected}"
		);
	}
}

#[test]
fn test_single_level_wildcard() {
	assert_matches(&[
		("a/+/c", "a/b/c", true),
		("a/+/c", "a/b/x/c", false),
		("a/+/c", "a/c", false),
		("+/+", "a/b", true),
		("+", "a/b", false),
		("a/+", "a/", true),
	]);
}

#[test]
fn test_multi_level_wildcard() {
	assert_matches(&[
		("a/#", "a/b/c", true),
		("a/#", "x/b/c", false),
		("a/#", "a", true),
		("#", "anything/at/all", true),
		("a/+/#", "a/b", true),
		("a/+/#", "a", false),
	]);
}

#[test]
fn test_exact_topics() {
	assert_matches(&[
		("amora/devices/dev1/commands", "amora/devices/dev1/commands", true),
		("amora/devices/dev1/commands", "amora/devices/dev1/state", false),
		("amora/devices/dev1", "amora/devices/dev1/state", false),
		("amora/devices/dev1/state", "amora/devices/dev1", false),
	]);
}

#[test]
fn test_device_namespace_wildcards() {
	assert_matches(&[
		("amora/devices/dev1/#", "amora/devices/dev1/state", true),
		("amora/devices/dev1/#", "amora/devices/dev2/state", false),
		("amora/devices/+/#", "amora/devices/dev2/responses", true),
		("amora/devices/+/connection", "amora/devices/dev9/connection", true),
	]);
}

#[test]
fn test_hash_must_be_last() {
	let err = TopicPattern::try_from("a/#/c").unwrap_err();
	assert_eq!(err, TopicPatternError::hash_position("a/#/c"));
}

#[test]
fn test_invalid_pattern_matches_nothing() {
	assert!(!matches("a/#/c", "a/b/c"));
	assert!(!matches("a/b+", "a/b+"));
	assert!(!matches("", ""));
}

#[test]
fn test_empty_pattern_rejected() {
	assert_eq!(
		TopicPattern::try_from("").unwrap_err(),
		TopicPatternError::EmptyTopic
	);
	assert_eq!(
		TopicPattern::try_from("   ").unwrap_err(),
		TopicPatternError::EmptyTopic
	);
}

#[test]
fn test_partial_wildcard_rejected() {
	assert!(matches!(
		TopicPattern::try_from("a/b+/c"),
		Err(TopicPatternError::WildcardUsage { .. })
	));
}

#[test]
fn test_pattern_metadata() {
	let wildcard = pattern("amora/+/state");
	let exact = pattern("amora/dev/state");

	assert!(wildcard.is_wildcard());
	assert!(!exact.is_wildcard());
	assert_eq!(wildcard.items().len(), 3);
	assert_eq!(wildcard.to_string(), "amora/+/state");
}
