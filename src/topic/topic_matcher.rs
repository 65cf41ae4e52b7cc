//! MQTT wildcard matching of subscription patterns against concrete topics.

use std::fmt;

use arcstr::{ArcStr, Substr};
use smallvec::SmallVec;

use super::topic_pattern_item::{TopicPatternError, TopicPatternItem};

/// Parsed and validated subscription pattern.
///
/// A pattern is a `/`-separated list of literal segments, `+` (exactly one
/// level) and `#` (every remaining level, last segment only).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPattern {
	pattern: ArcStr,
	items: SmallVec<[TopicPatternItem; 6]>,
}

impl TopicPattern {
	/// Parses a subscription pattern, rejecting misplaced wildcards.
	pub fn parse(pattern: impl Into<ArcStr>) -> Result<Self, TopicPatternError> {
		let pattern: ArcStr = pattern.into();
		super::validation::validate_pattern_for_subscription(&pattern)?;

		let segments: Vec<Substr> = pattern
			.split('/')
			.map(|s| pattern.substr_from(s))
			.collect();
		let last = segments.len() - 1;
		let mut items = SmallVec::with_capacity(segments.len());
		for (index, segment) in segments.into_iter().enumerate() {
			let item = TopicPatternItem::try_from(segment)?;
			if item == TopicPatternItem::Hash && index != last {
				return Err(TopicPatternError::hash_position(pattern.as_str()));
			}
			items.push(item);
		}
		Ok(Self { pattern, items })
	}

	/// Original pattern string.
	pub fn as_str(&self) -> &str {
		&self.pattern
	}

	/// Shared handle to the pattern string.
	pub fn as_arcstr(&self) -> ArcStr {
		self.pattern.clone()
	}

	/// True when the pattern contains `+` or `#`.
	pub fn is_wildcard(&self) -> bool {
		self.items.iter().any(TopicPatternItem::is_wildcard)
	}

	/// Parsed segments.
	pub fn items(&self) -> &[TopicPatternItem] {
		&self.items
	}

	/// Checks whether a concrete topic matches this pattern.
	pub fn matches(&self, topic: &str) -> bool {
		let mut topic_segments = topic.split('/');
		for item in &self.items {
			match item {
				| TopicPatternItem::Hash => return true,
				| TopicPatternItem::Plus => {
					if topic_segments.next().is_none() {
						return false;
					}
				}
				| TopicPatternItem::Str(expected) => {
					match topic_segments.next() {
						| Some(segment) if segment == expected.as_str() => {}
						| _ => return false,
					}
				}
			}
		}
		topic_segments.next().is_none()
	}
}

impl fmt::Display for TopicPattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.pattern)
	}
}

impl TryFrom<&str> for TopicPattern {
	type Error = TopicPatternError;

	fn try_from(value: &str) -> Result<Self, Self::Error> {
		Self::parse(ArcStr::from(value))
	}
}

impl TryFrom<String> for TopicPattern {
	type Error = TopicPatternError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(ArcStr::from(value))
	}
}

/// Matches a raw subscription pattern against a concrete topic.
///
/// Shorthand for parsing the pattern and calling [`TopicPattern::matches`];
/// an invalid pattern matches nothing.
pub fn matches(pattern: &str, topic: &str) -> bool {
	TopicPattern::try_from(pattern).is_ok_and(|pattern| pattern.matches(topic))
}
