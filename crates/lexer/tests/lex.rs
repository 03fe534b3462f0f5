use lisle_lexer::{relex, tokenize};
use lisle_primitives::{ChangeSet, Rope};
use proptest::prelude::*;

/// Source-like text: delimiters, literals, comments, reader macros and some
/// multi-byte characters, in arbitrary order.
fn source() -> impl Strategy<Value = String> {
	prop::collection::vec(
		prop_oneof![
			Just("(".to_string()),
			Just(")".to_string()),
			Just("[".to_string()),
			Just("}".to_string()),
			Just("#{".to_string()),
			Just("\"".to_string()),
			Just("\\".to_string()),
			Just(";".to_string()),
			Just("\n".to_string()),
			Just(" ".to_string()),
			Just("#".to_string()),
			Just("~@".to_string()),
			Just("λ".to_string()),
			"[a-z:+\\-0-9./]{1,6}",
		],
		0..40,
	)
	.prop_map(|parts| parts.concat())
}

fn boundary(text: &str, raw: usize) -> usize {
	let boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).chain([text.len()]).collect();
	boundaries[raw % boundaries.len()]
}

proptest! {
	#[test]
	fn prop_tokens_reproduce_source(text in source()) {
		let tokens = tokenize(&text);
		let joined: String = tokens.iter().map(|t| t.text.as_str()).collect();
		prop_assert_eq!(&joined, &text);
		prop_assert_eq!(tokens.is_empty(), text.is_empty());

		let mut expected_start = 0;
		for token in &tokens {
			prop_assert_eq!(token.start, expected_start);
			prop_assert!(!token.is_empty());
			expected_start = token.end();
		}
	}

	#[test]
	fn prop_arbitrary_unicode_never_panics(text in "\\PC{0,64}") {
		let joined: String = tokenize(&text).iter().map(|t| t.text.as_str()).collect();
		prop_assert_eq!(joined, text);
	}

	#[test]
	fn prop_relex_matches_full_tokenize(
		text in source(),
		a in any::<usize>(),
		b in any::<usize>(),
		insert in source(),
	) {
		let (start, end) = {
			let (x, y) = (boundary(&text, a), boundary(&text, b));
			(x.min(y), x.max(y))
		};
		let cs = ChangeSet::replace(text.len(), start..end, insert).expect("valid edit");
		let after = cs.apply_str(&text).expect("apply");

		let old = tokenize(&text);
		let expected = tokenize(&after);
		match cs.window() {
			Some(window) => {
				let rope = Rope::from(after.as_str());
				prop_assert_eq!(relex(&old, rope.slice(..), window), expected);
			}
			None => prop_assert_eq!(old, expected),
		}
	}
}
