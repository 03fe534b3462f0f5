use lisle_buffer::TokenizedBufferRegistry;
use lisle_lexer::tokenize;
use lisle_primitives::{BufferId, ChangeSet};
use proptest::prelude::*;

fn snippet() -> impl Strategy<Value = String> {
	prop::collection::vec(
		prop_oneof![
			Just("(".to_string()),
			Just(")".to_string()),
			Just("\"".to_string()),
			Just(";".to_string()),
			Just("\n".to_string()),
			Just(" ".to_string()),
			Just("#".to_string()),
			Just("\\".to_string()),
			"[a-z0-9:]{1,4}",
		],
		0..8,
	)
	.prop_map(|parts| parts.concat())
}

proptest! {
	#[test]
	fn prop_edit_sequence_matches_full_tokenize(
		initial in snippet(),
		edits in prop::collection::vec((any::<usize>(), any::<usize>(), snippet()), 1..12),
	) {
		let registry = TokenizedBufferRegistry::new();
		let id = BufferId(1);
		registry.create(id, None, &initial).expect("create");
		let mut expected = initial;

		for (a, b, insert) in edits {
			// All generated text is ASCII, so every offset is a char boundary.
			let len = expected.len();
			let (x, y) = (a % (len + 1), b % (len + 1));
			let range = x.min(y)..x.max(y);
			let changes = ChangeSet::replace(len, range, insert).expect("valid");
			expected = changes.apply_str(&expected).expect("apply");
			registry.on_edit(id, &changes).expect("edit");

			let snapshot = registry.get(id).expect("tracked");
			prop_assert_eq!(snapshot.text.to_string(), expected.clone());
			let expected_tokens = tokenize(&expected);
			prop_assert_eq!(snapshot.tokens(), expected_tokens.as_slice());
		}
	}
}
