use proptest::prelude::*;

use super::*;

#[test]
fn test_changeset_retain() {
	let mut cs = ChangeSet::new();
	cs.retain(5);
	assert_eq!(cs.len(), 5);
	assert_eq!(cs.len_after(), 5);
	assert!(cs.is_identity());
	assert_eq!(cs.window(), None);
}

#[test]
fn test_changeset_delete_then_insert_is_canonical() {
	let mut cs = ChangeSet::new();
	cs.delete(2);
	cs.insert("aa");
	cs.retain(3);
	assert_eq!(
		cs.changes(),
		&[Operation::Insert("aa".into()), Operation::Delete(2), Operation::Retain(3)]
	);

	let mut doc = Rope::from("hello");
	cs.apply(&mut doc).expect("apply");
	assert_eq!(doc.to_string(), "aallo");
}

#[test]
fn test_from_edits_sorts_and_fills_gaps() {
	let cs = ChangeSet::from_edits(
		11,
		[TextEdit::insert(11, "!"), TextEdit::replace(0..5, "howdy"), TextEdit::delete(5..6)],
	)
	.expect("valid edits");
	assert_eq!(cs.apply_str("hello world").expect("apply"), "howdyworld!");
}

#[test]
fn test_from_edits_rejects_overlap() {
	let err = ChangeSet::from_edits(10, [TextEdit::delete(0..4), TextEdit::delete(2..6)]).unwrap_err();
	assert!(matches!(err, Error::OverlappingEdits { offset: 2 }));
}

#[test]
fn test_from_edits_rejects_out_of_bounds() {
	let err = ChangeSet::from_edits(3, [TextEdit::delete(1..9)]).unwrap_err();
	assert!(matches!(err, Error::EditOutOfBounds { offset: 9 }));
}

#[test]
fn test_apply_rejects_length_mismatch() {
	let cs = ChangeSet::replace(4, 0..1, "x").expect("valid");
	let mut doc = Rope::from("too long");
	let err = cs.apply(&mut doc).unwrap_err();
	assert!(matches!(err, Error::ChangeSetMismatch { expected: 4, actual: 8 }));
	assert_eq!(doc.to_string(), "too long");
}

#[test]
fn test_apply_rejects_split_utf8() {
	// 'λ' is two bytes; byte 1 is inside it.
	let cs = ChangeSet::replace(3, 1..2, "x").expect("valid shape");
	let mut doc = Rope::from("λa");
	assert!(matches!(cs.apply(&mut doc), Err(Error::EditOutOfBounds { offset: 1 })));
	assert!(cs.apply_str("λa").is_err());
}

#[test]
fn test_window_spans_all_changes() {
	let cs = ChangeSet::from_edits(10, [TextEdit::insert(2, "abc"), TextEdit::delete(6..8)]).expect("valid");
	let window = cs.window().expect("non-identity");
	assert_eq!(window.start, 2);
	assert_eq!(window.old_end, 8);
	assert_eq!(window.new_end, 9);
	assert_eq!(window.delta(), 1);
}

fn edits_strategy() -> impl Strategy<Value = (String, Vec<(usize, usize, String)>)> {
	("[a-z() λ\n]{0,24}", prop::collection::vec((0usize..32, 0usize..4, "[a-z;]{0,3}"), 0..4))
}

proptest! {
	#[test]
	fn prop_rope_and_str_application_agree((text, raw) in edits_strategy()) {
		let boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).chain([text.len()]).collect();
		let mut edits = Vec::new();
		let mut cursor = 0;
		for (skip, span, ins) in raw {
			let start_idx = boundaries.iter().position(|&b| b >= cursor).unwrap_or(boundaries.len() - 1);
			let start_idx = (start_idx + skip % 3).min(boundaries.len() - 1);
			let end_idx = (start_idx + span).min(boundaries.len() - 1);
			let (start, end) = (boundaries[start_idx], boundaries[end_idx]);
			edits.push(TextEdit::replace(start..end, ins));
			cursor = end + 1;
		}

		let cs = ChangeSet::from_edits(text.len(), edits).expect("edits are disjoint");
		let expected = cs.apply_str(&text).expect("boundaries are valid");
		let mut rope = Rope::from(text.as_str());
		cs.apply(&mut rope).expect("boundaries are valid");
		prop_assert_eq!(rope.to_string(), expected.clone());
		prop_assert_eq!(expected.len(), cs.len_after());
	}
}
