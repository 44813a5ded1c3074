//! End-to-end tests over a rendered diff document.
//!
//! Exercises: render_diff, resolve, AnchorStore range selection and drafts,
//! and the search / word-highlight markers reacting to re-renders.

use std::time::{Duration, Instant};

use gutter_core::anchors::{AnchorStore, Placement, Widget};
use gutter_core::dom::{Document, NodeId, Tag};
use gutter_core::markers::{search::DEFAULT_DEBOUNCE, Markers, SEARCH_CLASS, SEARCH_CURRENT_CLASS, WORD_HIGHLIGHT_CLASS};
use gutter_core::render::{render_diff, FileView, RenderOptions};
use gutter_core::resolver::{resolve, CHANGE_KEY_ATTR};
use gutter_core::{Change, ChangeKey, FileDiff, FileStatus, Hunk, LineRef, Side};

const PATH: &str = "src/config.rs";

fn diff() -> FileDiff {
    let mut changes: Vec<Change> = (1..=12)
        .map(|n| Change::Normal { old_line: n, new_line: n, content: format!("let line{n} = {n};") })
        .collect();
    changes[2] = Change::Normal { old_line: 3, new_line: 3, content: "let value = parse(raw);".into() };
    changes[7] = Change::Normal { old_line: 8, new_line: 8, content: "return Value::from(value);".into() };
    FileDiff {
        path: PATH.into(),
        old_path: PATH.into(),
        status: FileStatus::Modified,
        hunks: vec![Hunk { old_start: 1, old_lines: 12, new_start: 1, new_lines: 12, changes }],
        old_line_count: Some(12),
    }
}

/// `root > div.diff-view`, rendered with `placement`.
fn rendered(placement: &Placement) -> (Document, NodeId, FileDiff) {
    let file = diff();
    let mut doc = Document::new();
    let container = doc.element_with(Tag::Div, &["diff-view"], &[]);
    let root = doc.root();
    doc.append_child(root, container);
    rerender(&mut doc, container, &file, placement);
    (doc, container, file)
}

fn rerender(doc: &mut Document, container: NodeId, file: &FileDiff, placement: &Placement) {
    let views = [FileView { diff: file, hunks: &file.hunks, total_lines: file.old_line_count, placement }];
    render_diff(doc, container, &views, &RenderOptions::default());
}

/// First text node inside the code cell of `key`.
fn code_text(doc: &Document, container: NodeId, key: &str) -> NodeId {
    let cell = doc
        .find_by_attr(container, CHANGE_KEY_ATTR, key)
        .into_iter()
        .find(|&n| doc.has_class(n, "diff-code-cell"))
        .unwrap();
    doc.text_nodes(cell, |_| false)[0]
}

fn gutter(doc: &Document, container: NodeId, key: &str) -> NodeId {
    doc.find_by_attr(container, CHANGE_KEY_ATTR, key)
        .into_iter()
        .find(|&n| doc.has_class(n, "diff-gutter-new"))
        .unwrap()
}

#[test]
fn every_node_in_a_row_resolves_to_its_line() {
    let (doc, container, _) = rendered(&Placement::default());
    for row in doc.find_by_class(container, "diff-line") {
        let key = doc.attr(row, CHANGE_KEY_ATTR).unwrap().to_owned();
        let line: u32 = key[1..].parse().unwrap();
        let cells = doc.children(row).to_vec();
        for node in cells.iter().flat_map(|&c| doc.descendants(c)) {
            assert_eq!(
                resolve(&doc, node),
                Some(LineRef { file: PATH.into(), line, side: Side::New }),
                "node under {key}"
            );
        }
    }
}

#[test]
fn drag_across_gutter_opens_seeded_draft() {
    let (mut doc, container, file) = rendered(&Placement::default());
    let mut store = AnchorStore::new();

    let start = resolve(&doc, gutter(&doc, container, "N5")).unwrap();
    store.pointer_down(&start);
    for key in ["N6", "N7", "N9"] {
        let target = code_text(&doc, container, key);
        assert!(store.pointer_move(&doc, target), "move over {key}");
    }
    assert!(store.pointer_up(|f| (f == PATH).then(|| file.hunks.clone())));

    let draft = store.draft().unwrap();
    assert_eq!((draft.range.start_line, draft.range.end_line), (5, 9));
    let expected: Vec<String> = (5..=9)
        .map(|n| file.hunks[0].changes[n - 1].content().to_owned())
        .collect();
    assert_eq!(draft.code.as_deref(), Some(expected.join("\n").as_str()));

    // The click from the same gesture does not replace the draft.
    assert!(!store.click(&LineRef { file: PATH.into(), line: 9, side: Side::New }, false, |_| None));

    let placement = store.placement(PATH, &file.hunks);
    rerender(&mut doc, container, &file, &placement);
    let selected: Vec<&str> = doc
        .find_by_class(container, "diff-selected")
        .into_iter()
        .filter_map(|row| doc.attr(row, CHANGE_KEY_ATTR))
        .collect();
    assert_eq!(selected, vec!["N5", "N6", "N7", "N8", "N9"]);
    let form = doc.find_by_class(container, "comment-form");
    assert_eq!(form.len(), 1);

    store.draft_mut().unwrap().text = "split this up".into();
    let id = store.submit_draft().unwrap();
    let placement = store.placement(PATH, &file.hunks);
    let key: ChangeKey = "N9".parse().unwrap();
    assert!(matches!(&placement.widgets[&key][..], [Widget::Comment { comment, .. }] if comment.id == id));
    assert!(placement.highlighted.is_empty());
}

#[test]
fn search_survives_rerender() {
    let (mut doc, container, file) = rendered(&Placement::default());
    let mut markers = Markers::new(container);
    let before = doc.text_content(container);

    markers.open_search(&mut doc);
    let first = markers.search.set_query(&mut doc, "value");
    assert_eq!(markers.search.matches().len(), 3);
    assert_eq!(first, markers.search.current_match());
    assert_eq!(doc.find_by_class(container, SEARCH_CURRENT_CLASS).len(), 1);
    markers.search.next(&mut doc);
    assert_eq!(markers.search.position_label().as_deref(), Some("2/3"));

    rerender(&mut doc, container, &file, &Placement::default());
    assert!(doc.find_by_class(container, SEARCH_CLASS).is_empty());
    let t0 = Instant::now();
    assert!(!markers.poll(&mut doc, t0));
    assert!(!markers.poll(&mut doc, t0 + Duration::from_millis(10)));
    assert!(markers.poll(&mut doc, t0 + DEFAULT_DEBOUNCE + Duration::from_millis(10)));
    assert_eq!(doc.find_by_class(container, SEARCH_CLASS).len(), 3);
    assert_eq!(markers.search.position_label().as_deref(), Some("2/3"));

    markers.close_search(&mut doc);
    assert!(doc.find_by_class(container, SEARCH_CLASS).is_empty());
    assert_eq!(doc.text_content(container), before);
}

#[test]
fn word_highlight_yields_to_search() {
    let (mut doc, container, file) = rendered(&Placement::default());
    let mut markers = Markers::new(container);

    let target = code_text(&doc, container, "N3");
    assert!(markers.double_click(&mut doc, target, "value"));
    assert_eq!(doc.find_by_class(container, WORD_HIGHLIGHT_CLASS).len(), 2);

    // Re-rendering drops the marks; the highlight is reapplied.
    rerender(&mut doc, container, &file, &Placement::default());
    markers.after_render(&mut doc);
    assert_eq!(doc.find_by_class(container, WORD_HIGHLIGHT_CLASS).len(), 2);

    markers.open_search(&mut doc);
    assert!(doc.find_by_class(container, WORD_HIGHLIGHT_CLASS).is_empty());
    assert_eq!(markers.words.word(), None);

    let target = code_text(&doc, container, "N3");
    assert!(!markers.double_click(&mut doc, target, "value"));
    assert!(doc.find_by_class(container, WORD_HIGHLIGHT_CLASS).is_empty());
}

#[test]
fn double_click_outside_code_is_ignored() {
    let (mut doc, container, _) = rendered(&Placement::default());
    let mut markers = Markers::new(container);
    let number = doc.text_nodes(gutter(&doc, container, "N3"), |_| false)[0];
    assert!(!markers.double_click(&mut doc, number, "value"));
    assert!(markers.words.marks().is_empty());
}
