//! Arena-backed rendered document.
//!
//! This is the tree the rendering surface paints and the tree every
//! interaction is resolved against. Nodes are never freed; a removed node is
//! simply detached and may be re-inserted later. All ancestor walks are
//! iterative and capped at [`MAX_DEPTH`].

/// Upper bound on any ancestor walk.
pub const MAX_DEPTH: usize = 512;

/// Handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Element kinds used by the diff and file renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Div,
    Table,
    Tbody,
    Tr,
    Td,
    Span,
    Mark,
    Script,
    Style,
}

impl Tag {
    pub fn name(self) -> &'static str {
        match self {
            Tag::Div => "div",
            Tag::Table => "table",
            Tag::Tbody => "tbody",
            Tag::Tr => "tr",
            Tag::Td => "td",
            Tag::Span => "span",
            Tag::Mark => "mark",
            Tag::Script => "script",
            Tag::Style => "style",
        }
    }
}

/// Element payload: tag, attributes, classes and visibility flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: Tag,
    attrs: Vec<(String, String)>,
    classes: Vec<String>,
    pub hidden: bool,
    pub display_none: bool,
    pub visibility_hidden: bool,
}

impl Element {
    fn new(tag: Tag) -> Self {
        Self {
            tag,
            attrs: Vec::new(),
            classes: Vec::new(),
            hidden: false,
            display_none: false,
            visibility_hidden: false,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A text position: byte `offset` inside text node `node`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Children were added to or removed from `target`.
    ChildList,
    /// The text of `target` changed.
    CharacterData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
}

#[derive(Debug)]
struct Observer {
    id: ObserverId,
    root: NodeId,
    records: Vec<MutationRecord>,
}

/// The rendered tree.
#[derive(Debug)]
pub struct Document {
    slots: Vec<Slot>,
    root: NodeId,
    observers: Vec<Observer>,
    next_observer: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates a document with an empty `div` root.
    pub fn new() -> Self {
        let root = Slot {
            data: NodeData::Element(Element::new(Tag::Div)),
            parent: None,
            children: Vec::new(),
        };
        Self {
            slots: vec![root],
            root: NodeId(0),
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    // ---------------------------------------------------------------------
    // Construction
    // ---------------------------------------------------------------------

    pub fn create_element(&mut self, tag: Tag) -> NodeId {
        self.push(NodeData::Element(Element::new(tag)))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    /// Creates a detached element with the given classes and attributes.
    pub fn element_with(&mut self, tag: Tag, classes: &[&str], attrs: &[(&str, &str)]) -> NodeId {
        let id = self.create_element(tag);
        for class in classes {
            self.add_class(id, class);
        }
        for (name, value) in attrs {
            self.set_attr(id, name, value);
        }
        id
    }

    /// Copies an element's tag, attributes and classes (never its children).
    /// Text nodes are copied with their text.
    pub fn shallow_clone(&mut self, id: NodeId) -> NodeId {
        let data = self.slots[id.0].data.clone();
        self.push(data)
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot { data, parent: None, children: Vec::new() });
        id
    }

    // ---------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.slots[id.0].data
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.slots[id.0].data {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.slots[id.0].data {
            NodeData::Element(element) => Some(element),
            NodeData::Text(_) => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.slots[id.0].data {
            NodeData::Text(text) => Some(text),
            NodeData::Element(_) => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.text(id).is_some()
    }

    pub fn tag(&self, id: NodeId) -> Option<Tag> {
        self.element(id).map(|e| e.tag)
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attr(name))
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id).is_some_and(|e| e.has_class(class))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.slots[id.0].children
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let index = self.index_in_parent(id)?;
        self.children(parent).get(index + 1).copied()
    }

    fn following_siblings(&self, id: NodeId) -> Vec<NodeId> {
        match (self.parent(id), self.index_in_parent(id)) {
            (Some(parent), Some(index)) => self.children(parent)[index + 1..].to_vec(),
            _ => Vec::new(),
        }
    }

    fn preceding_siblings(&self, id: NodeId) -> Vec<NodeId> {
        match (self.parent(id), self.index_in_parent(id)) {
            (Some(parent), Some(index)) => self.children(parent)[..index].to_vec(),
            _ => Vec::new(),
        }
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            if out.len() >= MAX_DEPTH {
                break;
            }
            out.push(node);
            current = self.parent(node);
        }
        out
    }

    /// True if `ancestor` is `id` or one of its ancestors.
    pub fn contains(&self, ancestor: NodeId, id: NodeId) -> bool {
        id == ancestor || self.ancestors(id).contains(&ancestor)
    }

    /// The nearest element at or above `id` satisfying `pred`. A text node
    /// starts the walk at its parent.
    pub fn closest(&self, id: NodeId, pred: impl Fn(&Element) -> bool) -> Option<NodeId> {
        let mut current = if self.is_text(id) { self.parent(id) } else { Some(id) };
        let mut steps = 0;
        while let Some(node) = current {
            if steps > MAX_DEPTH {
                return None;
            }
            if self.element(node).is_some_and(&pred) {
                return Some(node);
            }
            current = self.parent(node);
            steps += 1;
        }
        None
    }

    /// Descendants of `root` in document order, excluding `root`.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Text nodes under `root` in document order. Subtrees rooted at elements
    /// for which `skip` returns true are not entered.
    pub fn text_nodes(&self, root: NodeId, skip: impl Fn(&Element) -> bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(root).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            match &self.slots[node.0].data {
                NodeData::Text(_) => out.push(node),
                NodeData::Element(element) => {
                    if !skip(element) {
                        stack.extend(self.children(node).iter().rev().copied());
                    }
                }
            }
        }
        out
    }

    /// Elements under `root` (excluding `root`) carrying `class`, in document order.
    pub fn find_by_class(&self, root: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&id| self.has_class(id, class))
            .collect()
    }

    /// Elements under `root` (excluding `root`) whose attribute `name` equals `value`.
    pub fn find_by_attr(&self, root: NodeId, name: &str, value: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&id| self.attr(id, name) == Some(value))
            .collect()
    }

    /// Concatenated text of every text node under `id` (inclusive).
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text.to_owned();
        }
        self.text_nodes(id, |_| false)
            .into_iter()
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// False if `id` or any ancestor is hidden, `display: none` or
    /// `visibility: hidden`.
    pub fn is_rendered(&self, id: NodeId) -> bool {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .filter_map(|node| self.element(node))
            .all(|e| !(e.hidden || e.display_none || e.visibility_hidden))
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(element) = self.element_mut(id) {
            match element.attrs.iter_mut().find(|(key, _)| key == name) {
                Some((_, existing)) => *existing = value.to_owned(),
                None => element.attrs.push((name.to_owned(), value.to_owned())),
            }
        }
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if let Some(element) = self.element_mut(id) {
            if !element.has_class(class) {
                element.classes.push(class.to_owned());
            }
        }
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if let Some(element) = self.element_mut(id) {
            element.classes.retain(|c| c != class);
        }
    }

    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) {
        if let Some(element) = self.element_mut(id) {
            element.hidden = hidden;
        }
    }

    pub fn set_display_none(&mut self, id: NodeId, none: bool) {
        if let Some(element) = self.element_mut(id) {
            element.display_none = none;
        }
    }

    pub fn set_visibility_hidden(&mut self, id: NodeId, hidden: bool) {
        if let Some(element) = self.element_mut(id) {
            element.visibility_hidden = hidden;
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) {
        if let NodeData::Text(text) = &mut self.slots[id.0].data {
            *text = value.into();
            self.record(MutationKind::CharacterData, id);
        }
    }

    /// Detaches `id` from its parent, if any.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.slots[id.0].parent.take() {
            self.slots[parent.0].children.retain(|&c| c != id);
            self.record(MutationKind::ChildList, parent);
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_at(parent, child, None);
    }

    /// Inserts `child` before `reference`, or appends when `reference` is
    /// `None` or not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.insert_at(parent, child, reference.map(Anchor::Before));
    }

    /// Inserts `child` directly after `reference`.
    pub fn insert_after(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.insert_at(parent, child, Some(Anchor::After(reference)));
    }

    fn insert_at(&mut self, parent: NodeId, child: NodeId, anchor: Option<Anchor>) {
        if child == parent || self.contains(child, parent) {
            return;
        }
        self.remove(child);
        let children = &self.slots[parent.0].children;
        let index = match anchor {
            Some(Anchor::Before(reference)) => children.iter().position(|&c| c == reference),
            Some(Anchor::After(reference)) => {
                children.iter().position(|&c| c == reference).map(|i| i + 1)
            }
            None => None,
        }
        .unwrap_or(children.len());
        self.slots[parent.0].children.insert(index, child);
        self.slots[child.0].parent = Some(parent);
        self.record(MutationKind::ChildList, parent);
    }

    /// Replaces every child of `parent` with `children`, as one mutation.
    pub fn replace_children(&mut self, parent: NodeId, children: Vec<NodeId>) {
        let old = std::mem::take(&mut self.slots[parent.0].children);
        for child in old {
            self.slots[child.0].parent = None;
        }
        for &child in &children {
            if let Some(previous) = self.slots[child.0].parent.take() {
                self.slots[previous.0].children.retain(|&c| c != child);
            }
            self.slots[child.0].parent = Some(parent);
        }
        self.slots[parent.0].children = children;
        self.record(MutationKind::ChildList, parent);
    }

    /// Splits text node `id` at byte `offset`. `id` keeps the head; the
    /// returned node holds the tail and is inserted right after `id`.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Option<NodeId> {
        let text = self.text(id)?;
        if !text.is_char_boundary(offset) {
            return None;
        }
        let tail = text[offset..].to_owned();
        let head = text[..offset].to_owned();
        self.set_text(id, head);
        let tail_id = self.create_text(tail);
        if let Some(parent) = self.parent(id) {
            self.insert_after(parent, tail_id, id);
        }
        Some(tail_id)
    }

    /// Merges adjacent text nodes and drops empty ones throughout `root`.
    pub fn normalize(&mut self, root: NodeId) {
        let mut elements = vec![root];
        elements.extend(
            self.descendants(root)
                .into_iter()
                .filter(|&id| self.element(id).is_some()),
        );
        for element in elements {
            let children = self.slots[element.0].children.clone();
            let mut kept: Vec<NodeId> = Vec::with_capacity(children.len());
            let mut changed = false;
            for child in children {
                let Some(text) = self.text(child).map(str::to_owned) else {
                    kept.push(child);
                    continue;
                };
                let previous_text = kept.last().copied().filter(|&prev| self.is_text(prev));
                if text.is_empty() || previous_text.is_some() {
                    if let Some(prev) = previous_text {
                        if let NodeData::Text(existing) = &mut self.slots[prev.0].data {
                            existing.push_str(&text);
                        }
                    }
                    self.slots[child.0].parent = None;
                    changed = true;
                } else {
                    kept.push(child);
                }
            }
            if changed {
                self.slots[element.0].children = kept;
                self.record(MutationKind::ChildList, element);
            }
        }
    }

    /// Moves the contents of the text range `[start, end)` into `wrapper`
    /// and inserts `wrapper` where the range began.
    ///
    /// Elements only partially covered by the range are shallow-cloned into
    /// the wrapper with the covered part of their content; the originals stay
    /// in place with the rest. Returns false (and leaves the tree untouched)
    /// when the boundaries are not text nodes in document order.
    pub fn wrap_range(&mut self, start: Boundary, end: Boundary, wrapper: NodeId) -> bool {
        if !self.is_text(start.node) || !self.is_text(end.node) {
            return false;
        }

        if start.node == end.node {
            if start.offset >= end.offset {
                return false;
            }
            let Some(parent) = self.parent(start.node) else {
                return false;
            };
            if self.split_text(start.node, end.offset).is_none() {
                return false;
            }
            let Some(middle) = self.split_text(start.node, start.offset) else {
                return false;
            };
            self.insert_after(parent, wrapper, start.node);
            self.append_child(wrapper, middle);
            return true;
        }

        let start_path = self.path_from_top(start.node);
        let end_path = self.path_from_top(end.node);
        let shared = start_path
            .iter()
            .zip(end_path.iter())
            .take_while(|(a, b)| a == b)
            .count();
        if shared == 0 || shared >= start_path.len() || shared >= end_path.len() {
            return false;
        }
        let common = start_path[shared - 1];
        let first_partial = start_path[shared];
        let last_partial = end_path[shared];
        let siblings = self.children(common);
        let (Some(first_index), Some(last_index)) = (
            siblings.iter().position(|&c| c == first_partial),
            siblings.iter().position(|&c| c == last_partial),
        ) else {
            return false;
        };
        if first_index >= last_index {
            return false;
        }
        let contained = siblings[first_index + 1..last_index].to_vec();

        // The end side is cut first so that nothing on the start side moves
        // before its own cut.
        let Some(end_part) = self.extract_leading(&end_path[shared..], end.offset) else {
            return false;
        };
        let Some(start_part) = self.extract_trailing(&start_path[shared..], start.offset) else {
            return false;
        };
        self.append_child(wrapper, start_part);
        for node in contained {
            self.append_child(wrapper, node);
        }
        self.append_child(wrapper, end_part);
        self.insert_after(common, wrapper, first_partial);
        true
    }

    /// Cuts everything from `offset` in the text node at the end of `path` to
    /// the end of `path[0]`, returning a detached copy of that content.
    fn extract_trailing(&mut self, path: &[NodeId], offset: usize) -> Option<NodeId> {
        let text = *path.last()?;
        let tail = self.split_text(text, offset)?;
        self.remove(tail);
        let mut extracted = tail;
        for level in (0..path.len() - 1).rev() {
            let following = self.following_siblings(path[level + 1]);
            let clone = self.shallow_clone(path[level]);
            self.append_child(clone, extracted);
            for node in following {
                self.append_child(clone, node);
            }
            extracted = clone;
        }
        Some(extracted)
    }

    /// Cuts everything from the start of `path[0]` up to `offset` in the text
    /// node at the end of `path`, returning a detached copy of that content.
    fn extract_leading(&mut self, path: &[NodeId], offset: usize) -> Option<NodeId> {
        let text = *path.last()?;
        self.split_text(text, offset)?;
        let mut extracted = text;
        for level in (0..path.len() - 1).rev() {
            let preceding = self.preceding_siblings(path[level + 1]);
            let clone = self.shallow_clone(path[level]);
            for node in preceding {
                self.append_child(clone, node);
            }
            self.append_child(clone, extracted);
            extracted = clone;
        }
        self.remove(extracted);
        Some(extracted)
    }

    /// `id` and its ancestors, outermost first.
    fn path_from_top(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = self.ancestors(id);
        path.reverse();
        path.push(id);
        path
    }

    // ---------------------------------------------------------------------
    // Mutation observation
    // ---------------------------------------------------------------------

    /// Starts recording mutations anywhere inside `root`.
    pub fn observe(&mut self, root: NodeId) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push(Observer { id, root, records: Vec::new() });
        id
    }

    /// Stops an observer and drops its pending records.
    pub fn disconnect(&mut self, id: ObserverId) {
        self.observers.retain(|o| o.id != id);
    }

    /// Drains the records queued for `id`.
    pub fn take_records(&mut self, id: ObserverId) -> Vec<MutationRecord> {
        self.observers
            .iter_mut()
            .find(|o| o.id == id)
            .map(|o| std::mem::take(&mut o.records))
            .unwrap_or_default()
    }

    fn record(&mut self, kind: MutationKind, target: NodeId) {
        if self.observers.is_empty() {
            return;
        }
        for observer in self.observers.iter_mut() {
            let root = observer.root;
            let mut inside = target == root;
            let mut current = self.slots[target.0].parent;
            let mut steps = 0;
            while let Some(node) = current {
                if inside || steps > MAX_DEPTH {
                    break;
                }
                inside = node == root;
                current = self.slots[node.0].parent;
                steps += 1;
            }
            if inside {
                observer.records.push(MutationRecord { kind, target });
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Anchor {
    Before(NodeId),
    After(NodeId),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_with(doc: &mut Document, text: &str) -> (NodeId, NodeId) {
        let span = doc.create_element(Tag::Span);
        let t = doc.create_text(text);
        doc.append_child(span, t);
        (span, t)
    }

    #[test]
    fn split_text_keeps_head_in_place() {
        let mut doc = Document::new();
        let t = doc.create_text("hello world");
        doc.append_child(doc.root(), t);
        let tail = doc.split_text(t, 5).unwrap();
        assert_eq!(doc.text(t), Some("hello"));
        assert_eq!(doc.text(tail), Some(" world"));
        assert_eq!(doc.children(doc.root()), &[t, tail]);
    }

    #[test]
    fn normalize_merges_and_drops_empty_text() {
        let mut doc = Document::new();
        let root = doc.root();
        for part in ["ab", "", "cd"] {
            let t = doc.create_text(part);
            doc.append_child(root, t);
        }
        doc.normalize(root);
        assert_eq!(doc.children(root).len(), 1);
        assert_eq!(doc.text_content(root), "abcd");
    }

    #[test]
    fn wrap_range_within_one_text_node() {
        let mut doc = Document::new();
        let root = doc.root();
        let t = doc.create_text("a value here");
        doc.append_child(root, t);
        let mark = doc.create_element(Tag::Mark);
        assert!(doc.wrap_range(
            Boundary { node: t, offset: 2 },
            Boundary { node: t, offset: 7 },
            mark
        ));
        assert_eq!(doc.text_content(mark), "value");
        assert_eq!(doc.text_content(root), "a value here");
        assert_eq!(doc.parent(mark), Some(root));
    }

    #[test]
    fn wrap_range_across_sibling_spans_clones_partial_ancestors() {
        let mut doc = Document::new();
        let root = doc.root();
        let (s1, t1) = span_with(&mut doc, "xval");
        let (s2, t2) = span_with(&mut doc, "uey");
        doc.append_child(root, s1);
        doc.append_child(root, s2);

        let mark = doc.create_element(Tag::Mark);
        assert!(doc.wrap_range(
            Boundary { node: t1, offset: 1 },
            Boundary { node: t2, offset: 2 },
            mark
        ));

        assert_eq!(doc.text_content(mark), "value");
        assert_eq!(doc.text_content(root), "xvaluey");
        assert_eq!(doc.text(t1), Some("x"));
        assert_eq!(doc.children(root)[1], mark);
        assert!(doc
            .children(mark)
            .iter()
            .all(|&c| doc.tag(c) == Some(Tag::Span)));
    }

    #[test]
    fn wrap_range_rejects_reversed_boundaries() {
        let mut doc = Document::new();
        let root = doc.root();
        let (s1, t1) = span_with(&mut doc, "ab");
        let (s2, t2) = span_with(&mut doc, "cd");
        doc.append_child(root, s1);
        doc.append_child(root, s2);
        let mark = doc.create_element(Tag::Mark);
        assert!(!doc.wrap_range(
            Boundary { node: t2, offset: 0 },
            Boundary { node: t1, offset: 1 },
            mark
        ));
        assert_eq!(doc.text_content(root), "abcd");
    }

    #[test]
    fn observer_only_sees_its_subtree() {
        let mut doc = Document::new();
        let root = doc.root();
        let inside = doc.create_element(Tag::Div);
        let outside = doc.create_element(Tag::Div);
        doc.append_child(root, inside);
        doc.append_child(root, outside);

        let observer = doc.observe(inside);
        let t = doc.create_text("x");
        doc.append_child(outside, t);
        assert!(doc.take_records(observer).is_empty());

        let t2 = doc.create_text("y");
        doc.append_child(inside, t2);
        let records = doc.take_records(observer);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, inside);

        doc.disconnect(observer);
        doc.set_text(t2, "z");
        assert!(doc.take_records(observer).is_empty());
    }

    #[test]
    fn visibility_is_inherited() {
        let mut doc = Document::new();
        let root = doc.root();
        let outer = doc.create_element(Tag::Div);
        let inner = doc.create_element(Tag::Td);
        doc.append_child(root, outer);
        doc.append_child(outer, inner);
        assert!(doc.is_rendered(inner));
        doc.set_display_none(outer, true);
        assert!(!doc.is_rendered(inner));
        doc.set_display_none(outer, false);
        doc.set_visibility_hidden(inner, true);
        assert!(!doc.is_rendered(inner));
    }
}
