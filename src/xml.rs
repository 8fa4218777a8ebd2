//! Arena-based XML tree with faithful re-serialization.
//!
//! Documents parse into a contiguous arena of linked nodes. Whitespace,
//! comments, declarations, and unresolved entity references all become
//! nodes, so a parse/serialize round trip preserves everything a
//! downstream reader could observe. Unresolved references inside
//! attribute values survive as written too.

use quick_xml::Reader;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesStart, Event};

use crate::util::{decode_text, extract_xml_encoding, strip_bom};

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel value for no node.
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check if this is a valid node ID.
    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    /// Check if this is the sentinel value.
    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Node type in the tree.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root.
    Document,
    /// Element with its name as written (prefix included) and attributes.
    Element { name: String, attrs: Vec<Attribute> },
    /// Character data.
    Text(String),
    /// CDATA section, emitted verbatim.
    CData(String),
    /// Comment, emitted verbatim.
    Comment(String),
    /// XML declaration content between `<?` and `?>`.
    Decl(String),
    /// Processing instruction content between `<?` and `?>`.
    Pi(String),
    /// DOCTYPE content after `<!DOCTYPE `.
    Doctype(String),
    /// General entity reference that could not be resolved, kept as `&name;`.
    EntityRef(String),
}

/// XML attribute with its name as written (prefix included).
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// A node in the tree.
#[derive(Debug)]
pub struct Node {
    pub data: NodeData,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub prev_sibling: NodeId,
    pub next_sibling: NodeId,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }
}

/// Arena-backed XML document.
///
/// All nodes are stored in a contiguous vector for cache-friendly traversal.
/// Parent/child/sibling links use indices into this vector. Detached nodes
/// stay allocated but unreachable.
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    /// Create a new empty document with a root node.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId::NONE,
        };
        doc.root = doc.alloc(Node::new(NodeData::Document));
        doc
    }

    /// Parse an XML document, keeping whitespace, comments, declarations,
    /// and processing instructions so the tree serializes back faithfully.
    ///
    /// # Example
    ///
    /// ```
    /// use bindery::xml::Document;
    ///
    /// let doc = Document::parse("<container><rootfiles/></container>")?;
    /// assert!(doc.find_by_tag("rootfiles").is_some());
    /// # Ok::<(), quick_xml::Error>(())
    /// ```
    pub fn parse(text: &str) -> std::result::Result<Self, quick_xml::Error> {
        let mut reader = Reader::from_str(text);
        let mut doc = Document::new();
        let mut stack: Vec<NodeId> = vec![doc.root];

        loop {
            let parent = stack.last().copied().unwrap_or(doc.root);
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let element = doc.element_from_tag(&e);
                    doc.append(parent, element);
                    stack.push(element);
                }
                Ok(Event::Empty(e)) => {
                    let element = doc.element_from_tag(&e);
                    doc.append(parent, element);
                }
                Ok(Event::End(_)) => {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
                Ok(Event::Text(e)) => {
                    doc.append_text(parent, &String::from_utf8_lossy(e.as_ref()));
                }
                Ok(Event::GeneralRef(e)) => {
                    let name = String::from_utf8_lossy(e.as_ref()).into_owned();
                    if let Some(ch) = resolve_char_ref(&name) {
                        doc.append_text(parent, ch.encode_utf8(&mut [0u8; 4]));
                    } else if let Some(text) = resolve_entity(&name) {
                        doc.append_text(parent, text);
                    } else {
                        let node = doc.alloc(Node::new(NodeData::EntityRef(name)));
                        doc.append(parent, node);
                    }
                }
                Ok(Event::CData(e)) => {
                    let node = doc.alloc(Node::new(NodeData::CData(
                        String::from_utf8_lossy(e.as_ref()).into_owned(),
                    )));
                    doc.append(parent, node);
                }
                Ok(Event::Comment(e)) => {
                    let node = doc.alloc(Node::new(NodeData::Comment(
                        String::from_utf8_lossy(e.as_ref()).into_owned(),
                    )));
                    doc.append(parent, node);
                }
                Ok(Event::Decl(e)) => {
                    let node = doc.alloc(Node::new(NodeData::Decl(
                        String::from_utf8_lossy(e.as_ref()).into_owned(),
                    )));
                    doc.append(parent, node);
                }
                Ok(Event::PI(e)) => {
                    let node = doc.alloc(Node::new(NodeData::Pi(
                        String::from_utf8_lossy(e.as_ref()).into_owned(),
                    )));
                    doc.append(parent, node);
                }
                Ok(Event::DocType(e)) => {
                    let node = doc.alloc(Node::new(NodeData::Doctype(
                        String::from_utf8_lossy(e.as_ref()).into_owned(),
                    )));
                    doc.append(parent, node);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(e),
            }
        }

        Ok(doc)
    }

    /// Parse from raw bytes: strips any UTF-8 BOM and falls back to the
    /// declared encoding or Windows-1252 when the bytes are not valid UTF-8.
    pub fn parse_bytes(bytes: &[u8]) -> std::result::Result<Self, quick_xml::Error> {
        let bytes = strip_bom(bytes);
        let hint = extract_xml_encoding(bytes);
        let text = decode_text(bytes, hint);
        Self::parse(&text)
    }

    fn element_from_tag(&mut self, e: &BytesStart) -> NodeId {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in e.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            // Same reference handling as text nodes: unknown entities in
            // attribute values stay as written
            let value = decode_attr_value(&String::from_utf8_lossy(&attr.value));
            attrs.push(Attribute { name: key, value });
        }
        self.alloc(Node::new(NodeData::Element { name, attrs }))
    }

    /// Allocate a new node in the arena.
    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get the root node ID.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Get a node by ID.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    /// Get a mutable node by ID.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    /// Create a new element node with no attributes.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.alloc(Node::new(NodeData::Element {
            name: name.to_string(),
            attrs: Vec::new(),
        }))
    }

    /// Create a new text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(Node::new(NodeData::Text(text.to_string())))
    }

    /// Append a child to a parent node.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        let last_child = self.get(parent).map(|n| n.last_child).unwrap_or(NodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
        }

        if last_child.is_some() {
            if let Some(last_node) = self.get_mut(last_child) {
                last_node.next_sibling = child;
            }
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Insert a node before a sibling.
    pub fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        let parent = self.get(sibling).map(|n| n.parent).unwrap_or(NodeId::NONE);
        let prev = self
            .get(sibling)
            .map(|n| n.prev_sibling)
            .unwrap_or(NodeId::NONE);

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Insert a node as the first child of a parent.
    pub fn prepend(&mut self, parent: NodeId, child: NodeId) {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(NodeId::NONE);
        if first.is_some() {
            self.insert_before(first, child);
        } else {
            self.append(parent, child);
        }
    }

    /// Remove a node from its parent, leaving it allocated but unreachable.
    pub fn detach(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else { return };
        let parent = node.parent;
        let prev = node.prev_sibling;
        let next = node.next_sibling;

        if let Some(p) = self.get_mut(prev) {
            p.next_sibling = next;
        }
        if let Some(n) = self.get_mut(next) {
            n.prev_sibling = prev;
        }
        if let Some(par) = self.get_mut(parent) {
            if par.first_child == id {
                par.first_child = next;
            }
            if par.last_child == id {
                par.last_child = prev;
            }
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = NodeId::NONE;
            node.prev_sibling = NodeId::NONE;
            node.next_sibling = NodeId::NONE;
        }
    }

    /// Append text to an existing text node, or create new if last child isn't text.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last_child = self.get(parent).map(|n| n.last_child).unwrap_or(NodeId::NONE);

        if let Some(last) = self.get_mut(last_child) {
            if let NodeData::Text(ref mut existing) = last.data {
                existing.push_str(text);
                return;
            }
        }

        let text_node = self.create_text(text);
        self.append(parent, text_node);
    }

    /// Get the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the document is empty (only has the root).
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> ChildrenIter<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(NodeId::NONE);
        ChildrenIter {
            doc: self,
            current: first,
        }
    }

    /// Find the first node matching a predicate, depth-first from the root.
    pub fn find<F>(&self, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        self.find_in(self.root, predicate)
    }

    /// Find the first node matching a predicate, depth-first within a subtree.
    pub fn find_in<F>(&self, scope: NodeId, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        let mut stack = vec![scope];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get(id) {
                if predicate(node) {
                    return Some(id);
                }
                // Push children in reverse order for left-to-right traversal
                let mut children: Vec<_> = self.children(id).collect();
                children.reverse();
                stack.extend(children);
            }
        }
        None
    }

    /// Collect all nodes matching a predicate within a subtree, in document order.
    pub fn find_all_in<F>(&self, scope: NodeId, predicate: F) -> Vec<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        let mut found = Vec::new();
        let mut stack = vec![scope];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get(id) {
                if predicate(node) {
                    found.push(id);
                }
                let mut children: Vec<_> = self.children(id).collect();
                children.reverse();
                stack.extend(children);
            }
        }
        found
    }

    /// Find element by local tag name (first match in document order).
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.find(|node| {
            if let NodeData::Element { name, .. } = &node.data {
                local_name(name) == tag
            } else {
                false
            }
        })
    }

    /// Serialize the document back to XML text.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        for child in self.children(self.root) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else { return };
        match &node.data {
            NodeData::Document => {}
            NodeData::Element { name, attrs } => {
                out.push('<');
                out.push_str(name);
                for attr in attrs {
                    out.push(' ');
                    out.push_str(&attr.name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(&attr.value));
                    out.push('"');
                }
                if node.first_child.is_none() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for child in self.children(id) {
                        self.write_node(child, out);
                    }
                    out.push_str("</");
                    out.push_str(name);
                    out.push('>');
                }
            }
            NodeData::Text(text) => out.push_str(&partial_escape(text.as_str())),
            NodeData::CData(text) => {
                out.push_str("<![CDATA[");
                out.push_str(text);
                out.push_str("]]>");
            }
            NodeData::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeData::Decl(content) | NodeData::Pi(content) => {
                out.push_str("<?");
                out.push_str(content);
                out.push_str("?>");
            }
            NodeData::Doctype(content) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(content);
                out.push('>');
            }
            NodeData::EntityRef(name) => {
                out.push('&');
                out.push_str(name);
                out.push(';');
            }
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over children of a node.
pub struct ChildrenIter<'a> {
    doc: &'a Document,
    current: NodeId,
}

impl<'a> Iterator for ChildrenIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .doc
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(NodeId::NONE);
        Some(id)
    }
}

/// Convenience methods for element nodes.
impl Document {
    /// Get an element's name as written, prefix included.
    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    /// Check whether a node is an element with the given local name.
    pub fn is_named(&self, id: NodeId, local: &str) -> bool {
        self.element_name(id)
            .is_some_and(|name| local_name(name) == local)
    }

    /// Get an attribute value by exact name.
    pub fn attr(&self, id: NodeId, attr_name: &str) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name == attr_name)
                .map(|a| a.value.as_str()),
            _ => None,
        })
    }

    /// Get an attribute value by local name, ignoring any namespace prefix.
    pub fn attr_local(&self, id: NodeId, local: &str) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| local_name(&a.name) == local)
                .map(|a| a.value.as_str()),
            _ => None,
        })
    }

    /// Set an attribute, replacing any existing value under the same name.
    pub fn set_attr(&mut self, id: NodeId, attr_name: &str, value: &str) {
        if let Some(node) = self.get_mut(id) {
            if let NodeData::Element { attrs, .. } = &mut node.data {
                if let Some(attr) = attrs.iter_mut().find(|a| a.name == attr_name) {
                    attr.value = value.to_string();
                } else {
                    attrs.push(Attribute {
                        name: attr_name.to_string(),
                        value: value.to_string(),
                    });
                }
            }
        }
    }

    /// Get a node's parent ID.
    pub fn parent(&self, id: NodeId) -> NodeId {
        self.get(id).map(|n| n.parent).unwrap_or(NodeId::NONE)
    }

    /// Check if node is an element.
    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, NodeData::Element { .. }))
    }

    /// Get text content of a text node.
    pub fn text_content(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }
}

/// Extract local name from a potentially namespaced XML name.
pub fn local_name(name: &str) -> &str {
    match name.rfind(':') {
        Some(i) => &name[i + 1..],
        None => name,
    }
}

/// Resolve the five predefined XML entities.
fn resolve_entity(name: &str) -> Option<&'static str> {
    match name {
        "lt" => Some("<"),
        "gt" => Some(">"),
        "amp" => Some("&"),
        "apos" => Some("'"),
        "quot" => Some("\""),
        _ => None,
    }
}

/// Resolve a numeric character reference like `#160` or `#x2014`.
fn resolve_char_ref(name: &str) -> Option<char> {
    let digits = name.strip_prefix('#')?;
    let code = if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse().ok()?
    };
    char::from_u32(code)
}

/// Length of the well-formed reference starting at a `&`, including the
/// terminating `;`; `None` when the ampersand does not begin one.
fn reference_len(s: &str) -> Option<usize> {
    let body = s.strip_prefix('&')?;
    let end = body.find(';')?;
    let name = &body[..end];
    let valid = if let Some(digits) = name.strip_prefix('#') {
        if let Some(hex) = digits.strip_prefix('x').or_else(|| digits.strip_prefix('X')) {
            !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit())
        } else {
            !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
        }
    } else {
        name.bytes().next().is_some_and(|b| b.is_ascii_alphabetic())
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
    };
    valid.then_some(end + 2)
}

/// Decode a raw attribute value. Known named and numeric character
/// references resolve; unknown references and bare ampersands stay as
/// written, mirroring how text content keeps unresolved entities.
fn decode_attr_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(len) = reference_len(tail) {
            let name = &tail[1..len - 1];
            if let Some(ch) = resolve_char_ref(name) {
                out.push(ch);
            } else if let Some(text) = resolve_entity(name) {
                out.push_str(text);
            } else {
                out.push_str(&tail[..len]);
            }
            rest = &tail[len..];
        } else {
            out.push('&');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

/// Escape an attribute value for output inside double quotes. References
/// kept by [`decode_attr_value`] pass through unchanged so they survive
/// the round trip.
fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    loop {
        let Some(pos) = rest.find(['&', '<', '>', '"', '\'']) else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match tail.as_bytes()[0] {
            b'<' => out.push_str("&lt;"),
            b'>' => out.push_str("&gt;"),
            b'"' => out.push_str("&quot;"),
            b'\'' => out.push_str("&apos;"),
            _ => {
                if let Some(len) = reference_len(tail) {
                    out.push_str(&tail[..len]);
                    rest = &tail[len..];
                    continue;
                }
                out.push_str("&amp;");
            }
        }
        rest = &tail[1..];
    }
}
