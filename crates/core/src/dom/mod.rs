use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use html5ever::tree_builder::TreeBuilderOpts;
use html5ever::ParseOpts;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::collections::HashMap;

/// A node in our DOM tree. Minimal: only what extraction needs.
#[derive(Debug, Clone)]
pub struct DomNode {
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub text: String,
    pub children: Vec<DomNode>,
    pub node_type: NodeType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeType {
    Element,
    Text,
    Document,
}

/// Tags treated as line breaks when recovering line-structured cell text.
const BLOCK_TAGS: [&str; 5] = ["div", "p", "li", "tr", "table"];

impl DomNode {
    pub fn new_element(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            attributes: HashMap::new(),
            text: String::new(),
            children: Vec::new(),
            node_type: NodeType::Element,
        }
    }

    pub fn new_text(text: &str) -> Self {
        Self {
            tag: String::new(),
            attributes: HashMap::new(),
            text: text.to_string(),
            children: Vec::new(),
            node_type: NodeType::Text,
        }
    }

    pub fn new_document() -> Self {
        Self {
            tag: String::new(),
            attributes: HashMap::new(),
            text: String::new(),
            children: Vec::new(),
            node_type: NodeType::Document,
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }

    /// Exact match against one of the space-separated class tokens.
    pub fn has_class(&self, class: &str) -> bool {
        self.get_attr("class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// First descendant (or self) carrying the given class token.
    pub fn find_by_class<'a>(&'a self, class: &str) -> Option<&'a DomNode> {
        if self.has_class(class) {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find_by_class(class))
    }

    /// First descendant (or self) with the given id attribute.
    pub fn find_by_id<'a>(&'a self, id: &str) -> Option<&'a DomNode> {
        if self.get_attr("id") == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_by_id(id))
    }

    /// First descendant (or self) with the given tag name.
    pub fn find_first_tag<'a>(&'a self, tag: &str) -> Option<&'a DomNode> {
        if self.tag == tag {
            return Some(self);
        }
        self.children
            .iter()
            .find_map(|child| child.find_first_tag(tag))
    }

    /// All descendants with the given tag, in document order.
    pub fn collect_tag<'a>(&'a self, tag: &str) -> Vec<&'a DomNode> {
        let mut nodes = Vec::new();
        self.collect_tag_into(tag, &mut nodes);
        nodes
    }

    fn collect_tag_into<'a>(&'a self, tag: &str, nodes: &mut Vec<&'a DomNode>) {
        if self.tag == tag {
            nodes.push(self);
        }
        for child in &self.children {
            child.collect_tag_into(tag, nodes);
        }
    }

    /// Get the visible text content of this node and all children.
    pub fn text_content(&self) -> String {
        let mut result = String::new();
        self.collect_text(&mut result);
        result.trim().to_string()
    }

    fn collect_text(&self, out: &mut String) {
        match self.node_type {
            NodeType::Text => {
                let trimmed = self.text.trim();
                if !trimmed.is_empty() {
                    if !out.is_empty() && !out.ends_with(' ') {
                        out.push(' ');
                    }
                    out.push_str(trimmed);
                }
            }
            _ => {
                for child in &self.children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// Text content as trimmed, non-empty lines. `<br>` and block-level
    /// boundaries count as breaks; this is how table cells encode the
    /// name/teacher/room stack.
    pub fn text_lines(&self) -> Vec<String> {
        let mut raw = String::new();
        self.collect_lines(&mut raw);
        raw.lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect()
    }

    fn collect_lines(&self, out: &mut String) {
        match self.node_type {
            NodeType::Text => out.push_str(&self.text),
            _ => {
                if self.tag == "br" {
                    out.push('\n');
                }
                for child in &self.children {
                    child.collect_lines(out);
                }
                if BLOCK_TAGS.contains(&self.tag.as_str()) {
                    out.push('\n');
                }
            }
        }
    }
}

/// Parse an HTML string into a DomNode tree.
pub fn parse_html(html: &str) -> DomNode {
    let opts = ParseOpts {
        tree_builder: TreeBuilderOpts {
            drop_doctype: true,
            ..Default::default()
        },
        ..Default::default()
    };

    let dom = parse_document(RcDom::default(), opts)
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .expect("failed to parse HTML");

    convert_node(&dom.document)
}

fn convert_node(handle: &Handle) -> DomNode {
    match &handle.data {
        NodeData::Document => {
            let mut doc = DomNode::new_document();
            for child in handle.children.borrow().iter() {
                doc.children.push(convert_node(child));
            }
            doc
        }
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.to_string();

            // Script, style, svg content stays out of the tree; inline
            // script text is matched by regex over the raw payload instead.
            if tag == "script" || tag == "style" || tag == "svg" || tag == "path" {
                let mut node = DomNode::new_element(&tag);
                for attr in attrs.borrow().iter() {
                    node.attributes
                        .insert(attr.name.local.to_string(), attr.value.to_string());
                }
                return node;
            }

            let mut node = DomNode::new_element(&tag);
            for attr in attrs.borrow().iter() {
                node.attributes
                    .insert(attr.name.local.to_string(), attr.value.to_string());
            }
            for child in handle.children.borrow().iter() {
                let child_node = convert_node(child);
                // Skip empty text nodes
                if child_node.node_type == NodeType::Text && child_node.text.trim().is_empty() {
                    continue;
                }
                node.children.push(child_node);
            }
            node
        }
        NodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            DomNode::new_text(&text)
        }
        _ => DomNode::new_document(), // Comments, PIs, doctypes → ignored
    }
}
