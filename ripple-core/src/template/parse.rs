//! Markup Parsing
//!
//! Templates are parsed by a [`MarkupParser`]. The default implementation
//! drives html5ever's fragment parser (the same algorithm a browser uses for
//! `innerHTML` in a `<body>` context) into an arena, then converts the arena
//! into the owned [`dom`](super::dom) model.
//!
//! Malformed markup is never rejected: html5ever recovers the way browsers
//! do, and whatever tree it recovers is the result.

use std::borrow::Cow;

use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{local_name, namespace_url, ns, parse_fragment, Attribute, ExpandedName, ParseOpts, QualName};

use super::dom::{Element, Fragment, Node};

/// Turns a markup string into a fragment.
///
/// Implementations must be inert: parsing never loads resources or runs
/// scripts.
pub trait MarkupParser {
    fn parse_fragment(&self, markup: &str) -> Fragment;
}

impl<P> MarkupParser for std::rc::Rc<P>
where
    P: MarkupParser + ?Sized,
{
    fn parse_fragment(&self, markup: &str) -> Fragment {
        (**self).parse_fragment(markup)
    }
}

/// HTML5 fragment parser backed by html5ever.
#[derive(Debug, Clone, Copy, Default)]
pub struct Html5everParser;

impl MarkupParser for Html5everParser {
    fn parse_fragment(&self, markup: &str) -> Fragment {
        let context = QualName::new(None, ns!(html), local_name!("body"));

        parse_fragment(ArenaSink::new(), ParseOpts::default(), context, Vec::new()).one(markup)
    }
}

// ----------------------------------------------------------------------------
// Tree sink
// ----------------------------------------------------------------------------

/// Handle of the document node.
const DOCUMENT: usize = 0;

#[derive(Debug)]
enum SinkData {
    Document,
    /// Contents of a `<template>` element.
    Contents,
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
        contents: Option<usize>,
    },
    Text(String),
    Comment(String),
    ProcessingInstruction,
}

#[derive(Debug)]
struct SinkNode {
    data: SinkData,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Arena-backed html5ever sink. Handles are indices into `nodes`.
#[derive(Debug)]
struct ArenaSink {
    nodes: Vec<SinkNode>,
}

impl ArenaSink {
    fn new() -> Self {
        Self {
            nodes: vec![SinkNode {
                data: SinkData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    fn push(&mut self, data: SinkData) -> usize {
        self.nodes.push(SinkNode {
            data,
            parent: None,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn detach(&mut self, node: usize) {
        if let Some(parent) = self.nodes[node].parent.take() {
            self.nodes[parent].children.retain(|child| *child != node);
        }
    }

    /// Insert `node` under `parent`, before `before` or at the end.
    fn attach(&mut self, parent: usize, node: usize, before: Option<usize>) {
        self.detach(node);
        self.nodes[node].parent = Some(parent);

        let children = &mut self.nodes[parent].children;
        let index = before
            .and_then(|sibling| children.iter().position(|child| *child == sibling))
            .unwrap_or(children.len());
        children.insert(index, node);
    }

    /// Insert text, merging with a text node right before the insertion point.
    fn insert_text(&mut self, parent: usize, before: Option<usize>, text: &str) {
        let previous = {
            let children = &self.nodes[parent].children;
            let index = before
                .and_then(|sibling| children.iter().position(|child| *child == sibling))
                .unwrap_or(children.len());
            index.checked_sub(1).map(|i| children[i])
        };

        if let Some(previous) = previous {
            if let SinkData::Text(existing) = &mut self.nodes[previous].data {
                existing.push_str(text);
                return;
            }
        }

        let node = self.push(SinkData::Text(text.to_string()));
        self.attach(parent, node, before);
    }

    fn convert_children(&self, node: usize) -> Vec<Node> {
        self.nodes[node]
            .children
            .iter()
            .filter_map(|child| self.convert(*child))
            .collect()
    }

    fn convert(&self, node: usize) -> Option<Node> {
        match &self.nodes[node].data {
            SinkData::Element {
                name,
                attrs,
                contents,
            } => {
                let mut element = Element::new(&*name.local);
                for attr in attrs {
                    element.set_attribute(&*attr.name.local, &*attr.value);
                }

                let source = contents.unwrap_or(node);
                for child in self.convert_children(source) {
                    element.push_child(child);
                }

                Some(Node::Element(element))
            }
            SinkData::Text(text) => Some(Node::Text(text.clone())),
            SinkData::Comment(text) => Some(Node::Comment(text.clone())),
            SinkData::Document | SinkData::Contents | SinkData::ProcessingInstruction => None,
        }
    }
}

impl TreeSink for ArenaSink {
    type Handle = usize;
    type Output = Fragment;

    fn finish(self) -> Fragment {
        // Fragment parsing puts everything under a synthetic <html> root
        let root = self.nodes[DOCUMENT]
            .children
            .iter()
            .copied()
            .find(|child| matches!(self.nodes[*child].data, SinkData::Element { .. }));

        match root {
            Some(root) => Fragment::from_nodes(self.convert_children(root)),
            None => Fragment::new(),
        }
    }

    fn parse_error(&mut self, msg: Cow<'static, str>) {
        tracing::trace!(%msg, "recovered from markup error");
    }

    fn get_document(&mut self) -> usize {
        DOCUMENT
    }

    fn elem_name<'a>(&'a self, target: &'a usize) -> ExpandedName<'a> {
        match &self.nodes[*target].data {
            SinkData::Element { name, .. } => name.expanded(),
            _ => unreachable!("html5ever asked for the name of a non-element"),
        }
    }

    fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>, flags: ElementFlags) -> usize {
        let contents = if flags.template {
            Some(self.push(SinkData::Contents))
        } else {
            None
        };

        self.push(SinkData::Element {
            name,
            attrs,
            contents,
        })
    }

    fn create_comment(&mut self, text: StrTendril) -> usize {
        self.push(SinkData::Comment(text.to_string()))
    }

    fn create_pi(&mut self, _target: StrTendril, _data: StrTendril) -> usize {
        self.push(SinkData::ProcessingInstruction)
    }

    fn append(&mut self, parent: &usize, child: NodeOrText<usize>) {
        match child {
            NodeOrText::AppendNode(node) => self.attach(*parent, node, None),
            NodeOrText::AppendText(text) => self.insert_text(*parent, None, &text),
        }
    }

    fn append_based_on_parent_node(
        &mut self,
        element: &usize,
        prev_element: &usize,
        child: NodeOrText<usize>,
    ) {
        if self.nodes[*element].parent.is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &mut self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
    }

    fn get_template_contents(&mut self, target: &usize) -> usize {
        match &self.nodes[*target].data {
            SinkData::Element {
                contents: Some(contents),
                ..
            } => *contents,
            _ => unreachable!("html5ever asked for the contents of a non-template"),
        }
    }

    fn same_node(&self, x: &usize, y: &usize) -> bool {
        x == y
    }

    fn set_quirks_mode(&mut self, _mode: QuirksMode) {}

    fn append_before_sibling(&mut self, sibling: &usize, new_node: NodeOrText<usize>) {
        let Some(parent) = self.nodes[*sibling].parent else {
            return;
        };

        match new_node {
            NodeOrText::AppendNode(node) => self.attach(parent, node, Some(*sibling)),
            NodeOrText::AppendText(text) => self.insert_text(parent, Some(*sibling), &text),
        }
    }

    fn add_attrs_if_missing(&mut self, target: &usize, attrs: Vec<Attribute>) {
        if let SinkData::Element {
            attrs: existing, ..
        } = &mut self.nodes[*target].data
        {
            for attr in attrs {
                if !existing.iter().any(|present| present.name == attr.name) {
                    existing.push(attr);
                }
            }
        }
    }

    fn remove_from_parent(&mut self, target: &usize) {
        self.detach(*target);
    }

    fn reparent_children(&mut self, node: &usize, new_parent: &usize) {
        let children = std::mem::take(&mut self.nodes[*node].children);
        for child in children {
            self.nodes[child].parent = Some(*new_parent);
            self.nodes[*new_parent].children.push(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(markup: &str) -> Fragment {
        Html5everParser.parse_fragment(markup)
    }

    #[test]
    fn parses_elements_attributes_and_text() {
        let fragment = parse(r#"<p class="greeting" id="x">Hello <b>world</b></p>"#);

        let p = fragment.first_element().expect("p element");
        assert_eq!(p.name(), "p");
        assert_eq!(p.attribute("class"), Some("greeting"));
        assert_eq!(p.attribute("id"), Some("x"));
        assert_eq!(p.text_content(), "Hello world");
        assert_eq!(p.to_html(), r#"<p class="greeting" id="x">Hello <b>world</b></p>"#);
    }

    #[test]
    fn keeps_all_top_level_nodes() {
        let fragment = parse("<p>one</p> <p>two</p>");

        assert_eq!(fragment.element_count(), 2);
        assert_eq!(fragment.children().len(), 3);
    }

    #[test]
    fn recovers_from_malformed_markup() {
        let fragment = parse("<div><span>unclosed");

        assert_eq!(fragment.to_html(), "<div><span>unclosed</span></div>");
    }

    #[test]
    fn decodes_entities() {
        let fragment = parse("<p title=\"a &amp; b\">x &lt; y</p>");
        let p = fragment.first_element().expect("p element");

        assert_eq!(p.attribute("title"), Some("a & b"));
        assert_eq!(p.text_content(), "x < y");
    }

    #[test]
    fn template_contents_become_children() {
        let fragment = parse("<template><i>inside</i></template>");
        let template = fragment.first_element().expect("template element");

        assert_eq!(template.name(), "template");
        assert_eq!(template.to_html(), "<template><i>inside</i></template>");
    }

    #[test]
    fn comments_are_kept() {
        let fragment = parse("<div><!-- hi --></div>");

        assert_eq!(fragment.to_html(), "<div><!-- hi --></div>");
    }

    #[test]
    fn text_only_markup_has_no_element() {
        let fragment = parse("just text");

        assert!(fragment.first_element().is_none());
        assert_eq!(fragment.children(), &[Node::text("just text")]);
    }
}
