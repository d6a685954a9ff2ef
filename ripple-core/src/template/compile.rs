//! Template Compilation
//!
//! A template is a list of literal strings with one interpolated value
//! between each pair. Compiling it:
//!
//! 1. generates a stub marker for every value position,
//! 2. joins literals and stubs into one markup string,
//! 3. parses that string once,
//! 4. keeps the first top-level element as the template root,
//! 5. records every attribute and text node that contains stubs as a
//!    [`StubSite`], pre-split into literal and slot segments.
//!
//! Rendering then never parses or searches: it clones the root and writes
//! each site from its segments.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::error::TemplateError;

use super::cache::TemplateId;
use super::dom::{Element, Node};
use super::parse::MarkupParser;

/// Counter giving each compiled template its own stub namespace.
static STUB_NONCE_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_stub_nonce() -> u64 {
    STUB_NONCE_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Child-index path from the template root.
pub type SitePath = SmallVec<[usize; 4]>;

/// A piece of a stubbed string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// The value at this position.
    Slot(usize),
}

/// What a stub site writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteTarget {
    /// The named attribute of the element at the site's path.
    Attribute(String),
    /// The text node at the site's path.
    Text,
}

/// A location in the template root that holds stubs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubSite {
    path: SitePath,
    target: SiteTarget,
    segments: Vec<Segment>,
}

impl StubSite {
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn target(&self) -> &SiteTarget {
        &self.target
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Build the site's string from `values`.
    ///
    /// A slot without a value is written back as its stub.
    fn interpolate(&self, values: &[&dyn Display], stubs: &[String]) -> String {
        let mut out = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(index) => match values.get(*index) {
                    Some(value) => out.push_str(&value.to_string()),
                    None => {
                        if let Some(stub) = stubs.get(*index) {
                            out.push_str(stub);
                        }
                    }
                },
            }
        }

        out
    }
}

/// A parsed template, ready to be cloned and filled.
#[derive(Debug)]
pub struct CompiledTemplate {
    id: TemplateId,

    /// The literal strings the template was compiled from.
    strings: Vec<String>,

    /// Stub marker per value position.
    stubs: Vec<String>,

    root: Element,

    sites: Vec<StubSite>,
}

impl CompiledTemplate {
    /// Compile `strings` with `parser`.
    ///
    /// Fails only if the parsed markup has no top-level element. Extra
    /// top-level elements are dropped.
    pub fn compile(
        id: TemplateId,
        strings: &[&str],
        parser: &dyn MarkupParser,
        stub_prefix: &str,
    ) -> Result<Self, TemplateError> {
        let head = format!("__{}{}_", stub_prefix, next_stub_nonce());
        let stubs: Vec<String> = (0..strings.len().saturating_sub(1))
            .map(|index| format!("{head}{index}__"))
            .collect();

        let mut markup = String::new();
        for (index, literal) in strings.iter().enumerate() {
            markup.push_str(literal);
            if let Some(stub) = stubs.get(index) {
                markup.push_str(stub);
            }
        }

        let fragment = parser.parse_fragment(&markup);
        let top_level = fragment.element_count();
        let root = fragment
            .into_first_element()
            .ok_or_else(|| TemplateError::NoRootElement { id: id.clone() })?;

        if top_level > 1 {
            tracing::debug!(
                template = %id,
                dropped = top_level - 1,
                "only the first top-level element is rendered"
            );
        }

        let mut sites = Vec::new();
        collect_sites(&root, &mut SitePath::new(), &head, stubs.len(), &mut sites);

        tracing::debug!(
            template = %id,
            stubs = stubs.len(),
            sites = sites.len(),
            "compiled template"
        );

        Ok(Self {
            id,
            strings: strings.iter().map(|s| s.to_string()).collect(),
            stubs,
            root,
            sites,
        })
    }

    pub fn id(&self) -> &TemplateId {
        &self.id
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Check whether this template was compiled from exactly `strings`.
    pub fn matches(&self, strings: &[&str]) -> bool {
        self.strings.iter().map(String::as_str).eq(strings.iter().copied())
    }

    /// The stub marker for a value position.
    pub fn stub(&self, index: usize) -> Option<&str> {
        self.stubs.get(index).map(String::as_str)
    }

    /// Number of value positions.
    pub fn stub_count(&self) -> usize {
        self.stubs.len()
    }

    /// The root element with stubs in place.
    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn sites(&self) -> &[StubSite] {
        &self.sites
    }

    /// Clone the root and fill every stub site with `values`.
    ///
    /// Values are stringified with `Display`. Missing values leave their
    /// stubs in place; extra values are ignored.
    pub fn instantiate(&self, values: &[&dyn Display]) -> Element {
        if values.len() < self.stubs.len() {
            tracing::warn!(
                template = %self.id,
                expected = self.stubs.len(),
                got = values.len(),
                "not enough values, leaving stubs in place"
            );
        }

        let mut element = self.root.clone();

        for site in &self.sites {
            let rendered = site.interpolate(values, &self.stubs);

            match &site.target {
                SiteTarget::Attribute(name) => {
                    if let Some(target) = element.descendant_mut(&site.path) {
                        target.set_attribute(name.clone(), rendered);
                    }
                }
                SiteTarget::Text => {
                    if let Some(Node::Text(text)) = element.node_at_mut(&site.path) {
                        *text = rendered;
                    }
                }
            }
        }

        element
    }
}

fn collect_sites(
    element: &Element,
    path: &mut SitePath,
    head: &str,
    count: usize,
    sites: &mut Vec<StubSite>,
) {
    for (name, value) in element.attributes() {
        if let Some(segments) = split_stubs(value, head, count) {
            sites.push(StubSite {
                path: path.clone(),
                target: SiteTarget::Attribute(name.to_string()),
                segments,
            });
        }
    }

    for (index, child) in element.children().iter().enumerate() {
        path.push(index);
        match child {
            Node::Element(child) => collect_sites(child, path, head, count, sites),
            Node::Text(text) => {
                if let Some(segments) = split_stubs(text, head, count) {
                    sites.push(StubSite {
                        path: path.clone(),
                        target: SiteTarget::Text,
                        segments,
                    });
                }
            }
            Node::Comment(_) => {}
        }
        path.pop();
    }
}

/// Split `text` at its stubs. `None` if it contains no valid stub.
///
/// A stub is `head`, a decimal index below `count`, then `__`. Anything that
/// looks like a stub but is not one stays literal.
fn split_stubs(text: &str, head: &str, count: usize) -> Option<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = text;
    let mut found = false;

    while let Some(position) = rest.find(head) {
        let after = &rest[position + head.len()..];
        let digits = after.bytes().take_while(|b| b.is_ascii_digit()).count();
        let tail = &after[digits..];

        let index = after[..digits].parse::<usize>().ok();
        if let Some(index) = index.filter(|index| *index < count && tail.starts_with("__")) {
            literal.push_str(&rest[..position]);
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Slot(index));
            rest = &tail[2..];
            found = true;
        } else {
            literal.push_str(&rest[..position + head.len()]);
            rest = after;
        }
    }

    if !found {
        return None;
    }

    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Html5everParser;

    fn compile(strings: &[&str]) -> CompiledTemplate {
        CompiledTemplate::compile(TemplateId::named("test"), strings, &Html5everParser, "stub")
            .expect("template compiles")
    }

    #[test]
    fn split_finds_stubs_between_literals() {
        let segments = split_stubs("a __s1_0__ b __s1_1__", "__s1_", 2).expect("stubs");

        assert_eq!(
            segments,
            vec![
                Segment::Literal("a ".into()),
                Segment::Slot(0),
                Segment::Literal(" b ".into()),
                Segment::Slot(1),
            ]
        );
    }

    #[test]
    fn split_distinguishes_multi_digit_indices() {
        let segments = split_stubs("__s1_1____s1_10__", "__s1_", 11).expect("stubs");
        assert_eq!(segments, vec![Segment::Slot(1), Segment::Slot(10)]);
    }

    #[test]
    fn split_leaves_foreign_markers_literal() {
        assert_eq!(split_stubs("plain", "__s1_", 2), None);
        assert_eq!(split_stubs("__s1_7__", "__s1_", 2), None);
        assert_eq!(split_stubs("__s1_x__", "__s1_", 2), None);

        let segments = split_stubs("__s1_9__ __s1_0__", "__s1_", 1).expect("stubs");
        assert_eq!(
            segments,
            vec![Segment::Literal("__s1_9__ ".into()), Segment::Slot(0)]
        );
    }

    #[test]
    fn compile_records_attribute_and_text_sites() {
        let template = compile(&["<p class=\"", "\">count: ", "</p>"]);

        assert_eq!(template.stub_count(), 2);
        assert_eq!(template.root().name(), "p");
        assert_eq!(template.sites().len(), 2);

        let attribute = &template.sites()[0];
        assert_eq!(attribute.target(), &SiteTarget::Attribute("class".into()));
        assert!(attribute.path().is_empty());
        assert_eq!(attribute.segments(), &[Segment::Slot(0)]);

        let text = &template.sites()[1];
        assert_eq!(text.target(), &SiteTarget::Text);
        assert_eq!(text.path(), &[0]);
        assert_eq!(
            text.segments(),
            &[Segment::Literal("count: ".into()), Segment::Slot(1)]
        );
    }

    #[test]
    fn instantiate_fills_values() {
        let template = compile(&["<p class=\"", "\">count: ", "</p>"]);

        let element = template.instantiate(&[&"big", &3]);
        assert_eq!(element.to_html(), "<p class=\"big\">count: 3</p>");

        // The compiled root still carries its stubs
        assert_eq!(
            template.root().attribute("class"),
            template.stub(0)
        );
    }

    #[test]
    fn instantiate_reaches_nested_nodes() {
        let template = compile(&["<ul><li title=\"", "\">", "</li><li>", "</li></ul>"]);

        let element = template.instantiate(&[&"t", &"first", &"second"]);
        assert_eq!(
            element.to_html(),
            "<ul><li title=\"t\">first</li><li>second</li></ul>"
        );
    }

    #[test]
    fn missing_values_leave_stubs() {
        let template = compile(&["<b>", "/", "</b>"]);

        let element = template.instantiate(&[&1]);
        let expected = format!("1/{}", template.stub(1).expect("second stub"));
        assert_eq!(element.text_content(), expected);
    }

    #[test]
    fn extra_values_are_ignored() {
        let template = compile(&["<b>", "</b>"]);

        let element = template.instantiate(&[&1, &2, &3]);
        assert_eq!(element.to_html(), "<b>1</b>");
    }

    #[test]
    fn values_are_not_parsed_as_markup() {
        let template = compile(&["<b>", "</b>"]);

        let element = template.instantiate(&[&"<i>x</i>"]);
        assert_eq!(element.children(), &[Node::text("<i>x</i>")]);
        assert_eq!(element.to_html(), "<b>&lt;i&gt;x&lt;/i&gt;</b>");
    }

    #[test]
    fn only_first_top_level_element_is_kept() {
        let template = compile(&["<p>", "</p><p>", "</p>"]);

        assert_eq!(template.root().name(), "p");
        assert_eq!(template.sites().len(), 1);

        let element = template.instantiate(&[&"first", &"second"]);
        assert_eq!(element.to_html(), "<p>first</p>");
    }

    #[test]
    fn no_element_is_an_error() {
        let result =
            CompiledTemplate::compile(TemplateId::named("bare"), &["text ", ""], &Html5everParser, "stub");

        assert_eq!(
            result.err(),
            Some(TemplateError::NoRootElement {
                id: TemplateId::named("bare")
            })
        );
    }

    #[test]
    fn templates_get_distinct_stubs() {
        let first = compile(&["<b>", "</b>"]);
        let second = compile(&["<b>", "</b>"]);

        assert_ne!(first.stub(0), second.stub(0));
    }
}
