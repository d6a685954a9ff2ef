//! Template Cache
//!
//! Compiled templates are keyed by [`TemplateId`] and kept for the life of the
//! cache. An id comes from one of two places:
//!
//! - explicit registration: the caller picks a stable name and hands over the
//!   literal strings up front with [`TemplateCache::register`];
//! - a call site: every expansion of the [`html!`](crate::html) macro owns a
//!   `static` [`CallSite`], and the static's address is the id. The first
//!   render from a call site compiles; every later render from the same site
//!   reuses the compiled template.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::rc::Rc;

use crate::config::TemplateConfig;
use crate::error::TemplateError;

use super::compile::CompiledTemplate;
use super::dom::Element;
use super::parse::{Html5everParser, MarkupParser};

/// Identifies a compiled template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateId(Key);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Named(Cow<'static, str>),
    Site(usize),
}

impl TemplateId {
    /// An id chosen by the caller.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self(Key::Named(name.into()))
    }

    /// The id of a call site: its address.
    pub fn of_site(site: &'static CallSite) -> Self {
        Self(Key::Site(site as *const CallSite as usize))
    }
}

impl Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Key::Named(name) => write!(f, "{name:?}"),
            Key::Site(address) => write!(f, "site@{address:#x}"),
        }
    }
}

/// The literal strings of one template call site.
///
/// Declared as a `static` so that its address identifies the site.
#[derive(Debug)]
pub struct CallSite {
    strings: &'static [&'static str],
}

impl CallSite {
    pub const fn new(strings: &'static [&'static str]) -> Self {
        Self { strings }
    }

    pub fn strings(&self) -> &'static [&'static str] {
        self.strings
    }

    pub fn id(&'static self) -> TemplateId {
        TemplateId::of_site(self)
    }
}

/// Compiles templates once and renders them by cloning.
pub struct TemplateCache {
    templates: RefCell<HashMap<TemplateId, Rc<CompiledTemplate>>>,
    parser: Box<dyn MarkupParser>,
    config: TemplateConfig,
    compiles: Cell<usize>,
}

impl TemplateCache {
    /// A cache using the html5ever parser and default configuration.
    pub fn new() -> Self {
        Self::with_parser(Html5everParser)
    }

    /// A cache using a custom parser.
    pub fn with_parser(parser: impl MarkupParser + 'static) -> Self {
        Self {
            templates: RefCell::new(HashMap::new()),
            parser: Box::new(parser),
            config: TemplateConfig::default(),
            compiles: Cell::new(0),
        }
    }

    /// Replace the configuration. Affects templates compiled afterwards.
    pub fn with_config(mut self, config: TemplateConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    /// Register a template under an explicit id and compile it now.
    ///
    /// Registering the same strings again returns the existing template.
    /// Registering different strings under a taken id fails.
    pub fn register(
        &self,
        id: TemplateId,
        strings: &[&str],
    ) -> Result<Rc<CompiledTemplate>, TemplateError> {
        if let Some(existing) = self.get(&id) {
            if existing.matches(strings) {
                return Ok(existing);
            }
            return Err(TemplateError::LayoutConflict { id });
        }

        self.compile(id, strings)
    }

    /// Render a registered template.
    pub fn render(
        &self,
        id: &TemplateId,
        values: &[&dyn Display],
    ) -> Result<Element, TemplateError> {
        let template = self
            .get(id)
            .ok_or_else(|| TemplateError::UnknownTemplate { id: id.clone() })?;

        Ok(template.instantiate(values))
    }

    /// Render the template of a call site, compiling it on first use.
    ///
    /// Usually reached through the [`html!`](crate::html) macro.
    pub fn html(
        &self,
        site: &'static CallSite,
        values: &[&dyn Display],
    ) -> Result<Element, TemplateError> {
        let id = site.id();
        let template = match self.get(&id) {
            Some(template) => template,
            None => self.compile(id, site.strings())?,
        };

        Ok(template.instantiate(values))
    }

    /// The compiled template for an id.
    pub fn get(&self, id: &TemplateId) -> Option<Rc<CompiledTemplate>> {
        self.templates.borrow().get(id).cloned()
    }

    pub fn contains(&self, id: &TemplateId) -> bool {
        self.templates.borrow().contains_key(id)
    }

    /// Number of cached templates.
    pub fn len(&self) -> usize {
        self.templates.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.borrow().is_empty()
    }

    /// Number of successful compilations so far.
    pub fn compile_count(&self) -> usize {
        self.compiles.get()
    }

    fn compile(
        &self,
        id: TemplateId,
        strings: &[&str],
    ) -> Result<Rc<CompiledTemplate>, TemplateError> {
        let template = Rc::new(CompiledTemplate::compile(
            id.clone(),
            strings,
            self.parser.as_ref(),
            &self.config.stub_prefix,
        )?);

        self.compiles.set(self.compiles.get() + 1);
        self.templates
            .borrow_mut()
            .insert(id, Rc::clone(&template));

        Ok(template)
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateCache")
            .field("templates", &self.len())
            .field("compiles", &self.compile_count())
            .field("config", &self.config)
            .finish()
    }
}

/// Render a template from this call site.
///
/// The first argument is a [`TemplateCache`] (or anything that derefs to
/// one), the bracketed list holds the literal strings, and the remaining
/// arguments are the interpolated values, one fewer than the literals. Each
/// expansion of the macro is its own call site, so a loop calling it
/// compiles once.
///
/// ```rust
/// use ripple_core::{html, template::TemplateCache};
///
/// let cache = TemplateCache::new();
/// for n in 1..=3 {
///     let element = html!(cache, ["<p class=\"", "\">", "</p>"], "count", n).unwrap();
///     assert_eq!(element.text_content(), n.to_string());
/// }
/// assert_eq!(cache.compile_count(), 1);
/// ```
#[macro_export]
macro_rules! html {
    ($cache:expr, [$($literal:literal),+ $(,)?] $(, $value:expr)* $(,)?) => {{
        static SITE: $crate::template::CallSite = $crate::template::CallSite::new(&[$($literal),+]);
        $cache.html(&SITE, &[$(&$value as &dyn ::std::fmt::Display),*])
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Fragment;

    /// Counts calls into the real parser.
    struct CountingParser {
        calls: Rc<Cell<usize>>,
    }

    impl MarkupParser for CountingParser {
        fn parse_fragment(&self, markup: &str) -> Fragment {
            self.calls.set(self.calls.get() + 1);
            Html5everParser.parse_fragment(markup)
        }
    }

    fn counting_cache() -> (TemplateCache, Rc<Cell<usize>>) {
        let calls = Rc::new(Cell::new(0));
        let cache = TemplateCache::with_parser(CountingParser {
            calls: calls.clone(),
        });
        (cache, calls)
    }

    static GREETING: CallSite = CallSite::new(&["<p>Hello, ", "!</p>"]);
    static OTHER: CallSite = CallSite::new(&["<p>Hello, ", "!</p>"]);

    #[test]
    fn call_site_compiles_once() {
        let (cache, calls) = counting_cache();

        let first = cache.html(&GREETING, &[&"Ada"]).unwrap();
        let second = cache.html(&GREETING, &[&"Grace"]).unwrap();

        assert_eq!(first.to_html(), "<p>Hello, Ada!</p>");
        assert_eq!(second.to_html(), "<p>Hello, Grace!</p>");
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn identical_text_at_different_sites_compiles_twice() {
        let (cache, calls) = counting_cache();

        cache.html(&GREETING, &[&"a"]).unwrap();
        cache.html(&OTHER, &[&"b"]).unwrap();

        assert_eq!(calls.get(), 2);
        assert_ne!(GREETING.id(), OTHER.id());
    }

    #[test]
    fn renders_are_independent_nodes() {
        let cache = TemplateCache::new();

        let mut first = cache.html(&GREETING, &[&"a"]).unwrap();
        let second = cache.html(&GREETING, &[&"b"]).unwrap();
        first.set_attribute("id", "mutated");

        assert!(!second.has_attribute("id"));
        assert!(!cache.get(&GREETING.id()).unwrap().root().has_attribute("id"));
    }

    #[test]
    fn register_then_render() {
        let (cache, calls) = counting_cache();
        let id = TemplateId::named("counter");

        cache
            .register(id.clone(), &["<span data-n=\"", "\">", "</span>"])
            .unwrap();
        assert_eq!(calls.get(), 1);

        let element = cache.render(&id, &[&7, &"seven"]).unwrap();
        assert_eq!(element.to_html(), "<span data-n=\"7\">seven</span>");

        cache.render(&id, &[&8, &"eight"]).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn register_is_idempotent_for_same_strings() {
        let cache = TemplateCache::new();
        let id = TemplateId::named("same");

        let first = cache.register(id.clone(), &["<b>", "</b>"]).unwrap();
        let second = cache.register(id.clone(), &["<b>", "</b>"]).unwrap();

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(cache.compile_count(), 1);
    }

    #[test]
    fn register_conflict_is_an_error() {
        let cache = TemplateCache::new();
        let id = TemplateId::named("taken");

        cache.register(id.clone(), &["<b>", "</b>"]).unwrap();
        let result = cache.register(id.clone(), &["<i>", "</i>"]);

        assert_eq!(result.err(), Some(TemplateError::LayoutConflict { id }));
    }

    #[test]
    fn unknown_template_is_an_error() {
        let cache = TemplateCache::new();
        let id = TemplateId::named("missing");

        assert_eq!(
            cache.render(&id, &[]).err(),
            Some(TemplateError::UnknownTemplate { id })
        );
    }

    #[test]
    fn failed_compile_is_not_cached() {
        let (cache, calls) = counting_cache();
        let id = TemplateId::named("text");

        assert!(cache.register(id.clone(), &["no elements ", ""]).is_err());
        assert!(cache.register(id.clone(), &["no elements ", ""]).is_err());

        assert_eq!(calls.get(), 2);
        assert!(!cache.contains(&id));
        assert_eq!(cache.compile_count(), 0);
    }

    #[test]
    fn macro_reuses_its_site() {
        let (cache, calls) = counting_cache();

        let rendered: Vec<String> = (0..3)
            .map(|n| {
                html!(cache, ["<li>item ", "</li>"], n)
                    .unwrap()
                    .to_html()
            })
            .collect();

        assert_eq!(
            rendered,
            vec!["<li>item 0</li>", "<li>item 1</li>", "<li>item 2</li>"]
        );
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn macro_without_values() {
        let cache = TemplateCache::new();

        let element = html!(cache, ["<hr>"]).unwrap();
        assert_eq!(element.to_html(), "<hr>");
    }

    #[test]
    fn stub_prefix_comes_from_config() {
        let cache = TemplateCache::new().with_config(TemplateConfig {
            stub_prefix: "slot".into(),
        });
        let template = cache
            .register(TemplateId::named("prefixed"), &["<b>", "</b>"])
            .unwrap();

        assert!(template.stub(0).unwrap().starts_with("__slot"));
    }

    #[test]
    fn ids_display_readably() {
        assert_eq!(TemplateId::named("counter").to_string(), "\"counter\"");
        assert!(GREETING.id().to_string().starts_with("site@0x"));
    }
}
