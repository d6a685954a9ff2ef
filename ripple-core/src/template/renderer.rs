//! Renderer
//!
//! A [`Renderer`] binds a template cache to one fixed call site, so rendering
//! only needs the current values. A [`Mount`] is the live slot a render effect
//! swaps each fresh element into.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use ripple_core::reactive::{create_state, MicrotaskQueue};
//! use ripple_core::template::{create_renderer, CallSite, Mount, TemplateCache};
//!
//! static COUNTER: CallSite = CallSite::new(&["<output>", "</output>"]);
//!
//! let queue = MicrotaskQueue::new();
//! let (state, effects) = create_state::<i32>(queue.clone());
//! state.set("count", 0);
//!
//! let renderer = create_renderer(Rc::new(TemplateCache::new()), &COUNTER);
//! let mount = Mount::new();
//!
//! let (reader, target) = (state.clone(), mount.clone());
//! effects.use_effect(move || {
//!     let count = reader.get("count").unwrap_or_default();
//!     if let Ok(element) = renderer.render(&[&count]) {
//!         target.swap(element);
//!     }
//! });
//! assert_eq!(mount.to_html(), "<output>0</output>");
//!
//! queue.turn(|| state.set("count", 1));
//! assert_eq!(mount.to_html(), "<output>1</output>");
//! ```

use std::cell::{Cell, RefCell};
use std::fmt::{self, Display};
use std::rc::Rc;

use crate::error::TemplateError;

use super::cache::{CallSite, TemplateCache, TemplateId};
use super::dom::Element;

/// Create a renderer for `site` backed by `cache`.
pub fn create_renderer(cache: Rc<TemplateCache>, site: &'static CallSite) -> Renderer {
    Renderer { cache, site }
}

/// Renders one call site's template with fresh values.
#[derive(Clone)]
pub struct Renderer {
    cache: Rc<TemplateCache>,
    site: &'static CallSite,
}

impl Renderer {
    /// Render the template with `values`, returning a new element.
    ///
    /// The template is compiled on the first call only.
    pub fn render(&self, values: &[&dyn Display]) -> Result<Element, TemplateError> {
        self.cache.html(self.site, values)
    }

    /// The template id of this renderer's call site.
    pub fn id(&self) -> TemplateId {
        self.site.id()
    }

    pub fn cache(&self) -> &Rc<TemplateCache> {
        &self.cache
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("template", &self.id())
            .field("strings", &self.site.strings())
            .finish()
    }
}

/// The live slot a render effect swaps its output into.
///
/// Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct Mount {
    current: Rc<RefCell<Option<Element>>>,
    swaps: Rc<Cell<usize>>,
}

impl Mount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `element`, returning the element it replaced.
    pub fn swap(&self, element: Element) -> Option<Element> {
        self.swaps.set(self.swaps.get() + 1);
        self.current.replace(Some(element))
    }

    /// Remove whatever is shown.
    pub fn clear(&self) -> Option<Element> {
        self.current.take()
    }

    /// A copy of the element currently shown.
    pub fn current(&self) -> Option<Element> {
        self.current.borrow().clone()
    }

    /// Run `f` against the element currently shown, without cloning it.
    pub fn with_current<R>(&self, f: impl FnOnce(Option<&Element>) -> R) -> R {
        f(self.current.borrow().as_ref())
    }

    /// HTML of the element currently shown, or an empty string.
    pub fn to_html(&self) -> String {
        self.with_current(|element| element.map(Element::to_html).unwrap_or_default())
    }

    /// Number of swaps so far.
    pub fn swap_count(&self) -> usize {
        self.swaps.get()
    }
}
