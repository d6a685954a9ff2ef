//! Templates
//!
//! The template half of the pipeline: markup with interpolated values is
//! compiled once into a [`CompiledTemplate`] and rendered many times by
//! cloning the compiled root and writing the current values into its stub
//! sites.
//!
//! # Pipeline
//!
//! ```text
//! literal strings --stubs--> markup --MarkupParser--> Fragment
//!     --first element--> root + stub sites  (cached per TemplateId)
//!     --clone + fill--> Element --Mount::swap--> live slot
//! ```
//!
//! Values are inserted as text, never parsed as markup.

mod dom;
mod parse;
mod compile;
mod cache;
mod renderer;

pub use dom::{Element, Fragment, Node};
pub use parse::{Html5everParser, MarkupParser};
pub use compile::{CompiledTemplate, Segment, SitePath, SiteTarget, StubSite};
pub use cache::{CallSite, TemplateCache, TemplateId};
pub use renderer::{create_renderer, Mount, Renderer};
