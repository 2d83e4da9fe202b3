//! Rendering utilities for CI surfaces (Markdown, GitHub annotations).
//!
//! Renderers work on a small renderable model so they stay independent of the
//! report schema; the app crate does the mapping.

#![forbid(unsafe_code)]

mod gha;
mod markdown;
mod model;

pub use gha::render_github_annotations;
pub use markdown::render_markdown;
pub use model::{
    RenderableData, RenderableFinding, RenderableLocation, RenderableNamespace,
    RenderableReport, RenderableSeverity, RenderableVerdictStatus,
};
