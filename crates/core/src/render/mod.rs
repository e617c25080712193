//! Invoice rendering.
//!
//! Turns a finalized invoice and a template into a paginated list of draw
//! instructions. Amounts are formatted, never recomputed.

pub mod document;
pub mod error;
pub mod renderer;
pub mod template;

#[cfg(test)]
mod render_props;

pub use document::{Cell, DrawInstruction, RenderedDocument, RowKind, TextStyle};
pub use error::RenderError;
pub use renderer::InvoiceRenderer;
pub use template::{Align, ColumnKind, ColumnSpec, Margins, PaperSize, TemplateConfig};
