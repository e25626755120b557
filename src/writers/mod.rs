//! Target encoders: intermediate content → output bytes.
//!
//! ```text
//! PlainText / Grid / Markup ──▶ layout (plan) ──▶ pdf (paint)   .pdf
//!                          └──▶ word                          .docx
//!                          └──▶ excel                         .xlsx
//!                          └──▶ ppt                           .pptx
//! ```
//!
//! The OOXML writers are pure and need no native library. PDF output goes
//! through a [`layout::DocumentPlan`] so pagination can be tested without
//! pdfium.

pub mod excel;
pub mod layout;
pub mod metrics;
pub mod pdf;
pub mod ppt;
pub mod word;
