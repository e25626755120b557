//! Format readers: source bytes → intermediate content.
//!
//! | Reader | Output |
//! |--------|--------|
//! | [`pdf`]   | page text, positioned text items, grid sheets |
//! | [`word`]  | raw text or a [`crate::formats::markup::DocNode`] tree |
//! | [`excel`] | sheets of display strings |
//! | [`ppt`]   | slides in numeric order |
//! | [`text`]  | decoded text |
//!
//! Readers are synchronous; the conversion layer runs them on the blocking
//! pool.

pub mod excel;
pub mod pdf;
pub mod ppt;
pub mod text;
pub mod word;
