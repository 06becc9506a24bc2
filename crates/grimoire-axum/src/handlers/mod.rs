//! HTTP handlers, grouped by surface.

pub mod control;
pub mod generate;
pub mod image;
pub mod meta;
