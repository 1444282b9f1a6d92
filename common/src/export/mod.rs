//! Export core modules shared across CLI renderers.

pub mod pdf_core;
