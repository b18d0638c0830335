//! Procedural renderer for the Glass Calculator app icon.

pub mod contents_json;
pub mod font;
pub mod icon_gen;
