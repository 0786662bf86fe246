//! Email parsing: EML files, header decoding, charset fallback, and MIME walking.

pub mod charset;
pub mod eml;
pub mod escape;
pub mod header;
pub mod mime;
