//! HTML rendering: inline image embedding, attachment listing, document
//! assembly, and sanitization.

pub mod attachments;
pub mod document;
pub mod embed;
pub mod sanitize;
