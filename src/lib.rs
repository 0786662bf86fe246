//! `eml2pdf` — convert `.eml` email messages into sanitized, self-contained
//! documents.
//!
//! This crate provides the core library: MIME walking with charset fallback,
//! RFC 2047 header decoding, inline image embedding, HTML sanitization, and
//! the batch pipeline that hands documents to a rendering backend.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod render;
