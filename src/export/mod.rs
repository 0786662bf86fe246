//! Output side: file naming, rendering backends, and the conversion pipeline.

pub mod backend;
pub mod naming;
pub mod pipeline;
