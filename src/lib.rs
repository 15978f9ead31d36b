//! Image and document conversion service.
//!
//! Image routes compress by preset, enhance toward a target file size, and
//! convert between formats while keeping the original byte size. Document
//! routes assemble images into PDFs, convert between PDF and Word, and split
//! PDFs into page images.

pub mod archive;
pub mod codec;
pub mod config;
pub mod documents;
pub mod error;
pub mod handlers;
pub mod models;
pub mod multipart;
pub mod ops;
pub mod pdf;
pub mod scratch;
pub mod search;
pub mod services;
pub mod utils;
pub mod validation;
