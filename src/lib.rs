//! Masked language model pipelines for local inference in Rust.
//!
//! Powered by [Candle](https://github.com/huggingface/candle). Prepares
//! BERT-style masked training features from raw text, predicts masked words,
//! and grows text one word piece at a time by filling a trailing `[MASK]`.
//! Results come back as annotated text that renders to the terminal or HTML.

#![deny(missing_docs)]

// ============ Internal API ============

pub(crate) mod loaders;
pub(crate) mod models;
pub(crate) mod pipelines;

#[cfg(test)]
pub(crate) mod test_utils;

// ============ Public API ============

pub mod data;
pub mod error;
pub mod render;

pub use pipelines::masked_lm;
