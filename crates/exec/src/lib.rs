//! External score-extraction boundary.
//!
//! The emulator's `.hi` files are binary; decoding them is delegated to the
//! `hi2txt` tool, run as a child process.  This crate only knows how to
//! launch it and pick the data line out of its output.

pub mod extractor;

pub use extractor::{Extraction, Hi2TxtExtractor, ScoreExtractor, first_data_line};
