//! Core synthesis logic — config types, parsing, the template model, logical
//! IDs, graph checks, output, and diffing.

pub mod diff;
pub mod error;
pub mod hasher;
pub mod output;
pub mod parser;
pub mod resolver;
pub mod stack;
pub mod synth;
pub mod template;
pub mod types;
