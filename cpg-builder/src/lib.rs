//! Lua Code Property Graph construction.
//!
//! Turns a directory of Lua sources into a typed, multi-relational graph:
//! the file-system hierarchy, the concrete syntax tree of every file, and a
//! knowledge layer of semantic entities (modules, declarations, references,
//! control blocks, calls) with the relationships between them. The graph is
//! exported as a single JSON document in the CPG v1 format.

pub mod config;
pub mod core;
pub mod export;
pub mod graph;
pub mod metrics;
pub mod model;
pub mod run;
pub mod symbols;
