//! Tree-sitter parsing layer.
//!
//! Responsibilities:
//! - Initialize a parser for the Lua grammar;
//! - Read file contents (size was already checked during scanning);
//! - Parse and surface syntax failures per file.
//!
//! The parser is owned by the run that created it and passed down
//! explicitly; there is no process-wide parser state.

use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::Path;
use tracing::debug;
use tree_sitter::{Parser, Tree};

/// A parser bound to the Lua grammar. One instance per run.
pub struct LuaParser {
    parser: Parser,
}

impl LuaParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_lua::LANGUAGE.into())
            .context("load Lua grammar")?;
        Ok(Self { parser })
    }

    /// Parse a byte buffer. Returns an error when tree-sitter gives up
    /// entirely (cancellation, invalid ranges); syntax errors still produce
    /// a tree and are reported by [`Self::parse_file`].
    pub fn parse_source(&mut self, source: &[u8]) -> Result<Tree> {
        self.parser
            .parse(source, None)
            .ok_or_else(|| anyhow!("tree-sitter returned no tree"))
    }

    /// Read and parse a single file. A tree whose root contains syntax
    /// errors is rejected: the caller records the file as failed and the
    /// run continues.
    pub fn parse_file(&mut self, path: &Path) -> Result<(Tree, Vec<u8>)> {
        debug!("parse: reading {}", path.display());
        let source =
            fs::read(path).with_context(|| format!("read {}", path.display()))?;

        let tree = self
            .parse_source(&source)
            .with_context(|| format!("parse {}", path.display()))?;

        if tree.root_node().has_error() {
            return Err(anyhow!("syntax error in {}", path.display()));
        }

        Ok((tree, source))
    }
}
