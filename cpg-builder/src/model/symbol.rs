//! Lexical symbols and scopes.
//!
//! A `Symbol` is an immutable record of a declaration; a `Scope` is a name
//! resolution region with a parent link. Scopes form a tree per file with the
//! file's root chunk at the top. Scope ids reuse the grammar-internal node
//! identity of the scope-introducing AST node, so the two traversal passes
//! agree on them without extra bookkeeping.

use crate::model::span::Span;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// Identity of a scope: the tree-sitter id of the node that introduced it.
pub type ScopeId = usize;

/// Declaration kind of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Module,
    FunctionDeclaration,
    Function,
    LocalFunction,
    GlobalFunction,
    LocalVar,
    GlobalVar,
    Parameter,
}

impl Display for SymbolKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use SymbolKind::*;
        let s = match self {
            Module => "module",
            FunctionDeclaration => "function_declaration",
            Function => "function",
            LocalFunction => "local_function",
            GlobalFunction => "global_function",
            LocalVar => "local_var",
            GlobalVar => "global_var",
            Parameter => "parameter",
        };
        f.write_str(s)
    }
}

/// Immutable record of a single declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Id of the worker that recorded the symbol.
    pub worker_id: String,
    /// File the declaration lives in.
    pub file_path: String,
    /// Scope the declaration was recorded in.
    pub scope_id: ScopeId,
    /// Variable or function name.
    pub name: String,
    pub kind: SymbolKind,
    /// Grammar-internal identity of the declaring AST node.
    pub ast_id: usize,
    pub span: Span,
}

/// A name-resolution region. Symbols of enclosing regions are reachable
/// through the parent link.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub scope_id: ScopeId,
    pub parent: Option<ScopeId>,
    pub symbols: HashMap<String, Symbol>,
}

impl Scope {
    pub fn new(scope_id: ScopeId, parent: Option<ScopeId>) -> Self {
        Self {
            scope_id,
            parent,
            symbols: HashMap::new(),
        }
    }
}
