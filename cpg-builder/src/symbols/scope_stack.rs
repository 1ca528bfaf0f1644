//! Traversal companion that keeps the current lexical scope and records
//! every new scope and symbol into the owning [`SymbolTable`].
//!
//! Pushes and pops must stay balanced with the scope-introducing AST nodes
//! of the walk that drives the stack.

use crate::model::span::Span;
use crate::model::symbol::{Scope, ScopeId, Symbol, SymbolKind};
use crate::symbols::table::SymbolTable;

pub struct ScopeStack {
    stack: Vec<ScopeId>,
    worker_id: String,
    file_path: String,
}

impl ScopeStack {
    pub fn new(worker_id: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            stack: Vec::new(),
            worker_id: worker_id.into(),
            file_path: file_path.into(),
        }
    }

    /// Id of the innermost scope, if any.
    pub fn current(&self) -> Option<ScopeId> {
        self.stack.last().copied()
    }

    /// Open a new scope whose parent is the current top, and register it in
    /// the table.
    pub fn push_scope(&mut self, table: &mut SymbolTable, scope_id: ScopeId) {
        let scope = Scope::new(scope_id, self.current());
        self.stack.push(scope_id);
        table.add_scope(scope);
    }

    /// Close the innermost scope.
    pub fn pop_scope(&mut self) -> Option<ScopeId> {
        self.stack.pop()
    }

    /// Record a declaration in the innermost scope and index it in the
    /// table's exports.
    pub fn add_symbol(
        &mut self,
        table: &mut SymbolTable,
        name: impl Into<String>,
        kind: SymbolKind,
        ast_id: usize,
        span: Span,
    ) {
        let Some(scope_id) = self.current() else {
            return;
        };
        let symbol = Symbol {
            worker_id: self.worker_id.clone(),
            file_path: self.file_path.clone(),
            scope_id,
            name: name.into(),
            kind,
            ast_id,
            span,
        };
        if let Some(scope) = table.scopes.get_mut(&scope_id) {
            scope.symbols.insert(symbol.name.clone(), symbol.clone());
        }
        table.add_export(symbol);
    }
}
