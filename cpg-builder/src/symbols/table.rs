//! Per-file symbol table.
//!
//! Scopes form a tree; lookups walk parent links bottom-up, so inner
//! declarations hide outer ones. The table also tracks the file's public
//! surface (`exports`), `require`d modules (`imports`), and references that
//! could not be bound locally (`unresolved`, kept for later cross-file
//! linking).

use crate::model::symbol::{Scope, ScopeId, Symbol, SymbolKind};
use std::collections::HashMap;

#[derive(Debug)]
pub struct SymbolTable {
    pub worker_id: String,
    /// Scope tree, keyed by scope id.
    pub scopes: HashMap<ScopeId, Scope>,
    /// Top-level declarations: the file's public surface. Every declaration
    /// is treated as potentially exported; refinement is future work.
    pub exports: HashMap<String, Symbol>,
    /// Mapping of local names to required module names,
    /// i.e. `local m = require("math.utils")` records `m -> math.utils`.
    pub imports: HashMap<String, String>,
    /// References without a local declaration. Mostly references into other
    /// files, retained for later cross-file linking.
    pub unresolved: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            scopes: HashMap::new(),
            exports: HashMap::new(),
            imports: HashMap::new(),
            unresolved: HashMap::new(),
        }
    }

    pub fn add_scope(&mut self, scope: Scope) {
        self.scopes.insert(scope.scope_id, scope);
    }

    pub fn add_export(&mut self, symbol: Symbol) {
        self.exports.insert(symbol.name.clone(), symbol);
    }

    pub fn add_import(&mut self, local_name: impl Into<String>, module_name: impl Into<String>) {
        self.imports.insert(local_name.into(), module_name.into());
    }

    pub fn add_unresolved(&mut self, symbol: Symbol) {
        self.unresolved.insert(symbol.name.clone(), symbol);
    }

    /// Bottom-up lookup: the first symbol named `name` found on the walk
    /// from `scope_id` to the root, or `None`. This is the operation the
    /// CPG pass relies on; its semantics must match lexical binding exactly.
    pub fn lookup_by_name(&self, scope_id: ScopeId, name: &str) -> Option<&Symbol> {
        let mut current = self.scopes.get(&scope_id);
        while let Some(scope) = current {
            if let Some(sym) = scope.symbols.get(name) {
                return Some(sym);
            }
            current = scope.parent.and_then(|p| self.scopes.get(&p));
        }
        None
    }

    /// Bottom-up lookup by kind: every symbol of `kind` held by the nearest
    /// scope that holds any. Used to resolve parameters in a block.
    pub fn lookup_by_kind(&self, scope_id: ScopeId, kind: SymbolKind) -> Vec<&Symbol> {
        let mut current = self.scopes.get(&scope_id);
        while let Some(scope) = current {
            let found: Vec<&Symbol> = scope
                .symbols
                .values()
                .filter(|s| s.kind == kind)
                .collect();
            if !found.is_empty() {
                return found;
            }
            current = scope.parent.and_then(|p| self.scopes.get(&p));
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::span::Span;

    fn sym(name: &str, scope_id: ScopeId, kind: SymbolKind, start: usize) -> Symbol {
        Symbol {
            worker_id: "w".into(),
            file_path: "f.lua".into(),
            scope_id,
            name: name.into(),
            kind,
            ast_id: start,
            span: Span::new(1, 1, start, start + 1),
        }
    }

    fn table_with_nested_scopes() -> SymbolTable {
        let mut table = SymbolTable::new("w");
        let mut root = Scope::new(1, None);
        root.symbols
            .insert("x".into(), sym("x", 1, SymbolKind::LocalVar, 0));
        root.symbols
            .insert("f".into(), sym("f", 1, SymbolKind::FunctionDeclaration, 10));
        let mut inner = Scope::new(2, Some(1));
        inner
            .symbols
            .insert("x".into(), sym("x", 2, SymbolKind::Parameter, 20));
        table.add_scope(root);
        table.add_scope(inner);
        table
    }

    #[test]
    fn lookup_prefers_inner_scope() {
        let table = table_with_nested_scopes();
        let from_inner = table.lookup_by_name(2, "x").unwrap();
        assert_eq!(from_inner.scope_id, 2);
        let from_root = table.lookup_by_name(1, "x").unwrap();
        assert_eq!(from_root.scope_id, 1);
    }

    #[test]
    fn lookup_walks_to_ancestors() {
        let table = table_with_nested_scopes();
        let f = table.lookup_by_name(2, "f").unwrap();
        assert_eq!(f.kind, SymbolKind::FunctionDeclaration);
        assert!(table.lookup_by_name(2, "missing").is_none());
    }

    #[test]
    fn lookup_by_kind_stops_at_nearest_holder() {
        let table = table_with_nested_scopes();
        let params = table.lookup_by_kind(2, SymbolKind::Parameter);
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "x");
        // Root scope has no parameters at all.
        assert!(table.lookup_by_kind(1, SymbolKind::Parameter).is_empty());
        // LocalVar resolution from the inner scope walks up to the root.
        let vars = table.lookup_by_kind(2, SymbolKind::LocalVar);
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].scope_id, 1);
    }

    #[test]
    fn shadowing_within_one_scope_keeps_last_writer() {
        let mut table = SymbolTable::new("w");
        let mut scope = Scope::new(1, None);
        scope
            .symbols
            .insert("a".into(), sym("a", 1, SymbolKind::LocalVar, 0));
        scope
            .symbols
            .insert("a".into(), sym("a", 1, SymbolKind::LocalVar, 40));
        table.add_scope(scope);
        assert_eq!(table.lookup_by_name(1, "a").unwrap().ast_id, 40);
    }
}
