//! Symbol resolution pass (first pass).
//!
//! A depth-first pre-order walk over a file's syntax tree that populates the
//! per-file [`SymbolTable`]: scopes are opened on scope-introducing nodes,
//! declarations are recorded into the innermost scope, and function
//! parameters are queued so they land in the scope of the function's body
//! block rather than in the surrounding scope.

use crate::core::ast_utils::{
    self, DeclKind, all_of_kind, declaration_kind, first_of_kind, is_scope_introducing, node_text,
};
use crate::model::span::Span;
use crate::model::symbol::SymbolKind;
use crate::symbols::scope_stack::ScopeStack;
use crate::symbols::table::SymbolTable;
use tree_sitter::Node;

/// A parameter waiting for its block scope to open.
struct QueuedParameter {
    name: String,
    ast_id: usize,
    span: Span,
}

pub struct SymbolBuilder<'src> {
    scope_stack: ScopeStack,
    param_queue: Vec<QueuedParameter>,
    source: &'src [u8],
}

impl<'src> SymbolBuilder<'src> {
    pub fn new(worker_id: &str, file_path: &str, source: &'src [u8]) -> Self {
        Self {
            scope_stack: ScopeStack::new(worker_id, file_path),
            param_queue: Vec::new(),
            source,
        }
    }

    /// Walk the tree rooted at `root` (normally the file's chunk) and record
    /// every declaration into `table`.
    pub fn build(&mut self, table: &mut SymbolTable, root: Node<'_>) {
        self.walk(table, root);
    }

    fn walk(&mut self, table: &mut SymbolTable, node: Node<'_>) {
        let introduces_scope = is_scope_introducing(node);
        if introduces_scope {
            self.scope_stack.push_scope(table, node.id());
        }

        // Parameters queued by the enclosing function declaration belong to
        // the body scope that just opened.
        if node.kind() == "block" {
            self.drain_parameters(table);
        }

        match declaration_kind(node) {
            Some(DeclKind::Variable) => self.declare_variables(table, node),
            Some(DeclKind::Function) => self.declare_function(table, node),
            Some(DeclKind::Block) | None => {}
        }

        for child in ast_utils::children(node) {
            self.walk(table, child);
        }

        if introduces_scope {
            self.scope_stack.pop_scope();
        }
    }

    /// `local a, b = …` declares every identifier in the variable list; a
    /// missing `local` keyword makes the declaration global.
    fn declare_variables(&mut self, table: &mut SymbolTable, node: Node<'_>) {
        let kind = match node.child(0) {
            Some(first) if first.kind() == "local" => SymbolKind::LocalVar,
            _ => SymbolKind::GlobalVar,
        };

        let Some(var_list) = first_of_kind(node, "variable_list") else {
            return;
        };

        for ident in all_of_kind(var_list, "identifier") {
            let name = node_text(ident, self.source);
            self.scope_stack
                .add_symbol(table, name, kind, node.id(), Span::of_node(&node));
        }
    }

    /// Record the function under its leading identifier (for dotted names,
    /// the receiver) and queue its parameters for the body scope.
    fn declare_function(&mut self, table: &mut SymbolTable, node: Node<'_>) {
        if let Some(name_node) = first_of_kind(node, "identifier") {
            let name = node_text(name_node, self.source);
            self.scope_stack.add_symbol(
                table,
                name,
                SymbolKind::FunctionDeclaration,
                node.id(),
                Span::of_node(&node),
            );
        }

        // A body-less function (`function f() end`) never opens a block, so
        // stale entries must not leak into an unrelated block.
        self.param_queue.clear();
        if let Some(params) = first_of_kind(node, "parameters") {
            for ident in all_of_kind(params, "identifier") {
                self.param_queue.push(QueuedParameter {
                    name: node_text(ident, self.source),
                    ast_id: ident.id(),
                    span: Span::of_node(&ident),
                });
            }
        }
    }

    fn drain_parameters(&mut self, table: &mut SymbolTable) {
        for param in self.param_queue.drain(..) {
            self.scope_stack.add_symbol(
                table,
                param.name,
                SymbolKind::Parameter,
                param.ast_id,
                param.span,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parse::LuaParser;

    fn build_table(code: &str) -> (SymbolTable, tree_sitter::Tree) {
        let tree = LuaParser::new().unwrap().parse_source(code.as_bytes()).unwrap();
        let mut table = SymbolTable::new("w1");
        let mut builder = SymbolBuilder::new("w1", "test.lua", code.as_bytes());
        builder.build(&mut table, tree.root_node());
        (table, tree)
    }

    #[test]
    fn local_variable_lands_in_chunk_scope() {
        let code = "local a = 5\n";
        let (table, tree) = build_table(code);

        let chunk_id = tree.root_node().id();
        let sym = table.lookup_by_name(chunk_id, "a").unwrap();
        assert_eq!(sym.kind, SymbolKind::LocalVar);
        assert!(table.exports.contains_key("a"));
    }

    #[test]
    fn multiple_declaration_records_every_name() {
        let code = "local a, b = 1, 2\n";
        let (table, tree) = build_table(code);

        let chunk_id = tree.root_node().id();
        assert!(table.lookup_by_name(chunk_id, "a").is_some());
        assert!(table.lookup_by_name(chunk_id, "b").is_some());
    }

    #[test]
    fn function_parameters_bind_inside_the_body_only() {
        let code = "local function add(a, b)\n    return a + b\nend\n";
        let (table, tree) = build_table(code);
        let root = tree.root_node();

        let chunk_id = root.id();
        let f = table.lookup_by_name(chunk_id, "add").unwrap();
        assert_eq!(f.kind, SymbolKind::FunctionDeclaration);

        // Parameters are invisible at chunk level…
        assert!(table.lookup_by_name(chunk_id, "a").is_none());

        // …but bound in the body block's scope.
        let block = first_of_kind(root, "block").unwrap();
        let a = table.lookup_by_name(block.id(), "a").unwrap();
        assert_eq!(a.kind, SymbolKind::Parameter);
        let params = table.lookup_by_kind(block.id(), SymbolKind::Parameter);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn inner_scopes_shadow_outer_declarations() {
        let code = "local x = 1\ndo\n    local x = 2\nend\n";
        let (table, tree) = build_table(code);
        let root = tree.root_node();

        let inner_block = first_of_kind(root, "block").unwrap();
        let inner = table.lookup_by_name(inner_block.id(), "x").unwrap();
        let outer = table.lookup_by_name(root.id(), "x").unwrap();
        assert_ne!(inner.scope_id, outer.scope_id);
        assert!(inner.span.start_byte > outer.span.start_byte);
    }
}
