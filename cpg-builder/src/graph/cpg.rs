//! CPG synthesis pass (second pass).
//!
//! Walks a file's syntax tree again, consulting the symbol table built by
//! the first pass, and emits knowledge nodes and edges. Three traversal
//! companions drive the walk: a scope-stack mirror of the first pass, a
//! construction-context stack, and the store's identity index (knowledge
//! nodes reuse the key of the AST node they derive from, so a later
//! reference to the same AST node resolves to the same key).
//!
//! After the walk, discovered blocks are processed by an explicit
//! fixed-point work list, and `function` nodes are reclassified as
//! `local_function` / `global_function` once their declaration context is
//! known.

use crate::core::ast_utils::{self, first_of_kind, is_scope_introducing, node_text};
use crate::graph::store::GraphStore;
use crate::model::document::{KnowledgeKind, KnowledgeNodeDoc, KnowledgeRelation};
use crate::model::span::Span;
use crate::model::symbol::{ScopeId, Symbol, SymbolKind};
use crate::symbols::table::SymbolTable;
use anyhow::Result;
use serde_json::json;
use tracing::debug;
use tree_sitter::Node;

/// Construction context for the current sub-walk. Each frame carries the
/// knowledge-node key the context links back to.
#[derive(Debug, Clone)]
enum Context {
    Global { id: String },
    VarDecl { id: String },
    Expression { id: String },
    Arguments { id: String },
}

/// How deep the per-block call search descends before giving up.
const CALL_SEARCH_DEPTH: usize = 10;

pub struct CpgBuilder<'a> {
    store: &'a mut GraphStore,
    table: &'a mut SymbolTable,
    source: &'a [u8],
    file_path: &'a str,
    scope_stack: Vec<ScopeId>,
    context: Vec<Context>,
    root_chunk: Option<String>,
}

impl<'a> CpgBuilder<'a> {
    pub fn new(
        store: &'a mut GraphStore,
        table: &'a mut SymbolTable,
        source: &'a [u8],
        file_path: &'a str,
    ) -> Self {
        Self {
            store,
            table,
            source,
            file_path,
            scope_stack: Vec::new(),
            context: Vec::new(),
            root_chunk: None,
        }
    }

    /// Copy the file-system hierarchy into the knowledge layer: one
    /// `file`/`dir` knowledge node per AST file/dir node (same keys) and a
    /// `contains` edge per parent→child link. Runs once per project,
    /// before the per-file builds.
    pub fn copy_file_structure(store: &mut GraphStore) -> Result<()> {
        let nodes: Vec<(String, String, Option<String>, Option<String>)> = store
            .ast_nodes()
            .iter()
            .filter(|n| n.kind == "file" || n.kind == "dir")
            .map(|n| (n.key.clone(), n.kind.clone(), n.name.clone(), n.path.clone()))
            .collect();

        for (key, kind, name, path) in &nodes {
            let kkind = if kind == "file" {
                KnowledgeKind::File
            } else {
                KnowledgeKind::Dir
            };
            let mut doc =
                KnowledgeNodeDoc::new(key.clone(), kkind, name.clone().unwrap_or_default());
            if let Some(p) = path {
                doc = doc.with_path(p.clone());
            }
            store.insert_knowledge_node(doc)?;
        }

        let links: Vec<(String, String)> = store
            .ast_edges()
            .iter()
            .filter(|e| {
                store.knowledge_node(&e.from).is_some() && store.knowledge_node(&e.to).is_some()
            })
            .map(|e| (e.from.clone(), e.to.clone()))
            .collect();
        for (from, to) in links {
            store.insert_knowledge_edge(from, to, KnowledgeRelation::Contains);
        }
        Ok(())
    }

    /// Build the knowledge layer for one file's tree.
    pub fn build(&mut self, root: Node<'_>) -> Result<()> {
        self.walk(root)?;
        self.process_blocks()?;
        self.reclassify_functions()?;
        Ok(())
    }

    /* ------------------------------ walking ------------------------------ */

    fn walk(&mut self, node: Node<'_>) -> Result<()> {
        let introduces_scope = is_scope_introducing(node);
        if introduces_scope {
            self.scope_stack.push(node.id());
        }
        let result = self.visit(node);
        if introduces_scope {
            self.scope_stack.pop();
        }
        result
    }

    fn walk_children(&mut self, node: Node<'_>) -> Result<()> {
        for child in ast_utils::children(node) {
            self.walk(child)?;
        }
        Ok(())
    }

    fn visit(&mut self, node: Node<'_>) -> Result<()> {
        match node.kind() {
            "chunk" => self.visit_chunk(node),
            "block" => self.visit_block(node),
            "function_declaration" => self.visit_function_declaration(node),
            "variable_declaration" => self.visit_variable_declaration(node),
            "class_declaration" => self.visit_class_declaration(node),
            "identifier" => self.visit_identifier(node),
            "function_call" => self.visit_function_call(node),
            "expression_list" => self.visit_expression_list(node),
            _ => self.walk_children(node),
        }
    }

    fn visit_chunk(&mut self, node: Node<'_>) -> Result<()> {
        let text = node_text(node, self.source);
        let key = self.emit_for(node, KnowledgeKind::Chunk, text)?;
        self.root_chunk = Some(key.clone());

        // Hang the chunk off its file node when the file layer is present.
        if let Some(file_key) = self.store.id_from_path(self.file_path).map(str::to_string) {
            if self.store.knowledge_node(&file_key).is_some() {
                self.store
                    .insert_knowledge_edge(file_key, key.clone(), KnowledgeRelation::Contains);
            }
        }

        self.context.push(Context::Global { id: key });
        let result = self.walk_children(node);
        self.context.pop();
        result
    }

    fn visit_block(&mut self, node: Node<'_>) -> Result<()> {
        let text = node_text(node, self.source);
        if self.knowledge_key_of(node).is_none() {
            let key = self.ast_key(node);
            let doc = KnowledgeNodeDoc::new(key.clone(), KnowledgeKind::Block, text)
                .with_span(Span::of_node(&node))
                .with_ast_id(node.id())
                .discovered_block();
            self.store.insert_knowledge_node(doc)?;
            self.apply_context(&key);
        }
        self.walk_children(node)
    }

    fn visit_function_declaration(&mut self, node: Node<'_>) -> Result<()> {
        let name_node = ast_utils::children(node)
            .find(|c| c.kind() == "identifier" || c.kind() == "dot_index_expression");
        let text = name_node
            .map(|n| node_text(n, self.source))
            .unwrap_or_else(|| node_text(node, self.source));

        let key = self.emit_for(node, KnowledgeKind::Function, text)?;
        if let Some(chunk) = self.root_chunk.clone() {
            self.store
                .insert_knowledge_edge(chunk, key.clone(), KnowledgeRelation::Contains);
        }
        self.apply_context(&key);

        // Parameters become knowledge nodes of their own; the body resolves
        // them through the symbol table, not through these nodes.
        if let Some(params) = first_of_kind(node, "parameters") {
            for param in ast_utils::children(params)
                .filter(|c| c.kind() == "identifier" || c.kind() == "vararg_expression")
            {
                let param_text = node_text(param, self.source);
                let param_key = self.emit_for(param, KnowledgeKind::Parameter, param_text)?;
                self.store.insert_knowledge_edge(
                    key.clone(),
                    param_key,
                    KnowledgeRelation::HasParameter,
                );
            }
        }

        // Only the body is walked; the name and parameter subtrees are
        // declaration-side and must not produce reference nodes.
        if let Some(block) = ast_utils::children(node).find(|c| c.kind() == "block") {
            self.walk(block)?;
            if let Some(block_key) = self.knowledge_key_of(block) {
                self.store.insert_knowledge_edge(
                    key,
                    block_key,
                    KnowledgeRelation::HasBlock,
                );
            }
        }
        Ok(())
    }

    fn visit_variable_declaration(&mut self, node: Node<'_>) -> Result<()> {
        let text = node_text(node, self.source);
        let key = self.emit_for(node, KnowledgeKind::VariableDeclaration, text)?;
        if let Some(chunk) = self.root_chunk.clone() {
            self.store
                .insert_knowledge_edge(chunk, key.clone(), KnowledgeRelation::Contains);
        }
        self.apply_context(&key);

        let has_initializer =
            ast_utils::children(node).any(|c| c.kind() == "assignment_statement");
        if has_initializer {
            self.store.update_knowledge_node(&key, |n| {
                n.props.insert("initialized".into(), json!(true));
            })?;
            self.context.push(Context::VarDecl { id: key });
            let result = self.walk_children(node);
            self.context.pop();
            result
        } else {
            self.walk_children(node)
        }
    }

    // Unreachable with the Lua grammar; kept for grammars that have it.
    fn visit_class_declaration(&mut self, node: Node<'_>) -> Result<()> {
        let text = node_text(node, self.source);
        let key = self.emit_for(node, KnowledgeKind::ClassDeclaration, text)?;
        self.apply_context(&key);
        self.walk_children(node)
    }

    fn visit_identifier(&mut self, node: Node<'_>) -> Result<()> {
        let text = node_text(node, self.source);

        // An identifier inside the variable list of a declaration is being
        // declared, not referencing: it gets a `declares` edge from the
        // declaration and never a `refers_to`.
        if let Some(declaration) = self.declaration_side(node) {
            let key = self.emit_for(node, KnowledgeKind::Identifier, text)?;
            if let Some(decl_key) = self.knowledge_key_of(declaration) {
                self.store
                    .insert_knowledge_edge(decl_key, key, KnowledgeRelation::Declares);
            }
            return Ok(());
        }

        let key = self.emit_for(node, KnowledgeKind::Identifier, text.clone())?;
        self.apply_context(&key);
        self.link_reference(&key, &text, node);
        Ok(())
    }

    fn visit_function_call(&mut self, node: Node<'_>) -> Result<()> {
        let name_node = ast_utils::children(node)
            .find(|c| c.kind() == "identifier" || c.kind() == "dot_index_expression");
        let name_text = name_node.map(|n| node_text(n, self.source));
        // Dotted calls resolve through their leading identifier.
        let lookup_name = name_node.and_then(|n| {
            first_of_kind(n, "identifier").map(|ident| node_text(ident, self.source))
        });

        match lookup_name.as_deref() {
            Some("require") => return self.visit_require(node),
            Some("module") => return self.visit_module_call(node),
            _ => {}
        }

        let text = name_text.unwrap_or_else(|| node_text(node, self.source));
        let key = self.emit_for(node, KnowledgeKind::FunctionCall, text)?;
        self.apply_context(&key);

        if let Some(name) = lookup_name {
            match self.resolve(&name) {
                Some(symbol) => {
                    if let Some(decl_key) = self
                        .store
                        .key_for_identity(symbol.ast_id)
                        .map(str::to_string)
                        .filter(|k| self.store.knowledge_node(k).is_some())
                    {
                        // The call site is defined by the declaration.
                        self.store.insert_knowledge_edge(
                            decl_key,
                            key.clone(),
                            KnowledgeRelation::Defines,
                        );
                    }
                }
                // Unresolved call: retained for later cross-file linking,
                // no edge today.
                None => self.record_unresolved(&name, node, SymbolKind::Function),
            }
        }

        if let Some(args) = ast_utils::children(node).find(|c| c.kind() == "arguments") {
            let arg_children: Vec<Node<'_>> = ast_utils::children(args)
                .filter(|c| !matches!(c.kind(), "(" | ")" | ","))
                .collect();
            if !arg_children.is_empty() {
                self.context.push(Context::Arguments { id: key });
                for arg in arg_children {
                    self.walk(arg)?;
                }
                self.context.pop();
            }
        }
        Ok(())
    }

    /// `local m = require("mod")` produces a deduplicated `module` node and
    /// an `imports` edge from the declared variable.
    fn visit_require(&mut self, node: Node<'_>) -> Result<()> {
        let text = node_text(node, self.source);
        let key = self.emit_for(node, KnowledgeKind::FunctionCall, "require".to_string())?;
        self.apply_context(&key);

        let Some(module_name) = self.call_string_argument(node) else {
            debug!("cpg: require without a literal module name: {text}");
            return Ok(());
        };

        let module_key = self.module_node(&module_name, Span::of_node(&node))?;

        if let Some(Context::VarDecl { id }) = self.context.last().cloned() {
            self.store
                .insert_knowledge_edge(id, module_key, KnowledgeRelation::Imports);
            if let Some(local_name) = self.required_local_name(node) {
                self.table.add_import(local_name, module_name);
            }
        }
        Ok(())
    }

    /// `module("name")` declares the chunk's module.
    fn visit_module_call(&mut self, node: Node<'_>) -> Result<()> {
        let Some(module_name) = self.call_string_argument(node) else {
            return Ok(());
        };
        let key = self.emit_for(node, KnowledgeKind::Module, module_name)?;
        if let Some(chunk) = self.root_chunk.clone() {
            self.store
                .insert_knowledge_edge(chunk, key, KnowledgeRelation::Defines);
        }
        Ok(())
    }

    /// Expression lists are traversal-transparent: inside a declaration or
    /// an argument list the enclosing context keeps governing the linking.
    /// At top level they open an `Expression` frame tied to the chunk.
    fn visit_expression_list(&mut self, node: Node<'_>) -> Result<()> {
        if let Some(Context::Global { id }) = self.context.last().cloned() {
            self.context.push(Context::Expression { id });
            let result = self.walk_children(node);
            self.context.pop();
            result
        } else {
            self.walk_children(node)
        }
    }

    /* ----------------------------- helpers ------------------------------ */

    fn ast_key(&self, node: Node<'_>) -> String {
        self.store
            .key_for_identity(node.id())
            .map(str::to_string)
            .unwrap_or_else(|| node.id().to_string())
    }

    /// Key of the knowledge node already emitted for `node`, if any.
    fn knowledge_key_of(&self, node: Node<'_>) -> Option<String> {
        let key = self.store.key_for_identity(node.id())?;
        self.store.knowledge_node(key)?;
        Some(key.to_string())
    }

    /// Emit a knowledge node for an AST node, reusing the AST node's key.
    /// Emitting twice for the same node yields the same key.
    fn emit_for(
        &mut self,
        node: Node<'_>,
        kind: KnowledgeKind,
        text: String,
    ) -> Result<String> {
        let key = self.ast_key(node);
        if self.store.knowledge_node(&key).is_none() {
            let doc = KnowledgeNodeDoc::new(key.clone(), kind, text)
                .with_span(Span::of_node(&node))
                .with_ast_id(node.id());
            self.store.insert_knowledge_node(doc)?;
        }
        Ok(key)
    }

    /// Context-dependent linking for a freshly emitted node.
    fn apply_context(&mut self, key: &str) {
        match self.context.last().cloned() {
            Some(Context::Arguments { id }) => {
                self.store
                    .insert_knowledge_edge(id, key, KnowledgeRelation::HasArgument);
            }
            Some(Context::VarDecl { id }) => {
                self.store
                    .insert_knowledge_edge(key, id, KnowledgeRelation::Initializes);
            }
            Some(Context::Expression { id }) => {
                self.store
                    .insert_knowledge_edge(id, key, KnowledgeRelation::Contains);
            }
            Some(Context::Global { .. }) | None => {}
        }
    }

    /// The `variable_declaration` this identifier is declared by, if the
    /// identifier sits on the declaration side (inside the variable list,
    /// not inside an initializer or argument list).
    fn declaration_side<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        let mut in_variable_list = false;
        let mut current = node.parent();
        while let Some(parent) = current {
            match parent.kind() {
                "variable_list" => in_variable_list = true,
                "expression_list" | "arguments" => return None,
                "variable_declaration" => return in_variable_list.then_some(parent),
                "chunk" | "block" => return None,
                _ => {}
            }
            current = parent.parent();
        }
        None
    }

    fn current_scope(&self) -> Option<ScopeId> {
        self.scope_stack.last().copied()
    }

    fn resolve(&self, name: &str) -> Option<Symbol> {
        let scope = self.current_scope()?;
        self.table.lookup_by_name(scope, name).cloned()
    }

    /// `refers_to` from a reference to its declaration's knowledge node.
    fn link_reference(&mut self, key: &str, name: &str, node: Node<'_>) {
        match self.resolve(name) {
            Some(symbol) => {
                let decl_key = self
                    .store
                    .key_for_identity(symbol.ast_id)
                    .map(str::to_string)
                    .filter(|k| self.store.knowledge_node(k).is_some());
                if let Some(decl_key) = decl_key {
                    self.store
                        .insert_knowledge_edge(key, decl_key, KnowledgeRelation::RefersTo);
                }
            }
            None => self.record_unresolved(name, node, SymbolKind::GlobalVar),
        }
    }

    fn record_unresolved(&mut self, name: &str, node: Node<'_>, kind: SymbolKind) {
        let Some(scope_id) = self.current_scope() else {
            return;
        };
        self.table.add_unresolved(Symbol {
            worker_id: self.table.worker_id.clone(),
            file_path: self.file_path.to_string(),
            scope_id,
            name: name.to_string(),
            kind,
            ast_id: node.id(),
            span: Span::of_node(&node),
        });
    }

    /// First string literal inside a call's argument list
    /// (`require("x")`, `module("x")`).
    fn call_string_argument(&self, node: Node<'_>) -> Option<String> {
        let args = ast_utils::children(node).find(|c| c.kind() == "arguments")?;
        let content = first_of_kind(args, "string_content")?;
        Some(node_text(content, self.source))
    }

    /// Local name on the declaration side of `local m = require(…)`.
    fn required_local_name(&self, node: Node<'_>) -> Option<String> {
        let (declaration, _) = ast_utils::ancestor_of_kind(node, "variable_declaration")?;
        let var_list = first_of_kind(declaration, "variable_list")?;
        let ident = first_of_kind(var_list, "identifier")?;
        Some(node_text(ident, self.source))
    }

    /// Get-or-create the deduplicated module node for `name`.
    fn module_node(&mut self, name: &str, span: Span) -> Result<String> {
        let existing = self
            .store
            .knowledge_nodes()
            .iter()
            .find(|n| n.kind == KnowledgeKind::Module && n.text == name)
            .map(|n| n.key.clone());
        if let Some(key) = existing {
            return Ok(key);
        }
        let key = self.store.next_id();
        self.store.insert_knowledge_node(
            KnowledgeNodeDoc::new(key.clone(), KnowledgeKind::Module, name).with_span(span),
        )?;
        Ok(key)
    }

    /* ------------------------ recursive block pass ------------------------ */

    /// Fixed-point processing of discovered blocks. Terminates because the
    /// AST is finite, each AST block yields at most one knowledge block,
    /// and `processed` is monotone.
    fn process_blocks(&mut self) -> Result<()> {
        let mut iteration = 0usize;
        loop {
            iteration += 1;
            let new_statements = self.undiscovered_statements();
            debug!(
                "cpg: block pass iteration {iteration}: {} new control statements",
                new_statements.len()
            );

            for stmt in &new_statements {
                if self.store.knowledge_node(&stmt.key).is_none() {
                    self.store.insert_knowledge_node(
                        KnowledgeNodeDoc::new(stmt.key.clone(), stmt.kind, stmt.text.clone())
                            .with_span(stmt.span)
                            .with_ast_id(stmt.ast_id),
                    )?;
                }
                self.store.insert_knowledge_edge(
                    stmt.block_key.clone(),
                    stmt.key.clone(),
                    KnowledgeRelation::Executes,
                );
                self.attach_statement_blocks(&stmt.key)?;
            }

            let pending = self.discovered_unprocessed_blocks();
            if pending.is_empty() {
                break;
            }
            debug!("cpg: processing {} discovered blocks", pending.len());

            for block_key in pending {
                self.insert_laststat_returns(&block_key)?;
                self.insert_block_var_decls(&block_key)?;
                self.insert_local_assignments(&block_key)?;
                self.insert_block_function_calls(&block_key)?;
                self.process_if_statements(&block_key)?;
                self.store
                    .update_knowledge_node(&block_key, |n| n.processed = Some(true))?;
            }
        }
        Ok(())
    }

    fn discovered_unprocessed_blocks(&self) -> Vec<String> {
        self.store
            .knowledge_nodes()
            .iter()
            .filter(|n| {
                n.kind == KnowledgeKind::Block
                    && n.discovered == Some(true)
                    && n.processed == Some(false)
            })
            .map(|n| n.key.clone())
            .collect()
    }

    /// Control statements sitting directly inside a discovered block that
    /// have no knowledge node yet.
    fn undiscovered_statements(&self) -> Vec<PendingStatement> {
        let mut results = Vec::new();
        for block in self
            .store
            .knowledge_nodes()
            .iter()
            .filter(|n| n.kind == KnowledgeKind::Block && n.discovered == Some(true))
        {
            for child in self.store.ast_children(&block.key) {
                let Some(kind) = KnowledgeKind::control_statement(&child.kind) else {
                    continue;
                };
                if self.store.knowledge_node(&child.key).is_some() {
                    continue;
                }
                results.push(PendingStatement {
                    block_key: block.key.clone(),
                    key: child.key.clone(),
                    kind,
                    text: child.text.clone().unwrap_or_default(),
                    span: child.span.unwrap_or(Span::new(0, 0, 0, 0)),
                    ast_id: child.ast_id.unwrap_or_default(),
                });
            }
        }
        results
    }

    /// Link a control statement to its inner blocks with `has_block`. The
    /// block nodes themselves were already discovered during the main walk.
    fn attach_statement_blocks(&mut self, stmt_key: &str) -> Result<()> {
        let blocks: Vec<String> = self
            .store
            .ast_children(stmt_key)
            .iter()
            .filter(|c| c.kind == "block")
            .map(|c| c.key.clone())
            .collect();
        for block_key in blocks {
            self.ensure_block_node(&block_key)?;
            self.store.insert_knowledge_edge(
                stmt_key.to_string(),
                block_key,
                KnowledgeRelation::HasBlock,
            );
        }
        Ok(())
    }

    fn ensure_block_node(&mut self, block_key: &str) -> Result<()> {
        if self.store.knowledge_node(block_key).is_some() {
            return Ok(());
        }
        let Some(ast) = self.store.ast_node(block_key) else {
            return Ok(());
        };
        let doc = KnowledgeNodeDoc::new(
            block_key.to_string(),
            KnowledgeKind::Block,
            ast.text.clone().unwrap_or_default(),
        )
        .discovered_block();
        let doc = match (ast.span, ast.ast_id) {
            (Some(span), Some(id)) => doc.with_span(span).with_ast_id(id),
            (Some(span), None) => doc.with_span(span),
            (None, Some(id)) => doc.with_ast_id(id),
            (None, None) => doc,
        };
        self.store.insert_knowledge_node(doc)
    }

    /// Direct `return_statement` children become `laststat_return` nodes.
    fn insert_laststat_returns(&mut self, block_key: &str) -> Result<()> {
        let returns: Vec<(String, String, Option<Span>, Option<usize>)> = self
            .store
            .ast_children(block_key)
            .iter()
            .filter(|c| c.kind == "return_statement")
            .map(|c| {
                (
                    c.key.clone(),
                    c.text.clone().unwrap_or_default(),
                    c.span,
                    c.ast_id,
                )
            })
            .collect();
        for (key, text, span, ast_id) in returns {
            if self.store.knowledge_node(&key).is_none() {
                let mut doc = KnowledgeNodeDoc::new(key.clone(), KnowledgeKind::LaststatReturn, text);
                doc.span = span;
                doc.ast_id = ast_id;
                self.store.insert_knowledge_node(doc)?;
            }
            self.store.insert_knowledge_edge(
                block_key.to_string(),
                key,
                KnowledgeRelation::Executes,
            );
        }
        Ok(())
    }

    /// Declaration identifiers inside a block become `local_var` nodes
    /// declared by the block. Identifier nodes emitted by the main walk
    /// are promoted in place.
    fn insert_block_var_decls(&mut self, block_key: &str) -> Result<()> {
        for (ident_key, text, span, ast_id) in self.block_declaration_idents(block_key) {
            if self.store.knowledge_node(&ident_key).is_some() {
                self.store.update_knowledge_node(&ident_key, |n| {
                    if n.kind == KnowledgeKind::Identifier {
                        n.kind = KnowledgeKind::LocalVar;
                    }
                })?;
            } else {
                let mut doc = KnowledgeNodeDoc::new(ident_key.clone(), KnowledgeKind::LocalVar, text);
                doc.span = span;
                doc.ast_id = ast_id;
                self.store.insert_knowledge_node(doc)?;
            }
            self.store.insert_knowledge_edge(
                block_key.to_string(),
                ident_key,
                KnowledgeRelation::Declares,
            );
        }
        Ok(())
    }

    fn block_declaration_idents(
        &self,
        block_key: &str,
    ) -> Vec<(String, String, Option<Span>, Option<usize>)> {
        let mut idents = Vec::new();
        for decl in self
            .store
            .ast_children(block_key)
            .iter()
            .filter(|c| c.kind == "variable_declaration")
        {
            for assign in self
                .store
                .ast_children(&decl.key)
                .iter()
                .filter(|c| c.kind == "assignment_statement")
            {
                for var_list in self
                    .store
                    .ast_children(&assign.key)
                    .iter()
                    .filter(|c| c.kind == "variable_list")
                {
                    for ident in self
                        .store
                        .ast_children(&var_list.key)
                        .iter()
                        .filter(|c| c.kind == "identifier")
                    {
                        idents.push((
                            ident.key.clone(),
                            ident.text.clone().unwrap_or_default(),
                            ident.span,
                            ident.ast_id,
                        ));
                    }
                }
            }
        }
        idents
    }

    /// Assignment statements of nested declarations become
    /// `local_assignment` nodes executed by the block.
    fn insert_local_assignments(&mut self, block_key: &str) -> Result<()> {
        let mut assignments = Vec::new();
        for decl in self
            .store
            .ast_children(block_key)
            .iter()
            .filter(|c| c.kind == "variable_declaration")
        {
            for assign in self
                .store
                .ast_children(&decl.key)
                .iter()
                .filter(|c| c.kind == "assignment_statement")
            {
                assignments.push((
                    assign.key.clone(),
                    assign.text.clone().unwrap_or_default(),
                    assign.span,
                    assign.ast_id,
                ));
            }
        }
        for (key, text, span, ast_id) in assignments {
            if self.store.knowledge_node(&key).is_none() {
                let mut doc =
                    KnowledgeNodeDoc::new(key.clone(), KnowledgeKind::LocalAssignment, text);
                doc.span = span;
                doc.ast_id = ast_id;
                self.store.insert_knowledge_node(doc)?;
            }
            self.store.insert_knowledge_edge(
                block_key.to_string(),
                key,
                KnowledgeRelation::Executes,
            );
        }
        Ok(())
    }

    /// Calls reachable from the block without crossing a nested block
    /// become `calls` edges, either to a declaration matched by name or to
    /// the call's own node.
    fn insert_block_function_calls(&mut self, block_key: &str) -> Result<()> {
        let mut calls = Vec::new();
        self.collect_calls(block_key, 0, true, &mut calls);

        for call_key in calls {
            let name = self
                .store
                .ast_children(&call_key)
                .iter()
                .find(|c| c.kind == "identifier" || c.kind == "dot_index_expression")
                .and_then(|c| c.text.clone());
            let Some(name) = name else { continue };

            let target = self
                .store
                .knowledge_nodes()
                .iter()
                .find(|n| {
                    n.text == name
                        && (n.kind.is_function() || n.kind == KnowledgeKind::LocalVar)
                })
                .map(|n| n.key.clone());

            match target {
                Some(decl_key) => self.store.insert_knowledge_edge(
                    block_key.to_string(),
                    decl_key,
                    KnowledgeRelation::Calls,
                ),
                None => {
                    // The main walk already gave every call site a node.
                    if self.store.knowledge_node(&call_key).is_some() {
                        self.store.insert_knowledge_edge(
                            block_key.to_string(),
                            call_key,
                            KnowledgeRelation::Calls,
                        );
                    }
                }
            }
        }
        Ok(())
    }

    fn collect_calls(&self, key: &str, depth: usize, is_root: bool, out: &mut Vec<String>) {
        if depth > CALL_SEARCH_DEPTH {
            return;
        }
        let Some(node) = self.store.ast_node(key) else {
            return;
        };
        if !is_root && node.kind == "block" {
            return;
        }
        if node.kind == "function_call" {
            out.push(key.to_string());
        }
        let children: Vec<String> = self
            .store
            .ast_children(key)
            .iter()
            .map(|c| c.key.clone())
            .collect();
        for child in children {
            self.collect_calls(&child, depth + 1, false, out);
        }
    }

    /// `if` statements hand their `elseif`/`else` arms knowledge nodes with
    /// `executes` edges; each arm's inner block is linked via `has_block`.
    fn process_if_statements(&mut self, block_key: &str) -> Result<()> {
        let if_keys: Vec<String> = self
            .store
            .ast_children(block_key)
            .iter()
            .filter(|c| c.kind == "if_statement")
            .map(|c| c.key.clone())
            .collect();

        for if_key in if_keys {
            let arms: Vec<(String, KnowledgeKind, String, Option<Span>, Option<usize>)> = self
                .store
                .ast_children(&if_key)
                .iter()
                .filter_map(|c| {
                    let kind = match c.kind.as_str() {
                        "else_statement" => KnowledgeKind::ElseStatement,
                        "elseif_statement" => KnowledgeKind::ElseifStatement,
                        _ => return None,
                    };
                    Some((
                        c.key.clone(),
                        kind,
                        c.text.clone().unwrap_or_default(),
                        c.span,
                        c.ast_id,
                    ))
                })
                .collect();

            for (arm_key, kind, text, span, ast_id) in arms {
                if self.store.knowledge_node(&arm_key).is_none() {
                    let mut doc = KnowledgeNodeDoc::new(arm_key.clone(), kind, text);
                    doc.span = span;
                    doc.ast_id = ast_id;
                    self.store.insert_knowledge_node(doc)?;
                }
                self.store.insert_knowledge_edge(
                    if_key.clone(),
                    arm_key.clone(),
                    KnowledgeRelation::Executes,
                );
                self.attach_statement_blocks(&arm_key)?;
            }
        }
        Ok(())
    }

    /* --------------------------- reclassification --------------------------- */

    /// Promote `function` nodes once declaration context is known: a
    /// `local` child makes a `local_function`; a declaration hanging
    /// directly under a chunk makes a `global_function`.
    fn reclassify_functions(&mut self) -> Result<()> {
        let functions: Vec<String> = self
            .store
            .knowledge_nodes()
            .iter()
            .filter(|n| n.kind == KnowledgeKind::Function)
            .map(|n| n.key.clone())
            .collect();

        for key in functions {
            let is_local = self
                .store
                .ast_children(&key)
                .iter()
                .any(|c| c.kind == "local");

            let new_kind = if is_local {
                Some(KnowledgeKind::LocalFunction)
            } else {
                let under_chunk = self.store.knowledge_inbound(&key).iter().any(|e| {
                    matches!(
                        e.relation,
                        KnowledgeRelation::Contains | KnowledgeRelation::Declares
                    ) && self
                        .store
                        .knowledge_node(&e.from)
                        .map(|n| n.kind == KnowledgeKind::Chunk)
                        .unwrap_or(false)
                });
                under_chunk.then_some(KnowledgeKind::GlobalFunction)
            };

            if let Some(kind) = new_kind {
                self.store
                    .update_knowledge_node(&key, |n| n.kind = kind)?;
            }
        }
        Ok(())
    }
}

struct PendingStatement {
    block_key: String,
    key: String,
    kind: KnowledgeKind,
    text: String,
    span: Span,
    ast_id: usize,
}
