//! In-memory typed multigraph.
//!
//! Four collections: AST nodes, AST edges, knowledge nodes, knowledge
//! edges. Nodes live in insertion-ordered vectors with a key index, so a
//! run's emission order is deterministic. Two secondary indexes are
//! maintained: file path → key (file/dir nodes) and tree-sitter identity →
//! key (syntax nodes), the latter letting the second pass find the graph
//! node for any AST node it revisits.
//!
//! Edge queries are linear scans. N is bounded by a single project's graph
//! and callers batch their queries; adjacency indexes can be added if
//! profiling ever demands them.

use crate::model::document::{
    AstEdge, AstNodeDoc, KnowledgeEdge, KnowledgeNodeDoc, KnowledgeRelation,
};
use anyhow::{Result, bail};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct GraphStore {
    ast_nodes: Vec<AstNodeDoc>,
    ast_index: HashMap<String, usize>,
    ast_edges: Vec<AstEdge>,

    knowledge_nodes: Vec<KnowledgeNodeDoc>,
    knowledge_index: HashMap<String, usize>,
    knowledge_edges: Vec<KnowledgeEdge>,

    /// Monotonic key source, shared by both layers.
    counter: u64,
    /// `path` is a secondary key on file/dir AST nodes.
    path_index: HashMap<String, String>,
    /// Grammar-internal identity → AST node key.
    identity_index: HashMap<usize, String>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh key from the monotonic counter, rendered as a decimal string.
    /// Keys are stable within a single run only.
    pub fn next_id(&mut self) -> String {
        self.counter += 1;
        self.counter.to_string()
    }

    /* ----------------------------- AST layer ----------------------------- */

    pub fn insert_ast_node(&mut self, doc: AstNodeDoc) -> Result<()> {
        if doc.key.is_empty() {
            bail!("AST node must have a key");
        }
        if self.ast_index.contains_key(&doc.key) {
            bail!("duplicate AST node key: {}", doc.key);
        }
        if let Some(path) = &doc.path {
            self.path_index.insert(path.clone(), doc.key.clone());
        }
        if let Some(ast_id) = doc.ast_id {
            self.identity_index.insert(ast_id, doc.key.clone());
        }
        self.ast_index.insert(doc.key.clone(), self.ast_nodes.len());
        self.ast_nodes.push(doc);
        Ok(())
    }

    pub fn insert_ast_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.ast_edges.push(AstEdge {
            from: from.into(),
            to: to.into(),
        });
    }

    pub fn ast_node(&self, key: &str) -> Option<&AstNodeDoc> {
        self.ast_index.get(key).map(|&i| &self.ast_nodes[i])
    }

    pub fn ast_nodes(&self) -> &[AstNodeDoc] {
        &self.ast_nodes
    }

    pub fn ast_edges(&self) -> &[AstEdge] {
        &self.ast_edges
    }

    /// Child nodes of `parent_key` in the AST layer (relation `child_of`).
    pub fn ast_children(&self, parent_key: &str) -> Vec<&AstNodeDoc> {
        self.ast_edges
            .iter()
            .filter(|e| e.from == parent_key)
            .filter_map(|e| self.ast_node(&e.to))
            .collect()
    }

    pub fn ast_inbound(&self, to_key: &str) -> Vec<&AstEdge> {
        self.ast_edges.iter().filter(|e| e.to == to_key).collect()
    }

    /// Key of the file/dir node registered under `path`.
    pub fn id_from_path(&self, path: &str) -> Option<&str> {
        self.path_index.get(path).map(String::as_str)
    }

    /// Key of the AST node created for the tree-sitter node with `ast_id`.
    pub fn key_for_identity(&self, ast_id: usize) -> Option<&str> {
        self.identity_index.get(&ast_id).map(String::as_str)
    }

    /* -------------------------- Knowledge layer -------------------------- */

    pub fn insert_knowledge_node(&mut self, doc: KnowledgeNodeDoc) -> Result<()> {
        if doc.key.is_empty() {
            bail!("knowledge node must have a key");
        }
        if self.knowledge_index.contains_key(&doc.key) {
            bail!("duplicate knowledge node key: {}", doc.key);
        }
        self.knowledge_index
            .insert(doc.key.clone(), self.knowledge_nodes.len());
        self.knowledge_nodes.push(doc);
        Ok(())
    }

    pub fn insert_knowledge_edge(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        relation: KnowledgeRelation,
    ) {
        self.knowledge_edges.push(KnowledgeEdge {
            from: from.into(),
            to: to.into(),
            relation,
        });
    }

    pub fn knowledge_node(&self, key: &str) -> Option<&KnowledgeNodeDoc> {
        self.knowledge_index
            .get(key)
            .map(|&i| &self.knowledge_nodes[i])
    }

    pub fn knowledge_nodes(&self) -> &[KnowledgeNodeDoc] {
        &self.knowledge_nodes
    }

    pub fn knowledge_edges(&self) -> &[KnowledgeEdge] {
        &self.knowledge_edges
    }

    /// Merge-style update of a knowledge node. The closed set of legal
    /// updates (kind promotion, `processed`, extra properties) is enforced
    /// by the callers; the store only guarantees the node exists.
    pub fn update_knowledge_node<F>(&mut self, key: &str, patch: F) -> Result<()>
    where
        F: FnOnce(&mut KnowledgeNodeDoc),
    {
        match self.knowledge_index.get(key) {
            Some(&i) => {
                patch(&mut self.knowledge_nodes[i]);
                Ok(())
            }
            None => bail!("unknown knowledge node key: {key}"),
        }
    }

    /// Child nodes of `parent_key` in the knowledge layer, optionally
    /// restricted to one relation.
    pub fn knowledge_children(
        &self,
        parent_key: &str,
        relation: Option<KnowledgeRelation>,
    ) -> Vec<&KnowledgeNodeDoc> {
        self.knowledge_edges
            .iter()
            .filter(|e| e.from == parent_key)
            .filter(|e| relation.map(|r| e.relation == r).unwrap_or(true))
            .filter_map(|e| self.knowledge_node(&e.to))
            .collect()
    }

    pub fn knowledge_outbound(&self, from_key: &str) -> Vec<&KnowledgeEdge> {
        self.knowledge_edges
            .iter()
            .filter(|e| e.from == from_key)
            .collect()
    }

    pub fn knowledge_inbound(&self, to_key: &str) -> Vec<&KnowledgeEdge> {
        self.knowledge_edges
            .iter()
            .filter(|e| e.to == to_key)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::KnowledgeKind;

    fn ast_doc(key: &str, kind: &str) -> AstNodeDoc {
        AstNodeDoc {
            key: key.into(),
            kind: kind.into(),
            text: None,
            name: None,
            span: None,
            path: None,
            parent: None,
            ast_id: None,
        }
    }

    #[test]
    fn next_id_is_monotonic() {
        let mut store = GraphStore::new();
        assert_eq!(store.next_id(), "1");
        assert_eq!(store.next_id(), "2");
        assert_eq!(store.next_id(), "3");
    }

    #[test]
    fn insert_rejects_missing_and_duplicate_keys() {
        let mut store = GraphStore::new();
        assert!(store.insert_ast_node(ast_doc("", "chunk")).is_err());
        store.insert_ast_node(ast_doc("1", "chunk")).unwrap();
        assert!(store.insert_ast_node(ast_doc("1", "chunk")).is_err());
    }

    #[test]
    fn path_index_resolves_files() {
        let mut store = GraphStore::new();
        let mut doc = ast_doc("42", "file");
        doc.name = Some("test.lua".into());
        doc.path = Some("proj/src/test.lua".into());
        store.insert_ast_node(doc).unwrap();

        assert_eq!(store.id_from_path("proj/src/test.lua"), Some("42"));
        assert_eq!(store.id_from_path("nonexistent"), None);
    }

    #[test]
    fn children_follow_edges() {
        let mut store = GraphStore::new();
        store.insert_ast_node(ast_doc("1", "chunk")).unwrap();
        store.insert_ast_node(ast_doc("2", "identifier")).unwrap();
        store.insert_ast_node(ast_doc("3", "number")).unwrap();
        store.insert_ast_edge("1", "2");
        store.insert_ast_edge("1", "3");

        let children = store.ast_children("1");
        assert_eq!(children.len(), 2);
        assert_eq!(store.ast_inbound("3").len(), 1);
        assert!(store.ast_children("2").is_empty());
    }

    #[test]
    fn knowledge_updates_merge_into_existing_nodes() {
        let mut store = GraphStore::new();
        store
            .insert_knowledge_node(
                KnowledgeNodeDoc::new("7", KnowledgeKind::Block, "x = 1").discovered_block(),
            )
            .unwrap();

        store
            .update_knowledge_node("7", |n| n.processed = Some(true))
            .unwrap();
        let node = store.knowledge_node("7").unwrap();
        assert_eq!(node.processed, Some(true));
        assert_eq!(node.discovered, Some(true));
        assert_eq!(node.text, "x = 1");

        assert!(store.update_knowledge_node("missing", |_| {}).is_err());
    }

    #[test]
    fn knowledge_children_filter_by_relation() {
        let mut store = GraphStore::new();
        store
            .insert_knowledge_node(KnowledgeNodeDoc::new("1", KnowledgeKind::Chunk, ""))
            .unwrap();
        store
            .insert_knowledge_node(KnowledgeNodeDoc::new("2", KnowledgeKind::LocalVar, "a"))
            .unwrap();
        store
            .insert_knowledge_node(KnowledgeNodeDoc::new("3", KnowledgeKind::Module, "m"))
            .unwrap();
        store.insert_knowledge_edge("1", "2", KnowledgeRelation::Contains);
        store.insert_knowledge_edge("1", "3", KnowledgeRelation::Defines);

        assert_eq!(store.knowledge_children("1", None).len(), 2);
        let contained = store.knowledge_children("1", Some(KnowledgeRelation::Contains));
        assert_eq!(contained.len(), 1);
        assert_eq!(contained[0].key, "2");
    }
}
