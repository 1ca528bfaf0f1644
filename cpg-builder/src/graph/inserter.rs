//! AST layer population.
//!
//! Two sub-operations: directory-structure insertion (the enumerated
//! file-system items become `file`/`dir` nodes linked with `child_of`
//! edges) and syntax-tree insertion (pre-order, one graph node per
//! tree-sitter node, the file node linked to the tree root).

use crate::core::ast_utils::{self, node_text};
use crate::core::fs_scan::FsItem;
use crate::graph::store::GraphStore;
use crate::model::document::AstNodeDoc;
use crate::model::span::Span;
use anyhow::Result;
use tracing::debug;
use tree_sitter::Node;

pub struct AstInserter;

impl AstInserter {
    /// Insert the enumerated directory structure. Two passes: nodes first,
    /// then `child_of` edges resolved through the path index, so ordering
    /// of the enumeration never matters.
    pub fn insert_dir_struct(store: &mut GraphStore, items: &[FsItem]) -> Result<()> {
        for item in items {
            let key = store.next_id();
            store.insert_ast_node(AstNodeDoc {
                key,
                kind: item.kind.as_str().to_string(),
                text: None,
                name: Some(item.name.clone()),
                span: None,
                path: Some(item.path.clone()),
                parent: item.parent.clone(),
                ast_id: None,
            })?;
        }

        for item in items {
            let Some(parent_path) = &item.parent else {
                continue;
            };
            let parent_key = store.id_from_path(parent_path).map(str::to_string);
            let item_key = store.id_from_path(&item.path).map(str::to_string);
            if let (Some(from), Some(to)) = (parent_key, item_key) {
                store.insert_ast_edge(from, to);
            }
        }

        debug!("inserter: dir structure, items={}", items.len());
        Ok(())
    }

    /// Insert a file's syntax tree. The file node (found through the path
    /// index) is linked to the tree root so the file layer and the code
    /// layer connect.
    pub fn insert_tree(
        store: &mut GraphStore,
        root: Node<'_>,
        source: &[u8],
        file_path: &str,
    ) -> Result<()> {
        let root_key = Self::insert_node(store, root, source, None)?;

        if let Some(file_key) = store.id_from_path(file_path).map(str::to_string) {
            store.insert_ast_edge(file_key, root_key);
        }
        Ok(())
    }

    fn insert_node(
        store: &mut GraphStore,
        node: Node<'_>,
        source: &[u8],
        parent_key: Option<&str>,
    ) -> Result<String> {
        let key = store.next_id();
        store.insert_ast_node(AstNodeDoc {
            key: key.clone(),
            kind: node.kind().to_string(),
            text: Some(node_text(node, source)),
            name: None,
            span: Some(Span::of_node(&node)),
            path: None,
            parent: None,
            ast_id: Some(node.id()),
        })?;

        if let Some(parent) = parent_key {
            store.insert_ast_edge(parent, key.clone());
        }

        for child in ast_utils::children(node) {
            Self::insert_node(store, child, source, Some(&key))?;
        }

        Ok(key)
    }
}
