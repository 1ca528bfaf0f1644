//! CPG v1 export.
//!
//! Maps the internal node and edge vocabulary onto the schema's closed
//! vocabulary and serialises the whole store as one JSON document. Node ids
//! are `<project_id>:<internal_key>`. When an AST node and a knowledge node
//! share a key, the knowledge node wins: it carries the refined kind
//! (`local_function`, `local_var`, …) the consumers care about.

use crate::graph::store::GraphStore;
use crate::model::document::{AstNodeDoc, KnowledgeNodeDoc, KnowledgeRelation};
use crate::model::span::Span;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use std::collections::HashSet;

pub const SCHEMA_VERSION: &str = "v1";
pub const LANGUAGE: &str = "lua";

pub struct CpgV1Exporter<'a> {
    store: &'a GraphStore,
    project_id: &'a str,
}

impl<'a> CpgV1Exporter<'a> {
    pub fn new(store: &'a GraphStore, project_id: &'a str) -> Self {
        Self { store, project_id }
    }

    /// Build the export document.
    pub fn export(&self) -> Value {
        let mut nodes = Vec::new();
        let mut seen = HashSet::new();

        // Knowledge nodes first: for shared keys their refined kind must
        // shadow the raw grammar kind.
        for node in self.store.knowledge_nodes() {
            if seen.insert(node.key.clone()) {
                nodes.push(self.knowledge_node_json(node));
            }
        }
        for node in self.store.ast_nodes() {
            if seen.insert(node.key.clone()) {
                nodes.push(self.ast_node_json(node));
            }
        }

        let mut edges = Vec::new();
        for edge in self.store.ast_edges() {
            edges.push(json!({
                "source": self.node_id(&edge.from),
                "target": self.node_id(&edge.to),
                "type": self.ast_edge_type(&edge.from, &edge.to),
                "properties": {}
            }));
        }
        for edge in self.store.knowledge_edges() {
            edges.push(json!({
                "source": self.node_id(&edge.from),
                "target": self.node_id(&edge.to),
                "type": edge_type_key(edge.relation),
                "properties": {}
            }));
        }

        json!({
            "meta_data": {
                "schema_version": SCHEMA_VERSION,
                "languages": [LANGUAGE],
                "analysis_date": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                "graph_id": self.project_id,
                "project_id": self.project_id,
            },
            "nodes": nodes,
            "edges": edges,
        })
    }

    fn node_id(&self, key: &str) -> String {
        format!("{}:{}", self.project_id, key)
    }

    fn ast_node_json(&self, node: &AstNodeDoc) -> Value {
        let mut properties = Map::new();
        properties.insert("kind".into(), json!(node.kind));
        properties.insert("language".into(), json!(LANGUAGE));
        if let Some(text) = &node.text {
            properties.insert("code".into(), json!(text));
        }
        if let Some(name) = &node.name {
            properties.insert("name".into(), json!(name));
        }
        if let Some(path) = &node.path {
            properties.insert("path".into(), json!(path));
        }

        let mut doc = Map::new();
        doc.insert("id".into(), json!(self.node_id(&node.key)));
        doc.insert("type".into(), json!(ast_type_key(&node.kind)));
        doc.insert("properties".into(), Value::Object(properties));
        if let Some(location) = self.location(node.span, node.path.as_deref()) {
            doc.insert("location".into(), location);
        }
        Value::Object(doc)
    }

    fn knowledge_node_json(&self, node: &KnowledgeNodeDoc) -> Value {
        let mut properties = Map::new();
        properties.insert("kind".into(), json!(node.kind.to_string()));
        properties.insert("language".into(), json!(LANGUAGE));
        properties.insert("code".into(), json!(node.text));
        if let Some(path) = &node.path {
            properties.insert("path".into(), json!(path));
        }
        if let Some(discovered) = node.discovered {
            properties.insert("discovered".into(), json!(discovered));
        }
        if let Some(processed) = node.processed {
            properties.insert("processed".into(), json!(processed));
        }
        for (k, v) in &node.props {
            properties.insert(k.clone(), v.clone());
        }

        let mut doc = Map::new();
        doc.insert("id".into(), json!(self.node_id(&node.key)));
        doc.insert("type".into(), json!(knowledge_type_key(node)));
        doc.insert("properties".into(), Value::Object(properties));
        if let Some(location) = self.location(node.span, node.path.as_deref()) {
            doc.insert("location".into(), location);
        }
        Value::Object(doc)
    }

    fn location(&self, span: Option<Span>, path: Option<&str>) -> Option<Value> {
        let span = span?;
        let mut location = Map::new();
        location.insert("start_offset".into(), json!(span.start_byte));
        location.insert("end_offset".into(), json!(span.end_byte));
        if let Some(path) = path {
            location.insert("file".into(), json!(path));
        }
        Some(Value::Object(location))
    }

    /// `child_of` between two file/dir nodes is containment; anywhere else
    /// it is syntax structure.
    fn ast_edge_type(&self, from_key: &str, to_key: &str) -> &'static str {
        let is_fs = |key: &str| {
            self.store
                .ast_node(key)
                .map(|n| n.kind == "file" || n.kind == "dir")
                .unwrap_or(false)
        };
        if is_fs(from_key) && is_fs(to_key) {
            "CONTAINS"
        } else {
            "AST_CHILD"
        }
    }
}

/// Internal AST kind → CPG v1 node type.
fn ast_type_key(kind: &str) -> &'static str {
    match kind {
        "file" => "FILE",
        "dir" => "DIRECTORY",
        "identifier" => "IDENTIFIER",
        "string" | "number" | "boolean" | "nil" => "LITERAL",
        "function_call" => "CALL",
        "if_statement" | "while_statement" | "for_statement" | "repeat_statement" => {
            "CONTROL_STRUCTURE"
        }
        "block" | "do_statement" => "BLOCK",
        "comment" => "COMMENT",
        "module" => "NAMESPACE",
        k if k.contains("function") => "FUNCTION",
        k if k.contains("variable") => "VARIABLE",
        _ => "UNKNOWN",
    }
}

/// Knowledge kind → CPG v1 node type, through the same textual vocabulary.
fn knowledge_type_key(node: &KnowledgeNodeDoc) -> &'static str {
    use crate::model::document::KnowledgeKind::*;
    match node.kind {
        File => "FILE",
        Dir => "DIRECTORY",
        Module => "NAMESPACE",
        Function | LocalFunction | GlobalFunction | FunctionDeclaration => "FUNCTION",
        LocalVar | GlobalVar | VariableDeclaration | Parameter => "VARIABLE",
        Identifier => "IDENTIFIER",
        FunctionCall => "CALL",
        IfStatement | WhileStatement | ForStatement | RepeatStatement => "CONTROL_STRUCTURE",
        Block | DoStatement => "BLOCK",
        Chunk | LocalAssignment | LaststatReturn | ElseStatement | ElseifStatement
        | ClassDeclaration => "UNKNOWN",
    }
}

/// Knowledge relation → CPG v1 edge type.
fn edge_type_key(relation: KnowledgeRelation) -> &'static str {
    use KnowledgeRelation::*;
    match relation {
        Contains => "CONTAINS",
        Executes => "FLOWS_TO",
        Calls => "CALLS",
        Defines => "DEFINES",
        Declares => "DECLARES",
        RefersTo => "REFERS_TO",
        HasParameter => "HAS_PARAMETER",
        Returns => "RETURNS",
        Imports | Requires => "IMPORTS",
        HasBlock | HasArgument | Initializes | Represents | Unknown => "AST_CHILD",
    }
}
