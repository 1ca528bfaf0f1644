//! Graph document types shared by the store, the builders and the exporters.
//!
//! The graph holds two layers. The AST layer mirrors concrete syntax plus the
//! file-system hierarchy; its node kinds are open (grammar production names,
//! `file`, `dir`). The knowledge layer is typed with closed enums that
//! serialize to snake_case strings, keeping downstream artifacts stable and
//! grep-friendly.

use crate::model::span::Span;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Node of the AST layer: one per concrete-syntax-tree node, plus one per
/// directory and file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstNodeDoc {
    /// Stable key, unique within the AST collection.
    pub key: String,
    /// Grammar production name, or `file` / `dir` for file-system nodes.
    pub kind: String,
    /// Source text (file-system nodes have none).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Base name of a file/dir node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Byte span for syntax nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    /// Project-relative path (file/dir nodes only; secondary key).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Parent path (file/dir nodes only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Grammar-internal identity of the originating tree-sitter node,
    /// used to cross-reference the second pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ast_id: Option<usize>,
}

/// Unlabelled parent→child relation of the AST layer (tag `child_of`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstEdge {
    pub from: String,
    pub to: String,
}

impl AstEdge {
    /// Relation tag carried by every AST edge.
    pub const RELATION: &'static str = "child_of";
}

/// Kind of a knowledge-layer node.
///
/// Avoid renaming variants; the snake_case names are part of exported
/// artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeKind {
    File,
    Dir,
    Chunk,
    Module,
    Function,
    LocalFunction,
    GlobalFunction,
    LocalVar,
    GlobalVar,
    Parameter,
    Block,
    LocalAssignment,
    LaststatReturn,
    ElseStatement,
    ElseifStatement,
    FunctionCall,
    Identifier,
    IfStatement,
    WhileStatement,
    ForStatement,
    RepeatStatement,
    DoStatement,
    FunctionDeclaration,
    VariableDeclaration,
    // Unreachable with the Lua grammar; kept for other grammars.
    ClassDeclaration,
}

impl Display for KnowledgeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use KnowledgeKind::*;
        let s = match self {
            File => "file",
            Dir => "dir",
            Chunk => "chunk",
            Module => "module",
            Function => "function",
            LocalFunction => "local_function",
            GlobalFunction => "global_function",
            LocalVar => "local_var",
            GlobalVar => "global_var",
            Parameter => "parameter",
            Block => "block",
            LocalAssignment => "local_assignment",
            LaststatReturn => "laststat_return",
            ElseStatement => "else_statement",
            ElseifStatement => "elseif_statement",
            FunctionCall => "function_call",
            Identifier => "identifier",
            IfStatement => "if_statement",
            WhileStatement => "while_statement",
            ForStatement => "for_statement",
            RepeatStatement => "repeat_statement",
            DoStatement => "do_statement",
            FunctionDeclaration => "function_declaration",
            VariableDeclaration => "variable_declaration",
            ClassDeclaration => "class_declaration",
        };
        f.write_str(s)
    }
}

impl KnowledgeKind {
    /// Knowledge kind for a control-structure grammar production, if any.
    pub fn control_statement(kind: &str) -> Option<Self> {
        match kind {
            "if_statement" => Some(Self::IfStatement),
            "else_statement" => Some(Self::ElseStatement),
            "elseif_statement" => Some(Self::ElseifStatement),
            "while_statement" => Some(Self::WhileStatement),
            "for_statement" => Some(Self::ForStatement),
            "repeat_statement" => Some(Self::RepeatStatement),
            "do_statement" => Some(Self::DoStatement),
            _ => None,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(
            self,
            Self::Function | Self::LocalFunction | Self::GlobalFunction
        )
    }
}

/// Label of a knowledge-layer edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeRelation {
    Contains,
    Declares,
    Defines,
    Executes,
    HasBlock,
    HasParameter,
    HasArgument,
    Initializes,
    Calls,
    RefersTo,
    Represents,
    Imports,
    Requires,
    Returns,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl Display for KnowledgeRelation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use KnowledgeRelation::*;
        let s = match self {
            Contains => "contains",
            Declares => "declares",
            Defines => "defines",
            Executes => "executes",
            HasBlock => "has_block",
            HasParameter => "has_parameter",
            HasArgument => "has_argument",
            Initializes => "initializes",
            Calls => "calls",
            RefersTo => "refers_to",
            Represents => "represents",
            Imports => "imports",
            Requires => "requires",
            Returns => "returns",
            Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Node of the knowledge layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNodeDoc {
    /// Stable key, unique within the knowledge collection. Nodes derived
    /// from an AST node reuse that node's key.
    pub key: String,
    pub kind: KnowledgeKind,
    /// Entity text: a name for declarations and modules, source text for
    /// chunks and blocks.
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Identity of the AST node this entity was derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ast_id: Option<usize>,
    /// Block work-list flags: `(discovered=true, processed=false)` means at
    /// least one processing iteration remains.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovered: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed: Option<bool>,
    /// Free-form extra properties (e.g. `initialized: true`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, Value>,
}

impl KnowledgeNodeDoc {
    pub fn new(key: impl Into<String>, kind: KnowledgeKind, text: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind,
            text: text.into(),
            span: None,
            path: None,
            ast_id: None,
            discovered: None,
            processed: None,
            props: BTreeMap::new(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_ast_id(mut self, ast_id: usize) -> Self {
        self.ast_id = Some(ast_id);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Flag the node as a freshly discovered, not yet processed block.
    pub fn discovered_block(mut self) -> Self {
        self.discovered = Some(true);
        self.processed = Some(false);
        self
    }
}

/// Labelled directed relation of the knowledge layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeEdge {
    pub from: String,
    pub to: String,
    pub relation: KnowledgeRelation,
}
