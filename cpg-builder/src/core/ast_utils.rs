//! Predicates and searches over concrete syntax-tree nodes.
//!
//! Everything here is total and side-effect free. The grammar vocabulary is
//! the one produced by `tree-sitter-lua` (`chunk`, `block`,
//! `variable_declaration`, `function_declaration`, …).

use tree_sitter::Node;

/// Classification of declaration-introducing nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Function,
    Variable,
    Block,
}

/// Classification of reference-introducing nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Ident,
    Call,
    ExpList,
}

/// Depth-first leftmost descendant of kind `kind`, including `root` itself.
pub fn first_of_kind<'t>(root: Node<'t>, kind: &str) -> Option<Node<'t>> {
    if root.kind() == kind {
        return Some(root);
    }
    for child in children(root) {
        if let Some(found) = first_of_kind(child, kind) {
            return Some(found);
        }
    }
    None
}

/// Every descendant of kind `kind`, in pre-order, including `root` itself.
pub fn all_of_kind<'t>(root: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    collect_of_kind(root, kind, &mut found);
    found
}

fn collect_of_kind<'t>(node: Node<'t>, kind: &str, out: &mut Vec<Node<'t>>) {
    if node.kind() == kind {
        out.push(node);
    }
    for child in children(node) {
        collect_of_kind(child, kind, out);
    }
}

/// Nearest proper ancestor of kind `kind`, paired with the hop distance.
pub fn ancestor_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<(Node<'t>, usize)> {
    let mut dist = 0usize;
    let mut current = node.parent();
    while let Some(n) = current {
        dist += 1;
        if n.kind() == kind {
            return Some((n, dist));
        }
        current = n.parent();
    }
    None
}

/// True for nodes that introduce a new lexical scope.
///
/// A function's own node is not scope-introducing; its `block` child is.
/// This keeps function bodies single-scoped.
pub fn is_scope_introducing(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "chunk" | "block" | "do_statement" | "while_statement" | "for_statement" | "if_statement"
    )
}

/// True for nodes that are represented in the knowledge layer.
pub fn is_knowledge_node(node: Node<'_>) -> bool {
    matches!(
        node.kind(),
        "function_declaration" | "variable_declaration" | "class_declaration" | "block" | "chunk"
    )
}

/// Declaration classification, if this node declares anything.
pub fn declaration_kind(node: Node<'_>) -> Option<DeclKind> {
    match node.kind() {
        "function_declaration" => Some(DeclKind::Function),
        "variable_declaration" => Some(DeclKind::Variable),
        "block" => Some(DeclKind::Block),
        _ => None,
    }
}

/// Reference classification, if this node references anything.
pub fn reference_kind(node: Node<'_>) -> Option<RefKind> {
    match node.kind() {
        "identifier" => Some(RefKind::Ident),
        "function_call" => Some(RefKind::Call),
        "expression_list" => Some(RefKind::ExpList),
        _ => None,
    }
}

/// Source text of a node, UTF-8 with a Latin-1 fallback for files that are
/// not valid UTF-8.
pub fn node_text(node: Node<'_>, source: &[u8]) -> String {
    match node.utf8_text(source) {
        Ok(text) => text.to_string(),
        Err(_) => source[node.byte_range()]
            .iter()
            .map(|&b| b as char)
            .collect(),
    }
}

/// Iterator over all (named and anonymous) children of a node.
pub fn children(node: Node<'_>) -> impl Iterator<Item = Node<'_>> {
    (0..node.child_count()).filter_map(move |i| node.child(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parse::LuaParser;

    fn parse(code: &str) -> tree_sitter::Tree {
        LuaParser::new().unwrap().parse_source(code.as_bytes()).unwrap()
    }

    #[test]
    fn finds_first_and_all_of_kind() {
        let tree = parse("local a = 1\nlocal b = 2\n");
        let root = tree.root_node();

        let first = first_of_kind(root, "identifier").unwrap();
        assert_eq!(node_text(first, b"local a = 1\nlocal b = 2\n"), "a");

        let idents = all_of_kind(root, "identifier");
        assert_eq!(idents.len(), 2);
        let decls = all_of_kind(root, "variable_declaration");
        assert_eq!(decls.len(), 2);
    }

    #[test]
    fn ancestor_lookup_reports_distance() {
        let code = "local a = 1\n";
        let tree = parse(code);
        let ident = first_of_kind(tree.root_node(), "identifier").unwrap();

        let (decl, dist) = ancestor_of_kind(ident, "variable_declaration").unwrap();
        assert_eq!(decl.kind(), "variable_declaration");
        assert!(dist >= 2); // identifier -> variable_list -> … -> declaration

        assert!(ancestor_of_kind(ident, "while_statement").is_none());
    }

    #[test]
    fn scope_and_knowledge_predicates() {
        let code = "while true do local x = 1 end\n";
        let tree = parse(code);
        let root = tree.root_node();

        assert!(is_scope_introducing(root)); // chunk
        let while_node = first_of_kind(root, "while_statement").unwrap();
        assert!(is_scope_introducing(while_node));
        assert!(!is_knowledge_node(while_node));

        let decl = first_of_kind(root, "variable_declaration").unwrap();
        assert!(is_knowledge_node(decl));
        assert_eq!(declaration_kind(decl), Some(DeclKind::Variable));
        // A function node itself is not scope-introducing.
        let tree = parse("function f() return 1 end\n");
        let func = first_of_kind(tree.root_node(), "function_declaration").unwrap();
        assert!(!is_scope_introducing(func));
        assert_eq!(declaration_kind(func), Some(DeclKind::Function));
    }

    #[test]
    fn reference_classification() {
        let code = "print(a)\n";
        let tree = parse(code);
        let root = tree.root_node();

        let call = first_of_kind(root, "function_call").unwrap();
        assert_eq!(reference_kind(call), Some(RefKind::Call));
        let ident = first_of_kind(root, "identifier").unwrap();
        assert_eq!(reference_kind(ident), Some(RefKind::Ident));
        assert_eq!(reference_kind(root), None);
    }

    #[test]
    fn latin1_fallback_never_panics() {
        let code = b"local a = 1\n";
        let tree = LuaParser::new().unwrap().parse_source(code).unwrap();
        let root = tree.root_node();
        assert_eq!(node_text(root, code).trim(), "local a = 1");
    }
}
