//! Halstead complexity metrics over a syntax subtree.
//!
//! Leaf tokens are classified as operators or operands using the Lua
//! operator/keyword table. Closing brackets are not counted (the pair
//! counts as one operator); quotes come in pairs and contribute half an
//! occurrence each. String contents count as a single operand regardless
//! of length; comments are skipped entirely.

use crate::core::ast_utils::{self, node_text};
use serde::Serialize;
use std::collections::HashSet;
use tree_sitter::Node;

const OPERATOR_SYMBOLS: [&str; 48] = [
    // logical / relational / bitwise / arithmetic symbols
    "#", "%", "&", "(", "*", "+", ",", "-", ".", "..", "/", "//", ":", "::", ";", "<", "<<", "<=",
    "=", "==", ">", ">=", ">>", "[", "[[", "^", "{", "|", "~", "~=",
    // control-flow keywords
    "and", "do", "else", "elseif", "for", "function", "goto", "if", "in", "local", "not", "or",
    "repeat", "return", "then", "until", "while", "end",
];

#[derive(Debug, Clone, Serialize)]
pub struct HalsteadReport {
    /// Distinct operators.
    pub n1: usize,
    /// Distinct operands.
    pub n2: usize,
    /// Total operator occurrences.
    #[serde(rename = "N1")]
    pub big_n1: f64,
    /// Total operand occurrences.
    #[serde(rename = "N2")]
    pub big_n2: f64,
    /// Vocabulary.
    pub n: usize,
    /// Length.
    #[serde(rename = "N")]
    pub big_n: f64,
    /// Volume.
    #[serde(rename = "V")]
    pub volume: f64,
    /// Difficulty.
    #[serde(rename = "D")]
    pub difficulty: f64,
    /// Effort.
    #[serde(rename = "E")]
    pub effort: f64,
    /// Estimated implementation time, seconds.
    #[serde(rename = "T")]
    pub time: f64,
    /// Estimated delivered bugs.
    #[serde(rename = "B")]
    pub bugs: f64,
}

#[derive(Default)]
struct TokenCounts {
    operators: HashSet<String>,
    operands: HashSet<String>,
    operator_count: f64,
    operand_count: f64,
}

/// Compute the Halstead report for the subtree rooted at `node`.
pub fn halstead_metrics(node: Node<'_>, source: &[u8]) -> HalsteadReport {
    let mut counts = TokenCounts::default();
    collect(node, source, &mut counts);

    let n1 = counts.operators.len();
    let n2 = counts.operands.len();
    let big_n1 = counts.operator_count;
    let big_n2 = counts.operand_count;

    let n = n1 + n2;
    let big_n = big_n1 + big_n2;

    let volume = if n == 0 {
        0.0
    } else {
        big_n * (n as f64).log2()
    };
    let difficulty = if n2 == 0 {
        0.0
    } else {
        (n1 as f64 / 2.0) * (big_n2 / n2 as f64)
    };
    let effort = volume * difficulty;
    let time = if effort > 0.0 { effort / 18.0 } else { 0.0 };
    let bugs = if effort > 0.0 {
        effort.powf(2.0 / 3.0) / 3000.0
    } else {
        0.0
    };

    HalsteadReport {
        n1,
        n2,
        big_n1,
        big_n2,
        n,
        big_n,
        volume: round4(volume),
        difficulty: round4(difficulty),
        effort: round4(effort),
        time: round4(time),
        bugs: round4(bugs),
    }
}

fn collect(node: Node<'_>, source: &[u8], counts: &mut TokenCounts) {
    // Comments are invisible; a string's content subtree counts as one
    // operand token no matter how long it is.
    match node.kind() {
        "comment" => return,
        "string_content" => {
            counts.operands.insert(node.kind().to_string());
            counts.operand_count += 1.0;
            return;
        }
        _ => {}
    }

    if node.child_count() > 0 {
        for child in ast_utils::children(node) {
            collect(child, source, counts);
        }
        return;
    }

    let token = node_text(node, source);
    if token.is_empty() {
        return;
    }
    if OPERATOR_SYMBOLS.contains(&token.as_str()) || OPERATOR_SYMBOLS.contains(&node.kind()) {
        counts.operators.insert(token);
        counts.operator_count += 1.0;
    } else if matches!(token.as_str(), ")" | "]" | "}" | "]]") {
        // Closing halves of bracket pairs: the pair already counted once.
        // When a bracket is missing the parser still materialises the node
        // (is_missing), so skipping here never undercounts.
    } else if matches!(token.as_str(), "\"" | "'") {
        counts.operators.insert(token);
        counts.operator_count += 0.5;
    } else {
        counts.operands.insert(token);
        counts.operand_count += 1.0;
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
