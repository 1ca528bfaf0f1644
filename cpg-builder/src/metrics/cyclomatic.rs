//! Cyclomatic complexity over a syntax subtree.

use crate::core::ast_utils;
use tree_sitter::Node;

/// Decision-point kinds of the Lua grammar.
const DECISION_POINTS: [&str; 5] = [
    "if_statement",
    "elseif_statement",
    "while_statement",
    "for_statement",
    "repeat_statement",
];

/// Cyclomatic complexity of the subtree rooted at `node`, starting from the
/// base complexity of 1 every function has.
pub fn cyclomatic_complexity(node: Node<'_>) -> usize {
    let mut cc = 1;
    count(node, &mut cc);
    cc
}

fn count(node: Node<'_>, cc: &mut usize) {
    if DECISION_POINTS.contains(&node.kind()) {
        *cc += 1;
    }
    for child in ast_utils::children(node) {
        count(child, cc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parse::LuaParser;

    fn complexity_of(code: &str) -> usize {
        let tree = LuaParser::new().unwrap().parse_source(code.as_bytes()).unwrap();
        cyclomatic_complexity(tree.root_node())
    }

    #[test]
    fn straight_line_code_is_one() {
        assert_eq!(complexity_of("local x = 10\nlocal y = 20\nprint(x + y)\n"), 1);
    }

    #[test]
    fn every_branch_and_loop_counts() {
        let code = "\
function test(x)
    if x > 0 then
        return 1
    elseif x < 0 then
        return -1
    else
        return 0
    end
end
";
        // base + if + elseif
        assert_eq!(complexity_of(code), 3);

        let loops = "\
function loop(n)
    local sum = 0
    for i = 1, n do
        sum = sum + i
    end
    while sum > 100 do
        sum = sum / 2
    end
    repeat
        sum = sum + 1
    until sum > 10
    return sum
end
";
        // base + for + while + repeat
        assert_eq!(complexity_of(loops), 4);
    }
}
