//! End-to-end pipeline tests over real Lua sources.

use cpg_builder::config::model::AnalyzerConfig;
use cpg_builder::core::parse::LuaParser;
use cpg_builder::export::cpg_v1::CpgV1Exporter;
use cpg_builder::export::schema::CpgSchema;
use cpg_builder::graph::cpg::CpgBuilder;
use cpg_builder::graph::inserter::AstInserter;
use cpg_builder::graph::store::GraphStore;
use cpg_builder::model::document::{KnowledgeKind, KnowledgeRelation};
use cpg_builder::model::result::{ProcessingResult, RunStatus};
use cpg_builder::run::analyze_project;
use cpg_builder::symbols::builder::SymbolBuilder;
use cpg_builder::symbols::table::SymbolTable;
use std::fs;
use std::path::Path;

/// Run the two-pass pipeline over a single in-memory source, without the
/// file-system layer.
fn build_source(code: &str) -> (GraphStore, SymbolTable) {
    let mut parser = LuaParser::new().unwrap();
    let tree = parser.parse_source(code.as_bytes()).unwrap();
    assert!(!tree.root_node().has_error(), "fixture must be valid Lua");

    let mut store = GraphStore::new();
    AstInserter::insert_tree(&mut store, tree.root_node(), code.as_bytes(), "mem.lua").unwrap();

    let mut table = SymbolTable::new("w1");
    let mut symbols = SymbolBuilder::new("w1", "mem.lua", code.as_bytes());
    symbols.build(&mut table, tree.root_node());

    let mut cpg = CpgBuilder::new(&mut store, &mut table, code.as_bytes(), "mem.lua");
    cpg.build(tree.root_node()).unwrap();
    (store, table)
}

fn assert_invariants(store: &GraphStore) {
    // Knowledge edge endpoints exist in the knowledge collection.
    for edge in store.knowledge_edges() {
        assert!(
            store.knowledge_node(&edge.from).is_some(),
            "dangling knowledge edge source {}",
            edge.from
        );
        assert!(
            store.knowledge_node(&edge.to).is_some(),
            "dangling knowledge edge target {}",
            edge.to
        );
    }
    // AST edge endpoints exist in the AST collection.
    for edge in store.ast_edges() {
        assert!(store.ast_node(&edge.from).is_some());
        assert!(store.ast_node(&edge.to).is_some());
    }
    // No duplicate keys within a collection.
    let mut seen = std::collections::HashSet::new();
    for n in store.ast_nodes() {
        assert!(seen.insert(n.key.clone()), "duplicate AST key {}", n.key);
    }
    seen.clear();
    for n in store.knowledge_nodes() {
        assert!(seen.insert(n.key.clone()), "duplicate knowledge key {}", n.key);
    }
    // Lexical binding is past-facing: refers_to targets start earlier.
    for edge in store.knowledge_edges() {
        if edge.relation != KnowledgeRelation::RefersTo {
            continue;
        }
        let source = store.knowledge_node(&edge.from).unwrap();
        let target = store.knowledge_node(&edge.to).unwrap();
        let (Some(s), Some(t)) = (source.span, target.span) else {
            panic!("refers_to endpoints must carry spans");
        };
        assert!(
            t.start_byte < s.start_byte,
            "refers_to target at {} is not before source at {}",
            t.start_byte,
            s.start_byte
        );
    }
    // The recursive block pass ran to the fixed point.
    for n in store.knowledge_nodes() {
        if n.kind == KnowledgeKind::Block {
            assert_ne!(
                (n.discovered, n.processed),
                (Some(true), Some(false)),
                "unprocessed discovered block {}",
                n.key
            );
        }
    }
}

/* ------------------------------ scenarios ------------------------------ */

#[test]
fn scenario_a_declaration_and_reference() {
    let (store, _table) = build_source("local a = 5\na = 1\n");

    assert_invariants(&store);
    assert_eq!(store.knowledge_nodes().len(), 4);
    assert_eq!(store.knowledge_edges().len(), 3);

    let chunk = store
        .knowledge_nodes()
        .iter()
        .find(|n| n.kind == KnowledgeKind::Chunk)
        .unwrap();
    let decl = store
        .knowledge_nodes()
        .iter()
        .find(|n| n.kind == KnowledgeKind::VariableDeclaration)
        .unwrap();

    // chunk contains the declaration
    assert!(store.knowledge_edges().iter().any(|e| {
        e.relation == KnowledgeRelation::Contains && e.from == chunk.key && e.to == decl.key
    }));
    // the declaration declares its left-hand identifier
    let declared = store.knowledge_children(&decl.key, Some(KnowledgeRelation::Declares));
    assert_eq!(declared.len(), 1);
    assert_eq!(declared[0].kind, KnowledgeKind::Identifier);
    assert_eq!(declared[0].text, "a");
    // the later assignment's identifier refers back to the declaration
    let refers: Vec<_> = store
        .knowledge_edges()
        .iter()
        .filter(|e| e.relation == KnowledgeRelation::RefersTo)
        .collect();
    assert_eq!(refers.len(), 1);
    assert_eq!(refers[0].to, decl.key);
    // the initializer flags the declaration
    assert_eq!(decl.props.get("initialized"), Some(&serde_json::json!(true)));
}

#[test]
fn scenario_b_function_call_resolution() {
    let code = "\
local function add(a, b)
    return a + b
end
add(a, b)
";
    let (store, _table) = build_source(code);
    assert_invariants(&store);

    let func = store
        .knowledge_nodes()
        .iter()
        .find(|n| n.kind == KnowledgeKind::LocalFunction)
        .expect("add must be reclassified as local_function");
    assert_eq!(func.text, "add");

    // exactly one function node came from the declaration
    assert_eq!(
        store
            .knowledge_nodes()
            .iter()
            .filter(|n| n.kind.is_function())
            .count(),
        1
    );

    // both parameters, each linked exactly once
    let params = store.knowledge_children(&func.key, Some(KnowledgeRelation::HasParameter));
    assert_eq!(params.len(), 2);
    let names: Vec<_> = params.iter().map(|p| p.text.as_str()).collect();
    assert!(names.contains(&"a") && names.contains(&"b"));

    // the call resolves to the declaration
    let call = store
        .knowledge_nodes()
        .iter()
        .find(|n| n.kind == KnowledgeKind::FunctionCall && n.text == "add")
        .unwrap();
    assert!(store.knowledge_edges().iter().any(|e| {
        e.relation == KnowledgeRelation::Defines && e.from == func.key && e.to == call.key
    }));

    // argument identifiers hang off the call; they are unresolved at chunk
    // scope, so no refers_to leaves them
    let args = store.knowledge_children(&call.key, Some(KnowledgeRelation::HasArgument));
    assert_eq!(args.len(), 2);
    for arg in &args {
        assert_eq!(arg.kind, KnowledgeKind::Identifier);
        assert!(
            !store
                .knowledge_outbound(&arg.key)
                .iter()
                .any(|e| e.relation == KnowledgeRelation::RefersTo)
        );
    }

    // the body block was linked and fully processed
    let blocks = store.knowledge_children(&func.key, Some(KnowledgeRelation::HasBlock));
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].processed, Some(true));
    // …with its trailing return recorded
    let returns = store.knowledge_children(&blocks[0].key, Some(KnowledgeRelation::Executes));
    assert!(
        returns
            .iter()
            .any(|n| n.kind == KnowledgeKind::LaststatReturn)
    );
}

#[test]
fn scenario_b_body_references_bind_to_parameters() {
    let code = "\
local function add(a, b)
    return a + b
end
";
    let (store, _table) = build_source(code);

    let refers: Vec<_> = store
        .knowledge_edges()
        .iter()
        .filter(|e| e.relation == KnowledgeRelation::RefersTo)
        .collect();
    assert_eq!(refers.len(), 2);
    for edge in refers {
        let target = store.knowledge_node(&edge.to).unwrap();
        assert_eq!(target.kind, KnowledgeKind::Parameter);
    }
}

#[test]
fn scenario_c_control_structures() {
    let code = "\
function branching(x)
    if x > 0 then
        local a = 1
    elseif x < 0 then
        local b = 2
    else
        local c = 3
    end
    for i = 1, 10 do
        print(i)
    end
    while x > 0 do
        x = x - 1
    end
    repeat
        x = x + 1
    until x > 5
end
";
    let (store, _table) = build_source(code);
    assert_invariants(&store);

    for kind in [
        KnowledgeKind::IfStatement,
        KnowledgeKind::ForStatement,
        KnowledgeKind::WhileStatement,
        KnowledgeKind::RepeatStatement,
    ] {
        let stmt = store
            .knowledge_nodes()
            .iter()
            .find(|n| n.kind == kind)
            .unwrap_or_else(|| panic!("missing control node {kind}"));
        // every control structure owns its inner block
        let blocks = store.knowledge_children(&stmt.key, Some(KnowledgeRelation::HasBlock));
        assert!(!blocks.is_empty(), "{kind} has no has_block edge");
        for block in blocks {
            assert_eq!(block.processed, Some(true));
        }
    }

    // elseif/else arms are executed by the if and own their blocks
    let if_stmt = store
        .knowledge_nodes()
        .iter()
        .find(|n| n.kind == KnowledgeKind::IfStatement)
        .unwrap();
    let arms = store.knowledge_children(&if_stmt.key, Some(KnowledgeRelation::Executes));
    let arm_kinds: Vec<_> = arms.iter().map(|a| a.kind).collect();
    assert!(arm_kinds.contains(&KnowledgeKind::ElseifStatement));
    assert!(arm_kinds.contains(&KnowledgeKind::ElseStatement));
    for arm in arms {
        let blocks = store.knowledge_children(&arm.key, Some(KnowledgeRelation::HasBlock));
        assert_eq!(blocks.len(), 1);
    }

    // nested declarations were promoted to local_var and declared by their
    // blocks
    assert!(
        store
            .knowledge_nodes()
            .iter()
            .any(|n| n.kind == KnowledgeKind::LocalVar)
    );
    // the export maps them onto the closed vocabulary
    let doc = CpgV1Exporter::new(&store, "c").export();
    let types: Vec<_> = doc["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["type"].as_str().unwrap().to_string())
        .collect();
    assert!(types.iter().any(|t| t == "CONTROL_STRUCTURE"));
}

#[test]
fn scenario_d_require_imports() {
    let code = "\
local m = require(\"math_utils\")
local k = require(\"math_utils\")
";
    let (store, table) = build_source(code);
    assert_invariants(&store);

    // one deduplicated module node
    let modules: Vec<_> = store
        .knowledge_nodes()
        .iter()
        .filter(|n| n.kind == KnowledgeKind::Module)
        .collect();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0].text, "math_utils");

    // both declarations import it
    let imports: Vec<_> = store
        .knowledge_edges()
        .iter()
        .filter(|e| e.relation == KnowledgeRelation::Imports)
        .collect();
    assert_eq!(imports.len(), 2);
    for edge in &imports {
        assert_eq!(edge.to, modules[0].key);
        assert_eq!(
            store.knowledge_node(&edge.from).unwrap().kind,
            KnowledgeKind::VariableDeclaration
        );
    }

    // and the symbol table remembers the mapping
    assert_eq!(table.imports.get("m").map(String::as_str), Some("math_utils"));
    assert_eq!(table.imports.get("k").map(String::as_str), Some("math_utils"));
}

#[test]
fn module_call_defines_a_module_under_the_chunk() {
    let (store, _table) = build_source("module(\"my_mod\")\n");

    let module = store
        .knowledge_nodes()
        .iter()
        .find(|n| n.kind == KnowledgeKind::Module)
        .unwrap();
    assert_eq!(module.text, "my_mod");
    let chunk = store
        .knowledge_nodes()
        .iter()
        .find(|n| n.kind == KnowledgeKind::Chunk)
        .unwrap();
    assert!(store.knowledge_edges().iter().any(|e| {
        e.relation == KnowledgeRelation::Defines && e.from == chunk.key && e.to == module.key
    }));
}

/* ------------------------------ boundaries ------------------------------ */

#[test]
fn empty_file_produces_a_lone_chunk() {
    let (store, _table) = build_source("");
    assert_invariants(&store);

    assert_eq!(store.knowledge_nodes().len(), 1);
    assert_eq!(store.knowledge_nodes()[0].kind, KnowledgeKind::Chunk);
    assert!(store.knowledge_edges().is_empty());
}

#[test]
fn comment_only_file_produces_a_lone_chunk() {
    let (store, _table) = build_source("-- nothing to see here\n-- truly nothing\n");
    assert_eq!(store.knowledge_nodes().len(), 1);
    assert_eq!(store.knowledge_nodes()[0].kind, KnowledgeKind::Chunk);
}

#[test]
fn unknown_identifier_stays_unresolved() {
    let (store, table) = build_source("print(mystery)\n");
    assert_invariants(&store);

    let ident = store
        .knowledge_nodes()
        .iter()
        .find(|n| n.kind == KnowledgeKind::Identifier && n.text == "mystery")
        .unwrap();
    assert!(
        !store
            .knowledge_outbound(&ident.key)
            .iter()
            .any(|e| e.relation == KnowledgeRelation::RefersTo)
    );
    assert!(table.unresolved.contains_key("mystery"));
    assert!(table.unresolved.contains_key("print"));
}

/* ---------------------------- whole projects ---------------------------- */

fn write_project(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

#[test]
fn scenario_e_partial_run_keeps_good_files() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("proj");
    write_project(
        &root,
        &[
            ("good.lua", "local x = 10\n"),
            ("bad.lua", "function (((\n"),
        ],
    );

    let analysis = analyze_project(&root, "proj-1", &AnalyzerConfig::default()).unwrap();

    assert_eq!(analysis.files_processed, 1);
    assert_eq!(analysis.files_failed, 1);
    assert_eq!(analysis.errors.len(), 1);
    assert_eq!(analysis.errors[0].error_type, "SyntaxError");
    assert!(analysis.errors[0].file_path.ends_with("bad.lua"));
    assert_eq!(
        ProcessingResult::status_from_counts(analysis.files_processed, analysis.files_failed),
        RunStatus::Partial
    );

    // Only the good file contributed a chunk.
    let chunks: Vec<_> = analysis.document["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["properties"]["kind"] == "chunk")
        .collect();
    assert_eq!(chunks.len(), 1);
}

#[test]
fn project_export_validates_and_links_files() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("proj");
    write_project(
        &root,
        &[
            ("src/util.lua", "local function helper()\n    return true\nend\nhelper()\n"),
            ("main.lua", "local u = require(\"util\")\nprint(u)\n"),
        ],
    );

    let analysis = analyze_project(&root, "proj-2", &AnalyzerConfig::default()).unwrap();
    assert_eq!(analysis.files_processed, 2);
    assert_eq!(analysis.files_failed, 0);

    // The export validates against the published schema.
    let schema_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("schema/v1/cpg.export.schema.json");
    let schema = CpgSchema::load(&schema_path).unwrap();
    schema.validate(&analysis.document).unwrap();

    let doc = &analysis.document;
    let nodes = doc["nodes"].as_array().unwrap();
    let edges = doc["edges"].as_array().unwrap();

    // Each file's chunk hangs off its file node.
    let file_ids: Vec<&str> = nodes
        .iter()
        .filter(|n| n["properties"]["kind"] == "file")
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    let chunk_ids: Vec<&str> = nodes
        .iter()
        .filter(|n| n["properties"]["kind"] == "chunk")
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(file_ids.len(), 2);
    assert_eq!(chunk_ids.len(), 2);
    for chunk_id in chunk_ids {
        assert!(edges.iter().any(|e| {
            e["type"] == "CONTAINS"
                && e["target"] == chunk_id
                && file_ids.contains(&e["source"].as_str().unwrap())
        }));
    }
}

#[test]
fn file_layer_contains_each_node_exactly_once() {
    use cpg_builder::core::fs_scan::analyze_project_structure;

    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("proj");
    write_project(
        &root,
        &[("src/a.lua", "local a = 1\n"), ("src/b.lua", "local b = 2\n")],
    );

    let scan = analyze_project_structure(&root, &AnalyzerConfig::default()).unwrap();
    let mut store = GraphStore::new();
    AstInserter::insert_dir_struct(&mut store, &scan.items).unwrap();
    CpgBuilder::copy_file_structure(&mut store).unwrap();

    // Every file/dir knowledge node has exactly one incoming `contains`,
    // except the root, which has none.
    for node in store.knowledge_nodes() {
        let incoming = store
            .knowledge_inbound(&node.key)
            .iter()
            .filter(|e| e.relation == KnowledgeRelation::Contains)
            .count();
        if node.path.as_deref() == Some("proj") {
            assert_eq!(incoming, 0, "root must not be contained");
        } else {
            assert_eq!(incoming, 1, "{} must be contained exactly once", node.key);
        }
    }
}

#[test]
fn export_ids_are_prefixed_with_the_project() {
    let (store, _table) = build_source("local a = 1\n");
    let doc = CpgV1Exporter::new(&store, "my-project").export();
    for node in doc["nodes"].as_array().unwrap() {
        assert!(node["id"].as_str().unwrap().starts_with("my-project:"));
    }
}
