//! High-level orchestration of the per-project graph build.
//!
//! Single public entry point: [`analyze_project`]. It enumerates the
//! project tree, inserts the directory structure, then runs the two-pass
//! pipeline over every Lua file (parse → AST insertion → symbol resolution
//! → CPG synthesis) and exports the CPG v1 document.
//!
//! Per-file failures are recoverable: they are recorded and the run
//! continues. Everything else aborts the run.

use crate::config::model::AnalyzerConfig;
use crate::core::{fs_scan, parse::LuaParser};
use crate::export::cpg_v1::CpgV1Exporter;
use crate::graph::{cpg::CpgBuilder, inserter::AstInserter, store::GraphStore};
use crate::model::result::FileError;
use crate::symbols::{builder::SymbolBuilder, table::SymbolTable};
use anyhow::Result;
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Everything a run produces: the export document plus per-file outcome
/// counters for the result summary.
#[derive(Debug)]
pub struct ProjectAnalysis {
    pub document: Value,
    pub files_processed: usize,
    pub files_failed: usize,
    pub errors: Vec<FileError>,
}

/// Build the CPG for the project tree under `root`.
#[tracing::instrument(level = "info", skip_all, fields(root = %root.display(), project_id = %project_id))]
pub fn analyze_project(
    root: &Path,
    project_id: &str,
    cfg: &AnalyzerConfig,
) -> Result<ProjectAnalysis> {
    let root_path = dunce::canonicalize(root)?;

    // 1. Enumerate the tree: directories plus Lua sources.
    let scan = fs_scan::analyze_project_structure(&root_path, cfg)?;
    info!(items = scan.items.len(), "Scanned project tree");

    // 2. Insert the file-system hierarchy into both graph layers.
    let mut store = GraphStore::new();
    AstInserter::insert_dir_struct(&mut store, &scan.items)?;
    CpgBuilder::copy_file_structure(&mut store)?;

    // 3. Per file: parse, insert the syntax tree, resolve symbols, build
    //    the knowledge layer. The file loop is sequential by design.
    let mut parser = LuaParser::new()?;
    let worker_id = Uuid::new_v4().to_string();
    let mut files_processed = 0usize;
    let mut errors = Vec::new();

    for file in scan.lua_files() {
        match process_file(&mut parser, &mut store, &worker_id, file) {
            Ok(()) => files_processed += 1,
            Err(err) => {
                warn!(path = %file.path, error = %err, "Failed to analyze file");
                errors.push(FileError::new(
                    &file.path,
                    classify_error(&err),
                    format!("{err:#}"),
                ));
            }
        }
    }
    info!(
        nodes = store.ast_nodes().len(),
        knowledge_nodes = store.knowledge_nodes().len(),
        processed = files_processed,
        failed = errors.len(),
        "Built graph"
    );

    // 4. Export.
    let document = CpgV1Exporter::new(&store, project_id).export();

    Ok(ProjectAnalysis {
        document,
        files_processed,
        files_failed: errors.len(),
        errors,
    })
}

fn process_file(
    parser: &mut LuaParser,
    store: &mut GraphStore,
    worker_id: &str,
    file: &fs_scan::FsItem,
) -> Result<()> {
    let (tree, source) = parser.parse_file(&file.abs_path)?;

    AstInserter::insert_tree(store, tree.root_node(), &source, &file.path)?;

    let mut table = SymbolTable::new(worker_id);
    let mut symbol_builder = SymbolBuilder::new(worker_id, &file.path, &source);
    symbol_builder.build(&mut table, tree.root_node());

    let mut cpg = CpgBuilder::new(store, &mut table, &source, &file.path);
    cpg.build(tree.root_node())
}

fn classify_error(err: &anyhow::Error) -> &'static str {
    let text = format!("{err:#}").to_lowercase();
    if text.contains("syntax error") {
        "SyntaxError"
    } else if text.contains("read") {
        "IoError"
    } else {
        "ParseError"
    }
}
