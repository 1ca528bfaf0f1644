pub mod cpg_v1;
pub mod schema;
