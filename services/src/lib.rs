//! External collaborators of the analyzer: the Dapr sidecar (service
//! invocation and pub/sub) and project archive handling.

pub mod archive;
pub mod dapr;
