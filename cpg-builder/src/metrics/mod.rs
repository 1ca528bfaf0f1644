pub mod cyclomatic;
pub mod halstead;
pub mod loc;
