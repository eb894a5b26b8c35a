pub mod dedup;
pub mod fallback;
pub mod orchestrator;
