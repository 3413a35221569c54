// Library interface for wikisum modules
// This allows tests and other binaries to import modules

pub mod chunking;
pub mod fetch;
pub mod llm;
pub mod orchestrator;
pub mod records;
pub mod reference;
pub mod server;
pub mod storage;
pub mod telemetry;
pub mod text;
pub mod translation;
