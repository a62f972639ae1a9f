//! Core domain types shared across the pipeline.
//!
//! Everything downstream of the adapters speaks in these types: a
//! `ScanRequest` identifies one unit of work, adapters produce `ToolResult`s
//! holding normalized `Finding`s, and severity/kind vocabularies are fixed
//! enums so no tool-native wording leaks past the adapter boundary.

pub mod finding;
pub mod request;
pub mod severity;
pub mod tool_result;

pub use finding::Finding;
pub use request::{ScanMode, ScanRequest, ToolKind};
pub use severity::Severity;
pub use tool_result::{DiagnosticSeverity, ToolDiagnostic, ToolResult};
