//! Storage collaborator interface.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::records::ProjectionRecord;

/// A positional parameter of a named procedure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProcedureParam {
    Str(String),
    Int(i64),
    Bool(bool),
}

/// Invocation of a named storage procedure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcedureCall {
    pub name: String,
    pub params: Vec<ProcedureParam>,
}

impl ProcedureCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, param: ProcedureParam) -> Self {
        self.params.push(param);
        self
    }
}

/// Destination of projected records.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Inserts records, grouped by record type.
    async fn insert_many(&self, records: &[ProjectionRecord]) -> Result<()>;

    /// Executes a named procedure.
    async fn execute_procedure(&self, call: &ProcedureCall) -> Result<()>;
}
