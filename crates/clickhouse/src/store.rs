//! [`TelemetryStore`] backed by ClickHouse.

use crate::client::ClickHouseClient;
use crate::{insert, procedures};
use async_trait::async_trait;
use engine_core::{ProcedureCall, ProjectionRecord, Result, TelemetryStore};
use telemetry::metrics;

#[derive(Clone)]
pub struct ClickHouseTelemetryStore {
    client: ClickHouseClient,
}

impl ClickHouseTelemetryStore {
    pub fn new(client: ClickHouseClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TelemetryStore for ClickHouseTelemetryStore {
    async fn insert_many(&self, records: &[ProjectionRecord]) -> Result<()> {
        let written = insert::insert_records(&self.client, records).await?;
        metrics().records_flushed.inc_by(written as u64);
        Ok(())
    }

    async fn execute_procedure(&self, call: &ProcedureCall) -> Result<()> {
        procedures::execute(&self.client, call).await
    }
}
