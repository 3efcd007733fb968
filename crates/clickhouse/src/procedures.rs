//! Named write procedures.
//!
//! ClickHouse has no stored procedures, so each procedure name maps to a
//! parameterized INSERT. Parameters bind positionally.

use crate::client::ClickHouseClient;
use engine_core::error::StoreErrorCode;
use engine_core::{
    Error, ProcedureCall, ProcedureParam, Result, DEVICE_PULSE_PROCEDURE, LINE_PULSE_PROCEDURE,
};
use telemetry::metrics;
use tracing::debug;

/// A registered procedure.
#[derive(Debug, Clone, Copy)]
pub struct Procedure {
    pub name: &'static str,
    pub sql: &'static str,
    pub arity: usize,
}

const PROCEDURES: &[Procedure] = &[
    Procedure {
        name: DEVICE_PULSE_PROCEDURE,
        sql: "INSERT INTO pulse_telemetry (kind, device_id, message_created, pulses, duration, payload) VALUES (?, ?, ?, ?, ?, ?)",
        arity: 6,
    },
    Procedure {
        name: LINE_PULSE_PROCEDURE,
        sql: "INSERT INTO line_pulse_telemetry (kind, device_id, message_created, pulses, duration, is_line, payload) VALUES (?, ?, ?, ?, ?, ?, ?)",
        arity: 7,
    },
];

/// Looks up a procedure by name.
pub fn lookup(name: &str) -> Option<&'static Procedure> {
    PROCEDURES.iter().find(|p| p.name == name)
}

fn resolve(call: &ProcedureCall) -> Result<&'static Procedure> {
    let procedure = lookup(&call.name).ok_or_else(|| {
        Error::storage(
            StoreErrorCode::ProcedureFailed,
            format!("unknown procedure: {}", call.name),
        )
    })?;
    if call.params.len() != procedure.arity {
        return Err(Error::storage(
            StoreErrorCode::ProcedureFailed,
            format!(
                "procedure {} expects {} parameters, got {}",
                procedure.name,
                procedure.arity,
                call.params.len()
            ),
        ));
    }
    Ok(procedure)
}

/// Executes one procedure call.
pub async fn execute(client: &ClickHouseClient, call: &ProcedureCall) -> Result<()> {
    let procedure = resolve(call)?;

    let mut query = client.inner().query(procedure.sql);
    for param in &call.params {
        query = match param {
            ProcedureParam::Str(s) => query.bind(s.as_str()),
            ProcedureParam::Int(i) => query.bind(*i),
            ProcedureParam::Bool(b) => query.bind(*b),
        };
    }

    query.execute().await.map_err(|e| {
        Error::storage(
            StoreErrorCode::ProcedureFailed,
            format!("procedure {} failed: {}", procedure.name, e),
        )
    })?;

    metrics().procedures_executed.inc();
    debug!(procedure = procedure.name, "Executed procedure");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_match_arity() {
        for procedure in PROCEDURES {
            assert_eq!(procedure.sql.matches('?').count(), procedure.arity);
        }
    }

    #[test]
    fn test_unknown_procedure_rejected() {
        let err = resolve(&ProcedureCall::new("drop_everything")).unwrap_err();
        assert_eq!(err.error_code(), Some("STORE_002"));
    }

    #[test]
    fn test_arity_checked() {
        let call = ProcedureCall::new(DEVICE_PULSE_PROCEDURE).param(ProcedureParam::Int(1));
        assert!(resolve(&call).is_err());
    }
}
