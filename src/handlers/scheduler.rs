//! Scheduler-parameter inspection and reconfiguration procedures.
//!
//! Parameter names are capped at [`caps::SCHED_PARAM_FIELD_LENGTH`]; the
//! parameter set itself at [`caps::SCHEDULER_PARAMETERS_MAX`] entries.

use crate::handle::{get_nonnull_domain, read_domain_desc};
use crate::session::{ClientSession, ServerContext};
use crate::wire::{caps, Reader, SchedParamValue, Writer};

use super::{open_conn, require_writable, HandlerError};

fn read_params(reader: &mut Reader<'_>) -> Result<Vec<(String, SchedParamValue)>, crate::wire::WireError> {
    reader.read_var_array("scheduler.params", caps::SCHEDULER_PARAMETERS_MAX, |r| {
        let field = r.read_string("scheduler.param.field", caps::SCHED_PARAM_FIELD_LENGTH)?;
        let value = SchedParamValue::decode(r)?;
        Ok((field, value))
    })
}

fn write_params(writer: &mut Writer, params: &[(String, SchedParamValue)]) {
    writer.write_var_array(params, |w, (field, value)| {
        w.write_string(field);
        value.encode(w);
    });
}

/// `DomainGetSchedulerType`: scheduler name and parameter count.
pub async fn get_scheduler_type(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let desc = read_domain_desc(reader)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let (name, nparams) = ctx.driver.domain_get_scheduler_type(conn, guard.get()).await?;
    let mut w = Writer::new();
    w.write_string(&name);
    w.write_u32(nparams);
    Ok(w)
}

/// `DomainGetSchedulerParameters`.
pub async fn get_scheduler_parameters(
    ctx: &ServerContext,
    session: &ClientSession,
    reader: &mut Reader<'_>,
) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let desc = read_domain_desc(reader)?;
    let nparams = reader.read_i32()?;
    let nparams = usize::try_from(nparams).unwrap_or(0);
    if nparams > caps::SCHEDULER_PARAMETERS_MAX {
        return Err(crate::wire::WireError::CapExceeded {
            field: "get_scheduler_parameters.nparams",
            max: caps::SCHEDULER_PARAMETERS_MAX,
            actual: nparams,
        }
        .into());
    }
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let params = ctx.driver.domain_get_scheduler_parameters(conn, guard.get(), nparams).await?;
    let mut w = Writer::new();
    write_params(&mut w, &params);
    Ok(w)
}

/// `DomainSetSchedulerParameters`.
pub async fn set_scheduler_parameters(
    ctx: &ServerContext,
    session: &ClientSession,
    reader: &mut Reader<'_>,
) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let params = read_params(reader)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_set_scheduler_parameters(conn, guard.get(), &params).await?;
    Ok(Writer::new())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::driver::DriverFacade;
    use crate::sasl::PlainEngine;
    use crate::test_support::MockDriver;

    #[tokio::test]
    async fn round_trips_scheduler_parameters_through_the_mock() {
        let driver = Arc::new(MockDriver::new());
        let conn = driver.open("test", 0).await.unwrap();
        let uuid = [6_u8; 16];
        driver.seed_domain(conn, "vm", uuid, 1).await;
        let ctx = ServerContext::new(driver, Arc::new(PlainEngine::new(Vec::new())), false);
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);
        session.conn = Some(conn);

        let mut w = Writer::new();
        w.write_string("vm");
        w.write_fixed_opaque(&uuid);
        w.write_i32(1);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let reply = get_scheduler_parameters(&ctx, &session, &mut r).await.unwrap();
        let reply_bytes = reply.into_bytes();
        let mut rr = Reader::new(&reply_bytes);
        let params = rr
            .read_var_array("params", caps::SCHEDULER_PARAMETERS_MAX, |r| {
                let field = r.read_string("field", caps::SCHED_PARAM_FIELD_LENGTH)?;
                let value = SchedParamValue::decode(r)?;
                Ok((field, value))
            })
            .unwrap();
        assert_eq!(params, vec![("weight".to_owned(), SchedParamValue::Uint(100))]);
    }

    #[tokio::test]
    async fn get_scheduler_parameters_over_cap_is_rejected_without_clamping() {
        let driver = Arc::new(MockDriver::new());
        let conn = driver.open("test", 0).await.unwrap();
        let uuid = [9_u8; 16];
        driver.seed_domain(conn, "vm", uuid, 1).await;
        let ctx = ServerContext::new(driver, Arc::new(PlainEngine::new(Vec::new())), false);
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);
        session.conn = Some(conn);

        let mut w = Writer::new();
        w.write_string("vm");
        w.write_fixed_opaque(&uuid);
        w.write_i32(1);
        w.write_i32(i32::try_from(caps::SCHEDULER_PARAMETERS_MAX).unwrap() + 1);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let err = get_scheduler_parameters(&ctx, &session, &mut r).await.unwrap_err();
        assert!(matches!(err, HandlerError::Wire(crate::wire::WireError::CapExceeded { max, .. }) if max == caps::SCHEDULER_PARAMETERS_MAX));
    }
}
