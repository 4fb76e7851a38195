//! Domain migration procedures.
//!
//! `MigratePrepare`'s `uri_out` is an `Option<String>` owned by this
//! function's stack frame: an early `?` return simply drops it, with no
//! separate teardown pass needed to avoid leaking it, unlike the allocator
//! bookkeeping the original dispatcher required.

use crate::handle::{encode_domain_desc, make_nonnull_domain, read_domain_desc};
use crate::session::{ClientSession, ServerContext};
use crate::wire::{caps, Reader, Writer};

use super::{open_conn, require_writable, HandlerError};

/// `DomainMigratePrepare`: prepare a migration target.
pub async fn prepare(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let uri_in = reader.read_option(|r| r.read_string("migrate_prepare.uri_in", caps::STRING_MAX))?;
    let cookie_in = reader.read_var_opaque("migrate_prepare.cookie_in", caps::MIGRATE_COOKIE_MAX)?;

    let (uri_out, cookie_out) = ctx.driver.migrate_prepare(conn, uri_in.as_deref(), &cookie_in).await?;

    let mut w = Writer::new();
    w.write_option(uri_out.as_ref(), |w, v| w.write_string(v));
    w.write_var_opaque(&cookie_out);
    Ok(w)
}

/// `DomainMigratePerform`: perform a migration from the source side.
pub async fn perform(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let cookie = reader.read_var_opaque("migrate_perform.cookie", caps::MIGRATE_COOKIE_MAX)?;
    let uri = reader.read_string("migrate_perform.uri", caps::STRING_MAX)?;
    let guard = crate::handle::get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.migrate_perform(conn, guard.get(), &cookie, &uri).await?;
    Ok(Writer::new())
}

/// `DomainMigrateFinish`: finish a migration on the destination side.
pub async fn finish(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let dname = reader.read_string("migrate_finish.dname", caps::STRING_MAX)?;
    let cookie = reader.read_var_opaque("migrate_finish.cookie", caps::MIGRATE_COOKIE_MAX)?;
    let domain = ctx.driver.migrate_finish(conn, &dname, &cookie).await?;
    let mut w = Writer::new();
    encode_domain_desc(&mut w, &make_nonnull_domain(&domain));
    ctx.driver.release_domain(conn, domain);
    Ok(w)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::driver::DriverFacade;
    use crate::sasl::PlainEngine;
    use crate::test_support::MockDriver;

    #[tokio::test]
    async fn prepare_with_no_uri_in_returns_no_uri_out() {
        let driver = Arc::new(MockDriver::new());
        let conn = driver.open("test", 0).await.unwrap();
        let ctx = ServerContext::new(driver, Arc::new(PlainEngine::new(Vec::new())), false);
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);
        session.conn = Some(conn);

        let mut w = Writer::new();
        w.write_option::<String>(None, |w, v| w.write_string(v));
        w.write_var_opaque(&[]);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let reply = prepare(&ctx, &session, &mut r).await.unwrap();
        let reply_bytes = reply.into_bytes();
        let mut rr = Reader::new(&reply_bytes);
        let uri_out = rr.read_option(|r| r.read_string("uri_out", caps::STRING_MAX)).unwrap();
        assert_eq!(uri_out, None);
    }
}
