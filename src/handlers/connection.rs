//! Connection bootstrap and host-level inquiry procedures.

use crate::session::{ClientSession, ServerContext};
use crate::wire::{Reader, Writer};

use super::HandlerError;

/// `Open`: resolve the connection URI and acquire a driver connection.
/// `flags` bit 0 requests read-only.
pub async fn open(ctx: &ServerContext, session: &mut ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    if session.conn.is_some() {
        return Err(HandlerError::AlreadyOpen);
    }
    let name = reader.read_string("open.name", crate::wire::caps::STRING_MAX)?;
    let flags = reader.read_u32()?;
    let conn = ctx.driver.open(&name, flags).await.ok_or(HandlerError::NotFound)?;
    session.conn = Some(conn);
    session.readonly = ctx.force_readonly || flags & 1 != 0;
    Ok(Writer::new())
}

/// `Close`: release the driver connection, if any.
pub async fn close(ctx: &ServerContext, session: &mut ClientSession, _reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    if let Some(conn) = session.conn.take() {
        ctx.driver.close(conn).await;
    }
    Ok(Writer::new())
}

/// `GetType`: driver/daemon type string.
pub async fn get_type(ctx: &ServerContext, session: &ClientSession, _reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = super::open_conn(session)?;
    let mut w = Writer::new();
    w.write_string(&ctx.driver.get_type(conn).await);
    Ok(w)
}

/// `GetVersion`: driver version number.
pub async fn get_version(ctx: &ServerContext, session: &ClientSession, _reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = super::open_conn(session)?;
    let mut w = Writer::new();
    w.write_u64(ctx.driver.get_version(conn).await);
    Ok(w)
}

/// `GetHostname`: host name.
pub async fn get_hostname(ctx: &ServerContext, session: &ClientSession, _reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = super::open_conn(session)?;
    let mut w = Writer::new();
    w.write_string(&ctx.driver.get_hostname(conn).await);
    Ok(w)
}

/// `GetCapabilities`: host capabilities XML.
pub async fn get_capabilities(ctx: &ServerContext, session: &ClientSession, _reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = super::open_conn(session)?;
    let mut w = Writer::new();
    w.write_string(&ctx.driver.get_capabilities(conn).await);
    Ok(w)
}

/// `GetMaxVcpus`: maximum vcpus for an optional domain type.
pub async fn get_max_vcpus(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = super::open_conn(session)?;
    let domain_type = reader.read_option(|r| r.read_string("get_max_vcpus.type", crate::wire::caps::STRING_MAX))?;
    let mut w = Writer::new();
    w.write_i32(ctx.driver.get_max_vcpus(conn, domain_type.as_deref()).await);
    Ok(w)
}

/// `SupportsFeature`: whether an optional feature is supported.
pub async fn supports_feature(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = super::open_conn(session)?;
    let feature = reader.read_i32()?;
    let mut w = Writer::new();
    w.write_bool(ctx.driver.supports_feature(conn, feature).await);
    Ok(w)
}

/// `NodeGetInfo`: host node summary.
pub async fn node_get_info(ctx: &ServerContext, session: &ClientSession, _reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = super::open_conn(session)?;
    let info = ctx.driver.node_get_info(conn).await.ok_or(HandlerError::NotFound)?;
    let mut w = Writer::new();
    w.write_string(&info.model);
    w.write_u64(info.memory_kb);
    w.write_u32(info.cpus);
    w.write_u32(info.mhz);
    w.write_u32(info.nodes);
    w.write_u32(info.sockets);
    w.write_u32(info.cores);
    w.write_u32(info.threads);
    Ok(w)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sasl::PlainEngine;
    use crate::test_support::MockDriver;

    fn ctx() -> ServerContext {
        ServerContext::new(Arc::new(MockDriver::new()), Arc::new(PlainEngine::new(Vec::new())), false)
    }

    #[tokio::test]
    async fn open_sets_session_connection_and_readonly() {
        let ctx = ctx();
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);
        let mut w = Writer::new();
        w.write_string("test:///default");
        w.write_u32(1);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        open(&ctx, &mut session, &mut r).await.unwrap();
        assert!(session.conn.is_some());
        assert!(session.readonly);
    }

    #[tokio::test]
    async fn get_type_requires_open_connection() {
        let ctx = ctx();
        let session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);
        let bytes = Vec::new();
        let mut r = Reader::new(&bytes);
        assert!(matches!(get_type(&ctx, &session, &mut r).await, Err(HandlerError::NotOpen)));
    }

    #[tokio::test]
    async fn open_twice_is_rejected_without_touching_the_driver() {
        let ctx = ctx();
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);
        let mut w = Writer::new();
        w.write_string("test:///default");
        w.write_u32(0);
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        open(&ctx, &mut session, &mut r).await.unwrap();
        let first_conn = session.conn;

        let mut r = Reader::new(&bytes);
        assert!(matches!(open(&ctx, &mut session, &mut r).await, Err(HandlerError::AlreadyOpen)));
        assert_eq!(session.conn, first_conn, "a rejected second open must not clobber the first connection");
    }
}
