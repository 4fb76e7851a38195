//! Domain creation, definition, and power-state procedures.

use crate::handle::{encode_domain_desc, get_nonnull_domain, read_domain_desc, make_nonnull_domain};
use crate::session::{ClientSession, ServerContext};
use crate::wire::{caps, Reader, Writer};

use super::{open_conn, require_writable, HandlerError};

/// `DomainCreateLinux`: create and start a transient domain from a legacy
/// config blob.
pub async fn create_linux(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let xml = reader.read_string("domain_create_linux.xml", caps::XML_MAX)?;
    let flags = reader.read_u32()?;
    let domain = ctx.driver.domain_create_linux(conn, &xml, flags).await?;
    let mut w = Writer::new();
    encode_domain_desc(&mut w, &make_nonnull_domain(&domain));
    ctx.driver.release_domain(conn, domain);
    Ok(w)
}

/// `DomainDefineXml`: define a persistent domain without starting it.
pub async fn define_xml(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let xml = reader.read_string("domain_define_xml.xml", caps::XML_MAX)?;
    let domain = ctx.driver.domain_define_xml(conn, &xml).await?;
    let mut w = Writer::new();
    encode_domain_desc(&mut w, &make_nonnull_domain(&domain));
    ctx.driver.release_domain(conn, domain);
    Ok(w)
}

/// `DomainUndefine`: remove a persistent domain's configuration.
pub async fn undefine(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_undefine(conn, guard.get()).await?;
    Ok(Writer::new())
}

/// `DomainCreate`: start a previously defined domain.
pub async fn create(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_create(conn, guard.get()).await?;
    Ok(Writer::new())
}

/// `DomainDestroy`: stop and discard a domain. The driver consumes the
/// handle, so the guard is neutralised with
/// [`DomainGuard::into_destroyed`](crate::handle::DomainGuard::into_destroyed)
/// ahead of the call rather than released afterwards.
pub async fn destroy(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let domain = guard.into_destroyed();
    ctx.driver.domain_destroy(conn, domain).await?;
    Ok(Writer::new())
}

/// `DomainShutdown`: request a graceful shutdown.
pub async fn shutdown(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_shutdown(conn, guard.get()).await?;
    Ok(Writer::new())
}

/// `DomainReboot`.
pub async fn reboot(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let flags = reader.read_u32()?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_reboot(conn, guard.get(), flags).await?;
    Ok(Writer::new())
}

/// `DomainSuspend`.
pub async fn suspend(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_suspend(conn, guard.get()).await?;
    Ok(Writer::new())
}

/// `DomainResume`.
pub async fn resume(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_resume(conn, guard.get()).await?;
    Ok(Writer::new())
}

/// `DomainSave`: save running state to `path` and stop the domain.
pub async fn save(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let path = reader.read_string("domain_save.path", caps::STRING_MAX)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_save(conn, guard.get(), &path).await?;
    Ok(Writer::new())
}

/// `DomainRestore`: restore a domain previously saved to `path`.
pub async fn restore(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let path = reader.read_string("domain_restore.path", caps::STRING_MAX)?;
    ctx.driver.domain_restore(conn, &path).await?;
    Ok(Writer::new())
}

/// `DomainCoreDump`: write a core dump to `path`.
pub async fn core_dump(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let path = reader.read_string("domain_core_dump.path", caps::STRING_MAX)?;
    let flags = reader.read_u32()?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_core_dump(conn, guard.get(), &path, flags).await?;
    Ok(Writer::new())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::driver::DriverFacade;
    use crate::sasl::PlainEngine;
    use crate::test_support::MockDriver;

    async fn open_session() -> (ServerContext, ClientSession, Arc<MockDriver>, [u8; 16]) {
        let driver = Arc::new(MockDriver::new());
        let conn = driver.open("test", 0).await.unwrap();
        let uuid = [4_u8; 16];
        driver.seed_domain(conn, "vm", uuid, 7).await;
        let ctx = ServerContext::new(driver.clone(), Arc::new(PlainEngine::new(Vec::new())), false);
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);
        session.conn = Some(conn);
        (ctx, session, driver, uuid)
    }

    fn desc_body(name: &str, uuid: [u8; 16], id: i32) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_string(name);
        w.write_fixed_opaque(&uuid);
        w.write_i32(id);
        w.into_bytes()
    }

    #[tokio::test]
    async fn destroy_removes_the_domain() {
        let (ctx, session, driver, uuid) = open_session().await;
        let conn = session.conn.unwrap();
        let bytes = desc_body("vm", uuid, 7);
        let mut r = Reader::new(&bytes);
        destroy(&ctx, &session, &mut r).await.unwrap();
        assert!(driver.refcount(conn, uuid).await == 0);
        assert!(ctx.driver.domain_lookup_by_uuid(conn, &uuid).await.is_none());
    }

    #[tokio::test]
    async fn write_op_on_readonly_connection_is_rejected() {
        let (ctx, mut session, _driver, uuid) = open_session().await;
        session.readonly = true;
        let bytes = desc_body("vm", uuid, 7);
        let mut r = Reader::new(&bytes);
        assert!(matches!(destroy(&ctx, &session, &mut r).await, Err(HandlerError::ReadOnly)));
    }

    #[tokio::test]
    async fn destroy_missing_domain_is_not_found() {
        let (ctx, session, _driver, _uuid) = open_session().await;
        let bytes = desc_body("ghost", [0_u8; 16], 0);
        let mut r = Reader::new(&bytes);
        assert!(matches!(destroy(&ctx, &session, &mut r).await, Err(HandlerError::NotFound)));
    }
}
