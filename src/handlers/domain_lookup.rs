//! Domain resolution and enumeration procedures.

use crate::handle::{encode_domain_desc, make_nonnull_domain};
use crate::session::{ClientSession, ServerContext};
use crate::wire::{caps, Reader, Writer};

use super::{open_conn, HandlerError};

fn encode_domain(w: &mut Writer, domain: &crate::driver::Domain) {
    encode_domain_desc(w, &make_nonnull_domain(domain));
}

/// `DomainLookupById`.
pub async fn lookup_by_id(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let id = reader.read_i32()?;
    let domain = ctx.driver.domain_lookup_by_id(conn, id).await.ok_or(HandlerError::NotFound)?;
    let mut w = Writer::new();
    encode_domain(&mut w, &domain);
    ctx.driver.release_domain(conn, domain);
    Ok(w)
}

/// `DomainLookupByName`.
pub async fn lookup_by_name(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let name = reader.read_string("domain_lookup_by_name.name", caps::STRING_MAX)?;
    let domain = ctx.driver.domain_lookup_by_name(conn, &name).await.ok_or(HandlerError::NotFound)?;
    let mut w = Writer::new();
    encode_domain(&mut w, &domain);
    ctx.driver.release_domain(conn, domain);
    Ok(w)
}

/// `DomainLookupByUuid`.
pub async fn lookup_by_uuid(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let uuid = reader.read_fixed_opaque::<16>()?;
    let domain = ctx.driver.domain_lookup_by_uuid(conn, &uuid).await.ok_or(HandlerError::NotFound)?;
    let mut w = Writer::new();
    encode_domain(&mut w, &domain);
    ctx.driver.release_domain(conn, domain);
    Ok(w)
}

/// `NumOfDomains`.
pub async fn num_of_domains(ctx: &ServerContext, session: &ClientSession, _reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let mut w = Writer::new();
    w.write_i32(ctx.driver.num_of_domains(conn).await);
    Ok(w)
}

/// `ListDomains`: running domain ids, capped by [`caps::DOMAIN_ID_LIST_MAX`].
/// A `maxids` over the cap is rejected before the driver is called.
pub async fn list_domains(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let requested = reader.read_i32()?;
    let max = requested_count("list_domains.maxids", requested, caps::DOMAIN_ID_LIST_MAX)?;
    let ids = ctx.driver.list_domains(conn, max).await;
    let mut w = Writer::new();
    w.write_var_array(&ids, |w, id| w.write_i32(*id));
    Ok(w)
}

/// Validate a client-supplied result-count hint against its cap, rejecting
/// before any driver call rather than silently clamping.
fn requested_count(field: &'static str, requested: i32, max: usize) -> Result<usize, HandlerError> {
    let actual = usize::try_from(requested).unwrap_or(0);
    if actual > max {
        return Err(crate::wire::WireError::CapExceeded { field, max, actual }.into());
    }
    Ok(actual)
}

/// `NumOfDefinedDomains`.
pub async fn num_of_defined_domains(ctx: &ServerContext, session: &ClientSession, _reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let mut w = Writer::new();
    w.write_i32(ctx.driver.num_of_defined_domains(conn).await);
    Ok(w)
}

/// `ListDefinedDomains`: inactive domain names, capped by
/// [`caps::DOMAIN_NAME_LIST_MAX`]. A `maxnames` over the cap is rejected
/// before the driver is called.
pub async fn list_defined_domains(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let requested = reader.read_i32()?;
    let max = requested_count("list_defined_domains.maxnames", requested, caps::DOMAIN_NAME_LIST_MAX)?;
    let names = ctx.driver.list_defined_domains(conn, max).await;
    let mut w = Writer::new();
    w.write_var_array(&names, |w, name| w.write_string(name));
    Ok(w)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::driver::{ConnId, DriverFacade};
    use crate::sasl::PlainEngine;
    use crate::test_support::MockDriver;

    async fn open_session() -> (ServerContext, ClientSession, ConnId, Arc<MockDriver>) {
        let driver = Arc::new(MockDriver::new());
        let conn = driver.open("test", 0).await.unwrap();
        let ctx = ServerContext::new(driver.clone(), Arc::new(PlainEngine::new(Vec::new())), false);
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);
        session.conn = Some(conn);
        (ctx, session, conn, driver)
    }

    #[tokio::test]
    async fn lookup_by_uuid_releases_after_encoding() {
        let (ctx, session, conn, driver) = open_session().await;
        let uuid = [3_u8; 16];
        driver.seed_domain(conn, "vm", uuid, 5).await;
        let mut w = Writer::new();
        w.write_fixed_opaque(&uuid);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        lookup_by_uuid(&ctx, &session, &mut r).await.unwrap();
        assert_eq!(driver.refcount(conn, uuid).await, 0);
    }

    #[tokio::test]
    async fn lookup_by_uuid_miss_is_not_found() {
        let (ctx, session, _conn, _driver) = open_session().await;
        let mut w = Writer::new();
        w.write_fixed_opaque(&[9_u8; 16]);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert!(matches!(lookup_by_uuid(&ctx, &session, &mut r).await, Err(HandlerError::NotFound)));
    }

    #[tokio::test]
    async fn list_domains_over_cap_is_rejected_without_clamping() {
        let (ctx, session, _conn, _driver) = open_session().await;
        let mut w = Writer::new();
        w.write_i32(i32::try_from(caps::DOMAIN_ID_LIST_MAX).unwrap() + 1);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let err = list_domains(&ctx, &session, &mut r).await.unwrap_err();
        assert!(matches!(err, HandlerError::Wire(crate::wire::WireError::CapExceeded { max, .. }) if max == caps::DOMAIN_ID_LIST_MAX));
    }

    #[tokio::test]
    async fn list_defined_domains_over_cap_is_rejected_without_clamping() {
        let (ctx, session, _conn, _driver) = open_session().await;
        let mut w = Writer::new();
        w.write_i32(i32::try_from(caps::DOMAIN_NAME_LIST_MAX).unwrap() + 1);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let err = list_defined_domains(&ctx, &session, &mut r).await.unwrap_err();
        assert!(matches!(err, HandlerError::Wire(crate::wire::WireError::CapExceeded { max, .. }) if max == caps::DOMAIN_NAME_LIST_MAX));
    }
}
