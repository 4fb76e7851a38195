//! Network resolution, enumeration, and lifecycle procedures. Mirrors the
//! domain handlers' shape throughout — networks have no `Destroy`-style
//! consuming operation, so there is no `into_destroyed` twin of
//! [`handlers::domain_lifecycle::destroy`](super::domain_lifecycle::destroy).

use crate::handle::{encode_network_desc, get_nonnull_network, make_nonnull_network, read_network_desc};
use crate::session::{ClientSession, ServerContext};
use crate::wire::{caps, Reader, Writer};

use super::{open_conn, require_writable, HandlerError};

fn encode_network(w: &mut Writer, network: &crate::driver::Network) {
    encode_network_desc(w, &make_nonnull_network(network));
}

/// `NetworkLookupByName`.
pub async fn lookup_by_name(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let name = reader.read_string("network_lookup_by_name.name", caps::STRING_MAX)?;
    let network = ctx.driver.network_lookup_by_name(conn, &name).await.ok_or(HandlerError::NotFound)?;
    let mut w = Writer::new();
    encode_network(&mut w, &network);
    ctx.driver.release_network(conn, network);
    Ok(w)
}

/// `NetworkLookupByUuid`.
pub async fn lookup_by_uuid(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let uuid = reader.read_fixed_opaque::<16>()?;
    let network = ctx.driver.network_lookup_by_uuid(conn, &uuid).await.ok_or(HandlerError::NotFound)?;
    let mut w = Writer::new();
    encode_network(&mut w, &network);
    ctx.driver.release_network(conn, network);
    Ok(w)
}

/// `NumOfNetworks`.
pub async fn num_of_networks(ctx: &ServerContext, session: &ClientSession, _reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let mut w = Writer::new();
    w.write_i32(ctx.driver.num_of_networks(conn).await);
    Ok(w)
}

/// `ListNetworks`: active network names, capped by
/// [`caps::NETWORK_NAME_LIST_MAX`]. A `maxnames` over the cap is rejected
/// before the driver is called.
pub async fn list_networks(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let requested = reader.read_i32()?;
    let max = requested_count("list_networks.maxnames", requested, caps::NETWORK_NAME_LIST_MAX)?;
    let names = ctx.driver.list_networks(conn, max).await;
    let mut w = Writer::new();
    w.write_var_array(&names, |w, name| w.write_string(name));
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

/// `NumOfDefinedNetworks`.
pub async fn num_of_defined_networks(ctx: &ServerContext, session: &ClientSession, _reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let mut w = Writer::new();
    w.write_i32(ctx.driver.num_of_defined_networks(conn).await);
    Ok(w)
}

/// `ListDefinedNetworks`: inactive network names, same cap as
/// [`list_networks`].
pub async fn list_defined_networks(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let requested = reader.read_i32()?;
    let max = requested_count("list_defined_networks.maxnames", requested, caps::NETWORK_NAME_LIST_MAX)?;
    let names = ctx.driver.list_defined_networks(conn, max).await;
    let mut w = Writer::new();
    w.write_var_array(&names, |w, name| w.write_string(name));
    Ok(w)
}

/// `NetworkCreateXml`: create and start a transient network from XML.
pub async fn create_xml(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let xml = reader.read_string("network_create_xml.xml", caps::XML_MAX)?;
    let network = ctx.driver.network_create_xml(conn, &xml).await?;
    let mut w = Writer::new();
    encode_network(&mut w, &network);
    ctx.driver.release_network(conn, network);
    Ok(w)
}

/// `NetworkDefineXml`: define a persistent network without starting it.
pub async fn define_xml(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let xml = reader.read_string("network_define_xml.xml", caps::XML_MAX)?;
    let network = ctx.driver.network_define_xml(conn, &xml).await?;
    let mut w = Writer::new();
    encode_network(&mut w, &network);
    ctx.driver.release_network(conn, network);
    Ok(w)
}

/// `NetworkCreate`: start a previously defined network.
pub async fn create(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_network_desc(reader)?;
    let guard = get_nonnull_network(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.network_create(conn, guard.get()).await?;
    Ok(Writer::new())
}

/// `NetworkDestroy`: stop a network. Unlike domain destroy, the driver does
/// not consume the handle; the guard releases normally on scope exit.
pub async fn destroy(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_network_desc(reader)?;
    let guard = get_nonnull_network(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.network_destroy(conn, guard.get()).await?;
    Ok(Writer::new())
}

/// `NetworkUndefine`: remove a persistent network's configuration.
pub async fn undefine(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_network_desc(reader)?;
    let guard = get_nonnull_network(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.network_undefine(conn, guard.get()).await?;
    Ok(Writer::new())
}

/// `NetworkDumpXml`: network configuration XML.
pub async fn dump_xml(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let desc = read_network_desc(reader)?;
    let flags = reader.read_u32()?;
    let guard = get_nonnull_network(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let xml = ctx.driver.network_dump_xml(conn, guard.get(), flags).await?;
    let mut w = Writer::new();
    w.write_string(&xml);
    Ok(w)
}

/// `NetworkGetAutostart`.
pub async fn get_autostart(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let desc = read_network_desc(reader)?;
    let guard = get_nonnull_network(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let autostart = ctx.driver.network_get_autostart(conn, guard.get()).await?;
    let mut w = Writer::new();
    w.write_bool(autostart);
    Ok(w)
}

/// `NetworkSetAutostart`.
pub async fn set_autostart(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_network_desc(reader)?;
    let autostart = reader.read_bool()?;
    let guard = get_nonnull_network(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.network_set_autostart(conn, guard.get(), autostart).await?;
    Ok(Writer::new())
}

/// `NetworkGetBridgeName`.
pub async fn get_bridge_name(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let desc = read_network_desc(reader)?;
    let guard = get_nonnull_network(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let bridge = ctx.driver.network_get_bridge_name(conn, guard.get()).await?;
    let mut w = Writer::new();
    w.write_string(&bridge);
    Ok(w)
}
