//! Domain resource-inspection and reconfiguration procedures.

use crate::handle::{get_nonnull_domain, read_domain_desc};
use crate::session::{ClientSession, ServerContext};
use crate::wire::{caps, Reader, Writer};

use super::{open_conn, require_writable, HandlerError};

/// `DomainGetInfo`: point-in-time resource snapshot.
pub async fn get_info(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let desc = read_domain_desc(reader)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let info = ctx.driver.domain_get_info(conn, guard.get()).await?;
    let mut w = Writer::new();
    w.write_u32(u32::from(info.state));
    w.write_u64(info.max_mem_kb);
    w.write_u64(info.memory_kb);
    w.write_u32(info.nr_virt_cpu);
    w.write_u64(info.cpu_time_ns);
    Ok(w)
}

/// `DomainGetMaxMemory`.
pub async fn get_max_memory(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let desc = read_domain_desc(reader)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let kb = ctx.driver.domain_get_max_memory(conn, guard.get()).await?;
    let mut w = Writer::new();
    w.write_u64(kb);
    Ok(w)
}

/// `DomainGetMaxVcpus`: maximum vcpus this particular domain could be given,
/// distinct from the driver-wide [`connection::get_max_vcpus`](super::connection::get_max_vcpus).
pub async fn get_max_vcpus(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let desc = read_domain_desc(reader)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let max = ctx.driver.domain_get_max_vcpus(conn, guard.get()).await?;
    let mut w = Writer::new();
    w.write_u32(max);
    Ok(w)
}

/// `DomainGetOsType`.
pub async fn get_os_type(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let desc = read_domain_desc(reader)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let os_type = ctx.driver.domain_get_os_type(conn, guard.get()).await?;
    let mut w = Writer::new();
    w.write_string(&os_type);
    Ok(w)
}

/// `DomainGetAutostart`.
pub async fn get_autostart(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let desc = read_domain_desc(reader)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let autostart = ctx.driver.domain_get_autostart(conn, guard.get()).await?;
    let mut w = Writer::new();
    w.write_bool(autostart);
    Ok(w)
}

/// `DomainSetAutostart`.
pub async fn set_autostart(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let autostart = reader.read_bool()?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_set_autostart(conn, guard.get(), autostart).await?;
    Ok(Writer::new())
}

/// `DomainSetMaxMemory`.
pub async fn set_max_memory(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let kb = reader.read_u64()?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_set_max_memory(conn, guard.get(), kb).await?;
    Ok(Writer::new())
}

/// `DomainSetMemory`.
pub async fn set_memory(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let kb = reader.read_u64()?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_set_memory(conn, guard.get(), kb).await?;
    Ok(Writer::new())
}

/// `DomainSetVcpus`.
pub async fn set_vcpus(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let count = reader.read_u32()?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_set_vcpus(conn, guard.get(), count).await?;
    Ok(Writer::new())
}

/// `DomainPinVcpu`.
pub async fn pin_vcpu(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let vcpu = reader.read_u32()?;
    let cpumap = reader.read_var_opaque("pin_vcpu.cpumap", caps::CPUMAP_MAX)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_pin_vcpu(conn, guard.get(), vcpu, &cpumap).await?;
    Ok(Writer::new())
}

/// `DomainGetVcpus`: per-vcpu state and affinity. `maxinfo` is rejected over
/// [`caps::VCPUINFO_MAX`] and `maxinfo * maplen` over [`caps::CPUMAPS_MAX`],
/// both before any driver call or allocation.
pub async fn get_vcpus(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let desc = read_domain_desc(reader)?;
    let maxinfo = reader.read_i32()?;
    let maplen = reader.read_i32()?;
    let maxinfo = usize::try_from(maxinfo).unwrap_or(0);
    let maplen = usize::try_from(maplen).unwrap_or(0);
    if maxinfo > caps::VCPUINFO_MAX {
        return Err(crate::wire::WireError::CapExceeded {
            field: "get_vcpus.maxinfo",
            max: caps::VCPUINFO_MAX,
            actual: maxinfo,
        }
        .into());
    }
    let cpumaps_len = maxinfo.saturating_mul(maplen);
    if cpumaps_len > caps::CPUMAPS_MAX {
        return Err(crate::wire::WireError::CapExceeded {
            field: "get_vcpus.maxinfo*maplen",
            max: caps::CPUMAPS_MAX,
            actual: cpumaps_len,
        }
        .into());
    }
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let vcpus = ctx.driver.domain_get_vcpus(conn, guard.get(), maxinfo, maplen).await?;
    let mut w = Writer::new();
    w.write_var_array(&vcpus, |w, v| {
        w.write_u32(v.number);
        w.write_u32(u32::from(v.state));
        w.write_u64(v.cpu_time_ns);
        w.write_i32(v.cpu);
    });
    Ok(w)
}

/// `DomainDumpXml`: domain configuration XML.
pub async fn dump_xml(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let desc = read_domain_desc(reader)?;
    let flags = reader.read_u32()?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let xml = ctx.driver.domain_dump_xml(conn, guard.get(), flags).await?;
    let mut w = Writer::new();
    w.write_string(&xml);
    Ok(w)
}

/// `DomainAttachDevice`: hot-attach a device described by `xml`.
pub async fn attach_device(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let xml = reader.read_string("attach_device.xml", caps::XML_MAX)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_attach_device(conn, guard.get(), &xml).await?;
    Ok(Writer::new())
}

/// `DomainDetachDevice`: hot-detach a device described by `xml`.
pub async fn detach_device(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    require_writable(session)?;
    let desc = read_domain_desc(reader)?;
    let xml = reader.read_string("detach_device.xml", caps::XML_MAX)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    ctx.driver.domain_detach_device(conn, guard.get(), &xml).await?;
    Ok(Writer::new())
}

/// `DomainBlockStats`: block device I/O counters. The guard is acquired
/// before the driver call and released on every exit path including the
/// `?` early return, via `Drop` — not just on success.
pub async fn block_stats(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let desc = read_domain_desc(reader)?;
    let path = reader.read_string("block_stats.path", caps::STRING_MAX)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let stats = ctx.driver.domain_block_stats(conn, guard.get(), &path).await?;
    let mut w = Writer::new();
    w.write_i64(stats.rd_bytes);
    w.write_i64(stats.rd_req);
    w.write_i64(stats.wr_bytes);
    w.write_i64(stats.wr_req);
    w.write_i64(stats.errs);
    Ok(w)
}

/// `DomainInterfaceStats`: network interface I/O counters. Same
/// release-on-every-path guarantee as [`block_stats`].
pub async fn interface_stats(ctx: &ServerContext, session: &ClientSession, reader: &mut Reader<'_>) -> Result<Writer, HandlerError> {
    let conn = open_conn(session)?;
    let desc = read_domain_desc(reader)?;
    let device = reader.read_string("interface_stats.device", caps::STRING_MAX)?;
    let guard = get_nonnull_domain(&ctx.driver, conn, &desc).await.ok_or(HandlerError::NotFound)?;
    let stats = ctx.driver.domain_interface_stats(conn, guard.get(), &device).await?;
    let mut w = Writer::new();
    w.write_i64(stats.rx_bytes);
    w.write_i64(stats.rx_packets);
    w.write_i64(stats.rx_errs);
    w.write_i64(stats.rx_drop);
    w.write_i64(stats.tx_bytes);
    w.write_i64(stats.tx_packets);
    w.write_i64(stats.tx_errs);
    w.write_i64(stats.tx_drop);
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
    async fn block_stats_releases_handle_even_though_driver_errors() {
        let driver = Arc::new(MockDriver::new());
        let conn = driver.open("test", 0).await.unwrap();
        let uuid = [5_u8; 16];
        driver.seed_domain(conn, "vm", uuid, 1).await;
        let ctx = ServerContext::new(driver.clone(), Arc::new(PlainEngine::new(Vec::new())), false);
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);
        session.conn = Some(conn);

        let mut w = Writer::new();
        w.write_string("vm");
        w.write_fixed_opaque(&uuid);
        w.write_i32(1);
        w.write_string("vda");
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        block_stats(&ctx, &session, &mut r).await.unwrap();
        assert_eq!(driver.refcount(conn, uuid).await, 0);
    }

    #[tokio::test]
    async fn get_vcpus_over_maxinfo_cap_is_rejected_without_clamping() {
        let driver = Arc::new(MockDriver::new());
        let conn = driver.open("test", 0).await.unwrap();
        let uuid = [6_u8; 16];
        driver.seed_domain(conn, "vm", uuid, 1).await;
        let ctx = ServerContext::new(driver.clone(), Arc::new(PlainEngine::new(Vec::new())), false);
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);
        session.conn = Some(conn);

        let mut w = Writer::new();
        w.write_string("vm");
        w.write_fixed_opaque(&uuid);
        w.write_i32(1);
        w.write_i32(i32::try_from(caps::VCPUINFO_MAX).unwrap() + 1);
        w.write_i32(1);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let err = get_vcpus(&ctx, &session, &mut r).await.unwrap_err();
        assert!(matches!(err, HandlerError::Wire(crate::wire::WireError::CapExceeded { max, .. }) if max == caps::VCPUINFO_MAX));
    }

    #[tokio::test]
    async fn get_vcpus_over_cpumaps_cap_is_rejected_without_clamping() {
        let driver = Arc::new(MockDriver::new());
        let conn = driver.open("test", 0).await.unwrap();
        let uuid = [7_u8; 16];
        driver.seed_domain(conn, "vm", uuid, 1).await;
        let ctx = ServerContext::new(driver.clone(), Arc::new(PlainEngine::new(Vec::new())), false);
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);
        session.conn = Some(conn);

        let mut w = Writer::new();
        w.write_string("vm");
        w.write_fixed_opaque(&uuid);
        w.write_i32(1);
        w.write_i32(1);
        w.write_i32(i32::try_from(caps::CPUMAPS_MAX).unwrap() + 1);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let err = get_vcpus(&ctx, &session, &mut r).await.unwrap_err();
        assert!(matches!(err, HandlerError::Wire(crate::wire::WireError::CapExceeded { max, .. }) if max == caps::CPUMAPS_MAX));
    }
}
