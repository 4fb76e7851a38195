//! The dispatch table: one match arm per [`Procedure`], each calling into
//! its handler in [`crate::handlers`].
//!
//! A runtime table of boxed handler futures was considered and rejected —
//! it would need extra boxing machinery this crate has no other use for,
//! purely to store a set of arms that is fixed at compile time anyway. A
//! match is the plain, exhaustive way to express "known set, no default".

use crate::handlers::{connection, domain_inspect, domain_lifecycle, domain_lookup, migrate, network, scheduler, HandlerError};
use crate::procedure::Procedure;
use crate::session::{ClientSession, ServerContext};
use crate::wire::{Reader, Writer};

/// Run the handler for `proc`, decoding its arguments from `reader`.
///
/// Auth gating and connection-open checks are enforced by the caller before
/// this is reached; handlers still check `require_writable`/`open_conn`
/// themselves since those are per-procedure, not uniform.
///
/// # Panics
///
/// Panics if called with one of the four auth procedures — `dispatch_loop`
/// intercepts those itself since they mutate `session.auth` directly.
#[expect(clippy::unreachable, reason = "auth procedures never reach this match; see crate::dispatch_loop")]
pub async fn dispatch(
    proc: Procedure,
    ctx: &ServerContext,
    session: &mut ClientSession,
    reader: &mut Reader<'_>,
) -> Result<Writer, HandlerError> {
    match proc {
        Procedure::Open => connection::open(ctx, session, reader).await,
        Procedure::Close => connection::close(ctx, session, reader).await,
        Procedure::AuthList | Procedure::AuthSaslInit | Procedure::AuthSaslStart | Procedure::AuthSaslStep => {
            unreachable!("auth procedures are intercepted before dispatch")
        }

        Procedure::GetType => connection::get_type(ctx, session, reader).await,
        Procedure::GetVersion => connection::get_version(ctx, session, reader).await,
        Procedure::GetHostname => connection::get_hostname(ctx, session, reader).await,
        Procedure::GetCapabilities => connection::get_capabilities(ctx, session, reader).await,
        Procedure::GetMaxVcpus => connection::get_max_vcpus(ctx, session, reader).await,
        Procedure::SupportsFeature => connection::supports_feature(ctx, session, reader).await,
        Procedure::NodeGetInfo => connection::node_get_info(ctx, session, reader).await,

        Procedure::DomainLookupById => domain_lookup::lookup_by_id(ctx, session, reader).await,
        Procedure::DomainLookupByName => domain_lookup::lookup_by_name(ctx, session, reader).await,
        Procedure::DomainLookupByUuid => domain_lookup::lookup_by_uuid(ctx, session, reader).await,
        Procedure::NumOfDomains => domain_lookup::num_of_domains(ctx, session, reader).await,
        Procedure::ListDomains => domain_lookup::list_domains(ctx, session, reader).await,
        Procedure::NumOfDefinedDomains => domain_lookup::num_of_defined_domains(ctx, session, reader).await,
        Procedure::ListDefinedDomains => domain_lookup::list_defined_domains(ctx, session, reader).await,

        Procedure::DomainCreateLinux => domain_lifecycle::create_linux(ctx, session, reader).await,
        Procedure::DomainDefineXml => domain_lifecycle::define_xml(ctx, session, reader).await,
        Procedure::DomainUndefine => domain_lifecycle::undefine(ctx, session, reader).await,
        Procedure::DomainCreate => domain_lifecycle::create(ctx, session, reader).await,
        Procedure::DomainDestroy => domain_lifecycle::destroy(ctx, session, reader).await,
        Procedure::DomainShutdown => domain_lifecycle::shutdown(ctx, session, reader).await,
        Procedure::DomainReboot => domain_lifecycle::reboot(ctx, session, reader).await,
        Procedure::DomainSuspend => domain_lifecycle::suspend(ctx, session, reader).await,
        Procedure::DomainResume => domain_lifecycle::resume(ctx, session, reader).await,
        Procedure::DomainSave => domain_lifecycle::save(ctx, session, reader).await,
        Procedure::DomainRestore => domain_lifecycle::restore(ctx, session, reader).await,
        Procedure::DomainCoreDump => domain_lifecycle::core_dump(ctx, session, reader).await,

        Procedure::DomainGetInfo => domain_inspect::get_info(ctx, session, reader).await,
        Procedure::DomainGetMaxMemory => domain_inspect::get_max_memory(ctx, session, reader).await,
        Procedure::DomainGetMaxVcpus => domain_inspect::get_max_vcpus(ctx, session, reader).await,
        Procedure::DomainGetOsType => domain_inspect::get_os_type(ctx, session, reader).await,
        Procedure::DomainGetAutostart => domain_inspect::get_autostart(ctx, session, reader).await,
        Procedure::DomainSetAutostart => domain_inspect::set_autostart(ctx, session, reader).await,
        Procedure::DomainSetMaxMemory => domain_inspect::set_max_memory(ctx, session, reader).await,
        Procedure::DomainSetMemory => domain_inspect::set_memory(ctx, session, reader).await,
        Procedure::DomainSetVcpus => domain_inspect::set_vcpus(ctx, session, reader).await,
        Procedure::DomainPinVcpu => domain_inspect::pin_vcpu(ctx, session, reader).await,
        Procedure::DomainGetVcpus => domain_inspect::get_vcpus(ctx, session, reader).await,
        Procedure::DomainDumpXml => domain_inspect::dump_xml(ctx, session, reader).await,
        Procedure::DomainAttachDevice => domain_inspect::attach_device(ctx, session, reader).await,
        Procedure::DomainDetachDevice => domain_inspect::detach_device(ctx, session, reader).await,
        Procedure::DomainBlockStats => domain_inspect::block_stats(ctx, session, reader).await,
        Procedure::DomainInterfaceStats => domain_inspect::interface_stats(ctx, session, reader).await,

        Procedure::DomainGetSchedulerType => scheduler::get_scheduler_type(ctx, session, reader).await,
        Procedure::DomainGetSchedulerParameters => scheduler::get_scheduler_parameters(ctx, session, reader).await,
        Procedure::DomainSetSchedulerParameters => scheduler::set_scheduler_parameters(ctx, session, reader).await,

        Procedure::DomainMigratePrepare => migrate::prepare(ctx, session, reader).await,
        Procedure::DomainMigratePerform => migrate::perform(ctx, session, reader).await,
        Procedure::DomainMigrateFinish => migrate::finish(ctx, session, reader).await,

        Procedure::NetworkLookupByName => network::lookup_by_name(ctx, session, reader).await,
        Procedure::NetworkLookupByUuid => network::lookup_by_uuid(ctx, session, reader).await,
        Procedure::NumOfNetworks => network::num_of_networks(ctx, session, reader).await,
        Procedure::ListNetworks => network::list_networks(ctx, session, reader).await,
        Procedure::NumOfDefinedNetworks => network::num_of_defined_networks(ctx, session, reader).await,
        Procedure::ListDefinedNetworks => network::list_defined_networks(ctx, session, reader).await,
        Procedure::NetworkCreateXml => network::create_xml(ctx, session, reader).await,
        Procedure::NetworkDefineXml => network::define_xml(ctx, session, reader).await,
        Procedure::NetworkCreate => network::create(ctx, session, reader).await,
        Procedure::NetworkDestroy => network::destroy(ctx, session, reader).await,
        Procedure::NetworkUndefine => network::undefine(ctx, session, reader).await,
        Procedure::NetworkDumpXml => network::dump_xml(ctx, session, reader).await,
        Procedure::NetworkGetAutostart => network::get_autostart(ctx, session, reader).await,
        Procedure::NetworkSetAutostart => network::set_autostart(ctx, session, reader).await,
        Procedure::NetworkGetBridgeName => network::get_bridge_name(ctx, session, reader).await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sasl::PlainEngine;
    use crate::test_support::MockDriver;

    #[tokio::test]
    async fn get_type_dispatches_to_the_connection_handler() {
        let ctx = ServerContext::new(Arc::new(MockDriver::new()), Arc::new(PlainEngine::new(Vec::new())), false);
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);
        let conn = ctx.driver.open("test", 0).await.unwrap();
        session.conn = Some(conn);
        let bytes = Vec::new();
        let mut r = Reader::new(&bytes);
        let reply = dispatch(Procedure::GetType, &ctx, &mut session, &mut r).await.unwrap();
        let reply_bytes = reply.into_bytes();
        let mut rr = Reader::new(&reply_bytes);
        assert_eq!(rr.read_string("type", crate::wire::caps::STRING_MAX).unwrap(), "test");
    }

    #[tokio::test]
    async fn unopened_connection_is_rejected_before_reaching_the_driver() {
        let ctx = ServerContext::new(Arc::new(MockDriver::new()), Arc::new(PlainEngine::new(Vec::new())), false);
        let mut session = ClientSession::new("127.0.0.1:1".parse().unwrap(), false);
        let bytes = Vec::new();
        let mut r = Reader::new(&bytes);
        assert!(matches!(
            dispatch(Procedure::GetType, &ctx, &mut session, &mut r).await,
            Err(HandlerError::NotOpen)
        ));
    }
}
