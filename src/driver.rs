//! The driver facade: the narrow, opaque interface this crate uses to talk
//! to whatever hypervisor library is actually linked in. Every operation
//! declared here is assumed synchronous and short by the concurrency model
//! (see crate docs); the methods are `async fn` for uniformity with the rest
//! of the stack, not because any real implementation is expected to suspend.
//!
//! `release_domain`/`release_network` are the one pair of exceptions: they
//! are plain synchronous bookkeeping (refcount decrement), called from
//! [`crate::handle::DomainGuard`]/[`NetworkGuard`]'s `Drop` impls, which
//! cannot themselves be async.

use async_trait::async_trait;

use crate::wire::SchedParamValue;

/// Opaque identifier for a live driver connection (`client.conn`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub(crate) u64);

/// A live domain handle: the three wire-visible fields plus whatever
/// refcount bookkeeping the driver facade keeps internally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    /// Domain name.
    pub name: String,
    /// 16-byte UUID.
    pub uuid: [u8; 16],
    /// Numeric id (only meaningful while running; `-1` when shut off).
    pub id: i32,
}

/// A live network handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    /// Network name.
    pub name: String,
    /// 16-byte UUID.
    pub uuid: [u8; 16],
}

/// Host node summary returned by `NodeGetInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// CPU architecture/model string.
    pub model: String,
    /// Total usable memory, in kibibytes.
    pub memory_kb: u64,
    /// Number of active logical CPUs.
    pub cpus: u32,
    /// CPU clock speed in MHz.
    pub mhz: u32,
    /// Number of NUMA nodes.
    pub nodes: u32,
    /// Sockets per node.
    pub sockets: u32,
    /// Cores per socket.
    pub cores: u32,
    /// Threads per core.
    pub threads: u32,
}

/// Point-in-time resource snapshot returned by `GetInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainInfo {
    /// Running/shutoff/paused, encoded as the driver's own state codes.
    pub state: u8,
    /// Configured maximum memory, in kibibytes.
    pub max_mem_kb: u64,
    /// Current memory usage, in kibibytes.
    pub memory_kb: u64,
    /// Number of virtual CPUs.
    pub nr_virt_cpu: u32,
    /// Cumulative CPU time, in nanoseconds.
    pub cpu_time_ns: u64,
}

/// Per-vcpu runtime info returned by `GetVcpus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcpuInfo {
    /// Vcpu number.
    pub number: u32,
    /// Running/blocked/offline, driver-defined encoding.
    pub state: u8,
    /// Cumulative CPU time, in nanoseconds.
    pub cpu_time_ns: u64,
    /// Physical CPU currently running this vcpu, or `-1`.
    pub cpu: i32,
}

/// Block device I/O counters returned by `BlockStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockStats {
    /// Bytes read.
    pub rd_bytes: i64,
    /// Read requests.
    pub rd_req: i64,
    /// Bytes written.
    pub wr_bytes: i64,
    /// Write requests.
    pub wr_req: i64,
    /// Errors observed.
    pub errs: i64,
}

/// Network interface I/O counters returned by `InterfaceStats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterfaceStats {
    /// Bytes received.
    pub rx_bytes: i64,
    /// Receive packets.
    pub rx_packets: i64,
    /// Receive errors.
    pub rx_errs: i64,
    /// Receive drops.
    pub rx_drop: i64,
    /// Bytes transmitted.
    pub tx_bytes: i64,
    /// Transmit packets.
    pub tx_packets: i64,
    /// Transmit errors.
    pub tx_errs: i64,
    /// Transmit drops.
    pub tx_drop: i64,
}

/// A driver-level error, carrying the same fields the wire error record
/// needs so the error synthesizer (`crate::error`) can project it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    /// Numeric error code.
    pub code: i32,
    /// Originating subsystem/domain code.
    pub domain: i32,
    /// Severity level.
    pub level: i32,
    /// Human-readable message.
    pub message: String,
    /// First free-form string slot.
    pub str1: Option<String>,
    /// Second free-form string slot.
    pub str2: Option<String>,
    /// Third free-form string slot.
    pub str3: Option<String>,
    /// First free-form integer slot.
    pub int1: i32,
    /// Second free-form integer slot.
    pub int2: i32,
}

/// The narrow interface this crate uses to drive the local hypervisor. Out
/// of scope to implement "for real" here — a production build links a
/// binding to the actual driver library against this trait; tests and this
/// crate's own examples use [`crate::test_support::MockDriver`].
#[async_trait]
pub trait DriverFacade: Send + Sync {
    /// Open a connection, honoring `readonly` if set. Returns `None` if the
    /// driver refuses (e.g. the name does not resolve).
    async fn open(&self, name: &str, flags: u32) -> Option<ConnId>;
    /// Close a previously opened connection.
    async fn close(&self, conn: ConnId);

    /// Release a previously acquired domain handle. Synchronous: called from
    /// `Drop`, which cannot await.
    fn release_domain(&self, conn: ConnId, domain: Domain);
    /// Release a previously acquired network handle. Synchronous, same
    /// reason as `release_domain`.
    fn release_network(&self, conn: ConnId, network: Network);

    /// Driver/daemon type string (`GetType`).
    async fn get_type(&self, conn: ConnId) -> String;
    /// Driver version (`GetVersion`).
    async fn get_version(&self, conn: ConnId) -> u64;
    /// Host name (`GetHostname`).
    async fn get_hostname(&self, conn: ConnId) -> String;
    /// Host capabilities XML (`GetCapabilities`).
    async fn get_capabilities(&self, conn: ConnId) -> String;
    /// Maximum vcpus supported for a given domain type, or overall if `None`.
    async fn get_max_vcpus(&self, conn: ConnId, domain_type: Option<&str>) -> i32;
    /// Whether the named optional feature is supported.
    async fn supports_feature(&self, conn: ConnId, feature: i32) -> bool;
    /// Host node summary (`NodeGetInfo`).
    async fn node_get_info(&self, conn: ConnId) -> Option<NodeInfo>;

    /// Resolve a domain by numeric id.
    async fn domain_lookup_by_id(&self, conn: ConnId, id: i32) -> Option<Domain>;
    /// Resolve a domain by name.
    async fn domain_lookup_by_name(&self, conn: ConnId, name: &str) -> Option<Domain>;
    /// Resolve a domain by UUID.
    async fn domain_lookup_by_uuid(&self, conn: ConnId, uuid: &[u8; 16]) -> Option<Domain>;
    /// Count of running domains.
    async fn num_of_domains(&self, conn: ConnId) -> i32;
    /// Ids of running domains, already capped by the caller.
    async fn list_domains(&self, conn: ConnId, max: usize) -> Vec<i32>;
    /// Count of defined-but-not-running domains.
    async fn num_of_defined_domains(&self, conn: ConnId) -> i32;
    /// Names of defined-but-not-running domains, already capped by the caller.
    async fn list_defined_domains(&self, conn: ConnId, max: usize) -> Vec<String>;

    /// Create and start a transient domain from a legacy config blob.
    async fn domain_create_linux(&self, conn: ConnId, xml: &str, flags: u32) -> Result<Domain, DriverError>;
    /// Define a persistent domain from XML without starting it.
    async fn domain_define_xml(&self, conn: ConnId, xml: &str) -> Result<Domain, DriverError>;
    /// Remove a persistent domain's configuration.
    async fn domain_undefine(&self, conn: ConnId, domain: &Domain) -> Result<(), DriverError>;
    /// Start a previously defined domain.
    async fn domain_create(&self, conn: ConnId, domain: &Domain) -> Result<(), DriverError>;
    /// Stop and discard a domain; the driver consumes the handle, including
    /// reversing the reference the caller's lookup acquired — callers pass
    /// the domain by value precisely so there is nothing left to release
    /// afterwards.
    async fn domain_destroy(&self, conn: ConnId, domain: Domain) -> Result<(), DriverError>;
    /// Request a graceful shutdown.
    async fn domain_shutdown(&self, conn: ConnId, domain: &Domain) -> Result<(), DriverError>;
    /// Request a reboot.
    async fn domain_reboot(&self, conn: ConnId, domain: &Domain, flags: u32) -> Result<(), DriverError>;
    /// Suspend (pause) a running domain.
    async fn domain_suspend(&self, conn: ConnId, domain: &Domain) -> Result<(), DriverError>;
    /// Resume a suspended domain.
    async fn domain_resume(&self, conn: ConnId, domain: &Domain) -> Result<(), DriverError>;
    /// Save running state to `path` and stop the domain.
    async fn domain_save(&self, conn: ConnId, domain: &Domain, path: &str) -> Result<(), DriverError>;
    /// Restore a domain previously saved to `path`.
    async fn domain_restore(&self, conn: ConnId, path: &str) -> Result<(), DriverError>;
    /// Write a core dump to `path`.
    async fn domain_core_dump(&self, conn: ConnId, domain: &Domain, path: &str, flags: u32) -> Result<(), DriverError>;

    /// Point-in-time resource snapshot.
    async fn domain_get_info(&self, conn: ConnId, domain: &Domain) -> Result<DomainInfo, DriverError>;
    /// Configured maximum memory.
    async fn domain_get_max_memory(&self, conn: ConnId, domain: &Domain) -> Result<u64, DriverError>;
    /// Maximum vcpus this particular domain could be given.
    async fn domain_get_max_vcpus(&self, conn: ConnId, domain: &Domain) -> Result<u32, DriverError>;
    /// OS type string (`"hvm"`, `"linux"`, ...).
    async fn domain_get_os_type(&self, conn: ConnId, domain: &Domain) -> Result<String, DriverError>;
    /// Whether the domain autostarts.
    async fn domain_get_autostart(&self, conn: ConnId, domain: &Domain) -> Result<bool, DriverError>;
    /// Set whether the domain autostarts.
    async fn domain_set_autostart(&self, conn: ConnId, domain: &Domain, autostart: bool) -> Result<(), DriverError>;
    /// Set the configured maximum memory.
    async fn domain_set_max_memory(&self, conn: ConnId, domain: &Domain, kb: u64) -> Result<(), DriverError>;
    /// Set the current memory target.
    async fn domain_set_memory(&self, conn: ConnId, domain: &Domain, kb: u64) -> Result<(), DriverError>;
    /// Set the vcpu count.
    async fn domain_set_vcpus(&self, conn: ConnId, domain: &Domain, count: u32) -> Result<(), DriverError>;
    /// Pin one vcpu to the physical CPUs set in `cpumap`.
    async fn domain_pin_vcpu(&self, conn: ConnId, domain: &Domain, vcpu: u32, cpumap: &[u8]) -> Result<(), DriverError>;
    /// Per-vcpu state and affinity, capped by the caller.
    async fn domain_get_vcpus(
        &self,
        conn: ConnId,
        domain: &Domain,
        maxinfo: usize,
        maplen: usize,
    ) -> Result<Vec<VcpuInfo>, DriverError>;
    /// Domain configuration XML.
    async fn domain_dump_xml(&self, conn: ConnId, domain: &Domain, flags: u32) -> Result<String, DriverError>;
    /// Hot-attach a device described by `xml`.
    async fn domain_attach_device(&self, conn: ConnId, domain: &Domain, xml: &str) -> Result<(), DriverError>;
    /// Hot-detach a device described by `xml`.
    async fn domain_detach_device(&self, conn: ConnId, domain: &Domain, xml: &str) -> Result<(), DriverError>;
    /// Block device I/O counters.
    async fn domain_block_stats(&self, conn: ConnId, domain: &Domain, path: &str) -> Result<BlockStats, DriverError>;
    /// Network interface I/O counters.
    async fn domain_interface_stats(
        &self,
        conn: ConnId,
        domain: &Domain,
        device: &str,
    ) -> Result<InterfaceStats, DriverError>;

    /// Scheduler type name and parameter count.
    async fn domain_get_scheduler_type(&self, conn: ConnId, domain: &Domain) -> Result<(String, u32), DriverError>;
    /// Current scheduler parameters, named and capped by the caller.
    async fn domain_get_scheduler_parameters(
        &self,
        conn: ConnId,
        domain: &Domain,
        nparams: usize,
    ) -> Result<Vec<(String, SchedParamValue)>, DriverError>;
    /// Apply scheduler parameters.
    async fn domain_set_scheduler_parameters(
        &self,
        conn: ConnId,
        domain: &Domain,
        params: &[(String, SchedParamValue)],
    ) -> Result<(), DriverError>;

    /// Prepare a migration target; returns an optional URI the source should
    /// connect to and an opaque cookie.
    async fn migrate_prepare(
        &self,
        conn: ConnId,
        uri_in: Option<&str>,
        cookie_in: &[u8],
    ) -> Result<(Option<String>, Vec<u8>), DriverError>;
    /// Perform a migration from the source side.
    async fn migrate_perform(
        &self,
        conn: ConnId,
        domain: &Domain,
        cookie: &[u8],
        uri: &str,
    ) -> Result<(), DriverError>;
    /// Finish a migration on the destination side, returning the domain now
    /// live there.
    async fn migrate_finish(&self, conn: ConnId, dname: &str, cookie: &[u8]) -> Result<Domain, DriverError>;

    /// Resolve a network by name.
    async fn network_lookup_by_name(&self, conn: ConnId, name: &str) -> Option<Network>;
    /// Resolve a network by UUID.
    async fn network_lookup_by_uuid(&self, conn: ConnId, uuid: &[u8; 16]) -> Option<Network>;
    /// Count of active networks.
    async fn num_of_networks(&self, conn: ConnId) -> i32;
    /// Names of active networks, already capped by the caller.
    async fn list_networks(&self, conn: ConnId, max: usize) -> Vec<String>;
    /// Count of defined-but-inactive networks.
    async fn num_of_defined_networks(&self, conn: ConnId) -> i32;
    /// Names of defined-but-inactive networks, already capped by the caller.
    async fn list_defined_networks(&self, conn: ConnId, max: usize) -> Vec<String>;
    /// Create and start a transient network from XML.
    async fn network_create_xml(&self, conn: ConnId, xml: &str) -> Result<Network, DriverError>;
    /// Define a persistent network from XML without starting it.
    async fn network_define_xml(&self, conn: ConnId, xml: &str) -> Result<Network, DriverError>;
    /// Start a previously defined network.
    async fn network_create(&self, conn: ConnId, network: &Network) -> Result<(), DriverError>;
    /// Stop a network.
    async fn network_destroy(&self, conn: ConnId, network: &Network) -> Result<(), DriverError>;
    /// Remove a persistent network's configuration.
    async fn network_undefine(&self, conn: ConnId, network: &Network) -> Result<(), DriverError>;
    /// Network configuration XML.
    async fn network_dump_xml(&self, conn: ConnId, network: &Network, flags: u32) -> Result<String, DriverError>;
    /// Whether the network autostarts.
    async fn network_get_autostart(&self, conn: ConnId, network: &Network) -> Result<bool, DriverError>;
    /// Set whether the network autostarts.
    async fn network_set_autostart(&self, conn: ConnId, network: &Network, autostart: bool) -> Result<(), DriverError>;
    /// The network's bridge device name.
    async fn network_get_bridge_name(&self, conn: ConnId, network: &Network) -> Result<String, DriverError>;

    /// The last structured error recorded for `conn`, if any. Consulted by
    /// the error synthesizer when a handler returns `-1`.
    async fn get_last_error(&self, conn: Option<ConnId>) -> Option<DriverError>;
}
