//! An in-memory [`DriverFacade`] used by this crate's own tests and by
//! anything under `feature = "test-support"`. Not a faithful hypervisor: it
//! keeps just enough state (a domain/network registry plus a refcount per
//! handle) to exercise the dispatch core's logic without a real driver.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::driver::{
    BlockStats, ConnId, Domain, DriverError, DriverFacade, InterfaceStats, Network, NodeInfo, VcpuInfo,
};
use crate::wire::SchedParamValue;

struct ConnState {
    readonly: bool,
    domains: HashMap<[u8; 16], Domain>,
    networks: HashMap<[u8; 16], Network>,
    refcounts: HashMap<[u8; 16], usize>,
}

/// In-memory stand-in for a real driver binding.
pub struct MockDriver {
    conns: Mutex<HashMap<u64, ConnState>>,
    next_conn: Mutex<u64>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Build an empty mock with no open connections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            conns: Mutex::new(HashMap::new()),
            next_conn: Mutex::new(0),
        }
    }

    /// Seed a domain into `conn`'s registry, as if previously defined.
    pub async fn seed_domain(&self, conn: ConnId, name: &str, uuid: [u8; 16], id: i32) {
        let mut conns = self.conns.lock().expect("mock driver mutex poisoned");
        let state = conns.get_mut(&conn.0).expect("unknown connection");
        state.domains.insert(
            uuid,
            Domain {
                name: name.to_owned(),
                uuid,
                id,
            },
        );
    }

    /// Seed a network into `conn`'s registry.
    pub async fn seed_network(&self, conn: ConnId, name: &str, uuid: [u8; 16]) {
        let mut conns = self.conns.lock().expect("mock driver mutex poisoned");
        let state = conns.get_mut(&conn.0).expect("unknown connection");
        state.networks.insert(
            uuid,
            Network {
                name: name.to_owned(),
                uuid,
            },
        );
    }

    /// Current outstanding-handle count for a domain UUID on `conn`.
    pub async fn refcount(&self, conn: ConnId, uuid: [u8; 16]) -> usize {
        let conns = self.conns.lock().expect("mock driver mutex poisoned");
        conns
            .get(&conn.0)
            .and_then(|state| state.refcounts.get(&uuid).copied())
            .unwrap_or(0)
    }
}

#[async_trait]
impl DriverFacade for MockDriver {
    async fn open(&self, _name: &str, flags: u32) -> Option<ConnId> {
        let mut next = self.next_conn.lock().expect("mock driver mutex poisoned");
        let id = *next;
        *next += 1;
        let mut conns = self.conns.lock().expect("mock driver mutex poisoned");
        conns.insert(
            id,
            ConnState {
                readonly: flags & 1 != 0,
                domains: HashMap::new(),
                networks: HashMap::new(),
                refcounts: HashMap::new(),
            },
        );
        Some(ConnId(id))
    }

    async fn close(&self, conn: ConnId) {
        self.conns.lock().expect("mock driver mutex poisoned").remove(&conn.0);
    }

    fn release_domain(&self, conn: ConnId, domain: Domain) {
        let mut conns = self.conns.lock().expect("mock driver mutex poisoned");
        if let Some(state) = conns.get_mut(&conn.0) {
            if let Some(count) = state.refcounts.get_mut(&domain.uuid) {
                *count = count.saturating_sub(1);
            }
        }
    }

    fn release_network(&self, conn: ConnId, network: Network) {
        let mut conns = self.conns.lock().expect("mock driver mutex poisoned");
        if let Some(state) = conns.get_mut(&conn.0) {
            if let Some(count) = state.refcounts.get_mut(&network.uuid) {
                *count = count.saturating_sub(1);
            }
        }
    }

    async fn get_type(&self, _conn: ConnId) -> String {
        "test".to_owned()
    }

    async fn get_version(&self, _conn: ConnId) -> u64 {
        1
    }

    async fn get_hostname(&self, _conn: ConnId) -> String {
        "mock-host".to_owned()
    }

    async fn get_capabilities(&self, _conn: ConnId) -> String {
        "<capabilities/>".to_owned()
    }

    async fn get_max_vcpus(&self, _conn: ConnId, _domain_type: Option<&str>) -> i32 {
        64
    }

    async fn supports_feature(&self, _conn: ConnId, _feature: i32) -> bool {
        false
    }

    async fn node_get_info(&self, _conn: ConnId) -> Option<NodeInfo> {
        Some(NodeInfo {
            model: "x86_64".to_owned(),
            memory_kb: 16 * 1024 * 1024,
            cpus: 8,
            mhz: 2400,
            nodes: 1,
            sockets: 1,
            cores: 8,
            threads: 1,
        })
    }

    async fn domain_lookup_by_id(&self, conn: ConnId, id: i32) -> Option<Domain> {
        let conns = self.conns.lock().expect("mock driver mutex poisoned");
        let state = conns.get(&conn.0)?;
        state.domains.values().find(|d| d.id == id).cloned()
    }

    async fn domain_lookup_by_name(&self, conn: ConnId, name: &str) -> Option<Domain> {
        let conns = self.conns.lock().expect("mock driver mutex poisoned");
        let state = conns.get(&conn.0)?;
        state.domains.values().find(|d| d.name == name).cloned()
    }

    async fn domain_lookup_by_uuid(&self, conn: ConnId, uuid: &[u8; 16]) -> Option<Domain> {
        let mut conns = self.conns.lock().expect("mock driver mutex poisoned");
        let state = conns.get_mut(&conn.0)?;
        let domain = state.domains.get(uuid).cloned()?;
        *state.refcounts.entry(*uuid).or_insert(0) += 1;
        Some(domain)
    }

    async fn num_of_domains(&self, conn: ConnId) -> i32 {
        let conns = self.conns.lock().expect("mock driver mutex poisoned");
        conns.get(&conn.0).map_or(0, |state| i32::try_from(state.domains.len()).unwrap_or(i32::MAX))
    }

    async fn list_domains(&self, conn: ConnId, max: usize) -> Vec<i32> {
        let conns = self.conns.lock().expect("mock driver mutex poisoned");
        conns
            .get(&conn.0)
            .map(|state| state.domains.values().take(max).map(|d| d.id).collect())
            .unwrap_or_default()
    }

    async fn num_of_defined_domains(&self, _conn: ConnId) -> i32 {
        0
    }

    async fn list_defined_domains(&self, _conn: ConnId, _max: usize) -> Vec<String> {
        Vec::new()
    }

    async fn domain_create_linux(&self, _conn: ConnId, _xml: &str, _flags: u32) -> Result<Domain, DriverError> {
        Err(unsupported())
    }

    async fn domain_define_xml(&self, _conn: ConnId, _xml: &str) -> Result<Domain, DriverError> {
        Err(unsupported())
    }

    async fn domain_undefine(&self, _conn: ConnId, _domain: &Domain) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_create(&self, _conn: ConnId, _domain: &Domain) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_destroy(&self, conn: ConnId, domain: Domain) -> Result<(), DriverError> {
        let mut conns = self.conns.lock().expect("mock driver mutex poisoned");
        if let Some(state) = conns.get_mut(&conn.0) {
            state.domains.remove(&domain.uuid);
            if let Some(count) = state.refcounts.get_mut(&domain.uuid) {
                *count = count.saturating_sub(1);
            }
        }
        Ok(())
    }

    async fn domain_shutdown(&self, _conn: ConnId, _domain: &Domain) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_reboot(&self, _conn: ConnId, _domain: &Domain, _flags: u32) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_suspend(&self, _conn: ConnId, _domain: &Domain) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_resume(&self, _conn: ConnId, _domain: &Domain) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_save(&self, _conn: ConnId, _domain: &Domain, _path: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_restore(&self, _conn: ConnId, _path: &str) -> Result<(), DriverError> {
        Err(unsupported())
    }

    async fn domain_core_dump(&self, _conn: ConnId, _domain: &Domain, _path: &str, _flags: u32) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_get_info(&self, _conn: ConnId, _domain: &Domain) -> Result<crate::driver::DomainInfo, DriverError> {
        Ok(crate::driver::DomainInfo {
            state: 1,
            max_mem_kb: 1_048_576,
            memory_kb: 524_288,
            nr_virt_cpu: 2,
            cpu_time_ns: 0,
        })
    }

    async fn domain_get_max_memory(&self, _conn: ConnId, _domain: &Domain) -> Result<u64, DriverError> {
        Ok(1_048_576)
    }

    async fn domain_get_max_vcpus(&self, _conn: ConnId, _domain: &Domain) -> Result<u32, DriverError> {
        Ok(4)
    }

    async fn domain_get_os_type(&self, _conn: ConnId, _domain: &Domain) -> Result<String, DriverError> {
        Ok("hvm".to_owned())
    }

    async fn domain_get_autostart(&self, _conn: ConnId, _domain: &Domain) -> Result<bool, DriverError> {
        Ok(false)
    }

    async fn domain_set_autostart(&self, _conn: ConnId, _domain: &Domain, _autostart: bool) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_set_max_memory(&self, _conn: ConnId, _domain: &Domain, _kb: u64) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_set_memory(&self, _conn: ConnId, _domain: &Domain, _kb: u64) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_set_vcpus(&self, _conn: ConnId, _domain: &Domain, _count: u32) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_pin_vcpu(&self, _conn: ConnId, _domain: &Domain, _vcpu: u32, _cpumap: &[u8]) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_get_vcpus(
        &self,
        _conn: ConnId,
        _domain: &Domain,
        _maxinfo: usize,
        _maplen: usize,
    ) -> Result<Vec<VcpuInfo>, DriverError> {
        Ok(Vec::new())
    }

    async fn domain_dump_xml(&self, _conn: ConnId, domain: &Domain, _flags: u32) -> Result<String, DriverError> {
        Ok(format!("<domain><name>{}</name></domain>", domain.name))
    }

    async fn domain_attach_device(&self, _conn: ConnId, _domain: &Domain, _xml: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_detach_device(&self, _conn: ConnId, _domain: &Domain, _xml: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn domain_block_stats(&self, _conn: ConnId, _domain: &Domain, _path: &str) -> Result<BlockStats, DriverError> {
        Ok(BlockStats::default())
    }

    async fn domain_interface_stats(
        &self,
        _conn: ConnId,
        _domain: &Domain,
        _device: &str,
    ) -> Result<InterfaceStats, DriverError> {
        Ok(InterfaceStats::default())
    }

    async fn domain_get_scheduler_type(&self, _conn: ConnId, _domain: &Domain) -> Result<(String, u32), DriverError> {
        Ok(("fair".to_owned(), 1))
    }

    async fn domain_get_scheduler_parameters(
        &self,
        _conn: ConnId,
        _domain: &Domain,
        _nparams: usize,
    ) -> Result<Vec<(String, SchedParamValue)>, DriverError> {
        Ok(vec![("weight".to_owned(), SchedParamValue::Uint(100))])
    }

    async fn domain_set_scheduler_parameters(
        &self,
        _conn: ConnId,
        _domain: &Domain,
        _params: &[(String, SchedParamValue)],
    ) -> Result<(), DriverError> {
        Ok(())
    }

    async fn migrate_prepare(
        &self,
        _conn: ConnId,
        _uri_in: Option<&str>,
        _cookie_in: &[u8],
    ) -> Result<(Option<String>, Vec<u8>), DriverError> {
        Ok((None, Vec::new()))
    }

    async fn migrate_perform(
        &self,
        _conn: ConnId,
        _domain: &Domain,
        _cookie: &[u8],
        _uri: &str,
    ) -> Result<(), DriverError> {
        Ok(())
    }

    async fn migrate_finish(&self, _conn: ConnId, dname: &str, _cookie: &[u8]) -> Result<Domain, DriverError> {
        Ok(Domain {
            name: dname.to_owned(),
            uuid: [0_u8; 16],
            id: -1,
        })
    }

    async fn network_lookup_by_name(&self, conn: ConnId, name: &str) -> Option<Network> {
        let conns = self.conns.lock().expect("mock driver mutex poisoned");
        let state = conns.get(&conn.0)?;
        state.networks.values().find(|n| n.name == name).cloned()
    }

    async fn network_lookup_by_uuid(&self, conn: ConnId, uuid: &[u8; 16]) -> Option<Network> {
        let mut conns = self.conns.lock().expect("mock driver mutex poisoned");
        let state = conns.get_mut(&conn.0)?;
        let network = state.networks.get(uuid).cloned()?;
        *state.refcounts.entry(*uuid).or_insert(0) += 1;
        Some(network)
    }

    async fn num_of_networks(&self, conn: ConnId) -> i32 {
        let conns = self.conns.lock().expect("mock driver mutex poisoned");
        conns.get(&conn.0).map_or(0, |state| i32::try_from(state.networks.len()).unwrap_or(i32::MAX))
    }

    async fn list_networks(&self, conn: ConnId, max: usize) -> Vec<String> {
        let conns = self.conns.lock().expect("mock driver mutex poisoned");
        conns
            .get(&conn.0)
            .map(|state| state.networks.values().take(max).map(|n| n.name.clone()).collect())
            .unwrap_or_default()
    }

    async fn num_of_defined_networks(&self, _conn: ConnId) -> i32 {
        0
    }

    async fn list_defined_networks(&self, _conn: ConnId, _max: usize) -> Vec<String> {
        Vec::new()
    }

    async fn network_create_xml(&self, _conn: ConnId, _xml: &str) -> Result<Network, DriverError> {
        Err(unsupported())
    }

    async fn network_define_xml(&self, _conn: ConnId, _xml: &str) -> Result<Network, DriverError> {
        Err(unsupported())
    }

    async fn network_create(&self, _conn: ConnId, _network: &Network) -> Result<(), DriverError> {
        Ok(())
    }

    async fn network_destroy(&self, _conn: ConnId, _network: &Network) -> Result<(), DriverError> {
        Ok(())
    }

    async fn network_undefine(&self, _conn: ConnId, _network: &Network) -> Result<(), DriverError> {
        Ok(())
    }

    async fn network_dump_xml(&self, _conn: ConnId, network: &Network, _flags: u32) -> Result<String, DriverError> {
        Ok(format!("<network><name>{}</name></network>", network.name))
    }

    async fn network_get_autostart(&self, _conn: ConnId, _network: &Network) -> Result<bool, DriverError> {
        Ok(false)
    }

    async fn network_set_autostart(&self, _conn: ConnId, _network: &Network, _autostart: bool) -> Result<(), DriverError> {
        Ok(())
    }

    async fn network_get_bridge_name(&self, _conn: ConnId, network: &Network) -> Result<String, DriverError> {
        Ok(format!("virbr-{}", network.name))
    }

    async fn get_last_error(&self, _conn: Option<ConnId>) -> Option<DriverError> {
        None
    }
}

fn unsupported() -> DriverError {
    DriverError {
        code: 1,
        domain: 0,
        level: 2,
        message: "operation not supported by the mock driver".to_owned(),
        str1: None,
        str2: None,
        str3: None,
        int1: 0,
        int2: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_assigns_distinct_connection_ids() {
        let driver = MockDriver::new();
        let a = driver.open("a", 0).await.unwrap();
        let b = driver.open("b", 0).await.unwrap();
        assert_ne!(a.0, b.0);
    }

    #[tokio::test]
    async fn readonly_flag_is_recorded() {
        let driver = MockDriver::new();
        let conn = driver.open("a", 1).await.unwrap();
        let conns = driver.conns.lock().unwrap();
        assert!(conns.get(&conn.0).unwrap().readonly);
    }
}
