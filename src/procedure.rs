//! The procedure catalogue: every request number this dispatcher recognizes,
//! and the auth/readonly gating each one requires.
//!
//! Discriminants are explicit and stable — they are the wire representation,
//! not an implementation detail, so they are never renumbered once assigned.

/// One entry in the RPC catalogue. `proc` on the wire header indexes into
/// this set; an unrecognized number is rejected before a handler ever runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Procedure {
    /// Open a connection. Exempt from auth gating — it's how the session
    /// starts.
    Open = 1,
    /// Close the connection.
    Close = 2,
    /// List supported SASL/auth mechanisms.
    AuthList = 3,
    /// Begin SASL negotiation.
    AuthSaslInit = 4,
    /// Continue SASL negotiation.
    AuthSaslStart = 5,
    /// Continue SASL negotiation.
    AuthSaslStep = 6,

    /// Driver type string.
    GetType = 10,
    /// Driver version.
    GetVersion = 11,
    /// Host name.
    GetHostname = 12,
    /// Host capabilities XML.
    GetCapabilities = 13,
    /// Maximum vcpus for a domain type.
    GetMaxVcpus = 14,
    /// Whether an optional feature is supported.
    SupportsFeature = 15,
    /// Host node summary.
    NodeGetInfo = 16,

    /// Resolve a domain by numeric id.
    DomainLookupById = 20,
    /// Resolve a domain by name.
    DomainLookupByName = 21,
    /// Resolve a domain by UUID.
    DomainLookupByUuid = 22,
    /// Count of running domains.
    NumOfDomains = 23,
    /// Ids of running domains.
    ListDomains = 24,
    /// Count of defined-but-not-running domains.
    NumOfDefinedDomains = 25,
    /// Names of defined-but-not-running domains.
    ListDefinedDomains = 26,

    /// Create and start a transient domain from a legacy config blob.
    DomainCreateLinux = 30,
    /// Define a persistent domain from XML.
    DomainDefineXml = 31,
    /// Remove a persistent domain's configuration.
    DomainUndefine = 32,
    /// Start a previously defined domain.
    DomainCreate = 33,
    /// Stop and discard a domain.
    DomainDestroy = 34,
    /// Request a graceful shutdown.
    DomainShutdown = 35,
    /// Request a reboot.
    DomainReboot = 36,
    /// Suspend a running domain.
    DomainSuspend = 37,
    /// Resume a suspended domain.
    DomainResume = 38,
    /// Save running state and stop.
    DomainSave = 39,
    /// Restore previously saved state.
    DomainRestore = 40,
    /// Write a core dump.
    DomainCoreDump = 41,

    /// Point-in-time resource snapshot.
    DomainGetInfo = 50,
    /// Configured maximum memory.
    DomainGetMaxMemory = 51,
    /// Maximum vcpus this domain could be given.
    DomainGetMaxVcpus = 52,
    /// OS type string.
    DomainGetOsType = 53,
    /// Whether the domain autostarts.
    DomainGetAutostart = 54,
    /// Set whether the domain autostarts.
    DomainSetAutostart = 55,
    /// Set the configured maximum memory.
    DomainSetMaxMemory = 56,
    /// Set the current memory target.
    DomainSetMemory = 57,
    /// Set the vcpu count.
    DomainSetVcpus = 58,
    /// Pin one vcpu to physical CPUs.
    DomainPinVcpu = 59,
    /// Per-vcpu state and affinity.
    DomainGetVcpus = 60,
    /// Domain configuration XML.
    DomainDumpXml = 61,
    /// Hot-attach a device.
    DomainAttachDevice = 62,
    /// Hot-detach a device.
    DomainDetachDevice = 63,
    /// Block device I/O counters.
    DomainBlockStats = 64,
    /// Network interface I/O counters.
    DomainInterfaceStats = 65,

    /// Scheduler type name and parameter count.
    DomainGetSchedulerType = 70,
    /// Current scheduler parameters.
    DomainGetSchedulerParameters = 71,
    /// Apply scheduler parameters.
    DomainSetSchedulerParameters = 72,

    /// Prepare a migration target.
    DomainMigratePrepare = 80,
    /// Perform a migration from the source side.
    DomainMigratePerform = 81,
    /// Finish a migration on the destination side.
    DomainMigrateFinish = 82,

    /// Resolve a network by name.
    NetworkLookupByName = 90,
    /// Resolve a network by UUID.
    NetworkLookupByUuid = 91,
    /// Count of active networks.
    NumOfNetworks = 92,
    /// Names of active networks.
    ListNetworks = 93,
    /// Count of defined-but-inactive networks.
    NumOfDefinedNetworks = 94,
    /// Names of defined-but-inactive networks.
    ListDefinedNetworks = 95,
    /// Create and start a transient network from XML.
    NetworkCreateXml = 96,
    /// Define a persistent network from XML.
    NetworkDefineXml = 97,
    /// Start a previously defined network.
    NetworkCreate = 98,
    /// Stop a network.
    NetworkDestroy = 99,
    /// Remove a persistent network's configuration.
    NetworkUndefine = 100,
    /// Network configuration XML.
    NetworkDumpXml = 101,
    /// Whether the network autostarts.
    NetworkGetAutostart = 102,
    /// Set whether the network autostarts.
    NetworkSetAutostart = 103,
    /// The network's bridge device name.
    NetworkGetBridgeName = 104,
}

impl Procedure {
    /// Resolve a wire procedure number to a catalogue entry, or `None` if it
    /// names no recognized procedure.
    #[must_use]
    pub fn from_wire(value: u32) -> Option<Self> {
        Some(match value {
            1 => Self::Open,
            2 => Self::Close,
            3 => Self::AuthList,
            4 => Self::AuthSaslInit,
            5 => Self::AuthSaslStart,
            6 => Self::AuthSaslStep,
            10 => Self::GetType,
            11 => Self::GetVersion,
            12 => Self::GetHostname,
            13 => Self::GetCapabilities,
            14 => Self::GetMaxVcpus,
            15 => Self::SupportsFeature,
            16 => Self::NodeGetInfo,
            20 => Self::DomainLookupById,
            21 => Self::DomainLookupByName,
            22 => Self::DomainLookupByUuid,
            23 => Self::NumOfDomains,
            24 => Self::ListDomains,
            25 => Self::NumOfDefinedDomains,
            26 => Self::ListDefinedDomains,
            30 => Self::DomainCreateLinux,
            31 => Self::DomainDefineXml,
            32 => Self::DomainUndefine,
            33 => Self::DomainCreate,
            34 => Self::DomainDestroy,
            35 => Self::DomainShutdown,
            36 => Self::DomainReboot,
            37 => Self::DomainSuspend,
            38 => Self::DomainResume,
            39 => Self::DomainSave,
            40 => Self::DomainRestore,
            41 => Self::DomainCoreDump,
            50 => Self::DomainGetInfo,
            51 => Self::DomainGetMaxMemory,
            52 => Self::DomainGetMaxVcpus,
            53 => Self::DomainGetOsType,
            54 => Self::DomainGetAutostart,
            55 => Self::DomainSetAutostart,
            56 => Self::DomainSetMaxMemory,
            57 => Self::DomainSetMemory,
            58 => Self::DomainSetVcpus,
            59 => Self::DomainPinVcpu,
            60 => Self::DomainGetVcpus,
            61 => Self::DomainDumpXml,
            62 => Self::DomainAttachDevice,
            63 => Self::DomainDetachDevice,
            64 => Self::DomainBlockStats,
            65 => Self::DomainInterfaceStats,
            70 => Self::DomainGetSchedulerType,
            71 => Self::DomainGetSchedulerParameters,
            72 => Self::DomainSetSchedulerParameters,
            80 => Self::DomainMigratePrepare,
            81 => Self::DomainMigratePerform,
            82 => Self::DomainMigrateFinish,
            90 => Self::NetworkLookupByName,
            91 => Self::NetworkLookupByUuid,
            92 => Self::NumOfNetworks,
            93 => Self::ListNetworks,
            94 => Self::NumOfDefinedNetworks,
            95 => Self::ListDefinedNetworks,
            96 => Self::NetworkCreateXml,
            97 => Self::NetworkDefineXml,
            98 => Self::NetworkCreate,
            99 => Self::NetworkDestroy,
            100 => Self::NetworkUndefine,
            101 => Self::NetworkDumpXml,
            102 => Self::NetworkGetAutostart,
            103 => Self::NetworkSetAutostart,
            104 => Self::NetworkGetBridgeName,
            _ => return None,
        })
    }

    /// Whether this procedure may run before authentication completes. Only
    /// the four SASL negotiation procedures are admitted; everything else,
    /// including `Open`/`Close`, requires a fully authenticated session.
    #[must_use]
    pub const fn allowed_pre_auth(self) -> bool {
        matches!(self, Self::AuthList | Self::AuthSaslInit | Self::AuthSaslStart | Self::AuthSaslStep)
    }

    /// Whether this procedure mutates state and must therefore be rejected
    /// on a read-only connection.
    #[must_use]
    pub const fn requires_write(self) -> bool {
        !matches!(
            self,
            Self::Open
                | Self::Close
                | Self::AuthList
                | Self::AuthSaslInit
                | Self::AuthSaslStart
                | Self::AuthSaslStep
                | Self::GetType
                | Self::GetVersion
                | Self::GetHostname
                | Self::GetCapabilities
                | Self::GetMaxVcpus
                | Self::SupportsFeature
                | Self::NodeGetInfo
                | Self::DomainLookupById
                | Self::DomainLookupByName
                | Self::DomainLookupByUuid
                | Self::NumOfDomains
                | Self::ListDomains
                | Self::NumOfDefinedDomains
                | Self::ListDefinedDomains
                | Self::DomainGetInfo
                | Self::DomainGetMaxMemory
                | Self::DomainGetMaxVcpus
                | Self::DomainGetOsType
                | Self::DomainGetAutostart
                | Self::DomainGetVcpus
                | Self::DomainDumpXml
                | Self::DomainBlockStats
                | Self::DomainInterfaceStats
                | Self::DomainGetSchedulerType
                | Self::DomainGetSchedulerParameters
                | Self::NetworkLookupByName
                | Self::NetworkLookupByUuid
                | Self::NumOfNetworks
                | Self::ListNetworks
                | Self::NumOfDefinedNetworks
                | Self::ListDefinedNetworks
                | Self::NetworkDumpXml
                | Self::NetworkGetAutostart
                | Self::NetworkGetBridgeName
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_discriminant() {
        let procs = [
            Procedure::Open,
            Procedure::Close,
            Procedure::AuthList,
            Procedure::DomainDestroy,
            Procedure::NetworkGetBridgeName,
        ];
        for proc in procs {
            assert_eq!(Procedure::from_wire(proc as u32), Some(proc));
        }
    }

    #[test]
    fn unknown_number_is_none() {
        assert_eq!(Procedure::from_wire(9999), None);
    }

    #[test]
    fn only_the_sasl_procedures_are_allowed_pre_auth() {
        assert!(Procedure::AuthSaslInit.allowed_pre_auth());
        assert!(!Procedure::Open.allowed_pre_auth());
        assert!(!Procedure::Close.allowed_pre_auth());
        assert!(!Procedure::DomainDestroy.allowed_pre_auth());
    }

    #[test]
    fn reads_do_not_require_write_but_destroy_does() {
        assert!(!Procedure::DomainGetInfo.requires_write());
        assert!(Procedure::DomainDestroy.requires_write());
    }
}
