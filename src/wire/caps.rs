//! Per-field maxima for variable-length arrays and opaque buffers.
//!
//! Every cap here is checked before the corresponding allocation, not after,
//! so a hostile length prefix cannot be used to force a large allocation
//! ahead of the length actually being validated.

/// Maximum entries returned by `ListDomains` (enumerates running domain ids).
pub const DOMAIN_ID_LIST_MAX: usize = 16_384;
/// Maximum entries returned by `ListDefinedDomains` (enumerates domain names).
pub const DOMAIN_NAME_LIST_MAX: usize = 16_384;
/// Maximum entries returned by the network list/enumeration calls.
pub const NETWORK_NAME_LIST_MAX: usize = 4_096;
/// Maximum `maxinfo` accepted by `GetVcpus`.
pub const VCPUINFO_MAX: usize = 2_048;
/// Maximum `maxinfo * maplen` accepted by `GetVcpus`.
pub const CPUMAPS_MAX: usize = 262_144;
/// Maximum cpumap length accepted by `PinVcpu`.
pub const CPUMAP_MAX: usize = 1_024;
/// Maximum `nparams` accepted by the scheduler-parameter calls.
pub const SCHEDULER_PARAMETERS_MAX: usize = 64;
/// Maximum length of a single SASL negotiation data buffer.
pub const AUTH_SASL_DATA_MAX: usize = 65_536;
/// Maximum length of a generic string field (names, paths, URIs).
pub const STRING_MAX: usize = 65_536;
/// Maximum length of an XML document body (`DumpXml`, `DefineXml`, ...).
pub const XML_MAX: usize = 4 * 1024 * 1024;
/// Maximum length of an opaque migration cookie.
pub const MIGRATE_COOKIE_MAX: usize = 65_536;
/// Maximum length of a scheduler parameter field name before truncation.
pub const SCHED_PARAM_FIELD_LENGTH: usize = 80;
