//! Shared CLI type definitions for virtd build and runtime.
//!
//! This crate provides CLI argument and configuration types used by both the
//! `build.rs` script (for man page generation) and the runtime binary.
//! Extracting these types into a separate crate avoids brittle `#[path = ...]`
//! includes and keeps build-time and runtime dependencies cleanly separated.

// FIXME: File-wide suppressions are unavoidable here. Clap and OrthoConfig derive macros
// inject generated code throughout the module, and there is no mechanism to narrow
// the scope without restructuring the crate.
#![expect(
    non_snake_case,
    reason = "Clap/OrthoConfig derive macros generate helper modules with uppercase names"
)]
#![expect(
    missing_docs,
    reason = "OrthoConfig and Clap derive macros generate items that cannot be documented"
)]

use clap::{Args, Parser};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

/// Runtime configuration for the `virtd` binary.
///
/// The default bind address `0.0.0.0:16509` matches the conventional
/// libvirt-style RPC port. Production deployments should bind to a specific
/// interface and enable `readonly`/`sasl_required` as the deployment demands.
#[derive(Args, OrthoConfig, Serialize, Deserialize, Default, Debug, Clone)]
#[ortho_config(prefix = "VIRTD_")]
pub struct AppConfig {
    /// Listen address for the RPC dispatch core.
    #[ortho_config(default = "0.0.0.0:16509".to_owned())]
    #[arg(long)]
    pub bind: String,
    /// Force every session on this listener into the read-only driver flavor.
    #[ortho_config(default = false)]
    #[arg(long)]
    pub readonly: bool,
    /// Require SASL negotiation before admitting non-auth procedures.
    #[ortho_config(default = false)]
    #[arg(long)]
    pub sasl_required: bool,
}

/// Top-level CLI entry point consumed by the binary.
#[derive(Parser, Serialize)]
pub struct Cli {
    /// CLI configuration overrides (merged with files and defaults at runtime).
    #[command(flatten)]
    pub config: AppConfigCli,
}
