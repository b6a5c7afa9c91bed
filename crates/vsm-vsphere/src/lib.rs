//! # vsm – vSphere client
//!
//! Typed access to the subset of the vSphere Automation REST API that the
//! VM and template modules drive.
//!
//! ## Modules
//!
//! - **types**: Shared data structures (config, VMs, inventory, specs, tasks)
//! - **error**: Crate-specific error types
//! - **vsphere**: vSphere REST API HTTP client with session-based auth
//! - **api**: `VsphereApi` trait, the seam the modules are written against
//! - **vm**: VM lifecycle (create, clone, power, delete, template, customization)
//! - **inventory**: Named-object listing for datacenters, clusters, pools, etc.
//! - **resolver**: Name → managed-object resolution with duplicate handling
//! - **task**: CIS task lookup and bounded, cancellable task waiting
//! - **service**: `VsphereService`, the REST-backed `VsphereApi`
//! - **mock**: In-memory `VsphereApi` (feature `test-helpers`)

pub mod types;
pub mod error;
pub mod vsphere;
pub mod api;
pub mod vm;
pub mod inventory;
pub mod resolver;
pub mod task;
pub mod service;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;

pub use api::VsphereApi;
pub use error::{VmwareError, VmwareErrorKind, VmwareResult};
pub use service::VsphereService;
