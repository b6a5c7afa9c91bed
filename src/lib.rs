//! # vsm
//!
//! Declarative vSphere VM management for configuration-management runs.
//! Each module binary takes the desired state of one named VM, compares it
//! with what vCenter reports and issues only the calls needed to converge.
//!
//! ## Modules
//!
//! - **params**: Args-file parsing, aliases, env fallbacks, validation
//! - **reconcile**: Desired × observed state table
//! - **vm**: `vmware_vm` (create, clone, power off, destroy)
//! - **template**: `vmware_vm_template` (mark or clone-to template)
//! - **guest**: Guest OS ids and post-clone guest customization
//! - **outcome**: JSON result document
//! - **runner**: Binary entry point, session handling, Ctrl-C cancellation
//! - **logging**: stderr tracing setup

pub mod params;
pub mod reconcile;
pub mod guest;
pub mod outcome;
pub mod runner;
pub mod logging;
pub mod vm;
pub mod template;

pub use outcome::ModuleOutcome;
pub use runner::AutomationModule;
pub use template::TemplateModule;
pub use vm::VmModule;
