//! The management-plane operations the modules rely on.
//!
//! Mutating calls return a [`TaskHandle`]; callers hand it to
//! [`crate::task::TaskWaiter`] to block until the remote task is terminal.

use crate::error::VmwareResult;
use crate::types::*;

use async_trait::async_trait;

#[async_trait]
pub trait VsphereApi: Send + Sync {
    /// List inventory objects of `kind`, narrowed to `name` when given.
    /// Order is whatever the management plane returns.
    async fn list_objects(
        &self,
        kind: InventoryKind,
        name: Option<&str>,
    ) -> VmwareResult<Vec<InventoryObject>>;

    /// VMs and templates named exactly `name`, in inventory order.
    async fn find_vms(&self, name: &str) -> VmwareResult<Vec<VmRecord>>;

    /// Root resource pool of a cluster.
    async fn cluster_resource_pool(&self, cluster_id: &str) -> VmwareResult<String>;

    /// VM folder of a datacenter.
    async fn datacenter_vm_folder(&self, datacenter_id: &str) -> VmwareResult<String>;

    async fn create_vm(&self, spec: &VmCreateSpec) -> VmwareResult<TaskHandle>;

    async fn clone_vm(&self, spec: &VmCloneSpec) -> VmwareResult<TaskHandle>;

    async fn power_on(&self, vm_id: &str) -> VmwareResult<TaskHandle>;

    /// Hard power-off.
    async fn power_off(&self, vm_id: &str) -> VmwareResult<TaskHandle>;

    async fn delete_vm(&self, vm_id: &str) -> VmwareResult<TaskHandle>;

    async fn mark_as_template(&self, vm_id: &str) -> VmwareResult<TaskHandle>;

    /// Queue guest customization, applied on the VM's next power-on.
    async fn customize_guest(
        &self,
        vm_id: &str,
        spec: &GuestCustomizationSpec,
    ) -> VmwareResult<TaskHandle>;

    async fn task_info(&self, task_id: &str) -> VmwareResult<TaskInfo>;
}
