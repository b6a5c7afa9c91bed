//! REST-backed `VsphereApi`.
//!
//! `VsphereService` owns the `VsphereClient` for one module invocation and
//! routes every trait operation to the matching manager.

use crate::api::VsphereApi;
use crate::error::{VmwareError, VmwareResult};
use crate::inventory::InventoryManager;
use crate::task::TaskManager;
use crate::types::*;
use crate::vm::VmManager;
use crate::vsphere::VsphereClient;

use async_trait::async_trait;

pub struct VsphereService {
    client: VsphereClient,
}

impl VsphereService {
    /// Connect to a vCenter and open a session.
    pub async fn connect(config: &VsphereConfig) -> VmwareResult<Self> {
        let mut client = VsphereClient::new(config)?;
        client.login().await?;
        log::info!("Connected to vCenter {} as {}", config.host, config.username);
        Ok(Self { client })
    }

    /// Close the session. Errors are logged, not returned.
    pub async fn disconnect(mut self) {
        let _ = self.client.logout().await;
    }

    fn require_client(&self) -> VmwareResult<&VsphereClient> {
        if self.client.is_connected() {
            Ok(&self.client)
        } else {
            Err(VmwareError::connection("Not connected to vSphere"))
        }
    }
}

#[async_trait]
impl VsphereApi for VsphereService {
    async fn list_objects(
        &self,
        kind: InventoryKind,
        name: Option<&str>,
    ) -> VmwareResult<Vec<InventoryObject>> {
        let c = self.require_client()?;
        InventoryManager::new(c).list(kind, name).await
    }

    async fn find_vms(&self, name: &str) -> VmwareResult<Vec<VmRecord>> {
        let c = self.require_client()?;
        VmManager::new(c).find_vms(name).await
    }

    async fn cluster_resource_pool(&self, cluster_id: &str) -> VmwareResult<String> {
        let c = self.require_client()?;
        InventoryManager::new(c).cluster_resource_pool(cluster_id).await
    }

    async fn datacenter_vm_folder(&self, datacenter_id: &str) -> VmwareResult<String> {
        let c = self.require_client()?;
        InventoryManager::new(c).datacenter_vm_folder(datacenter_id).await
    }

    async fn create_vm(&self, spec: &VmCreateSpec) -> VmwareResult<TaskHandle> {
        let c = self.require_client()?;
        VmManager::new(c).create_vm(spec).await
    }

    async fn clone_vm(&self, spec: &VmCloneSpec) -> VmwareResult<TaskHandle> {
        let c = self.require_client()?;
        VmManager::new(c).clone_vm(spec).await
    }

    async fn power_on(&self, vm_id: &str) -> VmwareResult<TaskHandle> {
        let c = self.require_client()?;
        VmManager::new(c).power_on(vm_id).await
    }

    async fn power_off(&self, vm_id: &str) -> VmwareResult<TaskHandle> {
        let c = self.require_client()?;
        VmManager::new(c).power_off(vm_id).await
    }

    async fn delete_vm(&self, vm_id: &str) -> VmwareResult<TaskHandle> {
        let c = self.require_client()?;
        VmManager::new(c).delete_vm(vm_id).await
    }

    async fn mark_as_template(&self, vm_id: &str) -> VmwareResult<TaskHandle> {
        let c = self.require_client()?;
        VmManager::new(c).mark_as_template(vm_id).await
    }

    async fn customize_guest(
        &self,
        vm_id: &str,
        spec: &GuestCustomizationSpec,
    ) -> VmwareResult<TaskHandle> {
        let c = self.require_client()?;
        VmManager::new(c).customize_guest(vm_id, spec).await
    }

    async fn task_info(&self, task_id: &str) -> VmwareResult<TaskInfo> {
        let c = self.require_client()?;
        TaskManager::new(c).get_task(task_id).await
    }
}
