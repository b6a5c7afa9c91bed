//! In-memory `VsphereApi` used by tests.
//!
//! Keeps a tiny inventory, applies mutating calls to it and records every
//! call in order so tests can assert what reached the management plane.

use crate::api::VsphereApi;
use crate::error::{VmwareError, VmwareResult};
use crate::types::*;

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// One call received by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListObjects { kind: InventoryKind, name: Option<String> },
    FindVms(String),
    ClusterResourcePool(String),
    DatacenterVmFolder(String),
    CreateVm(VmCreateSpec),
    CloneVm(VmCloneSpec),
    PowerOn(String),
    PowerOff(String),
    DeleteVm(String),
    MarkAsTemplate(String),
    CustomizeGuest(String, GuestCustomizationSpec),
    TaskInfo(String),
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListObjects { .. } => "list_objects",
            Self::FindVms(_) => "find_vms",
            Self::ClusterResourcePool(_) => "cluster_resource_pool",
            Self::DatacenterVmFolder(_) => "datacenter_vm_folder",
            Self::CreateVm(_) => "create_vm",
            Self::CloneVm(_) => "clone_vm",
            Self::PowerOn(_) => "power_on",
            Self::PowerOff(_) => "power_off",
            Self::DeleteVm(_) => "delete_vm",
            Self::MarkAsTemplate(_) => "mark_as_template",
            Self::CustomizeGuest(..) => "customize_guest",
            Self::TaskInfo(_) => "task_info",
        }
    }

    /// Whether the call changes anything on the management plane.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::CreateVm(_)
                | Self::CloneVm(_)
                | Self::PowerOn(_)
                | Self::PowerOff(_)
                | Self::DeleteVm(_)
                | Self::MarkAsTemplate(_)
                | Self::CustomizeGuest(..)
        )
    }
}

struct ScriptedTask {
    statuses: VecDeque<TaskStatus>,
    outcome: Result<String, String>,
}

#[derive(Default)]
struct State {
    objects: Vec<(InventoryKind, InventoryObject)>,
    /// VMs and templates in inventory order. Kept apart from `objects`: the
    /// REST listing never shows them.
    vms: Vec<VmRecord>,
    cluster_pools: HashMap<String, String>,
    datacenter_folders: HashMap<String, String>,
    tasks: HashMap<String, ScriptedTask>,
    failures: HashMap<&'static str, VmwareError>,
    calls: Vec<Call>,
    next_id: u32,
}

#[derive(Default)]
pub struct MockVsphere {
    state: Mutex<State>,
}

impl MockVsphere {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the recorded calls.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Inventory setup ─────────────────────────────────────────────

    pub fn add_object(&self, kind: InventoryKind, id: &str, name: &str) {
        self.state().objects.push((kind, InventoryObject::new(id, name)));
    }

    pub fn add_network(&self, id: &str, name: &str, network_type: &str) {
        self.state().objects.push((
            InventoryKind::Network,
            InventoryObject::new(id, name).with_type(network_type),
        ));
    }

    pub fn add_datacenter(&self, id: &str, name: &str, vm_folder: &str) {
        let mut st = self.state();
        st.objects.push((InventoryKind::Datacenter, InventoryObject::new(id, name)));
        st.datacenter_folders.insert(id.into(), vm_folder.into());
    }

    pub fn add_cluster(&self, id: &str, name: &str, resource_pool: &str) {
        let mut st = self.state();
        st.objects.push((InventoryKind::Cluster, InventoryObject::new(id, name)));
        st.cluster_pools.insert(id.into(), resource_pool.into());
    }

    pub fn add_vm(&self, id: &str, name: &str, power_state: VmPowerState) {
        self.state().vms.push(VmRecord {
            id: id.into(),
            name: name.into(),
            power_state,
            ..VmRecord::default()
        });
    }

    /// Add a powered-off template stored on the datastore with id `datastore`.
    pub fn add_template(&self, id: &str, name: &str, datastore: &str) {
        self.state().vms.push(VmRecord {
            id: id.into(),
            name: name.into(),
            power_state: VmPowerState::PoweredOff,
            template: true,
            datastores: vec![datastore.into()],
        });
    }

    /// Script the status sequence of a task; after the statuses run out it
    /// reports `outcome`.
    pub fn script_task(&self, task_id: &str, statuses: &[TaskStatus], outcome: Result<&str, &str>) {
        self.state().tasks.insert(
            task_id.into(),
            ScriptedTask {
                statuses: statuses.iter().copied().collect(),
                outcome: outcome.map(str::to_string).map_err(str::to_string),
            },
        );
    }

    /// Make every later call of `op` fail with `err`.
    pub fn fail_on(&self, op: &'static str, err: VmwareError) {
        self.state().failures.insert(op, err);
    }

    // ── Inspection ──────────────────────────────────────────────────

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn call_names(&self) -> Vec<&'static str> {
        self.state().calls.iter().map(Call::name).collect()
    }

    pub fn mutating_calls(&self) -> Vec<Call> {
        self.state().calls.iter().filter(|c| c.is_mutating()).cloned().collect()
    }

    pub fn count_calls(&self, name: &str) -> usize {
        self.state().calls.iter().filter(|c| c.name() == name).count()
    }

    pub fn vm(&self, id: &str) -> Option<VmRecord> {
        self.state().vms.iter().find(|vm| vm.id == id).cloned()
    }

    pub fn is_template_flagged(&self, id: &str) -> bool {
        self.vm(id).map_or(false, |vm| vm.template)
    }

    // ── Internals ───────────────────────────────────────────────────

    fn record(&self, call: Call) -> VmwareResult<MutexGuard<'_, State>> {
        let mut st = self.state();
        let name = call.name();
        st.calls.push(call);
        if let Some(err) = st.failures.get(name).cloned() {
            return Err(err);
        }
        Ok(st)
    }

    fn vm_missing(id: &str) -> VmwareError {
        VmwareError::not_found(format!("Resource not found: VM {id}"))
    }

    fn insert_vm(st: &mut State, name: &str, power_state: VmPowerState, datastores: Vec<String>) -> String {
        st.next_id += 1;
        let id = format!("vm-{}", 1000 + st.next_id);
        st.vms.push(VmRecord { id: id.clone(), name: name.into(), power_state, template: false, datastores });
        id
    }

    fn vm_mut<'s>(st: &'s mut State, id: &str) -> VmwareResult<&'s mut VmRecord> {
        st.vms.iter_mut().find(|vm| vm.id == id).ok_or_else(|| Self::vm_missing(id))
    }
}

#[async_trait]
impl VsphereApi for MockVsphere {
    async fn list_objects(
        &self,
        kind: InventoryKind,
        name: Option<&str>,
    ) -> VmwareResult<Vec<InventoryObject>> {
        let st = self.record(Call::ListObjects { kind, name: name.map(str::to_string) })?;
        Ok(st
            .objects
            .iter()
            .filter(|(k, o)| *k == kind && name.map_or(true, |n| o.name == n))
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn find_vms(&self, name: &str) -> VmwareResult<Vec<VmRecord>> {
        let st = self.record(Call::FindVms(name.into()))?;
        Ok(st.vms.iter().filter(|vm| vm.name == name).cloned().collect())
    }

    async fn cluster_resource_pool(&self, cluster_id: &str) -> VmwareResult<String> {
        let st = self.record(Call::ClusterResourcePool(cluster_id.into()))?;
        st.cluster_pools
            .get(cluster_id)
            .cloned()
            .ok_or_else(|| VmwareError::not_found(format!("cluster {cluster_id}")))
    }

    async fn datacenter_vm_folder(&self, datacenter_id: &str) -> VmwareResult<String> {
        let st = self.record(Call::DatacenterVmFolder(datacenter_id.into()))?;
        st.datacenter_folders
            .get(datacenter_id)
            .cloned()
            .ok_or_else(|| VmwareError::not_found(format!("datacenter {datacenter_id}")))
    }

    async fn create_vm(&self, spec: &VmCreateSpec) -> VmwareResult<TaskHandle> {
        let mut st = self.record(Call::CreateVm(spec.clone()))?;
        let datastores = spec.placement.datastore.iter().cloned().collect();
        let id = Self::insert_vm(&mut st, &spec.name, VmPowerState::PoweredOff, datastores);
        Ok(TaskHandle::done_with(id))
    }

    async fn clone_vm(&self, spec: &VmCloneSpec) -> VmwareResult<TaskHandle> {
        let mut st = self.record(Call::CloneVm(spec.clone()))?;
        let source = Self::vm_mut(&mut st, &spec.source)?;
        let datastores = match spec.placement.as_ref().and_then(|p| p.datastore.clone()) {
            Some(ds) => vec![ds],
            None => source.datastores.clone(),
        };
        let power = if spec.power_on == Some(true) {
            VmPowerState::PoweredOn
        } else {
            VmPowerState::PoweredOff
        };
        let id = Self::insert_vm(&mut st, &spec.name, power, datastores);
        let task_id = format!("task-clone-{}", st.next_id);
        st.tasks.insert(
            task_id.clone(),
            ScriptedTask { statuses: VecDeque::from([TaskStatus::Running]), outcome: Ok(id) },
        );
        Ok(TaskHandle::Pending { task_id })
    }

    async fn power_on(&self, vm_id: &str) -> VmwareResult<TaskHandle> {
        let mut st = self.record(Call::PowerOn(vm_id.into()))?;
        let vm = Self::vm_mut(&mut st, vm_id)?;
        if vm.template {
            return Err(VmwareError::api(400, "templates cannot be powered on"));
        }
        vm.power_state = VmPowerState::PoweredOn;
        Ok(TaskHandle::done())
    }

    async fn power_off(&self, vm_id: &str) -> VmwareResult<TaskHandle> {
        let mut st = self.record(Call::PowerOff(vm_id.into()))?;
        let vm = Self::vm_mut(&mut st, vm_id)?;
        if vm.power_state == VmPowerState::PoweredOff {
            return Err(VmwareError::api(400, "VM is already powered off"));
        }
        vm.power_state = VmPowerState::PoweredOff;
        Ok(TaskHandle::done())
    }

    async fn delete_vm(&self, vm_id: &str) -> VmwareResult<TaskHandle> {
        let mut st = self.record(Call::DeleteVm(vm_id.into()))?;
        if Self::vm_mut(&mut st, vm_id)?.power_state == VmPowerState::PoweredOn {
            return Err(VmwareError::api(400, "VM must be powered off before deletion"));
        }
        st.vms.retain(|vm| vm.id != vm_id);
        Ok(TaskHandle::done())
    }

    async fn mark_as_template(&self, vm_id: &str) -> VmwareResult<TaskHandle> {
        let mut st = self.record(Call::MarkAsTemplate(vm_id.into()))?;
        let vm = Self::vm_mut(&mut st, vm_id)?;
        if vm.power_state != VmPowerState::PoweredOff {
            return Err(VmwareError::api(400, "only a powered-off VM can be marked as a template"));
        }
        vm.template = true;
        Ok(TaskHandle::done())
    }

    async fn customize_guest(
        &self,
        vm_id: &str,
        spec: &GuestCustomizationSpec,
    ) -> VmwareResult<TaskHandle> {
        let mut st = self.record(Call::CustomizeGuest(vm_id.into(), spec.clone()))?;
        Self::vm_mut(&mut st, vm_id)?;
        Ok(TaskHandle::done())
    }

    async fn task_info(&self, task_id: &str) -> VmwareResult<TaskInfo> {
        let mut st = self.record(Call::TaskInfo(task_id.into()))?;
        let task = st
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| VmwareError::not_found(format!("task {task_id}")))?;

        if let Some(status) = task.statuses.pop_front() {
            return Ok(TaskInfo { status, result: None, error: None, progress: None });
        }
        Ok(match &task.outcome {
            Ok(result) => TaskInfo {
                status: TaskStatus::Succeeded,
                result: Some(serde_json::Value::String(result.clone())),
                error: None,
                progress: None,
            },
            Err(msg) => TaskInfo {
                status: TaskStatus::Failed,
                result: None,
                error: Some(serde_json::json!({ "messages": [{ "default_message": msg }] })),
                progress: None,
            },
        })
    }
}
