//! `vmware_vm`: create, clone, power-manage and destroy a named VM.

use crate::guest::{build_customization, guest_os_identifier};
use crate::outcome::ModuleOutcome;
use crate::params::{ConnectionParams, NicParams, RawParams, VmParams};
use crate::reconcile::{plan, Action, ObservedState};
use crate::runner::AutomationModule;

use async_trait::async_trait;
use vsm_vsphere::resolver::{find_vm, resolve, resolve_vm};
use vsm_vsphere::task::TaskWaiter;
use vsm_vsphere::types::*;
use vsm_vsphere::{VmwareError, VmwareResult, VsphereApi};

pub struct VmModule {
    params: VmParams,
}

impl VmModule {
    pub fn new(params: VmParams) -> Self {
        Self { params }
    }

    /// Look the VM up by name and classify its state.
    pub async fn observe(
        &self,
        api: &dyn VsphereApi,
    ) -> VmwareResult<(ObservedState, Option<VmRecord>)> {
        let p = &self.params;
        let Some(vm) = find_vm(api, &p.vm_name, p.on_duplicate_name).await? else {
            return Ok((ObservedState::Absent, None));
        };
        Ok((ObservedState::from_power(vm.power_state), Some(vm)))
    }

    async fn converge(&self, api: &dyn VsphereApi, waiter: &TaskWaiter) -> VmwareResult<ModuleOutcome> {
        let p = &self.params;
        let (observed, vm) = self.observe(api).await?;
        let action = plan(p.state, observed);
        log::info!("VM '{}': desired {}, observed {observed}, action {action:?}", p.vm_name, p.state);

        if action == Action::Reject {
            return Err(VmwareError::invalid_state(format!(
                "Attempting operation on non-existent VM '{}'",
                p.vm_name
            )));
        }
        if action == Action::Create && p.template.is_none() && p.datastore.is_none() {
            return Err(VmwareError::invalid_param(
                "vm_datastore is required when creating a VM without vm_template",
            ));
        }
        if p.check_mode {
            return Ok(if action.reports_change() {
                ModuleOutcome::changed(None).with_msg(format!("would {}", action_verb(action)))
            } else {
                ModuleOutcome::unchanged()
            });
        }

        match (action, vm) {
            (Action::NoOp, _) => Ok(ModuleOutcome::unchanged()),
            (Action::Maintenance | Action::Restart, _) => Ok(ModuleOutcome::unchanged()
                .with_msg(format!("state '{}' is accepted but not acted upon", p.state))),
            (Action::Create, _) => self.create(api, waiter).await,
            (Action::Destroy, Some(vm)) => self.destroy(api, waiter, &vm).await,
            (Action::PowerOff, Some(vm)) => {
                waiter.wait(api, api.power_off(&vm.id).await?).await?;
                log::info!("Powered off VM {} ({})", p.vm_name, vm.id);
                Ok(ModuleOutcome::changed(Some(vm.id)))
            }
            (Action::Destroy | Action::PowerOff | Action::Reject, _) => Err(VmwareError::invalid_state(
                format!("Attempting operation on non-existent VM '{}'", p.vm_name),
            )),
        }
    }

    // ── Create / clone ───────────────────────────────────────────────

    async fn create(&self, api: &dyn VsphereApi, waiter: &TaskWaiter) -> VmwareResult<ModuleOutcome> {
        let p = &self.params;
        let policy = p.on_duplicate_name;

        let folder = match &p.folder {
            Some(name) => resolve(api, InventoryKind::Folder, Some(name), policy).await?.id,
            None => {
                let dc = resolve(api, InventoryKind::Datacenter, p.datacenter.as_deref(), policy).await?;
                api.datacenter_vm_folder(&dc.id).await?
            }
        };
        if p.folder.is_some() {
            if let Some(dc) = &p.datacenter {
                resolve(api, InventoryKind::Datacenter, Some(dc), policy).await?;
            }
        }

        let resource_pool = match &p.pool {
            Some(name) => {
                if let Some(cl) = &p.cluster {
                    resolve(api, InventoryKind::Cluster, Some(cl), policy).await?;
                }
                resolve(api, InventoryKind::ResourcePool, Some(name), policy).await?.id
            }
            None => {
                let cluster = resolve(api, InventoryKind::Cluster, p.cluster.as_deref(), policy).await?;
                api.cluster_resource_pool(&cluster.id).await?
            }
        };

        let placement = VmPlacement {
            folder: Some(folder),
            resource_pool: Some(resource_pool),
            ..VmPlacement::default()
        };
        match &p.template {
            Some(template) => self.clone_from(api, waiter, template, placement).await,
            None => self.create_new(api, waiter, placement).await,
        }
    }

    async fn clone_from(
        &self,
        api: &dyn VsphereApi,
        waiter: &TaskWaiter,
        template: &str,
        mut placement: VmPlacement,
    ) -> VmwareResult<ModuleOutcome> {
        let p = &self.params;
        let policy = p.on_duplicate_name;
        let source = resolve_vm(api, template, policy).await?;

        placement.datastore = Some(match &p.datastore {
            Some(name) => resolve(api, InventoryKind::Datastore, Some(name), policy).await?.id,
            None => source.datastores.first().cloned().ok_or_else(|| {
                VmwareError::not_found(format!("template '{template}' lists no datastore"))
            })?,
        });

        // Customization needs a powered-off guest; power on afterwards.
        let customization = build_customization(p);
        let spec = VmCloneSpec {
            name: p.vm_name.clone(),
            source: source.id.clone(),
            placement: Some(placement),
            power_on: Some(p.power_on && customization.is_none()),
        };
        let outcome = waiter.wait(api, api.clone_vm(&spec).await?).await?;
        let vm_id = self.new_vm_id(api, outcome).await?;
        log::info!("Cloned VM {} ({vm_id}) from {template}", p.vm_name);

        if let Some(c) = customization {
            waiter.wait(api, api.customize_guest(&vm_id, &c).await?).await?;
            log::info!("Applied guest customization to {vm_id}");
            if p.power_on {
                waiter.wait(api, api.power_on(&vm_id).await?).await?;
            }
        }
        Ok(ModuleOutcome::changed(Some(vm_id)))
    }

    async fn create_new(
        &self,
        api: &dyn VsphereApi,
        waiter: &TaskWaiter,
        mut placement: VmPlacement,
    ) -> VmwareResult<ModuleOutcome> {
        let p = &self.params;
        let policy = p.on_duplicate_name;

        let datastore = p
            .datastore
            .as_deref()
            .ok_or_else(|| VmwareError::invalid_param("vm_datastore is required"))?;
        placement.datastore = Some(resolve(api, InventoryKind::Datastore, Some(datastore), policy).await?.id);

        let mut nics = Vec::with_capacity(p.nics.len());
        for nic in &p.nics {
            nics.push(self.nic_spec(api, nic).await?);
        }
        if p.nics.iter().any(NicParams::has_ip_config) {
            log::warn!("IP settings are applied only when cloning from a template; ignoring them");
        }

        let spec = VmCreateSpec {
            name: p.vm_name.clone(),
            guest_os: guest_os_identifier(&p.guest_id),
            placement,
            cpu: p.num_cpus.map(|count| VmCpuSpec { count }),
            memory: p.memory_mb.map(|size_mib| VmMemorySpec { size_mib }),
            nics,
        };
        let outcome = waiter.wait(api, api.create_vm(&spec).await?).await?;
        let vm_id = self.new_vm_id(api, outcome).await?;
        log::info!("Created VM {} ({vm_id})", p.vm_name);

        if p.power_on {
            waiter.wait(api, api.power_on(&vm_id).await?).await?;
            log::info!("Powered on VM {vm_id}");
        }
        Ok(ModuleOutcome::changed(Some(vm_id)))
    }

    async fn nic_spec(&self, api: &dyn VsphereApi, nic: &NicParams) -> VmwareResult<VmNicSpec> {
        let network =
            resolve(api, InventoryKind::Network, Some(&nic.network), self.params.on_duplicate_name).await?;
        let listed = network.object_type.as_deref().and_then(NetworkBackingType::from_network_type);

        let backing_type = match (nic.switch_type, listed) {
            (Some(wanted), Some(actual)) if wanted != actual => {
                return Err(VmwareError::invalid_param(format!(
                    "network '{}' is a {actual:?}, not a {wanted:?}",
                    nic.network
                )))
            }
            (Some(wanted), _) => wanted,
            (None, Some(actual)) => actual,
            (None, None) => match network.object_type.as_deref() {
                None => NetworkBackingType::StandardPortgroup,
                Some(other) => {
                    return Err(VmwareError::invalid_param(format!(
                        "network '{}' has unsupported type {other}",
                        nic.network
                    )))
                }
            },
        };

        Ok(VmNicSpec {
            nic_type: nic.device_type,
            backing: NicBackingSpec { backing_type, network: network.id },
            start_connected: true,
            allow_guest_control: true,
        })
    }

    /// Id of a freshly created VM, from the task result or by name.
    async fn new_vm_id(&self, api: &dyn VsphereApi, outcome: TaskOutcome) -> VmwareResult<String> {
        if let Some(id) = outcome.result.filter(|r| !r.is_empty()) {
            return Ok(id);
        }
        let p = &self.params;
        resolve_vm(api, &p.vm_name, p.on_duplicate_name).await.map(|vm| vm.id)
    }

    // ── Destroy ──────────────────────────────────────────────────────

    async fn destroy(
        &self,
        api: &dyn VsphereApi,
        waiter: &TaskWaiter,
        vm: &VmRecord,
    ) -> VmwareResult<ModuleOutcome> {
        if vm.power_state != VmPowerState::PoweredOff {
            waiter.wait(api, api.power_off(&vm.id).await?).await?;
        }
        waiter.wait(api, api.delete_vm(&vm.id).await?).await?;
        log::info!("Destroyed VM {} ({})", self.params.vm_name, vm.id);
        Ok(ModuleOutcome::changed(Some(vm.id.clone())))
    }
}

fn action_verb(action: Action) -> &'static str {
    match action {
        Action::NoOp => "leave",
        Action::Create => "create",
        Action::Destroy => "destroy",
        Action::PowerOff => "power off",
        Action::Maintenance => "put into maintenance",
        Action::Restart => "restart",
        Action::Reject => "reject",
    }
}

#[async_trait]
impl AutomationModule for VmModule {
    const NAME: &'static str = "vmware_vm";

    fn from_params(raw: RawParams) -> VmwareResult<Self> {
        VmParams::from_raw(raw).map(Self::new)
    }

    fn connection(&self) -> &ConnectionParams {
        &self.params.connection
    }

    async fn run(&self, api: &dyn VsphereApi, waiter: &TaskWaiter) -> VmwareResult<ModuleOutcome> {
        self.converge(api, waiter).await
    }
}
