//! `vmware_vm_template`: turn a VM, or a fresh clone of it, into a template.

use crate::outcome::ModuleOutcome;
use crate::params::{ConnectionParams, RawParams, TemplateParams};
use crate::runner::AutomationModule;

use async_trait::async_trait;
use vsm_vsphere::resolver::find_vm;
use vsm_vsphere::task::TaskWaiter;
use vsm_vsphere::types::VmCloneSpec;
use vsm_vsphere::{VmwareError, VmwareResult, VsphereApi};

pub struct TemplateModule {
    params: TemplateParams,
}

impl TemplateModule {
    pub fn new(params: TemplateParams) -> Self {
        Self { params }
    }

    async fn promote(&self, api: &dyn VsphereApi, waiter: &TaskWaiter) -> VmwareResult<ModuleOutcome> {
        let p = &self.params;
        let policy = p.on_duplicate_name;

        let Some(vm) = find_vm(api, &p.vm_name, policy).await? else {
            return Err(VmwareError::invalid_state(format!(
                "Attempting operation on non-existent VM '{}'",
                p.vm_name
            )));
        };

        let Some(template_name) = &p.template_name else {
            if vm.template {
                log::info!("VM {} ({}) is already a template", p.vm_name, vm.id);
                return Ok(ModuleOutcome::unchanged());
            }
            if p.check_mode {
                return Ok(ModuleOutcome::changed(None).with_msg("would mark VM as template"));
            }
            waiter.wait(api, api.mark_as_template(&vm.id).await?).await?;
            log::info!("Marked VM {} ({}) as template", p.vm_name, vm.id);
            return Ok(ModuleOutcome::changed(Some(vm.id)));
        };

        if let Some(existing) = find_vm(api, template_name, policy).await? {
            if existing.template {
                log::info!("Template {template_name} ({}) already exists", existing.id);
                return Ok(ModuleOutcome::unchanged());
            }
            return Err(VmwareError::invalid_state(format!(
                "a VM named '{template_name}' already exists and is not a template"
            )));
        }
        if p.check_mode {
            return Ok(ModuleOutcome::changed(None)
                .with_msg(format!("would clone '{}' into template '{template_name}'", p.vm_name)));
        }

        // No placement: the clone lands next to its source.
        let spec = VmCloneSpec {
            name: template_name.clone(),
            source: vm.id.clone(),
            placement: None,
            power_on: Some(false),
        };
        let outcome = waiter.wait(api, api.clone_vm(&spec).await?).await?;
        let clone_id = match outcome.result.filter(|r| !r.is_empty()) {
            Some(id) => id,
            None => find_vm(api, template_name, policy)
                .await?
                .map(|clone| clone.id)
                .ok_or_else(|| VmwareError::not_found(format!("clone '{template_name}' not found")))?,
        };
        waiter.wait(api, api.mark_as_template(&clone_id).await?).await?;
        log::info!("Cloned {} into template {template_name} ({clone_id})", p.vm_name);
        Ok(ModuleOutcome::changed(Some(clone_id)))
    }
}

#[async_trait]
impl AutomationModule for TemplateModule {
    const NAME: &'static str = "vmware_vm_template";

    fn from_params(raw: RawParams) -> VmwareResult<Self> {
        TemplateParams::from_raw(raw).map(Self::new)
    }

    fn connection(&self) -> &ConnectionParams {
        &self.params.connection
    }

    async fn run(&self, api: &dyn VsphereApi, waiter: &TaskWaiter) -> VmwareResult<ModuleOutcome> {
        self.promote(api, waiter).await
    }
}
