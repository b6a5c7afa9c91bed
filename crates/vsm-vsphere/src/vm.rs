//! VM lifecycle management via the vSphere REST API.
//!
//! Covers lookup, create, clone, power operations, delete, template
//! conversion and guest customization. Lookup and template conversion go
//! through VI/JSON; the rest is Automation REST.

use crate::error::{VmwareError, VmwareResult};
use crate::types::*;
use crate::vsphere::{escape, VsphereClient};

use serde::Deserialize;
use serde_json::{json, Value};

/// High-level VM operations backed by `VsphereClient`.
pub struct VmManager<'a> {
    client: &'a VsphereClient,
}

impl<'a> VmManager<'a> {
    pub fn new(client: &'a VsphereClient) -> Self {
        Self { client }
    }

    // ── Lookup ───────────────────────────────────────────────────────

    /// Every VM and template named exactly `name`, in inventory order.
    ///
    /// `/api/vcenter/vm` leaves templates out, so this walks the inventory
    /// through a VI/JSON container view and the property collector.
    pub async fn find_vms(&self, name: &str) -> VmwareResult<Vec<VmRecord>> {
        let content: ServiceContent = self
            .client
            .vi_property("ServiceInstance", "ServiceInstance", "content")
            .await?;
        let view: MoRef = self
            .client
            .vi_call(
                "ViewManager",
                &content.view_manager.value,
                "CreateContainerView",
                &json!({
                    "container": content.root_folder.to_json(),
                    "type": ["VirtualMachine"],
                    "recursive": true,
                }),
            )
            .await?;

        let listed = self.retrieve_vms(&content.property_collector.value, &view).await;
        if let Err(e) = self.client.vi_invoke("ContainerView", &view.value, "DestroyView").await {
            log::debug!("Failed to destroy container view {}: {e}", view.value);
        }
        Ok(listed?.into_iter().filter(|vm| vm.name == name).collect())
    }

    async fn retrieve_vms(&self, collector: &str, view: &MoRef) -> VmwareResult<Vec<VmRecord>> {
        let mut page: Option<RetrieveResult> = self
            .client
            .vi_call("PropertyCollector", collector, "RetrievePropertiesEx", &vm_filter_spec(view))
            .await?;

        let mut records = Vec::new();
        while let Some(result) = page.take() {
            for object in &result.objects {
                records.push(parse_vm_object(object)?);
            }
            if let Some(token) = result.token {
                page = self
                    .client
                    .vi_call(
                        "PropertyCollector",
                        collector,
                        "ContinueRetrievePropertiesEx",
                        &json!({ "token": token }),
                    )
                    .await?;
            }
        }
        Ok(records)
    }

    // ── Create / Clone / Delete ─────────────────────────────────────

    /// Create a new VM. The API answers with the new VM identifier.
    pub async fn create_vm(&self, spec: &VmCreateSpec) -> VmwareResult<TaskHandle> {
        let id: String = self.client.post("/api/vcenter/vm", spec).await?;
        Ok(TaskHandle::done_with(id))
    }

    /// Clone a VM or template as a CIS task.
    pub async fn clone_vm(&self, spec: &VmCloneSpec) -> VmwareResult<TaskHandle> {
        let task_id: String = self
            .client
            .post("/api/vcenter/vm?action=clone&vmw-task=true", spec)
            .await?;
        Ok(TaskHandle::Pending { task_id })
    }

    /// Delete (unregister and remove) a VM.
    pub async fn delete_vm(&self, vm_id: &str) -> VmwareResult<TaskHandle> {
        let path = format!("/api/vcenter/vm/{}", escape(vm_id));
        self.client.delete(&path).await?;
        Ok(TaskHandle::done())
    }

    // ── Power operations ────────────────────────────────────────────

    /// Power on a VM.
    pub async fn power_on(&self, vm_id: &str) -> VmwareResult<TaskHandle> {
        let path = format!("/api/vcenter/vm/{}/power?action=start", escape(vm_id));
        self.client.post_empty(&path).await?;
        Ok(TaskHandle::done())
    }

    /// Power off a VM (hard).
    pub async fn power_off(&self, vm_id: &str) -> VmwareResult<TaskHandle> {
        let path = format!("/api/vcenter/vm/{}/power?action=stop", escape(vm_id));
        self.client.post_empty(&path).await?;
        Ok(TaskHandle::done())
    }

    // ── Templates / guest ───────────────────────────────────────────

    /// Flag a powered-off VM as a template.
    pub async fn mark_as_template(&self, vm_id: &str) -> VmwareResult<TaskHandle> {
        self.client
            .vi_invoke("VirtualMachine", vm_id, "MarkAsTemplate")
            .await?;
        Ok(TaskHandle::done())
    }

    /// Set the customization applied on next power-on.
    pub async fn customize_guest(
        &self,
        vm_id: &str,
        spec: &GuestCustomizationSpec,
    ) -> VmwareResult<TaskHandle> {
        let path = format!("/api/vcenter/vm/{}/guest/customization", escape(vm_id));
        self.client.put(&path, spec).await?;
        Ok(TaskHandle::done())
    }
}

// ── VI/JSON wire shapes ─────────────────────────────────────────────

const VM_PROPERTIES: [&str; 4] = ["name", "runtime.powerState", "config.template", "datastore"];

#[derive(Debug, Deserialize)]
struct MoRef {
    #[serde(rename = "type")]
    mo_type: String,
    value: String,
}

impl MoRef {
    fn to_json(&self) -> Value {
        json!({ "_typeName": "ManagedObjectReference", "type": self.mo_type, "value": self.value })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceContent {
    root_folder: MoRef,
    property_collector: MoRef,
    view_manager: MoRef,
}

#[derive(Debug, Deserialize)]
struct RetrieveResult {
    #[serde(default)]
    objects: Vec<Value>,
    #[serde(default)]
    token: Option<String>,
}

/// Filter selecting [`VM_PROPERTIES`] of every VM in a container view.
fn vm_filter_spec(view: &MoRef) -> Value {
    json!({
        "specSet": [{
            "_typeName": "PropertyFilterSpec",
            "propSet": [{
                "_typeName": "PropertySpec",
                "type": "VirtualMachine",
                "pathSet": VM_PROPERTIES,
            }],
            "objectSet": [{
                "_typeName": "ObjectSpec",
                "obj": view.to_json(),
                "skip": true,
                "selectSet": [{
                    "_typeName": "TraversalSpec",
                    "name": "traverseView",
                    "type": "ContainerView",
                    "path": "view",
                    "skip": false,
                }],
            }],
        }],
        "options": { "_typeName": "RetrieveOptions" },
    })
}

/// `anyType` property values arrive boxed as `{"_typeName": .., "_value": ..}`.
fn unbox(val: &Value) -> &Value {
    val.get("_value").unwrap_or(val)
}

/// One `ObjectContent` of the property collector as a [`VmRecord`].
fn parse_vm_object(object: &Value) -> VmwareResult<VmRecord> {
    let id = object
        .pointer("/obj/value")
        .and_then(Value::as_str)
        .ok_or_else(|| VmwareError::parse(format!("property collector object lacks an id: {object}")))?;

    let mut record = VmRecord { id: id.to_string(), ..VmRecord::default() };
    let props = object.get("propSet").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
    for prop in props {
        let Some(val) = prop.get("val").map(unbox) else { continue };
        match prop.get("name").and_then(Value::as_str) {
            Some("name") => record.name = val.as_str().unwrap_or_default().to_string(),
            Some("runtime.powerState") => {
                record.power_state = serde_json::from_value(val.clone()).unwrap_or_default();
            }
            Some("config.template") => record.template = val.as_bool().unwrap_or(false),
            Some("datastore") => {
                record.datastores = val
                    .as_array()
                    .map(|refs| {
                        refs.iter()
                            .filter_map(|r| r.get("value").and_then(Value::as_str))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
            }
            _ => {}
        }
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moref(mo_type: &str, value: &str) -> Value {
        json!({ "_typeName": "ManagedObjectReference", "type": mo_type, "value": value })
    }

    #[test]
    fn template_object_parses_boxed_values() {
        let object = json!({
            "_typeName": "ObjectContent",
            "obj": moref("VirtualMachine", "vm-500"),
            "propSet": [
                { "name": "name", "val": { "_typeName": "string", "_value": "tmpl-ubuntu" } },
                { "name": "runtime.powerState", "val": { "_typeName": "VirtualMachinePowerState", "_value": "poweredOff" } },
                { "name": "config.template", "val": { "_typeName": "boolean", "_value": true } },
                { "name": "datastore", "val": {
                    "_typeName": "ArrayOfManagedObjectReference",
                    "_value": [moref("Datastore", "datastore-12"), moref("Datastore", "datastore-11")]
                } }
            ]
        });
        let vm = parse_vm_object(&object).unwrap();
        assert_eq!(
            vm,
            VmRecord {
                id: "vm-500".into(),
                name: "tmpl-ubuntu".into(),
                power_state: VmPowerState::PoweredOff,
                template: true,
                datastores: vec!["datastore-12".into(), "datastore-11".into()],
            }
        );
    }

    #[test]
    fn inaccessible_vm_without_config_is_not_a_template() {
        let object = json!({
            "obj": moref("VirtualMachine", "vm-9"),
            "propSet": [
                { "name": "name", "val": "orphan" },
                { "name": "runtime.powerState", "val": "poweredOn" }
            ]
        });
        let vm = parse_vm_object(&object).unwrap();
        assert!(!vm.template);
        assert_eq!(vm.power_state, VmPowerState::PoweredOn);
        assert!(vm.datastores.is_empty());
    }

    #[test]
    fn object_without_id_is_rejected() {
        let err = parse_vm_object(&json!({ "propSet": [] })).unwrap_err();
        assert_eq!(err.kind, crate::error::VmwareErrorKind::ParseError);
    }

    #[test]
    fn filter_spec_walks_the_view() {
        let view = MoRef { mo_type: "ContainerView".into(), value: "session[1]2".into() };
        let spec = vm_filter_spec(&view);
        let set = &spec["specSet"][0];
        assert_eq!(set["propSet"][0]["pathSet"], json!(VM_PROPERTIES));
        assert_eq!(set["objectSet"][0]["obj"]["value"], "session[1]2");
        assert_eq!(set["objectSet"][0]["selectSet"][0]["path"], "view");
    }
}
