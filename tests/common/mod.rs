#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vsm_lib::params::{ParamReader, RawParams, TemplateParams, VmParams};
use vsm_vsphere::mock::MockVsphere;
use vsm_vsphere::task::TaskWaiter;
use vsm_vsphere::types::{InventoryKind, VmPowerState};

/// One datacenter, one cluster, two datastores, a standard and a
/// distributed port group, and an Ubuntu template living on `ds-slow`.
pub fn lab() -> MockVsphere {
    let mock = MockVsphere::new();
    mock.add_datacenter("datacenter-1", "DC1", "group-v3");
    mock.add_cluster("domain-c7", "Cluster1", "resgroup-8");
    mock.add_object(InventoryKind::ResourcePool, "resgroup-40", "batch");
    mock.add_object(InventoryKind::Folder, "group-v50", "web");
    mock.add_object(InventoryKind::Datastore, "datastore-11", "ds-fast");
    mock.add_object(InventoryKind::Datastore, "datastore-12", "ds-slow");
    mock.add_network("network-20", "VM Network", "STANDARD_PORTGROUP");
    mock.add_network("dvportgroup-30", "prod", "DISTRIBUTED_PORTGROUP");
    mock.add_template("vm-500", "tmpl-ubuntu", "datastore-12");
    mock
}

pub fn lab_with_vm(power: VmPowerState) -> MockVsphere {
    let mock = lab();
    mock.add_vm("vm-42", "web-01", power);
    mock
}

pub fn waiter() -> TaskWaiter {
    TaskWaiter::new(Duration::from_secs(5), Duration::from_millis(1), CancellationToken::new())
}

fn merged(extra: Value) -> RawParams {
    let mut v = json!({
        "hostname": "vc.lab.local",
        "username": "administrator@vsphere.local",
        "password": "secret",
        "vm_name": "web-01",
    });
    if let Some(obj) = extra.as_object() {
        for (k, val) in obj {
            v[k] = val.clone();
        }
    }
    RawParams::from_json(v).expect("object")
}

pub fn vm_params(extra: Value) -> VmParams {
    VmParams::read(ParamReader::with_env(merged(extra), HashMap::new())).expect("valid params")
}

pub fn template_params(extra: Value) -> TemplateParams {
    TemplateParams::read(ParamReader::with_env(merged(extra), HashMap::new())).expect("valid params")
}
