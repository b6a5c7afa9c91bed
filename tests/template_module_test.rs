mod common;

use common::{lab, lab_with_vm, template_params, waiter};
use serde_json::json;
use vsm_lib::runner::run_module;
use vsm_lib::{ModuleOutcome, TemplateModule};
use vsm_vsphere::mock::{Call, MockVsphere};
use vsm_vsphere::types::{VmCloneSpec, VmPowerState};

async fn run(mock: &MockVsphere, extra: serde_json::Value) -> ModuleOutcome {
    let module = TemplateModule::new(template_params(extra));
    run_module(&module, mock, &waiter()).await
}

#[tokio::test]
async fn marks_vm_in_place() {
    let mock = lab_with_vm(VmPowerState::PoweredOff);
    let out = run(&mock, json!({})).await;
    assert!(out.changed, "{out:?}");
    assert_eq!(out.result.as_deref(), Some("vm-42"));
    assert_eq!(mock.mutating_calls(), vec![Call::MarkAsTemplate("vm-42".into())]);
    assert!(mock.is_template_flagged("vm-42"));
}

#[tokio::test]
async fn second_run_after_marking_is_unchanged() {
    let mock = lab_with_vm(VmPowerState::PoweredOff);
    let first = run(&mock, json!({})).await;
    assert!(first.changed, "{first:?}");

    let second = run(&mock, json!({})).await;
    assert!(!second.changed, "{second:?}");
    assert!(!second.failed);
    assert_eq!(mock.mutating_calls(), vec![Call::MarkAsTemplate("vm-42".into())]);
}

#[tokio::test]
async fn running_vm_cannot_be_marked_in_place() {
    let mock = lab_with_vm(VmPowerState::PoweredOn);
    let out = run(&mock, json!({})).await;
    assert!(out.failed);
    assert!(!mock.is_template_flagged("vm-42"));
}

#[tokio::test]
async fn existing_template_is_unchanged() {
    let mock = lab();
    let out = run(&mock, json!({ "vm_name": "tmpl-ubuntu" })).await;
    assert!(!out.changed);
    assert!(!out.failed);
    assert!(mock.mutating_calls().is_empty());
}

#[tokio::test]
async fn clones_into_named_template() {
    let mock = lab_with_vm(VmPowerState::PoweredOn);
    let out = run(&mock, json!({ "template_name": "web-golden" })).await;
    assert!(out.changed, "{out:?}");
    assert_eq!(out.result.as_deref(), Some("vm-1001"));
    assert_eq!(
        mock.mutating_calls(),
        vec![
            Call::CloneVm(VmCloneSpec {
                name: "web-golden".into(),
                source: "vm-42".into(),
                placement: None,
                power_on: Some(false),
            }),
            Call::MarkAsTemplate("vm-1001".into()),
        ]
    );
    assert!(mock.is_template_flagged("vm-1001"));
    assert!(!mock.is_template_flagged("vm-42"));
}

#[tokio::test]
async fn named_template_already_present_is_unchanged() {
    let mock = lab_with_vm(VmPowerState::PoweredOn);
    let out = run(&mock, json!({ "template_name": "tmpl-ubuntu" })).await;
    assert!(!out.changed);
    assert!(mock.mutating_calls().is_empty());
}

#[tokio::test]
async fn named_target_that_is_a_plain_vm_fails() {
    let mock = lab_with_vm(VmPowerState::PoweredOn);
    mock.add_vm("vm-77", "web-golden", VmPowerState::PoweredOff);
    let out = run(&mock, json!({ "template_name": "web-golden" })).await;
    assert!(out.failed);
    assert!(mock.mutating_calls().is_empty());
}

#[tokio::test]
async fn missing_vm_fails() {
    let mock = lab();
    let out = run(&mock, json!({ "vm_name": "ghost" })).await;
    assert!(out.failed);
    assert!(out.msg.unwrap().contains("non-existent VM"));
}

#[tokio::test]
async fn dry_run_makes_no_calls() {
    let mock = lab_with_vm(VmPowerState::PoweredOff);
    let out = run(&mock, json!({ "_ansible_check_mode": true })).await;
    assert!(out.changed);
    assert!(mock.mutating_calls().is_empty());

    let out = run(&mock, json!({ "template_name": "web-golden", "_ansible_check_mode": true })).await;
    assert!(out.changed);
    assert!(mock.mutating_calls().is_empty());
}

#[tokio::test]
async fn dry_run_on_template_reports_no_change() {
    let mock = lab();
    let out = run(&mock, json!({ "vm_name": "tmpl-ubuntu", "_ansible_check_mode": true })).await;
    assert!(!out.changed);
}
