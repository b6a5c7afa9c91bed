//! Result document returned to the automation framework.

use serde::Serialize;
use vsm_vsphere::VmwareError;

fn is_false(b: &bool) -> bool {
    !*b
}

/// One JSON object on stdout per invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleOutcome {
    pub changed: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

impl ModuleOutcome {
    pub fn unchanged() -> Self {
        Self::default()
    }

    pub fn changed(result: Option<String>) -> Self {
        Self { changed: true, result, ..Self::default() }
    }

    pub fn failure(err: &VmwareError) -> Self {
        Self { failed: true, msg: Some(err.message.clone()), ..Self::default() }
    }

    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"changed":false,"failed":true,"msg":"cannot encode result: {e}"}}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unchanged_is_minimal() {
        let v: serde_json::Value = serde_json::from_str(&ModuleOutcome::unchanged().to_json()).unwrap();
        assert_eq!(v, json!({ "changed": false }));
    }

    #[test]
    fn failure_carries_message_only() {
        let out = ModuleOutcome::failure(&VmwareError::not_found("VM 'x' not found"));
        let v: serde_json::Value = serde_json::from_str(&out.to_json()).unwrap();
        assert_eq!(v, json!({ "changed": false, "failed": true, "msg": "VM 'x' not found" }));
    }

    #[test]
    fn changed_with_result() {
        let out = ModuleOutcome::changed(Some("vm-1001".into())).with_msg("created");
        let v: serde_json::Value = serde_json::from_str(&out.to_json()).unwrap();
        assert_eq!(v["changed"], true);
        assert_eq!(v["result"], "vm-1001");
        assert_eq!(v["msg"], "created");
    }
}
