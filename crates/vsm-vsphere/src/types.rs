//! Shared types for vSphere VM / template management.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection / Config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Top-level configuration for connecting to a vCenter / ESXi host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VsphereConfig {
    /// vCenter or ESXi hostname / IP (e.g. "vcenter.lab.local")
    pub host: String,
    /// Port (default 443)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username (e.g. "administrator@vsphere.local")
    pub username: String,
    /// Password
    pub password: String,
    /// Skip TLS certificate verification (self-signed labs)
    #[serde(default)]
    pub insecure: bool,
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Upper bound for waiting on a single vCenter task
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,
    /// Delay between two task status polls
    #[serde(default = "default_poll_interval")]
    pub task_poll_interval_ms: u64,
    /// Release segment of the VI/JSON endpoints (`/sdk/vim25/{release}/...`)
    #[serde(default = "default_api_release")]
    pub api_release: String,
}

fn default_port() -> u16 { 443 }
fn default_timeout() -> u64 { 30 }
fn default_task_timeout() -> u64 { 3600 }
fn default_poll_interval() -> u64 { 1000 }
fn default_api_release() -> String { "8.0.1.0".into() }

impl Default for VsphereConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            port: default_port(),
            insecure: false,
            timeout_secs: default_timeout(),
            task_timeout_secs: default_task_timeout(),
            task_poll_interval_ms: default_poll_interval(),
            api_release: default_api_release(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VM Power State
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `runtime.powerState` (`poweredOn`, `poweredOff`, `suspended`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum VmPowerState {
    PoweredOn,
    PoweredOff,
    Suspended,
    #[serde(other)]
    Unknown,
}

impl Default for VmPowerState {
    fn default() -> Self { Self::Unknown }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VM Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A VM or template as reported by the VI property collector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmRecord {
    /// Managed-object id (`vm-42`)
    pub id: String,
    pub name: String,
    pub power_state: VmPowerState,
    /// `config.template`
    pub template: bool,
    /// Datastore ids from the VM's `datastore` property, in reported order.
    pub datastores: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Inventory
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Category of a named inventory object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InventoryKind {
    Datacenter,
    Cluster,
    ResourcePool,
    Datastore,
    Folder,
    Network,
}

impl InventoryKind {
    /// List endpoint under `/api/vcenter`.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Datacenter => "/api/vcenter/datacenter",
            Self::Cluster => "/api/vcenter/cluster",
            Self::ResourcePool => "/api/vcenter/resource-pool",
            Self::Datastore => "/api/vcenter/datastore",
            Self::Folder => "/api/vcenter/folder",
            Self::Network => "/api/vcenter/network",
        }
    }

    /// Field of a list entry that carries the managed-object identifier.
    pub fn id_field(self) -> &'static str {
        match self {
            Self::Datacenter => "datacenter",
            Self::Cluster => "cluster",
            Self::ResourcePool => "resource_pool",
            Self::Datastore => "datastore",
            Self::Folder => "folder",
            Self::Network => "network",
        }
    }

    /// Fixed query parameters narrowing the listing.
    pub fn fixed_filters(self) -> &'static [(&'static str, &'static str)] {
        match self {
            // VMs can only be placed into VM folders.
            Self::Folder => &[("type", "VIRTUAL_MACHINE")],
            _ => &[],
        }
    }
}

impl fmt::Display for InventoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Datacenter => "datacenter",
            Self::Cluster => "cluster",
            Self::ResourcePool => "resource pool",
            Self::Datastore => "datastore",
            Self::Folder => "folder",
            Self::Network => "network",
        };
        f.write_str(s)
    }
}

/// A resolved inventory object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryObject {
    pub id: String,
    pub name: String,
    /// Network backing type (`STANDARD_PORTGROUP`, `DISTRIBUTED_PORTGROUP`, ...)
    /// when the listing reports one.
    #[serde(default)]
    pub object_type: Option<String>,
}

impl InventoryObject {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), object_type: None }
    }

    pub fn with_type(mut self, object_type: impl Into<String>) -> Self {
        self.object_type = Some(object_type.into());
        self
    }
}

/// What to do when a name matches more than one inventory object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateNamePolicy {
    /// Refuse to pick one (`AmbiguousName`).
    #[default]
    Fail,
    /// Take the first object in listing order.
    First,
}

impl FromStr for DuplicateNamePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail" => Ok(Self::Fail),
            "first" => Ok(Self::First),
            other => Err(format!("expected one of fail, first; got '{other}'")),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VM Create
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Create VM spec matching vSphere POST /api/vcenter/vm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmCreateSpec {
    pub name: String,
    #[serde(rename = "guest_OS")]
    pub guest_os: String,
    pub placement: VmPlacement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<VmCpuSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<VmMemorySpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nics: Vec<VmNicSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VmPlacement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_pool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastore: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmCpuSpec {
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmMemorySpec {
    #[serde(rename = "size_MiB")]
    pub size_mib: u64,
}

/// Virtual NIC adapter model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NicAdapterType {
    Vmxnet,
    Vmxnet2,
    #[default]
    Vmxnet3,
    E1000,
    E1000e,
}

impl FromStr for NicAdapterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vmxnet" => Ok(Self::Vmxnet),
            "vmxnet2" => Ok(Self::Vmxnet2),
            "vmxnet3" => Ok(Self::Vmxnet3),
            "e1000" => Ok(Self::E1000),
            "e1000e" => Ok(Self::E1000e),
            other => Err(format!(
                "expected one of vmxnet, vmxnet2, vmxnet3, e1000, e1000e; got '{other}'"
            )),
        }
    }
}

/// Port group flavour backing a NIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkBackingType {
    #[default]
    StandardPortgroup,
    DistributedPortgroup,
}

impl NetworkBackingType {
    /// Map an inventory network type onto a NIC backing.
    pub fn from_network_type(t: &str) -> Option<Self> {
        match t {
            "STANDARD_PORTGROUP" => Some(Self::StandardPortgroup),
            "DISTRIBUTED_PORTGROUP" => Some(Self::DistributedPortgroup),
            _ => None,
        }
    }
}

impl FromStr for NetworkBackingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::StandardPortgroup),
            "distributed" | "dvs" => Ok(Self::DistributedPortgroup),
            other => Err(format!("expected one of standard, distributed; got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmNicSpec {
    #[serde(rename = "type")]
    pub nic_type: NicAdapterType,
    pub backing: NicBackingSpec,
    pub start_connected: bool,
    pub allow_guest_control: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NicBackingSpec {
    #[serde(rename = "type")]
    pub backing_type: NetworkBackingType,
    pub network: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  VM Clone
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Clone spec for POST /api/vcenter/vm?action=clone. An unset placement
/// keeps the clone next to its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmCloneSpec {
    pub name: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<VmPlacement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_on: Option<bool>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Guest customization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Body of PUT /api/vcenter/vm/{vm}/guest/customization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestCustomizationSpec {
    pub spec: CustomizationSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomizationSpec {
    pub configuration_spec: ConfigurationSpec,
    #[serde(rename = "global_DNS_settings")]
    pub global_dns_settings: GlobalDnsSettings,
    pub interfaces: Vec<InterfaceMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationSpec {
    pub linux_config: LinuxConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinuxConfiguration {
    pub hostname: HostnameGenerator,
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostnameGenerator {
    #[serde(rename = "type")]
    pub generator_type: String,
    pub fixed_name: String,
}

impl HostnameGenerator {
    pub fn fixed(name: impl Into<String>) -> Self {
        Self { generator_type: "FIXED".into(), fixed_name: name.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalDnsSettings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_servers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceMapping {
    pub adapter: IpSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Ipv4Settings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<Ipv6Settings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IpAssignment {
    Dhcp,
    Static,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ipv4Settings {
    #[serde(rename = "type")]
    pub assignment: IpAssignment,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateways: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ipv6Settings {
    #[serde(rename = "type")]
    pub assignment: IpAssignment,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ipv6: Vec<Ipv6Address>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateways: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ipv6Address {
    pub ip_address: String,
    pub prefix: u8,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Task
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Blocked,
    Succeeded,
    Failed,
    #[serde(other)]
    Unknown,
}

/// CIS task record (GET /api/cis/tasks/{task}).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    #[serde(default)]
    pub progress: Option<serde_json::Value>,
}

impl TaskInfo {
    /// Human-readable fault carried by a failed task.
    pub fn error_message(&self) -> String {
        let Some(err) = self.error.as_ref() else {
            return "task failed without a fault description".into();
        };
        err.get("messages")
            .and_then(|m| m.as_array())
            .map(|msgs| {
                msgs.iter()
                    .filter_map(|m| m.get("default_message").and_then(|d| d.as_str()))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| err.to_string())
    }

    /// Task result rendered as text (string results unquoted).
    pub fn result_text(&self) -> Option<String> {
        self.result.as_ref().and_then(value_text)
    }
}

pub(crate) fn value_text(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Handle for a submitted mutating call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskHandle {
    /// The API finished the operation within the request.
    Completed { result: Option<String> },
    /// The API returned a CIS task that must be polled.
    Pending { task_id: String },
}

impl TaskHandle {
    pub fn done() -> Self {
        Self::Completed { result: None }
    }

    pub fn done_with(result: impl Into<String>) -> Self {
        Self::Completed { result: Some(result.into()) }
    }
}

/// Terminal, successful task state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOutcome {
    pub result: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn power_state_deserialises_unknown_values() {
        let s: VmPowerState = serde_json::from_value(json!("poweredOn")).unwrap();
        assert_eq!(s, VmPowerState::PoweredOn);
        let s: VmPowerState = serde_json::from_value(json!("halfOn")).unwrap();
        assert_eq!(s, VmPowerState::Unknown);
    }

    #[test]
    fn create_spec_uses_rest_field_names() {
        let spec = VmCreateSpec {
            name: "web-01".into(),
            guest_os: "OTHER_LINUX".into(),
            placement: VmPlacement {
                folder: Some("group-v3".into()),
                resource_pool: Some("resgroup-8".into()),
                datastore: Some("datastore-11".into()),
                ..Default::default()
            },
            cpu: Some(VmCpuSpec { count: 2 }),
            memory: Some(VmMemorySpec { size_mib: 2048 }),
            nics: vec![VmNicSpec {
                nic_type: NicAdapterType::E1000e,
                backing: NicBackingSpec {
                    backing_type: NetworkBackingType::DistributedPortgroup,
                    network: "dvportgroup-20".into(),
                },
                start_connected: true,
                allow_guest_control: true,
            }],
        };
        let v = serde_json::to_value(&spec).unwrap();
        assert_eq!(v["guest_OS"], "OTHER_LINUX");
        assert_eq!(v["memory"]["size_MiB"], 2048);
        assert_eq!(v["nics"][0]["type"], "E1000E");
        assert_eq!(v["nics"][0]["backing"]["type"], "DISTRIBUTED_PORTGROUP");
        assert!(v["placement"].get("host").is_none());
    }

    #[test]
    fn task_error_message_joins_default_messages() {
        let info: TaskInfo = serde_json::from_value(json!({
            "status": "FAILED",
            "error": { "messages": [
                { "id": "a", "default_message": "Insufficient disk space" },
                { "id": "b", "default_message": "on datastore san-01" }
            ] }
        }))
        .unwrap();
        assert_eq!(info.error_message(), "Insufficient disk space; on datastore san-01");
    }

    #[test]
    fn task_result_text_unquotes_strings() {
        let info: TaskInfo =
            serde_json::from_value(json!({ "status": "SUCCEEDED", "result": "vm-101" })).unwrap();
        assert_eq!(info.result_text().as_deref(), Some("vm-101"));
    }

    #[test]
    fn adapter_and_backing_parse() {
        assert_eq!("E1000E".parse::<NicAdapterType>().unwrap(), NicAdapterType::E1000e);
        assert!("pcnet32".parse::<NicAdapterType>().is_err());
        assert_eq!(
            "distributed".parse::<NetworkBackingType>().unwrap(),
            NetworkBackingType::DistributedPortgroup
        );
    }
}
