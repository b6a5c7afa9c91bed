//! Module parameters.
//!
//! The automation framework hands a module either a JSON object or a line of
//! `key=value` pairs. [`ParamReader`] consumes those values key by key
//! (aliases, environment fallbacks, defaults, type coercion) and rejects
//! whatever is left over. Framework-private keys (`_ansible_*`) are ignored,
//! except `_ansible_check_mode` which switches the module to dry-run.

use crate::reconcile::DesiredState;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use vsm_vsphere::types::{DuplicateNamePolicy, NetworkBackingType, NicAdapterType, VsphereConfig};
use vsm_vsphere::{VmwareError, VmwareResult};

const FRAMEWORK_PREFIX: &str = "_ansible_";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Raw parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Untyped parameter map as received from the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawParams(BTreeMap<String, Value>);

impl RawParams {
    /// Parse an args file: a JSON object, or whitespace-separated
    /// `key=value` pairs with optional single/double quoting.
    pub fn parse(text: &str) -> VmwareResult<Self> {
        let trimmed = text.trim();
        if trimmed.starts_with('{') {
            let value: Value = serde_json::from_str(trimmed)
                .map_err(|e| VmwareError::invalid_param(format!("args file is not valid JSON: {e}")))?;
            return Self::from_json(value);
        }

        let mut map = BTreeMap::new();
        for token in split_args(trimmed)? {
            let (key, value) = token.split_once('=').ok_or_else(|| {
                VmwareError::invalid_param(format!("expected key=value, got '{token}'"))
            })?;
            map.insert(key.to_string(), Value::String(value.to_string()));
        }
        Ok(Self(map))
    }

    pub fn from_json(value: Value) -> VmwareResult<Self> {
        match value {
            Value::Object(obj) => Ok(Self(obj.into_iter().collect())),
            other => Err(VmwareError::invalid_param(format!(
                "module arguments must be an object, got {other}"
            ))),
        }
    }
}

fn split_args(line: &str) -> VmwareResult<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if quote.is_some() {
        return Err(VmwareError::invalid_param("unterminated quote in module arguments"));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Reader
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Consumes typed values out of a [`RawParams`].
pub struct ParamReader {
    values: BTreeMap<String, Value>,
    env: HashMap<String, String>,
    consumed: BTreeSet<String>,
}

impl ParamReader {
    /// Reader with `VMWARE_*` process environment variables as fallbacks.
    pub fn new(raw: RawParams) -> Self {
        let env = std::env::vars().filter(|(k, _)| k.starts_with("VMWARE_")).collect();
        Self::with_env(raw, env)
    }

    pub fn with_env(raw: RawParams, env: HashMap<String, String>) -> Self {
        Self { values: raw.0, env, consumed: BTreeSet::new() }
    }

    fn take(&mut self, key: &str, aliases: &[&str]) -> VmwareResult<Option<(String, Value)>> {
        let mut found: Option<(String, Value)> = None;
        for name in std::iter::once(&key).chain(aliases.iter()) {
            self.consumed.insert(name.to_string());
            let Some(v) = self.values.get(*name) else { continue };
            if v.is_null() {
                continue;
            }
            if let Some((prev, _)) = &found {
                return Err(VmwareError::invalid_param(format!(
                    "parameters are mutually exclusive: {prev}|{name}"
                )));
            }
            found = Some((name.to_string(), v.clone()));
        }
        Ok(found)
    }

    fn take_or_env(
        &mut self,
        key: &str,
        aliases: &[&str],
        env_var: Option<&str>,
    ) -> VmwareResult<Option<(String, Value)>> {
        if let Some(found) = self.take(key, aliases)? {
            return Ok(Some(found));
        }
        Ok(env_var.and_then(|var| {
            self.env
                .get(var)
                .map(|v| (var.to_string(), Value::String(v.clone())))
        }))
    }

    pub fn string(
        &mut self,
        key: &str,
        aliases: &[&str],
        env_var: Option<&str>,
    ) -> VmwareResult<Option<String>> {
        match self.take_or_env(key, aliases, env_var)? {
            None => Ok(None),
            Some((_, Value::String(s))) => Ok(Some(s)),
            Some((_, Value::Number(n))) => Ok(Some(n.to_string())),
            Some((name, other)) => Err(VmwareError::invalid_param(format!(
                "{name} must be a string, got {other}"
            ))),
        }
    }

    pub fn required_string(
        &mut self,
        key: &str,
        aliases: &[&str],
        env_var: Option<&str>,
    ) -> VmwareResult<String> {
        self.string(key, aliases, env_var)?
            .filter(|s| !s.is_empty())
            .ok_or_else(|| VmwareError::invalid_param(format!("missing required arguments: {key}")))
    }

    pub fn bool(&mut self, key: &str, default: bool, env_var: Option<&str>) -> VmwareResult<bool> {
        match self.take_or_env(key, &[], env_var)? {
            None => Ok(default),
            Some((name, v)) => parse_bool(&v).ok_or_else(|| {
                VmwareError::invalid_param(format!("{name} must be a boolean, got {v}"))
            }),
        }
    }

    pub fn u64(&mut self, key: &str, env_var: Option<&str>) -> VmwareResult<Option<u64>> {
        match self.take_or_env(key, &[], env_var)? {
            None => Ok(None),
            Some((name, v)) => {
                let n = match &v {
                    Value::Number(n) => n.as_u64(),
                    Value::String(s) => s.trim().parse::<u64>().ok(),
                    _ => None,
                };
                n.map(Some).ok_or_else(|| {
                    VmwareError::invalid_param(format!("{name} must be a non-negative integer, got {v}"))
                })
            }
        }
    }

    /// A value restricted to the choices `T::from_str` accepts.
    pub fn choice<T>(&mut self, key: &str, default: T) -> VmwareResult<T>
    where
        T: FromStr<Err = String>,
    {
        match self.string(key, &[], None)? {
            None => Ok(default),
            Some(s) => s
                .parse::<T>()
                .map_err(|e| VmwareError::invalid_param(format!("value of {key} must be valid: {e}"))),
        }
    }

    /// A structured value given inline or as a JSON string.
    pub fn json<T: DeserializeOwned>(&mut self, key: &str) -> VmwareResult<Option<T>> {
        let Some((name, v)) = self.take(key, &[])? else { return Ok(None) };
        let v = match v {
            Value::String(s) => serde_json::from_str(&s)
                .map_err(|e| VmwareError::invalid_param(format!("{name} is not valid JSON: {e}")))?,
            other => other,
        };
        serde_json::from_value(v)
            .map(Some)
            .map_err(|e| VmwareError::invalid_param(format!("{name}: {e}")))
    }

    /// A list given as a JSON array or a comma-separated string.
    pub fn string_list(&mut self, key: &str) -> VmwareResult<Vec<String>> {
        match self.take(key, &[])? {
            None => Ok(Vec::new()),
            Some((_, Value::String(s))) => Ok(s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()),
            Some((name, Value::Array(items))) => items
                .into_iter()
                .map(|i| match i {
                    Value::String(s) => Ok(s),
                    other => Err(VmwareError::invalid_param(format!(
                        "{name} entries must be strings, got {other}"
                    ))),
                })
                .collect(),
            Some((name, other)) => Err(VmwareError::invalid_param(format!(
                "{name} must be a list, got {other}"
            ))),
        }
    }

    /// Dry-run flag set by the framework.
    pub fn check_mode(&mut self) -> VmwareResult<bool> {
        self.bool("_ansible_check_mode", false, None)
    }

    /// Fail on any key nobody asked for.
    pub fn finish(self) -> VmwareResult<()> {
        let unknown: Vec<&str> = self
            .values
            .keys()
            .filter(|k| !self.consumed.contains(*k) && !k.starts_with(FRAMEWORK_PREFIX))
            .map(String::as_str)
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(VmwareError::invalid_param(format!(
                "Unsupported parameters: {}",
                unknown.join(", ")
            )))
        }
    }
}

fn parse_bool(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "on" | "1" | "y" => Some(true),
            "no" | "false" | "off" | "0" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// vCenter endpoint and credentials shared by every module.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionParams {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub port: u16,
    pub validate_certs: bool,
    pub timeout_secs: u64,
    pub task_timeout_secs: u64,
    pub task_poll_interval_ms: u64,
}

impl ConnectionParams {
    pub fn read(r: &mut ParamReader) -> VmwareResult<Self> {
        let defaults = VsphereConfig::default();
        let port = r.u64("port", Some("VMWARE_PORT"))?.unwrap_or(u64::from(defaults.port));
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| VmwareError::invalid_param(format!("port {port} is out of range")))?;

        let task_poll_interval_ms = r
            .u64("task_poll_interval", None)?
            .unwrap_or(defaults.task_poll_interval_ms);
        if task_poll_interval_ms == 0 {
            return Err(VmwareError::invalid_param("task_poll_interval must be positive"));
        }

        Ok(Self {
            hostname: r.required_string("hostname", &[], Some("VMWARE_HOST"))?,
            username: r.required_string("username", &["user", "admin"], Some("VMWARE_USER"))?,
            password: r.required_string("password", &["pass", "pwd"], Some("VMWARE_PASSWORD"))?,
            port,
            validate_certs: r.bool("validate_certs", true, Some("VMWARE_VALIDATE_CERTS"))?,
            timeout_secs: r.u64("timeout", None)?.unwrap_or(defaults.timeout_secs),
            task_timeout_secs: r.u64("task_timeout", None)?.unwrap_or(defaults.task_timeout_secs),
            task_poll_interval_ms,
        })
    }

    pub fn to_config(&self) -> VsphereConfig {
        VsphereConfig {
            host: self.hostname.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            insecure: !self.validate_certs,
            timeout_secs: self.timeout_secs,
            task_timeout_secs: self.task_timeout_secs,
            task_poll_interval_ms: self.task_poll_interval_ms,
            ..VsphereConfig::default()
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  NIC descriptors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpMode {
    Dhcp,
    Static,
}

/// Guest IP settings for one address family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpConfig {
    pub mode: IpMode,
    /// Interface address with its prefix length; `None` under DHCP.
    pub address: Option<IpNet>,
    pub gateway: Option<IpAddr>,
}

/// One virtual NIC to attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NicParams {
    pub network: String,
    /// Explicit backing; inferred from the network's type when unset.
    pub switch_type: Option<NetworkBackingType>,
    pub device_type: NicAdapterType,
    pub ipv4: Option<IpConfig>,
    pub ipv6: Option<IpConfig>,
}

impl NicParams {
    pub fn has_ip_config(&self) -> bool {
        self.ipv4.is_some() || self.ipv6.is_some()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NicArg {
    network: String,
    #[serde(default)]
    switch_type: Option<String>,
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    ipv4: Option<IpArg>,
    #[serde(default)]
    ipv6: Option<IpArg>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IpArg {
    mode: IpMode,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    prefix: Option<u8>,
    #[serde(default)]
    netmask: Option<String>,
    #[serde(default)]
    gateway: Option<String>,
}

#[derive(Clone, Copy)]
enum Family {
    V4,
    V6,
}

impl IpArg {
    fn into_config(self, family: Family, nic: &str) -> VmwareResult<IpConfig> {
        let label = match family {
            Family::V4 => "ipv4",
            Family::V6 => "ipv6",
        };
        let invalid = |what: String| VmwareError::invalid_param(format!("{label} of NIC '{nic}': {what}"));

        if self.mode == IpMode::Dhcp {
            if self.address.is_some() || self.prefix.is_some() || self.netmask.is_some() {
                return Err(invalid("DHCP takes no address, prefix or netmask".into()));
            }
            return Ok(IpConfig { mode: IpMode::Dhcp, address: None, gateway: None });
        }

        let address = self.address.ok_or_else(|| invalid("static mode needs an address".into()))?;
        let prefix = match (self.prefix, self.netmask, family) {
            (Some(_), Some(_), _) => return Err(invalid("prefix and netmask are mutually exclusive".into())),
            (Some(p), None, _) => p,
            (None, Some(mask), Family::V4) => mask
                .parse::<Ipv4Addr>()
                .ok()
                .and_then(|m| ipnet::ipv4_mask_to_prefix(m).ok())
                .ok_or_else(|| invalid(format!("invalid netmask '{mask}'")))?,
            (None, Some(_), Family::V6) => return Err(invalid("use prefix, not netmask".into())),
            (None, None, _) => return Err(invalid("static mode needs a prefix".into())),
        };

        let net = match family {
            Family::V4 => {
                let addr = address
                    .parse::<Ipv4Addr>()
                    .map_err(|_| invalid(format!("'{address}' is not a valid address")))?;
                Ipv4Net::new(addr, prefix).map(IpNet::V4)
            }
            Family::V6 => {
                let addr = address
                    .parse::<Ipv6Addr>()
                    .map_err(|_| invalid(format!("'{address}' is not a valid address")))?;
                Ipv6Net::new(addr, prefix).map(IpNet::V6)
            }
        }
        .map_err(|_| invalid(format!("prefix {prefix} is out of range")))?;

        let gateway = self
            .gateway
            .map(|gw| match (family, gw.parse::<IpAddr>()) {
                (Family::V4, Ok(ip @ IpAddr::V4(_))) | (Family::V6, Ok(ip @ IpAddr::V6(_))) => Ok(ip),
                _ => Err(invalid(format!("gateway '{gw}' is not a valid address"))),
            })
            .transpose()?;

        Ok(IpConfig { mode: IpMode::Static, address: Some(net), gateway })
    }
}

impl NicArg {
    fn into_params(self) -> VmwareResult<NicParams> {
        let switch_type = self
            .switch_type
            .as_deref()
            .map(NetworkBackingType::from_str)
            .transpose()
            .map_err(|e| VmwareError::invalid_param(format!("switch_type of NIC '{}': {e}", self.network)))?;
        let device_type = self
            .device_type
            .as_deref()
            .map(NicAdapterType::from_str)
            .transpose()
            .map_err(|e| VmwareError::invalid_param(format!("device_type of NIC '{}': {e}", self.network)))?
            .unwrap_or_default();
        let ipv4 = self.ipv4.map(|a| a.into_config(Family::V4, &self.network)).transpose()?;
        let ipv6 = self.ipv6.map(|a| a.into_config(Family::V6, &self.network)).transpose()?;
        Ok(NicParams { network: self.network, switch_type, device_type, ipv4, ipv6 })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  vmware_vm
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything `vmware_vm` needs for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct VmParams {
    pub connection: ConnectionParams,
    pub state: DesiredState,
    pub vm_name: String,
    pub datacenter: Option<String>,
    pub cluster: Option<String>,
    pub pool: Option<String>,
    pub datastore: Option<String>,
    pub folder: Option<String>,
    pub template: Option<String>,
    pub power_on: bool,
    pub memory_mb: Option<u64>,
    pub num_cpus: Option<u32>,
    pub guest_id: String,
    pub nics: Vec<NicParams>,
    pub domain: Option<String>,
    pub dns_servers: Vec<String>,
    pub on_duplicate_name: DuplicateNamePolicy,
    pub check_mode: bool,
}

impl VmParams {
    pub fn from_raw(raw: RawParams) -> VmwareResult<Self> {
        Self::read(ParamReader::new(raw))
    }

    pub fn read(mut r: ParamReader) -> VmwareResult<Self> {
        let connection = ConnectionParams::read(&mut r)?;
        let state = r.choice("state", DesiredState::Present)?;
        let vm_name = r.required_string("vm_name", &[], None)?;

        let num_cpus = r
            .u64("vm_numCPUs", None)?
            .map(|n| u32::try_from(n).ok().filter(|n| *n > 0).ok_or(n))
            .transpose()
            .map_err(|n| VmwareError::invalid_param(format!("vm_numCPUs {n} is out of range")))?;
        let memory_mb = r.u64("vm_memoryMB", None)?;
        if memory_mb == Some(0) {
            return Err(VmwareError::invalid_param("vm_memoryMB must be positive"));
        }

        // Single-NIC shorthand, superseded by vm_nics.
        let network = r.string("vm_network", &[], None)?;
        let nic_type = r.string("vm_nic_type", &[], None)?;
        let switch_type = r.string("vm_switch_type", &[], None)?;
        let nics = match r.json::<Vec<NicArg>>("vm_nics")? {
            Some(list) => {
                if network.is_some() || nic_type.is_some() || switch_type.is_some() {
                    return Err(VmwareError::invalid_param(
                        "parameters are mutually exclusive: vm_nics|vm_network, vm_nic_type, vm_switch_type",
                    ));
                }
                list.into_iter().map(NicArg::into_params).collect::<VmwareResult<Vec<_>>>()?
            }
            None => vec![NicArg {
                network: network.unwrap_or_else(|| "VM Network".into()),
                switch_type,
                device_type: Some(nic_type.unwrap_or_else(|| "vmxnet3".into())),
                ipv4: None,
                ipv6: None,
            }
            .into_params()?],
        };

        let params = Self {
            connection,
            state,
            vm_name,
            datacenter: r.string("vm_datacenter", &[], None)?,
            cluster: r.string("vm_cluster", &[], None)?,
            pool: r.string("vm_pool", &[], None)?,
            datastore: r.string("vm_datastore", &[], None)?,
            folder: r.string("vm_folder", &[], None)?,
            template: r.string("vm_template", &[], None)?,
            power_on: r.bool("vm_power", true, None)?,
            memory_mb,
            num_cpus,
            guest_id: r
                .string("vm_guest_id", &[], None)?
                .unwrap_or_else(|| "otherLinuxGuest".into()),
            nics,
            domain: r.string("vm_domain", &[], None)?,
            dns_servers: r.string_list("vm_dns_servers")?,
            on_duplicate_name: r.choice("on_duplicate_name", DuplicateNamePolicy::Fail)?,
            check_mode: r.check_mode()?,
        };
        r.finish()?;
        Ok(params)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  vmware_vm_template
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateParams {
    pub connection: ConnectionParams,
    pub vm_name: String,
    pub template_name: Option<String>,
    pub on_duplicate_name: DuplicateNamePolicy,
    pub check_mode: bool,
}

impl TemplateParams {
    pub fn from_raw(raw: RawParams) -> VmwareResult<Self> {
        Self::read(ParamReader::new(raw))
    }

    pub fn read(mut r: ParamReader) -> VmwareResult<Self> {
        let params = Self {
            connection: ConnectionParams::read(&mut r)?,
            vm_name: r.required_string("vm_name", &[], None)?,
            template_name: r.string("template_name", &[], None)?.filter(|s| !s.is_empty()),
            on_duplicate_name: r.choice("on_duplicate_name", DuplicateNamePolicy::Fail)?,
            check_mode: r.check_mode()?,
        };
        r.finish()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vsm_vsphere::VmwareErrorKind;

    fn reader(v: Value) -> ParamReader {
        ParamReader::with_env(RawParams::from_json(v).unwrap(), HashMap::new())
    }

    fn base() -> Value {
        json!({ "hostname": "vc.lab", "username": "root", "password": "vmware", "vm_name": "web-01" })
    }

    fn with(extra: Value) -> Value {
        let mut v = base();
        for (k, val) in extra.as_object().unwrap() {
            v[k] = val.clone();
        }
        v
    }

    #[test]
    fn key_value_args_with_quotes() {
        let raw = RawParams::parse("hostname=10.1.1.2 username=root vm_network='VM Network' vm_power=false")
            .unwrap();
        let mut r = ParamReader::with_env(raw, HashMap::new());
        assert_eq!(r.string("vm_network", &[], None).unwrap().as_deref(), Some("VM Network"));
        assert!(!r.bool("vm_power", true, None).unwrap());
    }

    #[test]
    fn unterminated_quote_rejected() {
        let err = RawParams::parse("vm_name='web").unwrap_err();
        assert_eq!(err.kind, VmwareErrorKind::InvalidParameter);
    }

    #[test]
    fn non_object_json_rejected() {
        assert!(RawParams::parse("[1, 2]").is_err());
    }

    #[test]
    fn vm_defaults() {
        let p = VmParams::read(reader(base())).unwrap();
        assert_eq!(p.state, DesiredState::Present);
        assert!(p.power_on);
        assert_eq!(p.guest_id, "otherLinuxGuest");
        assert_eq!(p.connection.port, 443);
        assert!(p.connection.validate_certs);
        assert_eq!(p.on_duplicate_name, DuplicateNamePolicy::Fail);
        assert!(!p.check_mode);
        assert_eq!(p.nics.len(), 1);
        assert_eq!(p.nics[0].network, "VM Network");
        assert_eq!(p.nics[0].device_type, NicAdapterType::Vmxnet3);
        assert_eq!(p.nics[0].switch_type, None);
    }

    #[test]
    fn credential_aliases() {
        let p = VmParams::read(reader(json!({
            "hostname": "vc", "user": "root", "pwd": "x", "vm_name": "a"
        })))
        .unwrap();
        assert_eq!(p.connection.username, "root");
        assert_eq!(p.connection.password, "x");
    }

    #[test]
    fn alias_and_key_together_rejected() {
        let err = VmParams::read(reader(with(json!({ "user": "other" })))).unwrap_err();
        assert!(err.message.contains("mutually exclusive"));
    }

    #[test]
    fn env_fallback_for_connection() {
        let env = HashMap::from([
            ("VMWARE_HOST".to_string(), "vc.env".to_string()),
            ("VMWARE_USER".to_string(), "svc".to_string()),
            ("VMWARE_PASSWORD".to_string(), "pw".to_string()),
            ("VMWARE_VALIDATE_CERTS".to_string(), "no".to_string()),
        ]);
        let raw = RawParams::from_json(json!({ "vm_name": "a" })).unwrap();
        let p = VmParams::read(ParamReader::with_env(raw, env)).unwrap();
        assert_eq!(p.connection.hostname, "vc.env");
        assert!(!p.connection.validate_certs);
        assert!(p.connection.to_config().insecure);
    }

    #[test]
    fn explicit_value_beats_env() {
        let env = HashMap::from([("VMWARE_HOST".to_string(), "vc.env".to_string())]);
        let raw = RawParams::from_json(base()).unwrap();
        let p = VmParams::read(ParamReader::with_env(raw, env)).unwrap();
        assert_eq!(p.connection.hostname, "vc.lab");
    }

    #[test]
    fn missing_required_reported() {
        let err = VmParams::read(reader(json!({ "hostname": "vc", "username": "u", "password": "p" })))
            .unwrap_err();
        assert!(err.message.contains("vm_name"));
    }

    #[test]
    fn unknown_parameter_rejected_framework_keys_ignored() {
        let err = VmParams::read(reader(with(json!({ "vm_colour": "blue" })))).unwrap_err();
        assert!(err.message.contains("vm_colour"));

        let p = VmParams::read(reader(with(json!({
            "_ansible_check_mode": true, "_ansible_verbosity": 3
        }))))
        .unwrap();
        assert!(p.check_mode);
    }

    #[test]
    fn state_choices() {
        let p = VmParams::read(reader(with(json!({ "state": "stopped" })))).unwrap();
        assert_eq!(p.state, DesiredState::Stopped);
        let err = VmParams::read(reader(with(json!({ "state": "paused" })))).unwrap_err();
        assert!(err.message.contains("state"));
    }

    #[test]
    fn numeric_strings_coerced() {
        let p = VmParams::read(reader(with(json!({ "vm_memoryMB": "2048", "vm_numCPUs": 2 })))).unwrap();
        assert_eq!(p.memory_mb, Some(2048));
        assert_eq!(p.num_cpus, Some(2));
        assert!(VmParams::read(reader(with(json!({ "vm_numCPUs": 0 })))).is_err());
        assert!(VmParams::read(reader(with(json!({ "vm_memoryMB": "lots" })))).is_err());
    }

    #[test]
    fn nic_type_choices() {
        let p = VmParams::read(reader(with(json!({ "vm_nic_type": "e1000e" })))).unwrap();
        assert_eq!(p.nics[0].device_type, NicAdapterType::E1000e);
        assert!(VmParams::read(reader(with(json!({ "vm_nic_type": "rtl8139" })))).is_err());
    }

    #[test]
    fn nic_list_with_static_and_dhcp() {
        let p = VmParams::read(reader(with(json!({
            "vm_nics": [
                { "network": "prod", "switch_type": "distributed", "device_type": "vmxnet3",
                  "ipv4": { "mode": "static", "address": "10.0.0.5", "netmask": "255.255.255.0", "gateway": "10.0.0.1" },
                  "ipv6": { "mode": "static", "address": "fd00::5", "prefix": 64 } },
                { "network": "backup", "ipv4": { "mode": "dhcp" } }
            ]
        }))))
        .unwrap();
        assert_eq!(p.nics.len(), 2);
        let v4 = p.nics[0].ipv4.as_ref().unwrap();
        assert_eq!(v4.address, Some("10.0.0.5/24".parse().unwrap()));
        assert_eq!(v4.gateway, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(p.nics[0].switch_type, Some(NetworkBackingType::DistributedPortgroup));
        assert_eq!(p.nics[1].ipv4.as_ref().unwrap().mode, IpMode::Dhcp);
        assert!(p.nics[1].has_ip_config());
    }

    #[test]
    fn nic_list_as_json_string() {
        let p = VmParams::read(reader(with(json!({
            "vm_nics": "[{\"network\": \"lab\"}]"
        }))))
        .unwrap();
        assert_eq!(p.nics[0].network, "lab");
        assert!(!p.nics[0].has_ip_config());
    }

    #[test]
    fn nic_list_conflicts_with_single_nic_params() {
        let err = VmParams::read(reader(with(json!({
            "vm_network": "lab", "vm_nics": [{ "network": "lab" }]
        }))))
        .unwrap_err();
        assert!(err.message.contains("mutually exclusive"));
    }

    #[test]
    fn static_ip_validation() {
        let bad_addr = with(json!({ "vm_nics": [{ "network": "n", "ipv4": { "mode": "static", "address": "10.0.0.300", "prefix": 24 } }] }));
        assert!(VmParams::read(reader(bad_addr)).is_err());

        let missing_prefix = with(json!({ "vm_nics": [{ "network": "n", "ipv4": { "mode": "static", "address": "10.0.0.3" } }] }));
        assert!(VmParams::read(reader(missing_prefix)).is_err());

        let dhcp_with_addr = with(json!({ "vm_nics": [{ "network": "n", "ipv4": { "mode": "dhcp", "address": "10.0.0.3" } }] }));
        assert!(VmParams::read(reader(dhcp_with_addr)).is_err());

        let v6_prefix = with(json!({ "vm_nics": [{ "network": "n", "ipv6": { "mode": "static", "address": "fd00::1", "prefix": 129 } }] }));
        assert!(VmParams::read(reader(v6_prefix)).is_err());
    }

    fn ipv4_with(ipv4: Value) -> VmwareResult<VmParams> {
        VmParams::read(reader(with(json!({ "vm_nics": [{ "network": "n", "ipv4": ipv4 }] }))))
    }

    #[test]
    fn netmask_conversion() {
        for (mask, prefix) in [("255.255.255.0", 24), ("255.255.255.255", 32), ("0.0.0.0", 0), ("255.255.240.0", 20)] {
            let p = ipv4_with(json!({ "mode": "static", "address": "10.0.0.5", "netmask": mask })).unwrap();
            let net = p.nics[0].ipv4.as_ref().unwrap().address.unwrap();
            assert_eq!(net.prefix_len(), prefix, "{mask}");
        }
        let err = ipv4_with(json!({ "mode": "static", "address": "10.0.0.5", "netmask": "255.0.255.0" })).unwrap_err();
        assert!(err.message.contains("invalid netmask"));
    }

    #[test]
    fn prefix_and_gateway_bounds() {
        let err = ipv4_with(json!({ "mode": "static", "address": "10.0.0.5", "prefix": 33 })).unwrap_err();
        assert!(err.message.contains("prefix 33"));
        let err = ipv4_with(json!({ "mode": "static", "address": "10.0.0.5", "prefix": 24, "gateway": "fd00::1" })).unwrap_err();
        assert!(err.message.contains("gateway"));
        assert!(ipv4_with(json!({ "mode": "static", "address": "fd00::5", "prefix": 24 })).is_err());
    }

    #[test]
    fn dns_servers_from_csv() {
        let p = VmParams::read(reader(with(json!({ "vm_dns_servers": "10.0.0.2, 10.0.0.3" })))).unwrap();
        assert_eq!(p.dns_servers, ["10.0.0.2", "10.0.0.3"]);
    }

    #[test]
    fn template_params() {
        let p = TemplateParams::read(reader(with(json!({ "template_name": "golden" })))).unwrap();
        assert_eq!(p.template_name.as_deref(), Some("golden"));
        let p = TemplateParams::read(reader(with(json!({ "template_name": "" })))).unwrap();
        assert_eq!(p.template_name, None);
        assert!(TemplateParams::read(reader(with(json!({ "state": "present" })))).is_err());
    }

    #[test]
    fn duplicate_policy_choice() {
        let p = TemplateParams::read(reader(with(json!({ "on_duplicate_name": "first" })))).unwrap();
        assert_eq!(p.on_duplicate_name, DuplicateNamePolicy::First);
    }
}
