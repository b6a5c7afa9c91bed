//! Guest OS identifiers and guest customization.

use crate::params::{IpConfig, IpMode, NicParams, VmParams};

use vsm_vsphere::types::{
    ConfigurationSpec, CustomizationSpec, GlobalDnsSettings, GuestCustomizationSpec,
    HostnameGenerator, InterfaceMapping, IpAssignment, IpSettings, Ipv4Settings, Ipv6Address,
    Ipv6Settings, LinuxConfiguration,
};

/// Translate a VIM guest id (`otherLinux64Guest`) into the REST enum value
/// (`OTHER_LINUX_64`). Values already in REST form pass through.
pub fn guest_os_identifier(guest_id: &str) -> String {
    if !guest_id.chars().any(|c| c.is_ascii_lowercase()) {
        return guest_id.to_string();
    }

    let stem = if let Some(s) = guest_id.strip_suffix("Guest64") {
        format!("{s}64")
    } else {
        guest_id.strip_suffix("Guest").unwrap_or(guest_id).to_string()
    };

    let mut out = String::with_capacity(stem.len() + 4);
    let mut prev: Option<char> = None;
    for c in stem.chars() {
        if let Some(p) = prev {
            let boundary = (c.is_ascii_uppercase() && (p.is_ascii_lowercase() || p.is_ascii_digit()))
                || (c.is_ascii_digit() && p.is_ascii_alphabetic());
            if boundary {
                out.push('_');
            }
        }
        out.push(c.to_ascii_uppercase());
        prev = Some(c);
    }
    out
}

/// Guest hostname derived from a VM name: letters, digits and inner hyphens,
/// at most 63 characters.
pub fn hostname_for(vm_name: &str) -> String {
    let mapped: String = vm_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let trimmed: String = mapped.trim_matches('-').chars().take(63).collect();
    let trimmed = trimmed.trim_end_matches('-');
    if trimmed.is_empty() {
        "localhost".into()
    } else {
        trimmed.to_string()
    }
}

/// Customization to apply after a clone, or `None` when no NIC carries IP
/// settings.
pub fn build_customization(params: &VmParams) -> Option<GuestCustomizationSpec> {
    if !params.nics.iter().any(NicParams::has_ip_config) {
        return None;
    }

    let interfaces = params
        .nics
        .iter()
        .map(|nic| InterfaceMapping {
            adapter: IpSettings {
                ipv4: Some(ipv4_settings(nic.ipv4.as_ref())),
                ipv6: nic.ipv6.as_ref().map(ipv6_settings),
            },
        })
        .collect();

    Some(GuestCustomizationSpec {
        spec: CustomizationSpec {
            configuration_spec: ConfigurationSpec {
                linux_config: LinuxConfiguration {
                    hostname: HostnameGenerator::fixed(hostname_for(&params.vm_name)),
                    domain: params.domain.clone().unwrap_or_else(|| "localdomain".into()),
                },
            },
            global_dns_settings: GlobalDnsSettings { dns_servers: params.dns_servers.clone() },
            interfaces,
        },
    })
}

// NICs without IPv4 settings fall back to DHCP.
fn ipv4_settings(ip: Option<&IpConfig>) -> Ipv4Settings {
    match ip {
        Some(IpConfig { mode: IpMode::Static, address: Some(net), gateway }) => Ipv4Settings {
            assignment: IpAssignment::Static,
            ip_address: Some(net.addr().to_string()),
            prefix: Some(net.prefix_len()),
            gateways: gateway.iter().map(ToString::to_string).collect(),
        },
        _ => Ipv4Settings {
            assignment: IpAssignment::Dhcp,
            ip_address: None,
            prefix: None,
            gateways: Vec::new(),
        },
    }
}

fn ipv6_settings(ip: &IpConfig) -> Ipv6Settings {
    match (ip.mode, ip.address) {
        (IpMode::Static, Some(net)) => Ipv6Settings {
            assignment: IpAssignment::Static,
            ipv6: vec![Ipv6Address { ip_address: net.addr().to_string(), prefix: net.prefix_len() }],
            gateways: ip.gateway.iter().map(ToString::to_string).collect(),
        },
        _ => Ipv6Settings { assignment: IpAssignment::Dhcp, ipv6: Vec::new(), gateways: Vec::new() },
    }
}
