//! Inventory lookups (datacenters, clusters, pools, datastores, folders and
//! networks) via the vSphere REST API.

use crate::error::{VmwareError, VmwareResult};
use crate::types::{InventoryKind, InventoryObject};
use crate::vsphere::escape;
use crate::vsphere::VsphereClient;

use serde_json::Value;

/// Named-object listing over the `/api/vcenter/*` collections.
pub struct InventoryManager<'a> {
    client: &'a VsphereClient,
}

impl<'a> InventoryManager<'a> {
    pub fn new(client: &'a VsphereClient) -> Self {
        Self { client }
    }

    /// List objects of a kind, optionally filtered by name server-side.
    pub async fn list(
        &self,
        kind: InventoryKind,
        name: Option<&str>,
    ) -> VmwareResult<Vec<InventoryObject>> {
        let mut params: Vec<(String, String)> = kind
            .fixed_filters()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if let Some(n) = name {
            params.push(("names".into(), n.to_string()));
        }

        let rows: Vec<Value> = self
            .client
            .get_with_params(kind.endpoint(), &params)
            .await?;
        parse_rows(kind, &rows)
    }

    /// Root resource pool of a cluster (GET /api/vcenter/cluster/{id}).
    pub async fn cluster_resource_pool(&self, cluster_id: &str) -> VmwareResult<String> {
        #[derive(serde::Deserialize)]
        struct ClusterInfo {
            resource_pool: String,
        }
        let path = format!("/api/vcenter/cluster/{}", escape(cluster_id));
        let info: ClusterInfo = self.client.get(&path).await?;
        Ok(info.resource_pool)
    }

    /// VM folder of a datacenter (GET /api/vcenter/datacenter/{id}).
    pub async fn datacenter_vm_folder(&self, datacenter_id: &str) -> VmwareResult<String> {
        #[derive(serde::Deserialize)]
        struct DatacenterInfo {
            vm_folder: String,
        }
        let path = format!("/api/vcenter/datacenter/{}", escape(datacenter_id));
        let info: DatacenterInfo = self.client.get(&path).await?;
        Ok(info.vm_folder)
    }
}

/// Turn list-endpoint rows into inventory objects, keeping listing order.
pub(crate) fn parse_rows(kind: InventoryKind, rows: &[Value]) -> VmwareResult<Vec<InventoryObject>> {
    rows.iter()
        .map(|row| {
            let id = row
                .get(kind.id_field())
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    VmwareError::parse(format!(
                        "{kind} listing entry lacks '{}': {row}",
                        kind.id_field()
                    ))
                })?;
            let name = row.get("name").and_then(Value::as_str).unwrap_or_default();
            let mut obj = InventoryObject::new(id, name);
            obj.object_type = row.get("type").and_then(Value::as_str).map(str::to_string);
            Ok(obj)
        })
        .collect()
}
