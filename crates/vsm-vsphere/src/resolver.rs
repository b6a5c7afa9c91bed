//! Name → managed-object resolution.
//!
//! Names are not unique in a vCenter inventory. A name that matches several
//! objects is reported as ambiguous unless the caller opted into
//! [`DuplicateNamePolicy::First`], in which case the first object of the
//! listing wins.

use crate::api::VsphereApi;
use crate::error::{VmwareError, VmwareResult};
use crate::types::{DuplicateNamePolicy, InventoryKind, InventoryObject, VmRecord};

/// Resolve a required object.
///
/// With `name = None` any object of that kind is returned (singleton
/// lookup, e.g. the only datacenter of a standalone vCenter).
pub async fn resolve(
    api: &dyn VsphereApi,
    kind: InventoryKind,
    name: Option<&str>,
    policy: DuplicateNamePolicy,
) -> VmwareResult<InventoryObject> {
    match find(api, kind, name, policy).await? {
        Some(obj) => Ok(obj),
        None => Err(match name {
            Some(n) => VmwareError::not_found(format!("{kind} '{n}' not found")),
            None => VmwareError::not_found(format!("no {kind} found in inventory")),
        }),
    }
}

/// Resolve an optional object; zero matches is `Ok(None)`.
pub async fn find(
    api: &dyn VsphereApi,
    kind: InventoryKind,
    name: Option<&str>,
    policy: DuplicateNamePolicy,
) -> VmwareResult<Option<InventoryObject>> {
    let listed = api.list_objects(kind, name).await?;

    let Some(name) = name else {
        return Ok(listed.into_iter().next());
    };

    // The server-side filter is not relied upon for exactness.
    let matches = listed.into_iter().filter(|o| o.name == name).collect();
    pick(&kind.to_string(), name, matches, |o| &o.id, policy)
}

/// Resolve a required VM or template by name.
pub async fn resolve_vm(
    api: &dyn VsphereApi,
    name: &str,
    policy: DuplicateNamePolicy,
) -> VmwareResult<VmRecord> {
    find_vm(api, name, policy)
        .await?
        .ok_or_else(|| VmwareError::not_found(format!("virtual machine '{name}' not found")))
}

/// Resolve an optional VM or template by name; templates are included.
pub async fn find_vm(
    api: &dyn VsphereApi,
    name: &str,
    policy: DuplicateNamePolicy,
) -> VmwareResult<Option<VmRecord>> {
    let matches = api.find_vms(name).await?.into_iter().filter(|vm| vm.name == name).collect();
    pick("virtual machine", name, matches, |vm| &vm.id, policy)
}

fn pick<T>(
    kind: &str,
    name: &str,
    mut matches: Vec<T>,
    id: impl Fn(&T) -> &String,
    policy: DuplicateNamePolicy,
) -> VmwareResult<Option<T>> {
    match (matches.len(), policy) {
        (0, _) => Ok(None),
        (1, _) | (_, DuplicateNamePolicy::First) => {
            if matches.len() > 1 {
                log::warn!(
                    "{} {kind} objects are named '{name}', using {}",
                    matches.len(),
                    id(&matches[0])
                );
            }
            Ok(Some(matches.swap_remove(0)))
        }
        (_, DuplicateNamePolicy::Fail) => {
            let ids: Vec<&str> = matches.iter().map(|m| id(m).as_str()).collect();
            Err(VmwareError::ambiguous(format!(
                "{kind} name '{name}' matches {} objects ({})",
                ids.len(),
                ids.join(", ")
            )))
        }
    }
}
