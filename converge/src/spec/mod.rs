//! Resource specs.
//!
//! A spec describes one desired remote object and computes the delta against
//! its observed state. Each resource kind has its own implementation; the
//! driver only sees the [`ResourceSpec`] trait.

pub mod dns;
pub mod extension;
pub mod role_assignment;
pub mod subnet;
pub mod vnet;

pub use dns::RecordSpec;
pub use extension::{ExtensionSpec, VmExtensionSpec, VmssExtensionSpec};
pub use role_assignment::RoleAssignmentSpec;
pub use subnet::SubnetSpec;
pub use vnet::VnetSpec;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::{ResourceIdentity, ResourceKind};
use crate::model::RemoteObject;

/// Descriptor of one desired remote object.
pub trait ResourceSpec: Send + Sync {
    /// Name of the remote object. Must be non-empty and stable.
    fn resource_name(&self) -> &str;

    fn resource_group_name(&self) -> &str;

    /// Name of the parent resource that must exist first, or `""`.
    fn owner_resource_name(&self) -> &str;

    fn kind(&self) -> ResourceKind;

    /// Compute the create/update body for `existing`.
    ///
    /// - `Ok(None)`: the remote object already matches.
    /// - `Ok(Some(body))`: the object is absent or divergent.
    /// - `Err(_)`: divergence cannot be reconciled without an operator.
    ///
    /// Must be deterministic for a fixed `(self, existing)` pair.
    fn parameters(&self, existing: Option<&RemoteObject>) -> Result<Option<RemoteObject>, ValidationError>;

    fn identity(&self) -> ResourceIdentity {
        ResourceIdentity {
            name: self.resource_name().to_string(),
            resource_group: self.resource_group_name().to_string(),
            owner: self.owner_resource_name().to_string(),
            kind: self.kind(),
        }
    }
}

/// Check that `existing` is of the kind a resource spec manages.
pub(crate) fn expect_kind(existing: &RemoteObject, expected: ResourceKind) -> Result<(), ValidationError> {
    let found = existing.kind();
    if found == expected {
        Ok(())
    } else {
        Err(ValidationError::UnexpectedExisting { expected, found })
    }
}

/// Serializable form of any known spec, used for manifests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SpecDocument {
    VirtualNetwork(VnetSpec),
    Subnet(SubnetSpec),
    PrivateDnsRecord(RecordSpec),
    RoleAssignment(RoleAssignmentSpec),
    VmExtension(VmExtensionSpec),
    VmssExtension(VmssExtensionSpec),
}

impl SpecDocument {
    pub fn into_spec(self) -> Box<dyn ResourceSpec> {
        match self {
            SpecDocument::VirtualNetwork(s) => Box::new(s),
            SpecDocument::Subnet(s) => Box::new(s),
            SpecDocument::PrivateDnsRecord(s) => Box::new(s),
            SpecDocument::RoleAssignment(s) => Box::new(s),
            SpecDocument::VmExtension(s) => Box::new(s),
            SpecDocument::VmssExtension(s) => Box::new(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_document_parse() {
        let json = r#"[
            {"kind": "virtualNetwork", "name": "vnet-a", "resourceGroup": "rg", "cidrs": ["10.0.0.0/16"],
             "location": "westeurope", "clusterName": "c1"},
            {"kind": "subnet", "name": "nodes", "resourceGroup": "rg", "subscriptionId": "sub",
             "cidrs": ["10.0.1.0/24"], "vnetName": "vnet-a", "vnetResourceGroup": "rg", "isVnetManaged": true}
        ]"#;
        let docs: Vec<SpecDocument> = serde_json::from_str(json).unwrap();
        let specs: Vec<_> = docs.into_iter().map(SpecDocument::into_spec).collect();

        assert_eq!(specs[0].identity().kind, ResourceKind::VirtualNetwork);
        assert!(!specs[0].identity().has_owner());
        let subnet = specs[1].identity();
        assert_eq!(subnet.owner, "vnet-a");
        assert_eq!(subnet.kind.service_name(), "subnets");
    }
}
