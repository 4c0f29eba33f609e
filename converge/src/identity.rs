//! Resource identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kinds of remote objects the engine knows how to converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    VirtualNetwork,
    Subnet,
    PrivateDnsRecord,
    RoleAssignment,
    VmExtension,
    VmssExtension,
}

impl ResourceKind {
    /// Service name used to disambiguate operations on resources of
    /// different kinds that share a name.
    pub fn service_name(&self) -> &'static str {
        match self {
            ResourceKind::VirtualNetwork => "virtualnetworks",
            ResourceKind::Subnet => "subnets",
            ResourceKind::PrivateDnsRecord => "privatedns",
            ResourceKind::RoleAssignment => "roleassignments",
            ResourceKind::VmExtension => "vmextensions",
            ResourceKind::VmssExtension => "scalesets",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::VirtualNetwork => "virtual network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::PrivateDnsRecord => "private DNS record set",
            ResourceKind::RoleAssignment => "role assignment",
            ResourceKind::VmExtension => "VM extension",
            ResourceKind::VmssExtension => "VMSS extension",
        };
        f.write_str(s)
    }
}

/// Identity of one remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    pub name: String,
    pub resource_group: String,
    /// Parent that must exist before this object is created. Empty when
    /// there is no dependency.
    pub owner: String,
    pub kind: ResourceKind,
}

impl ResourceIdentity {
    pub fn has_owner(&self) -> bool {
        !self.owner.is_empty()
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.resource_group, self.name)
    }
}
