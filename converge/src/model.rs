//! Remote object shapes.
//!
//! The same types describe both what the remote API reports (`existing`) and
//! the bodies the engine sends on create/update.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identity::ResourceKind;

/// Tag key prefix marking resources owned by a cluster.
pub const CLUSTER_TAG_PREFIX: &str = "sigs.k8s.io_cluster-api-provider-azure_cluster_";
/// Tag key recording the role of a resource.
pub const ROLE_TAG_KEY: &str = "sigs.k8s.io_cluster-api-provider-azure_role";
/// Tag key holding the resource name.
pub const NAME_TAG_KEY: &str = "Name";
/// Lifecycle value for resources created and deleted by the engine.
pub const LIFECYCLE_OWNED: &str = "owned";
/// Role value for resources shared across the cluster.
pub const COMMON_ROLE: &str = "common";

/// A remote object of any known kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RemoteObject {
    VirtualNetwork(VirtualNetwork),
    Subnet(Subnet),
    PrivateDnsRecord(RecordSet),
    RoleAssignment(RoleAssignment),
    VmExtension(Extension),
    VmssExtension(Extension),
}

impl RemoteObject {
    pub fn kind(&self) -> ResourceKind {
        match self {
            RemoteObject::VirtualNetwork(_) => ResourceKind::VirtualNetwork,
            RemoteObject::Subnet(_) => ResourceKind::Subnet,
            RemoteObject::PrivateDnsRecord(_) => ResourceKind::PrivateDnsRecord,
            RemoteObject::RoleAssignment(_) => ResourceKind::RoleAssignment,
            RemoteObject::VmExtension(_) => ResourceKind::VmExtension,
            RemoteObject::VmssExtension(_) => ResourceKind::VmssExtension,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedLocation {
    pub name: String,
    #[serde(rename = "type")]
    pub location_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetwork {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_location: Option<ExtendedLocation>,
    #[serde(default)]
    pub address_prefixes: Vec<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    pub service: String,
    #[serde(default)]
    pub locations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    /// Set instead of `address_prefixes` when there is exactly one prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub address_prefixes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_table_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat_gateway_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_security_group_id: Option<String>,
    #[serde(default)]
    pub service_endpoints: Vec<ServiceEndpoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSet {
    pub ttl: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub a_records: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aaaa_records: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    pub role_definition_id: String,
}

/// VM or VMSS extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    pub name: String,
    pub publisher: String,
    #[serde(rename = "type")]
    pub extension_type: String,
    pub type_handler_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected_settings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Build the ownership tags for a cluster-owned resource.
pub fn build_tags(
    cluster_name: &str,
    name: &str,
    role: &str,
    additional: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut tags = additional.clone();
    tags.insert(
        format!("{}{}", CLUSTER_TAG_PREFIX, cluster_name),
        LIFECYCLE_OWNED.to_string(),
    );
    tags.insert(ROLE_TAG_KEY.to_string(), role.to_string());
    tags.insert(NAME_TAG_KEY.to_string(), name.to_string());
    tags
}

fn network_resource_id(subscription_id: &str, resource_group: &str, provider_type: &str, name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/{}/{}",
        subscription_id, resource_group, provider_type, name
    )
}

pub fn route_table_id(subscription_id: &str, resource_group: &str, name: &str) -> String {
    network_resource_id(subscription_id, resource_group, "routeTables", name)
}

pub fn nat_gateway_id(subscription_id: &str, resource_group: &str, name: &str) -> String {
    network_resource_id(subscription_id, resource_group, "natGateways", name)
}

pub fn security_group_id(subscription_id: &str, resource_group: &str, name: &str) -> String {
    network_resource_id(subscription_id, resource_group, "networkSecurityGroups", name)
}
