//! Subnet spec.

use serde::{Deserialize, Serialize};

use super::ResourceSpec;
use crate::error::ValidationError;
use crate::identity::ResourceKind;
use crate::model::{nat_gateway_id, route_table_id, security_group_id, RemoteObject, ServiceEndpoint, Subnet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    pub name: String,
    /// Resource group of the route table, NAT gateway and security group.
    pub resource_group: String,
    pub subscription_id: String,
    #[serde(default)]
    pub cidrs: Vec<String>,
    pub vnet_name: String,
    pub vnet_resource_group: String,
    /// False when the vnet is brought by the user and must not be modified.
    #[serde(default)]
    pub is_vnet_managed: bool,
    #[serde(default)]
    pub route_table_name: Option<String>,
    #[serde(default)]
    pub security_group_name: Option<String>,
    #[serde(default)]
    pub nat_gateway_name: Option<String>,
    #[serde(default)]
    pub service_endpoints: Vec<ServiceEndpoint>,
}

/// Order-insensitive form of a list of service endpoints.
fn normalized(endpoints: &[ServiceEndpoint]) -> Vec<ServiceEndpoint> {
    let mut out: Vec<ServiceEndpoint> = endpoints
        .iter()
        .map(|se| {
            let mut locations = se.locations.clone();
            locations.sort();
            ServiceEndpoint {
                service: se.service.clone(),
                locations,
            }
        })
        .collect();
    out.sort();
    out
}

impl ResourceSpec for SubnetSpec {
    fn resource_name(&self) -> &str {
        &self.name
    }

    /// The subnet lives in the resource group of its vnet.
    fn resource_group_name(&self) -> &str {
        &self.vnet_resource_group
    }

    fn owner_resource_name(&self) -> &str {
        &self.vnet_name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Subnet
    }

    fn parameters(&self, existing: Option<&RemoteObject>) -> Result<Option<RemoteObject>, ValidationError> {
        if let Some(existing) = existing {
            let RemoteObject::Subnet(existing) = existing else {
                return Err(ValidationError::UnexpectedExisting {
                    expected: ResourceKind::Subnet,
                    found: existing.kind(),
                });
            };

            if !self.is_vnet_managed {
                return Ok(None);
            }

            // Only service endpoints are updated in place.
            if normalized(&existing.service_endpoints) == normalized(&self.service_endpoints) {
                return Ok(None);
            }
        }

        if !self.is_vnet_managed {
            return Err(ValidationError::UnmanagedPrerequisiteMissing(self.name.clone()));
        }

        let mut subnet = Subnet {
            service_endpoints: self.service_endpoints.clone(),
            ..Default::default()
        };

        // A single prefix goes into `address_prefix`; subscriptions without the
        // multiple-prefix feature reject `address_prefixes`.
        match self.cidrs.as_slice() {
            [] => return Err(ValidationError::MissingField("cidrs")),
            [single] => subnet.address_prefix = Some(single.clone()),
            many => subnet.address_prefixes = many.to_vec(),
        }

        subnet.route_table_id = self
            .route_table_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .map(|n| route_table_id(&self.subscription_id, &self.resource_group, n));
        subnet.nat_gateway_id = self
            .nat_gateway_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .map(|n| nat_gateway_id(&self.subscription_id, &self.resource_group, n));
        subnet.network_security_group_id = self
            .security_group_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .map(|n| security_group_id(&self.subscription_id, &self.resource_group, n));

        Ok(Some(RemoteObject::Subnet(subnet)))
    }
}
