//! Virtual network spec.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{expect_kind, ResourceSpec};
use crate::error::ValidationError;
use crate::identity::ResourceKind;
use crate::model::{build_tags, ExtendedLocation, RemoteObject, VirtualNetwork, COMMON_ROLE};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VnetSpec {
    pub name: String,
    pub resource_group: String,
    #[serde(default)]
    pub cidrs: Vec<String>,
    pub location: String,
    #[serde(default)]
    pub extended_location: Option<ExtendedLocation>,
    pub cluster_name: String,
    #[serde(default)]
    pub additional_tags: BTreeMap<String, String>,
}

impl ResourceSpec for VnetSpec {
    fn resource_name(&self) -> &str {
        &self.name
    }

    fn resource_group_name(&self) -> &str {
        &self.resource_group
    }

    fn owner_resource_name(&self) -> &str {
        ""
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::VirtualNetwork
    }

    fn parameters(&self, existing: Option<&RemoteObject>) -> Result<Option<RemoteObject>, ValidationError> {
        if let Some(existing) = existing {
            expect_kind(existing, ResourceKind::VirtualNetwork)?;
            // Never updated once created.
            return Ok(None);
        }

        Ok(Some(RemoteObject::VirtualNetwork(VirtualNetwork {
            location: self.location.clone(),
            extended_location: self.extended_location.clone(),
            address_prefixes: self.cidrs.clone(),
            tags: build_tags(&self.cluster_name, &self.name, COMMON_ROLE, &self.additional_tags),
        })))
    }
}
