//! VM and VM scale set extension specs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{expect_kind, ResourceSpec};
use crate::error::ValidationError;
use crate::identity::ResourceKind;
use crate::model::{Extension, RemoteObject};

/// Fields shared by VM and VMSS extensions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSpec {
    pub name: String,
    /// VM or scale set the extension is installed on.
    pub vm_name: String,
    pub publisher: String,
    pub version: String,
    #[serde(default)]
    pub settings: Option<Value>,
    #[serde(default)]
    pub protected_settings: Option<Value>,
}

impl ExtensionSpec {
    fn to_extension(&self, location: Option<String>) -> Extension {
        Extension {
            name: self.name.clone(),
            publisher: self.publisher.clone(),
            extension_type: self.name.clone(),
            type_handler_version: self.version.clone(),
            settings: self.settings.clone(),
            protected_settings: self.protected_settings.clone(),
            location,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmExtensionSpec {
    #[serde(flatten)]
    pub extension: ExtensionSpec,
    pub resource_group: String,
    pub location: String,
}

impl ResourceSpec for VmExtensionSpec {
    fn resource_name(&self) -> &str {
        &self.extension.name
    }

    fn resource_group_name(&self) -> &str {
        &self.resource_group
    }

    fn owner_resource_name(&self) -> &str {
        &self.extension.vm_name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::VmExtension
    }

    fn parameters(&self, existing: Option<&RemoteObject>) -> Result<Option<RemoteObject>, ValidationError> {
        if let Some(existing) = existing {
            expect_kind(existing, ResourceKind::VmExtension)?;
            return Ok(None);
        }
        Ok(Some(RemoteObject::VmExtension(
            self.extension.to_extension(Some(self.location.clone())),
        )))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmssExtensionSpec {
    #[serde(flatten)]
    pub extension: ExtensionSpec,
    pub resource_group: String,
}

impl ResourceSpec for VmssExtensionSpec {
    fn resource_name(&self) -> &str {
        &self.extension.name
    }

    fn resource_group_name(&self) -> &str {
        &self.resource_group
    }

    fn owner_resource_name(&self) -> &str {
        &self.extension.vm_name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::VmssExtension
    }

    fn parameters(&self, existing: Option<&RemoteObject>) -> Result<Option<RemoteObject>, ValidationError> {
        if let Some(existing) = existing {
            expect_kind(existing, ResourceKind::VmssExtension)?;
            return Ok(None);
        }
        Ok(Some(RemoteObject::VmssExtension(self.extension.to_extension(None))))
    }
}
