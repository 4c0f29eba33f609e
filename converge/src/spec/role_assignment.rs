//! Role assignment spec.

use serde::{Deserialize, Serialize};

use super::{expect_kind, ResourceSpec};
use crate::error::ValidationError;
use crate::identity::ResourceKind;
use crate::model::{RemoteObject, RoleAssignment};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignmentSpec {
    pub name: String,
    pub resource_group: String,
    #[serde(default)]
    pub principal_id: Option<String>,
    pub role_definition_id: String,
    /// Scope the role is granted on. Doubles as the owner.
    pub scope: String,
}

impl ResourceSpec for RoleAssignmentSpec {
    fn resource_name(&self) -> &str {
        &self.name
    }

    fn resource_group_name(&self) -> &str {
        &self.resource_group
    }

    fn owner_resource_name(&self) -> &str {
        &self.scope
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::RoleAssignment
    }

    fn parameters(&self, existing: Option<&RemoteObject>) -> Result<Option<RemoteObject>, ValidationError> {
        if let Some(existing) = existing {
            expect_kind(existing, ResourceKind::RoleAssignment)?;
            return Ok(None);
        }
        if self.role_definition_id.is_empty() {
            return Err(ValidationError::MissingField("roleDefinitionId"));
        }

        Ok(Some(RemoteObject::RoleAssignment(RoleAssignment {
            principal_id: self.principal_id.clone(),
            role_definition_id: self.role_definition_id.clone(),
        })))
    }
}
