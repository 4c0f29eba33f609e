//! Private DNS record set spec.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::{expect_kind, ResourceSpec};
use crate::error::ValidationError;
use crate::identity::ResourceKind;
use crate::model::{RecordSet, RemoteObject};

/// TTL applied to every record set.
pub const RECORD_TTL: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    A,
    Aaaa,
}

/// Record type for an address, or `None` if it is not an IP address.
pub fn record_type(ip: &str) -> Option<RecordType> {
    match ip.parse::<IpAddr>().ok()? {
        IpAddr::V4(_) => Some(RecordType::A),
        IpAddr::V6(_) => Some(RecordType::Aaaa),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSpec {
    pub hostname: String,
    pub ip: String,
    pub zone_name: String,
    pub resource_group: String,
}

impl ResourceSpec for RecordSpec {
    fn resource_name(&self) -> &str {
        &self.hostname
    }

    fn resource_group_name(&self) -> &str {
        &self.resource_group
    }

    fn owner_resource_name(&self) -> &str {
        &self.zone_name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::PrivateDnsRecord
    }

    fn parameters(&self, existing: Option<&RemoteObject>) -> Result<Option<RemoteObject>, ValidationError> {
        if let Some(existing) = existing {
            expect_kind(existing, ResourceKind::PrivateDnsRecord)?;
        }

        let mut set = RecordSet {
            ttl: RECORD_TTL,
            ..Default::default()
        };
        match record_type(&self.ip) {
            Some(RecordType::A) => set.a_records = vec![self.ip.clone()],
            Some(RecordType::Aaaa) => set.aaaa_records = vec![self.ip.clone()],
            None => return Err(ValidationError::UnknownRecordType(self.ip.clone())),
        }

        // Record sets are upserted; an identical existing set needs no call.
        if let Some(RemoteObject::PrivateDnsRecord(current)) = existing {
            if *current == set {
                return Ok(None);
            }
        }

        Ok(Some(RemoteObject::PrivateDnsRecord(set)))
    }
}
