//! Probe target descriptors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a relay lives, when the inventory knows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLocation {
    pub country: String,
    pub country_code: String,
    pub city: String,
    pub city_code: String,
}

impl TargetLocation {
    /// `City, Country` for tables
    pub fn display_name(&self) -> String {
        match (self.city.is_empty(), self.country.is_empty()) {
            (false, false) => format!("{}, {}", self.city, self.country),
            (false, true) => self.city.clone(),
            (true, false) => self.country.clone(),
            (true, true) => self.country_code.to_uppercase(),
        }
    }
}

/// One candidate endpoint. Immutable once handed to the worker pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTarget {
    /// Stable identifier, e.g. a relay hostname
    pub id: String,
    /// Host name or IP literal used for ping and TCP connects
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<TargetLocation>,
}

impl ProbeTarget {
    pub fn new<I: Into<String>, A: Into<String>>(id: I, address: A) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: TargetLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Address trimmed, or `None` when there is nothing to probe
    pub fn probe_address(&self) -> Option<&str> {
        let address = self.address.trim();
        if address.is_empty() {
            None
        } else {
            Some(address)
        }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.id == self.address {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.id, self.address)
        }
    }
}
