//! Target sources: command-line specs and relay inventory files
//!
//! The relay inventory is the JSON cache a VPN client keeps of its server
//! list, nested as countries, then cities, then relays.

use crate::models::{Config, ProbeTarget, TargetLocation};
use crate::types::RelayProtocol;
use crate::error::{AppError, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Parse `name=address` or a bare `address` (which then doubles as the name)
pub fn parse_target_spec(spec: &str) -> Result<ProbeTarget> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(AppError::parse("empty target specification"));
    }

    match spec.split_once('=') {
        Some((name, address)) => {
            let (name, address) = (name.trim(), address.trim());
            if name.is_empty() {
                return Err(AppError::parse(format!("target '{}' has an empty name", spec)));
            }
            if address.is_empty() {
                return Err(AppError::parse(format!("target '{}' has an empty address", spec)));
            }
            if address.contains(char::is_whitespace) {
                return Err(AppError::parse(format!("target address '{}' contains whitespace", address)));
            }
            Ok(ProbeTarget::new(name, address))
        }
        None if spec.contains(char::is_whitespace) => {
            Err(AppError::parse(format!("target address '{}' contains whitespace", spec)))
        }
        None => Ok(ProbeTarget::new(spec, spec)),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayInventory {
    #[serde(default)]
    pub countries: Vec<RelayCountry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayCountry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub cities: Vec<RelayCity>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayCity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub relays: Vec<Relay>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relay {
    pub hostname: String,
    #[serde(default)]
    pub ipv4_addr_in: Option<String>,
    /// An object with a `wireguard` key, or the string `"openvpn"` / `"bridge"`
    #[serde(default)]
    pub endpoint_data: serde_json::Value,
    /// Relays taken out of service stay listed with `active: false`
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Relay {
    pub fn is_wireguard(&self) -> bool {
        self.endpoint_data
            .as_object()
            .map(|data| data.contains_key("wireguard"))
            .unwrap_or(false)
    }

    pub fn is_openvpn(&self) -> bool {
        self.endpoint_data.as_str() == Some("openvpn")
    }

    pub fn matches(&self, protocol: RelayProtocol) -> bool {
        match protocol {
            RelayProtocol::Any => true,
            RelayProtocol::WireGuard => self.is_wireguard(),
            RelayProtocol::OpenVpn => self.is_openvpn(),
        }
    }
}

/// Relays selected from an inventory, plus what was dropped on the way
#[derive(Debug, Clone, Default)]
pub struct RelaySelection {
    pub targets: Vec<ProbeTarget>,
    pub warnings: Vec<String>,
}

impl RelayInventory {
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| AppError::parse(format!("invalid relay inventory: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read relay inventory '{}'", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse relay inventory '{}'", path.display()))
    }

    pub fn relay_count(&self) -> usize {
        self.countries
            .iter()
            .flat_map(|country| &country.cities)
            .map(|city| city.relays.len())
            .sum()
    }

    /// Relays of one country (matched on code, case-insensitively) or of all
    /// countries, filtered by protocol
    pub fn select(&self, country_code: Option<&str>, protocol: RelayProtocol) -> RelaySelection {
        let mut selection = RelaySelection::default();
        let wanted = country_code.map(|code| code.trim().to_lowercase());

        let countries: Vec<&RelayCountry> = match &wanted {
            Some(code) => self.countries.iter().filter(|c| c.code.to_lowercase() == *code).collect(),
            None => self.countries.iter().collect(),
        };
        if let (Some(code), true) = (&wanted, countries.is_empty()) {
            selection.warnings.push(format!("no country with code '{}' in the relay inventory", code));
        }

        for country in countries {
            for city in &country.cities {
                for relay in city.relays.iter().filter(|r| r.matches(protocol)) {
                    if !relay.active {
                        selection.warnings.push(format!("relay {} is inactive, skipped", relay.hostname));
                        continue;
                    }
                    let address = relay.ipv4_addr_in.as_deref().map(str::trim).unwrap_or("");
                    if address.is_empty() {
                        selection
                            .warnings
                            .push(format!("relay {} has no IPv4 entry address, skipped", relay.hostname));
                        continue;
                    }

                    selection.targets.push(ProbeTarget::new(&relay.hostname, address).with_location(
                        TargetLocation {
                            country: country.name.clone(),
                            country_code: country.code.clone(),
                            city: city.name.clone(),
                            city_code: city.code.clone(),
                        },
                    ));
                }
            }
        }

        selection
    }
}

/// Drop later entries whose id was already seen
pub fn dedup_targets(targets: Vec<ProbeTarget>) -> (Vec<ProbeTarget>, usize) {
    let mut seen = HashSet::new();
    let before = targets.len();
    let unique: Vec<ProbeTarget> = targets.into_iter().filter(|t| seen.insert(t.id.clone())).collect();
    let removed = before - unique.len();
    (unique, removed)
}

/// Every target the configuration names: explicit specs first, then the relay inventory
pub fn load_targets(config: &Config) -> Result<(Vec<ProbeTarget>, Vec<String>)> {
    let mut targets = Vec::new();
    let mut warnings = Vec::new();

    for spec in &config.targets {
        targets.push(parse_target_spec(spec)?);
    }

    if let Some(path) = &config.relays_file {
        let inventory = RelayInventory::load(path)?;
        let selection = inventory.select(config.country.as_deref(), config.protocol);
        if selection.targets.is_empty() {
            warnings.push(format!(
                "relay inventory '{}' yielded no targets ({} relays listed)",
                path.display(),
                inventory.relay_count()
            ));
        }
        targets.extend(selection.targets);
        warnings.extend(selection.warnings);
    }

    let (targets, removed) = dedup_targets(targets);
    if removed > 0 {
        warnings.push(format!("{} duplicate target(s) ignored", removed));
    }

    Ok((targets, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVENTORY: &str = r#"{
        "countries": [
            {
                "name": "Sweden", "code": "se",
                "cities": [{
                    "name": "Gothenburg", "code": "got",
                    "relays": [
                        {"hostname": "se-got-wg-001", "ipv4_addr_in": "185.213.154.66",
                         "endpoint_data": {"wireguard": {"public_key": "abc"}}, "active": true},
                        {"hostname": "se-got-ovpn-001", "ipv4_addr_in": "185.213.154.130",
                         "endpoint_data": "openvpn"},
                        {"hostname": "se-got-br-001", "ipv4_addr_in": "185.213.154.140",
                         "endpoint_data": "bridge"}
                    ]
                }]
            },
            {
                "name": "Germany", "code": "de",
                "cities": [{
                    "name": "Berlin", "code": "ber",
                    "relays": [
                        {"hostname": "de-ber-wg-001", "ipv4_addr_in": "193.32.248.66",
                         "endpoint_data": {"wireguard": {}}},
                        {"hostname": "de-ber-wg-002", "endpoint_data": {"wireguard": {}}}
                    ]
                }]
            }
        ]
    }"#;

    #[test]
    fn test_parse_target_spec() {
        let named = parse_target_spec(" home = 192.168.1.1 ").unwrap();
        assert_eq!(named.id, "home");
        assert_eq!(named.address, "192.168.1.1");

        let bare = parse_target_spec("1.1.1.1").unwrap();
        assert_eq!(bare.id, "1.1.1.1");
        assert_eq!(bare.address, "1.1.1.1");

        assert!(parse_target_spec("").is_err());
        assert!(parse_target_spec("name=").is_err());
        assert!(parse_target_spec("=1.1.1.1").is_err());
        assert!(parse_target_spec("two words").is_err());
    }

    #[test]
    fn test_select_by_protocol() {
        let inventory = RelayInventory::from_json(INVENTORY).unwrap();
        assert_eq!(inventory.relay_count(), 5);

        let wireguard = inventory.select(None, RelayProtocol::WireGuard);
        let ids: Vec<&str> = wireguard.targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["se-got-wg-001", "de-ber-wg-001"]);
        assert_eq!(wireguard.warnings.len(), 1);
        assert!(wireguard.warnings[0].contains("de-ber-wg-002"));

        let openvpn = inventory.select(None, RelayProtocol::OpenVpn);
        assert_eq!(openvpn.targets.len(), 1);
        assert_eq!(openvpn.targets[0].id, "se-got-ovpn-001");

        // Bridges only show up without a protocol filter.
        assert_eq!(inventory.select(None, RelayProtocol::Any).targets.len(), 4);
    }

    #[test]
    fn test_select_by_country_is_case_insensitive() {
        let inventory = RelayInventory::from_json(INVENTORY).unwrap();
        let selection = inventory.select(Some("SE"), RelayProtocol::Any);
        assert_eq!(selection.targets.len(), 3);

        let location = selection.targets[0].location.as_ref().unwrap();
        assert_eq!(location.country, "Sweden");
        assert_eq!(location.city_code, "got");
        assert_eq!(location.display_name(), "Gothenburg, Sweden");

        let missing = inventory.select(Some("xx"), RelayProtocol::Any);
        assert!(missing.targets.is_empty());
        assert!(missing.warnings[0].contains("'xx'"));
    }

    #[test]
    fn test_inactive_relays_are_skipped_with_warning() {
        let inventory = RelayInventory::from_json(
            r#"{"countries": [{"name": "Norway", "code": "no", "cities": [{"name": "Oslo", "code": "osl",
                "relays": [
                    {"hostname": "no-osl-wg-001", "ipv4_addr_in": "176.125.235.71",
                     "endpoint_data": {"wireguard": {}}, "active": false},
                    {"hostname": "no-osl-wg-002", "ipv4_addr_in": "176.125.235.72",
                     "endpoint_data": {"wireguard": {}}}
                ]}]}]}"#,
        )
        .unwrap();

        let selection = inventory.select(None, RelayProtocol::WireGuard);
        let ids: Vec<&str> = selection.targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["no-osl-wg-002"]);
        assert_eq!(selection.warnings, vec!["relay no-osl-wg-001 is inactive, skipped".to_string()]);
    }

    #[test]
    fn test_dedup_keeps_first() {
        let (targets, removed) = dedup_targets(vec![
            ProbeTarget::new("a", "10.0.0.1"),
            ProbeTarget::new("b", "10.0.0.2"),
            ProbeTarget::new("a", "10.0.0.3"),
        ]);
        assert_eq!(removed, 1);
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].address, "10.0.0.1");
    }

    #[test]
    fn test_load_targets_combines_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relays.json");
        fs::write(&path, INVENTORY).unwrap();

        let mut config = Config::default();
        config.targets = vec!["de-ber-wg-001=10.9.9.9".to_string(), "8.8.8.8".to_string()];
        config.relays_file = Some(path);
        config.country = Some("de".to_string());

        let (targets, warnings) = load_targets(&config).unwrap();
        let ids: Vec<&str> = targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["de-ber-wg-001", "8.8.8.8"]);
        assert_eq!(targets[0].address, "10.9.9.9");
        assert!(warnings.iter().any(|w| w.contains("duplicate")));
        assert!(warnings.iter().any(|w| w.contains("de-ber-wg-002")));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let mut config = Config::default();
        config.relays_file = Some("/nonexistent/relays.json".into());
        let err = load_targets(&config).unwrap_err();
        assert_eq!(err.category(), "IO");
    }
}
