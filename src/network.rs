//! Network definitions and known escrow factory deployments.
//!
//! This module defines the networks the Capaz contracts are deployed on,
//! and provides the statically known escrow factory address per network.
//! [`EscrowConfig`] turns that table into an explicit immutable configuration
//! value built once at startup, with optional per-network overrides.

use alloy_primitives::address;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::types::EvmAddress;

/// Networks with a known Capaz escrow factory deployment.
#[derive(Debug, Hash, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    /// Local development node (chain ID 0).
    #[serde(rename = "local")]
    Local,
    /// Ethereum mainnet (chain ID 1).
    #[serde(rename = "mainnet")]
    Mainnet,
    /// Goerli testnet (chain ID 5).
    #[serde(rename = "testnet")]
    Testnet,
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Local => write!(f, "local"),
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

/// The wallet reported a chain ID no deployment is known for.
///
/// This is a configuration error at startup, not a runtime condition to
/// recover from.
#[derive(Debug, thiserror::Error)]
#[error("Unknown network id: {0}")]
pub struct UnknownNetworkError(pub u64);

impl Network {
    /// Return all known [`Network`] variants.
    pub fn variants() -> &'static [Network] {
        &[Network::Local, Network::Mainnet, Network::Testnet]
    }

    pub fn as_chain_id(&self) -> u64 {
        match self {
            Network::Local => 0,
            Network::Mainnet => 1,
            Network::Testnet => 5,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Result<Network, UnknownNetworkError> {
        match chain_id {
            0 => Ok(Network::Local),
            1 => Ok(Network::Mainnet),
            5 => Ok(Network::Testnet),
            other => Err(UnknownNetworkError(other)),
        }
    }
}

/// A deployed Capaz escrow factory instance on a specific network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowDeployment {
    pub network: Network,
    pub escrow_factory: EvmAddress,
}

static LOCAL: Lazy<EscrowDeployment> = Lazy::new(|| EscrowDeployment {
    network: Network::Local,
    escrow_factory: address!("0x6FD4EB990eD2E7bb2b1203E7f728e29904A4d5A4").into(),
});

static MAINNET: Lazy<EscrowDeployment> = Lazy::new(|| EscrowDeployment {
    network: Network::Mainnet,
    escrow_factory: address!("0x6FD4EB990eD2E7bb2b1203E7f728e29904A4d5A4").into(),
});

static TESTNET: Lazy<EscrowDeployment> = Lazy::new(|| EscrowDeployment {
    network: Network::Testnet,
    escrow_factory: address!("0x356b0EE59feB848F0b7Eb29480835fD5c6D0C79a").into(),
});

impl EscrowDeployment {
    /// Return the known deployment for `network`. Total over the enum.
    pub fn by_network(network: Network) -> &'static EscrowDeployment {
        match network {
            Network::Local => &LOCAL,
            Network::Mainnet => &MAINNET,
            Network::Testnet => &TESTNET,
        }
    }
}

/// One entry of the startup configuration: a network and the escrow factory
/// address to use on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub network_id: Network,
    pub escrow_factory_address: EvmAddress,
}

impl From<&EscrowDeployment> for NetworkConfig {
    fn from(deployment: &EscrowDeployment) -> Self {
        NetworkConfig {
            network_id: deployment.network,
            escrow_factory_address: deployment.escrow_factory,
        }
    }
}

/// Immutable per-network contract configuration, built once at startup.
///
/// Holds exactly one [`NetworkConfig`] per [`Network`] variant, so
/// [`EscrowConfig::get`] is a total function. Defaults come from the known
/// [`EscrowDeployment`] table; hosts can override individual networks from a
/// JSON document (e.g. to point at a freshly deployed local factory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowConfig {
    local: NetworkConfig,
    mainnet: NetworkConfig,
    testnet: NetworkConfig,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self::known()
    }
}

impl EscrowConfig {
    /// Configuration from the statically known deployments.
    pub fn known() -> Self {
        EscrowConfig {
            local: EscrowDeployment::by_network(Network::Local).into(),
            mainnet: EscrowDeployment::by_network(Network::Mainnet).into(),
            testnet: EscrowDeployment::by_network(Network::Testnet).into(),
        }
    }

    /// Known deployments with overrides applied from a JSON array of
    /// [`NetworkConfig`] entries. Later entries win.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let overrides: Vec<NetworkConfig> = serde_json::from_str(json)?;
        let mut config = Self::known();
        for entry in overrides {
            config.set(entry);
        }
        Ok(config)
    }

    pub fn get(&self, network: Network) -> &NetworkConfig {
        match network {
            Network::Local => &self.local,
            Network::Mainnet => &self.mainnet,
            Network::Testnet => &self.testnet,
        }
    }

    fn set(&mut self, entry: NetworkConfig) {
        match entry.network_id {
            Network::Local => self.local = entry,
            Network::Mainnet => self.mainnet = entry,
            Network::Testnet => self.testnet = entry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_id_round_trip() {
        for network in Network::variants() {
            let chain_id = network.as_chain_id();
            assert_eq!(Network::from_chain_id(chain_id).unwrap(), *network);
        }
        assert!(Network::from_chain_id(84532).is_err());
    }

    #[test]
    fn known_deployments() {
        let mainnet = EscrowDeployment::by_network(Network::Mainnet);
        assert_eq!(
            mainnet.escrow_factory,
            "0x6FD4EB990eD2E7bb2b1203E7f728e29904A4d5A4"
                .parse::<EvmAddress>()
                .unwrap()
        );
        let testnet = EscrowDeployment::by_network(Network::Testnet);
        assert_eq!(
            testnet.escrow_factory,
            "0x356b0EE59feB848F0b7Eb29480835fD5c6D0C79a"
                .parse::<EvmAddress>()
                .unwrap()
        );
    }

    #[test]
    fn config_defaults_to_known_deployments() {
        let config = EscrowConfig::known();
        for network in Network::variants() {
            assert_eq!(
                config.get(*network).escrow_factory_address,
                EscrowDeployment::by_network(*network).escrow_factory
            );
        }
    }

    #[test]
    fn config_override_from_json() {
        let json = r#"[
            {
                "networkId": "local",
                "escrowFactoryAddress": "0x0000000000000000000000000000000000000042"
            }
        ]"#;
        let config = EscrowConfig::from_json(json).unwrap();
        assert_eq!(
            config.get(Network::Local).escrow_factory_address,
            "0x0000000000000000000000000000000000000042"
                .parse::<EvmAddress>()
                .unwrap()
        );
        // Untouched networks keep the known deployment.
        assert_eq!(
            config.get(Network::Mainnet).escrow_factory_address,
            EscrowDeployment::by_network(Network::Mainnet).escrow_factory
        );
    }
}
