//! Address and interface registry.
//!
//! Static tables are parsed once into a [`Registry`]; every address it hands out is already an
//! [`Address`], so display goes through EIP-55 checksumming and no caller re-parses strings.

pub mod abi;
mod markets;
pub mod networks;
mod tokens;

use alloy::primitives::Address;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr as _;

/// A token the dashboard knows about, with its contract address per chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub symbol: String,
    pub decimals: u8,
    pub addresses: BTreeMap<u64, Address>,
}

impl AssetDescriptor {
    pub fn address_on(&self, chain_id: u64) -> Option<Address> {
        self.addresses.get(&chain_id).copied()
    }
}

/// A lending market on a single chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketDescriptor {
    pub symbol: String,
    pub address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovernanceContracts {
    pub comp_token: Address,
    pub governor: Address,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    tokens: Vec<AssetDescriptor>,
    markets: BTreeMap<u64, Vec<MarketDescriptor>>,
    proxies: BTreeMap<u64, Address>,
    governance: BTreeMap<u64, GovernanceContracts>,
}

/// Parse a `0x` + 40 hex address. Mixed-case input is accepted without checksum validation;
/// the returned value always renders checksummed.
pub fn parse_address(s: &str) -> Option<Address> {
    let s = s.trim();
    let hex = s.strip_prefix("0x")?;
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Address::from_str(s).ok()
}

pub fn checksum(addr: Address) -> String {
    addr.to_checksum(None)
}

fn parse_static(what: &str, s: &str) -> Option<Address> {
    let out = parse_address(s);
    if out.is_none() {
        tracing::warn!(entry = what, address = s, "skipping malformed static address");
    }
    out
}

impl Registry {
    /// The built-in tables.
    pub fn builtin() -> Self {
        let mut r = Self::default();
        for t in tokens::TOKENS {
            for (chain, a) in t.addresses {
                if let Some(address) = parse_static(t.symbol, a) {
                    r = r.with_token(t.symbol, t.decimals, *chain, address);
                }
            }
        }
        for m in markets::MARKETS {
            if let Some(address) = parse_static(m.symbol, m.address) {
                r = r.with_market(m.chain_id, m.symbol, address);
            }
        }
        for (chain, a) in networks::PROXIES {
            if let Some(address) = parse_static("proxy", a) {
                r = r.with_proxy(*chain, address);
            }
        }
        for (chain, comp, gov) in networks::GOVERNANCE {
            if let (Some(comp_token), Some(governor)) =
                (parse_static("COMP", comp), parse_static("GovernorBravo", gov))
            {
                r = r.with_governance(*chain, GovernanceContracts { comp_token, governor });
            }
        }
        r
    }

    pub fn with_token(mut self, symbol: &str, decimals: u8, chain_id: u64, address: Address) -> Self {
        if let Some(t) = self.tokens.iter_mut().find(|t| t.symbol == symbol) {
            t.addresses.insert(chain_id, address);
        } else {
            self.tokens.push(AssetDescriptor {
                symbol: symbol.to_owned(),
                decimals,
                addresses: BTreeMap::from([(chain_id, address)]),
            });
        }
        self
    }

    pub fn with_market(mut self, chain_id: u64, symbol: &str, address: Address) -> Self {
        self.markets.entry(chain_id).or_default().push(MarketDescriptor {
            symbol: symbol.to_owned(),
            address,
        });
        self
    }

    pub fn with_proxy(mut self, chain_id: u64, address: Address) -> Self {
        self.proxies.insert(chain_id, address);
        self
    }

    pub fn with_governance(mut self, chain_id: u64, contracts: GovernanceContracts) -> Self {
        self.governance.insert(chain_id, contracts);
        self
    }

    pub fn token(&self, symbol: &str) -> Option<&AssetDescriptor> {
        self.tokens.iter().find(|t| t.symbol == symbol)
    }

    /// Tokens that have an address on `chain_id`, in table order. Others are skipped, never
    /// defaulted.
    pub fn tokens_on(&self, chain_id: u64) -> Vec<(&AssetDescriptor, Address)> {
        self.tokens
            .iter()
            .filter_map(|t| Some((t, t.address_on(chain_id)?)))
            .collect()
    }

    /// Reverse lookup: which known token lives at `address` on `chain_id`.
    pub fn token_by_address(&self, chain_id: u64, address: Address) -> Option<&AssetDescriptor> {
        self.tokens
            .iter()
            .find(|t| t.address_on(chain_id) == Some(address))
    }

    pub fn markets(&self, chain_id: u64) -> &[MarketDescriptor] {
        self.markets.get(&chain_id).map_or(&[], Vec::as_slice)
    }

    pub fn market(&self, chain_id: u64, symbol: &str) -> Option<&MarketDescriptor> {
        self.markets(chain_id)
            .iter()
            .find(|m| m.symbol.eq_ignore_ascii_case(symbol))
    }

    pub fn proxy_address(&self, chain_id: u64) -> Option<Address> {
        self.proxies.get(&chain_id).copied()
    }

    pub fn governance(&self, chain_id: u64) -> Option<GovernanceContracts> {
        self.governance.get(&chain_id).copied()
    }

    /// Serializable view of the registry for `cometdash networks`.
    pub fn overview(&self) -> Vec<NetworkOverview> {
        let mut chains: Vec<u64> = self.proxies.keys().copied().collect();
        for c in self.markets.keys() {
            if !chains.contains(c) {
                chains.push(*c);
            }
        }
        chains.sort_unstable();

        chains
            .into_iter()
            .map(|chain_id| {
                let hex = networks::chain_id_hex(chain_id);
                NetworkOverview {
                    chain_id,
                    name: networks::network_name(&hex),
                    chain_id_hex: hex,
                    proxy: self.proxy_address(chain_id).map(checksum),
                    markets: self
                        .markets(chain_id)
                        .iter()
                        .map(|m| (m.symbol.clone(), checksum(m.address)))
                        .collect(),
                    tokens: self
                        .tokens_on(chain_id)
                        .into_iter()
                        .map(|(t, a)| (t.symbol.clone(), checksum(a)))
                        .collect(),
                    governance: self.governance(chain_id).map(|g| {
                        BTreeMap::from([
                            ("comp".to_owned(), checksum(g.comp_token)),
                            ("governor".to_owned(), checksum(g.governor)),
                        ])
                    }),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NetworkOverview {
    pub chain_id: u64,
    pub chain_id_hex: String,
    pub name: &'static str,
    pub proxy: Option<String>,
    pub markets: BTreeMap<String, String>,
    pub tokens: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub governance: Option<BTreeMap<String, String>>,
}
