//! Per-network contract addresses and display names.

pub const ETHEREUM_MAINNET: u64 = 1;
pub const POLYGON: u64 = 137;
pub const ARBITRUM: u64 = 42161;
pub const AVALANCHE: u64 = 43114;
pub const BSC: u64 = 56;

/// Comet proxy per chain: the market contract routed to when no market is named.
pub(super) const PROXIES: &[(u64, &str)] = &[
    (ETHEREUM_MAINNET, "0x3d9819210A31b4961b30EF54bE2aeD79B9c9Cd3B"),
    (POLYGON, "0xA5ED4E203Dbb8f541a5a5dEBC5b37bB4094eF43b"),
    (ARBITRUM, "0xA5f3865042c7d9985fE4023b21B170663DFeCa46"),
    (AVALANCHE, "0xA5bfe375Fcdcc5B2e9366BAACeFa9C5A0CD45b33"),
    (BSC, "0x9aA6f5dA6eF4Bf2a23BB0f264d33b9c75a3659D8"),
];

/// `(chain, COMP token, GovernorBravo)`.
pub(super) const GOVERNANCE: &[(u64, &str, &str)] = &[(
    ETHEREUM_MAINNET,
    "0xc00e94Cb662C3520282E6f5717214004A7f26888",
    "0xc0Da02939E1441F497fd74F78cE7Decb17B66529",
)];

const NETWORK_NAMES: &[(&str, &str)] = &[
    ("0x1", "Ethereum Mainnet"),
    ("0x3", "Ropsten Testnet"),
    ("0x4", "Rinkeby Testnet"),
    ("0x5", "Goerli Testnet"),
    ("0x2a", "Kovan Testnet"),
    ("0x38", "BNB Smart Chain"),
    ("0x89", "Polygon"),
    ("0xa4b1", "Arbitrum One"),
    ("0xa86a", "Avalanche C-Chain"),
];

pub const UNKNOWN_NETWORK: &str = "Unknown Network";

/// Human-readable name for a hex chain id as reported by a wallet (`"0x1"`).
pub fn network_name(hex_chain_id: &str) -> &'static str {
    let key = hex_chain_id.trim().to_ascii_lowercase();
    NETWORK_NAMES
        .iter()
        .find(|(id, _)| *id == key)
        .map_or(UNKNOWN_NETWORK, |(_, name)| *name)
}

/// Parse a wallet chain id (`"0x89"`, or decimal `"137"`) into a number.
pub fn parse_chain_id(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

pub fn chain_id_hex(chain_id: u64) -> String {
    format!("{chain_id:#x}")
}
