//! Static token table: symbol, decimals and per-chain contract address.

pub(super) struct TokenDef {
    pub symbol: &'static str,
    pub decimals: u8,
    pub addresses: &'static [(u64, &'static str)],
}

pub(super) const TOKENS: &[TokenDef] = &[
    // Governance
    TokenDef {
        symbol: "COMP",
        decimals: 18,
        addresses: &[
            (1, "0xc00e94Cb662C3520282E6f5717214004A7f26888"),
            (137, "0x1F9C2eC6d8F0DbC6A05bb214f2D73c1a80636dE1"),
            (42161, "0x354A6dA3fcde098F8389cad84b0182725c6C91dE"),
            (43114, "0xB31f66AA3C1e785363F0875A1B74E27b85FD66c7"),
            (56, "0x4979f9A6B8B54BB124d03634cE7A3d6C6dD1d4D2"),
        ],
    },
    // Stablecoins
    TokenDef {
        symbol: "USDC",
        decimals: 6,
        addresses: &[
            (1, "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606EB48"),
            (137, "0x2791Bca1f2de4661ED88A30C99A7a9449Aa84174"),
            (42161, "0xFF970A61A04b1cA14834A43f5dE4533eBDDB5CC8"),
            (43114, "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E"),
            (56, "0x8ac76a51cc950d9822D68b83fe1Ad97B32Cd580d"),
        ],
    },
    TokenDef {
        symbol: "USDT",
        decimals: 6,
        addresses: &[
            (1, "0xdAC17F958D2ee523a2206206994597C13D831ec7"),
            (137, "0xc2132D05D31c914a87C6611C10748AaCB9b0cA92"),
            (42161, "0xFd086BC7CD5C481DCC9c85e11a3b1045cDe5f3C1"),
            (43114, "0xc7198437980c041c805A1EDcbA50c1Ce5db95118"),
            (56, "0x55d398326f99059fF775485246999027B3197955"),
        ],
    },
    TokenDef {
        symbol: "DAI",
        decimals: 18,
        addresses: &[
            (1, "0x6B175474E89094C44Da98b954EedeAC495271d0F"),
            (137, "0x8f3Cf7ad23Cd3CaDbD9735AFf958023239c6A063"),
            (42161, "0xDA10009cBd5D07Dd0CeCc66161FC93D7c9000da1"),
            (43114, "0xd586E7F844cEa2F87f50152665BCbc2C279D8d70"),
            (56, "0x1AF3F329e8BE154074D8769D1FFa4eE058B1DBc3"),
        ],
    },
    // Wrapped
    TokenDef {
        symbol: "WETH",
        decimals: 18,
        addresses: &[
            (1, "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
            (137, "0x7ceB23fD6bC0adD59E62ac25578270cFf1b9f619"),
            (42161, "0x82af49447d8a07e3bd95bd0d56f35241523fbab1"),
            (43114, "0x49D5c2BdFfac6CE2BFdB6640F4F80f226bc10bAB"),
            (56, "0x2170Ed0880ac9A755fd29B2688956BD959F933F8"),
        ],
    },
    TokenDef {
        symbol: "WBTC",
        decimals: 8,
        addresses: &[
            (1, "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"),
            (137, "0x1BFD67037B42Cf73acF2047067bd4F2C47D9BfD6"),
            (42161, "0x2f2a2543b76a4166549f7aab2e75bef0dada6ff0"),
            (43114, "0x50b7545627a5162F82A992c33b87aDc75187B218"),
            (56, "0x7130d2A12B9BCbFAe4f2634d864A1Ee1Ce3Ead9c"),
        ],
    },
    // Mainnet only
    TokenDef {
        symbol: "MKR",
        decimals: 18,
        addresses: &[(1, "0x9f8F72aA9304c8B593d555F12eF6589cC3A579A2")],
    },
    TokenDef {
        symbol: "BAT",
        decimals: 18,
        addresses: &[(1, "0x0D8775F648430679A709E98d2b0Cb6250d2887EF")],
    },
];
