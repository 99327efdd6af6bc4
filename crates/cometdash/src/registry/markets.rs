//! Static per-chain market list. Each address is a market contract speaking the Comet interface.

pub(super) struct MarketDef {
    pub chain_id: u64,
    pub symbol: &'static str,
    pub address: &'static str,
}

const fn m(chain_id: u64, symbol: &'static str, address: &'static str) -> MarketDef {
    MarketDef {
        chain_id,
        symbol,
        address,
    }
}

pub(super) const MARKETS: &[MarketDef] = &[
    // Ethereum
    m(1, "cETH", "0x4Ddc2D193948926d02f9B1fE9e1daa0718270ED5"),
    m(1, "cDAI", "0x5d3a536E4D6DbD6114cc1Ead35777bAB948E3643"),
    m(1, "cUSDC", "0x39AA39c021dfbaE8faC545936693aC917d5E7563"),
    m(1, "cUSDT", "0xf650C3d88D12dB855b8bf7D11Be6C55A4e07dCC9"),
    m(1, "cWBTC", "0xccF4429DB6322D5C611ee964527D42E5d685DD6a"),
    m(1, "cBAT", "0x6C8C6B02E7b2BE14d4fA6022dfd6dFc496dD9d70"),
    m(1, "cZRX", "0xB3319f5D18Bc0D84dd1b4825dcde5d5F7266D407"),
    m(1, "cUNI", "0x35A18000230DA775CAc24873d00Ff85BccdeD550"),
    m(1, "cCOMP", "0xBe0eB53F46cd790Cd13851d5EFf43D12404d33E8"),
    m(1, "cMKR", "0x95b4EF2869EBd94BEb4eEE400a99824BF5DC325b"),
    m(1, "cLINK", "0xFAaDA5E06Dab1ac1b0a4D0f3f99814BDFB35875C"),
    m(1, "cREP", "0x158079Ee67Fce2f58472A96584A73C7Ab9AC95c1"),
    m(1, "cTUSD", "0x12392f67bdf24fae0af363c24ac620a2f67dad86"),
    m(1, "cSUSHI", "0x4B0181102A0112A2ef11AbD0a0A33A58DcD090d3"),
    m(1, "cYFI", "0x80a2AE356fc9ef4305676f7a3E2Ed04e12C33946"),
    m(1, "cAAVE", "0x3FF0eA7D7b8dC1d72c4bE705d9B4608Bdf6Fe808"),
    m(1, "cSAI", "0xf5dce57282a584d2746faf1593d3121fcac444dc"),
    // Polygon
    m(137, "cMATIC", "0xd0753a2ba919ba9c0f969e6d28b5b77b8c3ca08e"),
    m(137, "cDAI", "0x1a13f4ca1d028320a707d99520abfefca3998b7f"),
    m(137, "cUSDC", "0x9719d867A500Ef117cC201206B8ab51e794d3F82"),
    m(137, "cUSDT", "0x5B6E2F8aBd073fCE9CE60d94b86c46cbbAcDb0F7"),
    m(137, "cWBTC", "0x7D36999a7cF585351dFd5e8b17109458D97ec120"),
    m(137, "cWETH", "0x27B4692eD7095e920A72b8D8B43a9eECF1A8AD09"),
    // Arbitrum
    m(42161, "cETH", "0x41B5844f4680a8C38fBb695b7F9CFd1F64474a72"),
    m(42161, "cUSDC", "0x3eFCF0aD408D542b4b47e3C343F265E4EBeA362E"),
    m(42161, "cUSDT", "0x6f88e0b2e0f3fc5ab88812df5469e0943d2806e3"),
    m(42161, "cWBTC", "0x8a1b86B8503d43147D74C6920a1fD0F1c9E00fF2"),
    // Avalanche
    m(43114, "cAVAX", "0xE519f4cd2803BA53A40E6377E82406e548418660"),
    m(43114, "cUSDC", "0xA7D7079b0FEAD91F3E65f86E8915Cb59c1a4C664"),
    m(43114, "cUSDT", "0xcE1bFFBD5374Da8dC0B4d147d0B8F446b8A2aD01"),
    m(43114, "cDAI", "0x47AFa96Cdc9fAb46904A55a6ad4bf6660B53c38a"),
    m(43114, "cWETH", "0x0A77230d17318075983913bC2145DB16C7366156"),
    m(43114, "cWBTC", "0x2f5f0F2e0A5FfDA05bB90EAb3b49bF28b1Dca76a"),
    // BNB Smart Chain
    m(56, "cBNB", "0xF70b9E631cF466B9B7Bf8e82F110b50d0160F0E1"),
    m(56, "cBUSD", "0x6f00384D5fA5F3F5cF0BbB90BaFE0b16D6B6fd75"),
    m(56, "cUSDT", "0x135669c2dcBd63F639582b313883F101a4497F76"),
    m(56, "cBTCB", "0xBbD1d908c7b0D2b32D0eE834D06C8f4A8e655329"),
    m(56, "cETH", "0x063f5bcb3a59870d4a5a15365E6e9bABfD5Ab14D"),
];
