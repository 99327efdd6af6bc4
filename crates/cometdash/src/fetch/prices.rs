use super::{Cache, Ctx, FetchOutcome, Need, Reading};
use crate::amount::base_to_decimal;
use crate::registry::abi::IComet;
use crate::surface::{self, ids, Surface};
use crate::wallet::{read, WalletProvider};
use alloy::primitives::Address;
use eyre::OptionExt as _;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

const NAME: &str = "prices";

/// Comet price feeds report USD with eight decimals.
pub const PRICE_DECIMALS: u32 = 8;

/// USD price per token symbol.
pub type PriceSnapshot = BTreeMap<String, Reading<Decimal>>;

struct Feeds {
    base_token: Option<Address>,
    base_feed: Option<Address>,
}

impl Feeds {
    async fn feed_for(
        &self,
        wallet: &dyn WalletProvider,
        comet: Address,
        asset: Address,
    ) -> eyre::Result<Address> {
        if self.base_token == Some(asset) {
            return self.base_feed.ok_or_eyre("base price feed unavailable");
        }
        let info = read(wallet, comet, &IComet::getAssetInfoByAddressCall { asset }).await?;
        Ok(info.priceFeed)
    }
}

async fn price_of(
    wallet: &dyn WalletProvider,
    comet: Address,
    feeds: &Feeds,
    asset: Address,
) -> eyre::Result<Decimal> {
    let feed = feeds.feed_for(wallet, comet, asset).await?;
    let raw = read(wallet, comet, &IComet::getPriceCall { priceFeed: feed }).await?;
    base_to_decimal(raw, PRICE_DECIMALS)
}

pub struct PricesFetcher {
    ctx: Ctx,
    cache: Cache<PriceSnapshot>,
}

impl PricesFetcher {
    pub fn new(ctx: Ctx) -> Self {
        Self {
            ctx,
            cache: Cache::default(),
        }
    }

    pub async fn fetch(&self) -> FetchOutcome {
        let Some(scope) = self.ctx.scope(NAME, Need::Proxy) else {
            return FetchOutcome::Skipped;
        };
        let w = self.ctx.wallet.as_ref();
        let comet = scope.comet();

        let feeds = Feeds {
            base_token: Reading::from_result("base token", read(w, comet, &IComet::baseTokenCall {}).await)
                .value()
                .copied(),
            base_feed: Reading::from_result(
                "base price feed",
                read(w, comet, &IComet::baseTokenPriceFeedCall {}).await,
            )
            .value()
            .copied(),
        };

        let mut snapshot = PriceSnapshot::new();
        for (token, address) in self.ctx.registry.tokens_on(scope.chain_id) {
            let price = price_of(w, comet, &feeds, address).await;
            snapshot.insert(token.symbol.clone(), Reading::from_result(&token.symbol, price));
        }
        self.ctx.commit(NAME, &scope, &self.cache, snapshot, render)
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.fetch().await
    }

    pub fn cached(&self) -> Option<PriceSnapshot> {
        self.cache.get()
    }
}

fn render(s: &dyn Surface, snapshot: &PriceSnapshot) {
    for (symbol, price) in snapshot {
        let text = format!("Price: {} USD", price.display(|p| p.normalize().to_string()));
        surface::put_text(s, &ids::price(symbol), &text);
    }
}
