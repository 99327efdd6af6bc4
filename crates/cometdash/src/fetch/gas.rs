use super::{Cache, Ctx, FetchOutcome, Need, Reading};
use crate::surface::{self, ids, Surface};
use rust_decimal::Decimal;

const NAME: &str = "gas";
const GWEI_DECIMALS: u32 = 9;

pub fn wei_to_gwei(wei: u128) -> eyre::Result<Decimal> {
    let wei = i128::try_from(wei)?;
    Ok(Decimal::try_from_i128_with_scale(wei, GWEI_DECIMALS)?.normalize())
}

pub struct GasFetcher {
    ctx: Ctx,
    cache: Cache<Reading<Decimal>>,
}

impl GasFetcher {
    pub fn new(ctx: Ctx) -> Self {
        Self {
            ctx,
            cache: Cache::default(),
        }
    }

    pub async fn fetch(&self) -> FetchOutcome {
        let Some(scope) = self.ctx.scope(NAME, Need::Account) else {
            return FetchOutcome::Skipped;
        };
        let price = self
            .ctx
            .wallet
            .gas_price()
            .await
            .and_then(wei_to_gwei);
        let reading = Reading::from_result("gas price", price);
        self.ctx.commit(NAME, &scope, &self.cache, reading, render)
    }

    pub async fn refresh(&self) -> FetchOutcome {
        self.fetch().await
    }

    pub fn cached(&self) -> Option<Reading<Decimal>> {
        self.cache.get()
    }
}

fn render(s: &dyn Surface, gwei: &Reading<Decimal>) {
    let text = format!("{} Gwei", gwei.display(ToString::to_string));
    surface::put_text(s, ids::GAS_PRICE, &text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::test_support::{Harness, ScriptedWallet};

    #[test]
    fn gwei_conversion_is_exact() -> eyre::Result<()> {
        assert_eq!(wei_to_gwei(12_500_000_000)?.to_string(), "12.5");
        assert_eq!(wei_to_gwei(1)?.to_string(), "0.000000001");
        assert!(wei_to_gwei(u128::MAX).is_err(), "out of range must error, not panic");
        Ok(())
    }

    #[tokio::test]
    async fn gas_price_renders_in_gwei() {
        let h = Harness::new(Registry::default(), |_| {
            ScriptedWallet::new("0x1").with_gas_price(30_000_000_000)
        })
        .connected(1);
        let f = GasFetcher::new(h.ctx.clone());
        assert_eq!(f.fetch().await, FetchOutcome::Committed);
        assert_eq!(h.board.text(ids::GAS_PRICE).as_deref(), Some("30 Gwei"));
    }

    #[tokio::test]
    async fn unavailable_gas_price_shows_fallback() {
        let h = Harness::new(Registry::default(), |_| ScriptedWallet::new("0x1")).connected(1);
        let f = GasFetcher::new(h.ctx.clone());
        assert_eq!(f.refresh().await, FetchOutcome::Committed);
        assert_eq!(h.board.text(ids::GAS_PRICE).as_deref(), Some("-- Gwei"));
        assert_eq!(f.cached(), Some(Reading::Fallback));
    }
}
