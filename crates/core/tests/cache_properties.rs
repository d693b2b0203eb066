use proptest::prelude::*;

use btcpulse_core::cache::{CacheConfig, SnapshotCache};
use btcpulse_market_data::{Category, MarketData};

fn market(price: f64) -> MarketData {
    MarketData {
        current_price: price,
        price_change: 0.0,
        volume: 1.0,
        market_cap: 1.0,
    }
}

proptest! {
    #[test]
    fn history_stays_bounded_and_ordered(
        prices in prop::collection::vec(1.0f64..100_000.0, 0..200),
        cap in 1usize..50,
    ) {
        let cache = SnapshotCache::with_config(CacheConfig { max_history: cap, ..Default::default() });
        for price in &prices {
            cache.update_market_data(&market(*price), "prop");
        }

        let history = cache.history();
        prop_assert!(history.len() <= cap);
        prop_assert!(history.windows(2).all(|w| w[0].id < w[1].id));
        prop_assert!(history.iter().all(|e| e.category == Category::Market));
    }

    #[test]
    fn last_accepted_price_wins(prices in prop::collection::vec(1.0f64..100_000.0, 1..50)) {
        let cache = SnapshotCache::new();
        for price in &prices {
            cache.update_market_data(&market(*price), "prop");
        }
        prop_assert_eq!(cache.snapshot().current_price, prices.last().copied());
    }

    #[test]
    fn non_finite_prices_never_reach_the_cache(bad in prop_oneof![
        Just(f64::NAN),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
        -1e9f64..=0.0,
    ]) {
        let cache = SnapshotCache::new();
        prop_assert!(!cache.update_market_data(&market(bad), "prop"));
        prop_assert!(cache.snapshot().current_price.is_none());
    }
}
