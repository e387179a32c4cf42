use cucumber::given;
use haul_engine::test_utils::market::TestMarket;

use crate::cucumber::MarketWorld;

#[given("a fresh marketplace")]
async fn fresh_database(world: &mut MarketWorld) {
    world.market = Some(TestMarket::new().await);
}
