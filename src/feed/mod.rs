/// Feed subsystem: publish fan-out, the two event logs, and read-time
/// aggregation
pub mod aggregator;
pub mod dispatcher;
pub mod intake;
pub mod store;

pub use aggregator::FeedAggregator;
pub use dispatcher::{FanoutDispatcher, PublishEvent};
pub use intake::{PublishIntake, PublishProducer};
pub use store::{FeedStore, PgFeedStore};
