pub mod cache;
pub mod key;
pub mod state;

pub use cache::{
    GarbageCollectorHandle, QueryCacheStats, QueryClient, QueryConfig, QuerySubscription,
};
pub use key::{QueryFamily, QueryFilter, QueryKey};
pub use state::{QueryState, QueryStatus};
