//! Stage executors
//!
//! One executor per pipeline phase. Each stage is re-entrant and idempotent
//! at the granularity of the status field it owns: search produces fresh
//! in-memory candidates, product and seller mutate only their own records.

pub mod product;
pub mod search;
pub mod seller;

pub use product::ProductStage;
pub use search::SearchStage;
pub use seller::SellerStage;
