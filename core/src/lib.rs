pub mod classifier;
pub mod connection;
pub mod errors;
pub mod pipeline;
pub mod prepare;
pub mod registry;
pub mod result;
pub mod schema;
pub mod soql;
pub mod value;
pub mod writer;

pub use connection::Connection;
pub use errors::{SeedError, SeedResult};
pub use pipeline::{ChildPlan, DriverState, GrandchildPlan, PipelineDriver, RecordCount, SeedPlan};
pub use registry::IdentityRegistry;
pub use result::SeedResults;
