pub mod apply_result;
pub mod audit;
pub mod batch;
pub mod endpoint;
pub mod environment;
pub mod metrics;
pub mod plan;
pub mod policy;
pub mod schema;
pub mod topic;
pub mod violation;
