pub mod aggregator;
pub mod completion;
pub mod requests;
pub mod rpc;
