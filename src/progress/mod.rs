pub mod broker;
pub mod reader;

pub use broker::ProgressBroker;
