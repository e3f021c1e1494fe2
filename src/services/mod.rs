pub mod flows;

pub use flows::{CompletedFlow, FlowEngine, FlowKind, FlowRequest};
