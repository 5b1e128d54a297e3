pub mod forwarding;

pub use forwarding::ecmp_forwarding_rules;
