pub mod error;
pub mod http;
pub mod simpler_grants;
pub mod usaspending;
pub mod wire;
