pub mod api;
pub mod config;
pub mod flag_definitions;
pub mod flag_endpoint;
pub mod flag_matching;
pub mod organization;
pub mod organization_endpoint;
pub mod project;
pub mod project_endpoint;
pub mod redis;
pub mod router;
pub mod server;
pub mod unique_name;
pub mod utils;
pub mod v0_endpoint;
pub mod v0_request;

// Shared with the integration tests under tests/, so not gated on cfg(test)
pub mod test_utils;
