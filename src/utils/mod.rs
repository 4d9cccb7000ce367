/// Networks and RPC endpoints
pub mod chains;
/// Constants
pub mod constants;
/// Logger
pub mod logger;
/// Node providers
pub mod providers;
