pub mod inspect_cmd;
pub mod networks_cmd;
pub mod query_cmd;

pub use inspect_cmd::cmd_inspect;
pub use networks_cmd::cmd_networks;
pub use query_cmd::cmd_query;
