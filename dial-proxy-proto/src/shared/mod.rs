mod data;
mod dial_request;
mod frame;
mod net_addr;
mod status_code;
mod tunnel_type;

pub use data::*;
pub use dial_request::*;
pub use frame::*;
pub use net_addr::*;
pub use status_code::*;
pub use tunnel_type::*;
