//! Port traits: the seams every outward call goes through (spec §9 Design
//! Notes — constructor-injected interfaces instead of ambient globals).

mod cache;
mod coordinator;
mod governor;
mod journal;
mod poller;
mod push;
mod sponsor_state;
mod store;

pub use cache::*;
pub use coordinator::*;
pub use governor::*;
pub use journal::*;
pub use poller::*;
pub use push::*;
pub use sponsor_state::*;
pub use store::*;
