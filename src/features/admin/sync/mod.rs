//! Admin console state synchronization.
//!
//! Three sources feed one reducer: explicit fetches (on mount, filter and
//! page changes), realtime row changes, and a periodic full refresh.
//! Realtime updates use last-writer-wins on `updated_at`; creates are
//! prepended when they match the active filters.

mod action;
mod reducer;
mod state;
mod store;

pub use action::AdminAction;
pub use reducer::reduce;
pub use state::{AdminState, Collection, CollectionFilter, Entity, Slot};
pub use store::{AdminStore, StoreCore};
