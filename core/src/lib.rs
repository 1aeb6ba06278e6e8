//! # fleetr core
//!
//! Orchestration on top of the shared model in `fleetr-common`.
//!
//! * **[`ports`]**: the traits the reconciliation loop talks to. Concrete
//!   implementations are injected, never looked up globally.
//! * **[`reconciler`]**: the pull-based loop converging the remote assignment store.
//! * **[`inventory`]**: the local device inventory, acting as the device resolver.
//! * **[`store`]**, **[`sources`]**, **[`snapshot`]**, **[`vendors`]**: the adapters
//!   shipped with the workspace.

pub mod inventory;
pub mod ports;
pub mod reconciler;
pub mod snapshot;
pub mod sources;
pub mod store;
pub mod vendors;
