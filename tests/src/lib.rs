pub mod util;

mod adapters;
mod reconciliation;
