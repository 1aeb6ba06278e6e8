//! Assignment store implementations shipped with the workspace.
//!
//! Production deployments inject their own [`crate::ports::AssignmentStore`] talking
//! to the remote API; [`memory::MemoryAssignmentStore`] backs dry runs and tests.

pub mod memory;
