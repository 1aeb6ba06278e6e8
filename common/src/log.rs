//! Logging shorthands used across the workspace.
//!
//! These wrap `tracing` so that status lines (`success!`) can be told apart from
//! plain informational events by the CLI formatter.

/// Target used by [`success!`] events.
pub const SUCCESS_TARGET: &str = "fleetr::success";

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        ::tracing::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        ::tracing::info!(target: $crate::log::SUCCESS_TARGET, $($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        ::tracing::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        ::tracing::error!($($arg)*)
    };
}
