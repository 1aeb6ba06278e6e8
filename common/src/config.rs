use std::path::PathBuf;
use std::time::Duration;

/// Default pause between two reconciliation cycles.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(60);

pub struct Config {
    /// Hides the banner printed at startup.
    pub no_banner: bool,
    /// Output reduction level. `0` prints everything, `2` only prints summaries.
    pub quiet: u8,
    /// Skips the MAC vendor lookup when loading the inventory.
    pub no_vendors: bool,
    /// Pause between two reconciliation cycles.
    pub delay: Duration,
    /// Where the assignment cache is written on shutdown and read on startup.
    ///
    /// `None` disables warm restarts.
    pub snapshot: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            no_banner: false,
            quiet: 0,
            no_vendors: false,
            delay: DEFAULT_DELAY,
            snapshot: None,
        }
    }
}
