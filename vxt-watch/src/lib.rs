//! Discord bot that flags retweets relayed by the VXT bot and tracks the
//! workflow status of bug report threads.

pub mod channels;
pub mod config;
pub mod retweet;
pub mod thread_status;

use config::Settings;
use retweet::RetryPolicy;
use thread_status::StatusControls;

/// Process-wide state shared by every event handler
pub struct AppState {
    pub settings: Settings,
    /// Control message tracking; cleared only by a restart
    pub controls: StatusControls,
    pub embed_policy: RetryPolicy,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            controls: StatusControls::new(),
            embed_policy: RetryPolicy::default(),
        }
    }
}
