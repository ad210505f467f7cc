//! Workflow status for bug report threads.
//!
//! The status lives only in the thread name, as an emoji prefix followed by a
//! single space (`"🔍 someuser"`). Everything else in this module works on the
//! [`ThreadStatus`] enum; [`format_thread_name`] and [`status_from_name`] are the
//! only places that know about the name encoding.

pub mod controls;

pub use controls::{StatusControls, STATUS_BUTTON_CONTENT};

use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Prefix of the custom ID carried by every status button
pub const CONTROL_ID_PREFIX: &str = "status_";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, EnumIter, Display,
)]
#[strum(serialize_all = "snake_case")]
pub enum ThreadStatus {
    /// Issue spotted, nobody contacted yet
    Found,
    /// Reporter was asked for details
    Asked,
    /// Waiting on the reporter
    Waiting,
    Investigating,
    /// Fixed but not shipped
    Unreleased,
    Fixed,
    /// Terminal
    Closed,
}

impl ThreadStatus {
    /// Status of every newly created thread
    pub const INITIAL: ThreadStatus = ThreadStatus::Found;

    /// Name prefix for this status. Glyphs are pairwise prefix-free.
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Found => "🔍",
            Self::Asked => "❓",
            Self::Waiting => "🔄",
            Self::Investigating => "🛠️",
            Self::Unreleased => "📦",
            Self::Fixed => "✅",
            Self::Closed => "🔒",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Found => "Found",
            Self::Asked => "Asked",
            Self::Waiting => "Waiting",
            Self::Investigating => "Investigating",
            Self::Unreleased => "Unreleased",
            Self::Fixed => "Fixed",
            Self::Closed => "Closed",
        }
    }

    /// Statuses reachable from this one
    pub fn transitions(&self) -> &'static [ThreadStatus] {
        use ThreadStatus::*;
        match self {
            Found => &[Asked, Investigating],
            Asked => &[Waiting, Investigating, Closed],
            Waiting => &[Asked, Investigating, Unreleased, Fixed],
            Investigating => &[Asked, Waiting, Unreleased, Closed],
            Unreleased => &[Asked, Waiting, Investigating, Fixed],
            Fixed => &[Asked, Waiting, Investigating, Closed],
            Closed => &[],
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.transitions().is_empty()
    }
}

pub fn is_valid_transition(from: ThreadStatus, to: ThreadStatus) -> bool {
    from.transitions().contains(&to)
}

/// Thread name for `base_name` in the given status
pub fn format_thread_name(base_name: &str, status: ThreadStatus) -> String {
    format!("{} {}", status.emoji(), base_name)
}

/// Status encoded in a thread name; `None` if the name carries no known prefix
pub fn status_from_name(thread_name: &str) -> Option<ThreadStatus> {
    ThreadStatus::iter().find(|status| thread_name.starts_with(status.emoji()))
}

/// Strip the status prefix (and the one space after it) from a thread name
pub fn base_name(thread_name: &str) -> &str {
    match status_from_name(thread_name) {
        Some(status) => {
            let rest = &thread_name[status.emoji().len()..];
            rest.strip_prefix(' ').unwrap_or(rest)
        }
        None => thread_name,
    }
}

/// Replace the status prefix of a thread name, adding one if there was none
pub fn rename_with_status(thread_name: &str, new_status: ThreadStatus) -> String {
    format_thread_name(base_name(thread_name), new_status)
}

/// Why a status button press was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Could not determine current thread status.")]
    NoStatus,
    #[error("Invalid status transition from {from} to {to}.")]
    Invalid {
        from: ThreadStatus,
        to: ThreadStatus,
    },
}

/// Validate moving a thread named `thread_name` to `target` and return its new name.
///
/// Nothing should be renamed unless this returns `Ok`.
pub fn plan_transition(thread_name: &str, target: ThreadStatus) -> Result<String, TransitionError> {
    let current = status_from_name(thread_name).ok_or(TransitionError::NoStatus)?;
    if !is_valid_transition(current, target) {
        return Err(TransitionError::Invalid {
            from: current,
            to: target,
        });
    }
    Ok(rename_with_status(thread_name, target))
}

/// Custom ID for the button that moves a thread to `status`
pub fn control_id(status: ThreadStatus) -> String {
    format!("{}{}", CONTROL_ID_PREFIX, status)
}

/// Target status of a status button; `None` for foreign or unknown IDs
pub fn parse_control_id(custom_id: &str) -> Option<ThreadStatus> {
    custom_id
        .strip_prefix(CONTROL_ID_PREFIX)
        .and_then(|name| name.parse().ok())
}
