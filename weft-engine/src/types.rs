// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Shared types.
//!
//! Everything that can fail before a run starts reports a [`SetupError`]:
//! bad settings, unknown registry names, statistics files that cannot be
//! created. Once events are being delivered there is no error channel -
//! invariant violations (credit underflow, buffer overflow, an empty
//! routing response, an event scheduled in the past) indicate bugs and
//! abort through panics, and workload outcomes such as saturation flow
//! through the workload's state machine, not through errors.

use std::error::Error;
use std::fmt;

/// What failed while building the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupErrorKind {
    /// A missing, unknown or out-of-range setting.
    Config,
    /// The host refused a file or stream the settings asked for.
    Io,
}

/// A fatal pre-run failure; nothing is simulated after one of these.
#[derive(Debug)]
pub struct SetupError {
    /// The failure class.
    pub kind: SetupErrorKind,
    /// What went wrong.
    pub message: String,
}

impl SetupError {
    /// A [`SetupErrorKind::Config`] failure.
    pub fn config(message: impl fmt::Display) -> Self {
        Self {
            kind: SetupErrorKind::Config,
            message: message.to_string(),
        }
    }

    /// A [`SetupErrorKind::Io`] failure.
    pub fn io(message: impl fmt::Display) -> Self {
        Self {
            kind: SetupErrorKind::Io,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            SetupErrorKind::Config => write!(f, "configuration error: {}", self.message),
            SetupErrorKind::Io => write!(f, "io error: {}", self.message),
        }
    }
}

impl Error for SetupError {}

/// The return type of construction-time functions.
pub type SetupResult<T = ()> = Result<T, SetupError>;

#[macro_export]
/// Bail out of construction with a configuration [`SetupError`].
macro_rules! config_error {
    ($msg:expr) => {
        Err($crate::types::SetupError::config($msg))?
    };
}

#[macro_export]
/// Bail out of construction with an I/O [`SetupError`].
macro_rules! io_error {
    ($msg:expr) => {
        Err($crate::types::SetupError::io($msg))?
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fails(reject: bool) -> SetupResult {
        if reject {
            crate::config_error!("num_vcs must be at least 1");
        }
        Ok(())
    }

    #[test]
    fn kinds_and_display() {
        let error = fails(true).unwrap_err();
        assert_eq!(error.kind, SetupErrorKind::Config);
        assert_eq!(
            format!("{error}"),
            "configuration error: num_vcs must be at least 1"
        );
        assert!(fails(false).is_ok());

        let error = SetupError::io("cannot create 'channels.csv'");
        assert_eq!(error.kind, SetupErrorKind::Io);
        assert_eq!(format!("{error}"), "io error: cannot create 'channels.csv'");
    }
}
