// WOL Uplink - Restart Scheduler
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Scheduled self-restart.
//!
//! The scheduler only answers whether a restart is due. The orchestrator
//! sends the notifications and leaves its loop, then `main` hands control to
//! a [`RestartAction`].

use std::ffi::OsString;
use std::time::{Duration, Instant};
use tracing::info;

use crate::models::{Error, Result};

/// Decides when the uplink restarts itself.
#[derive(Debug, Clone)]
pub struct RestartScheduler {
    started_at: Instant,
    interval: Option<Duration>,
}

impl RestartScheduler {
    /// `None` disables scheduled restarts.
    pub fn new(started_at: Instant, interval: Option<Duration>) -> Self {
        if let Some(interval) = interval {
            info!("[RESTART] Scheduled every {}h.", interval.as_secs() / 3600);
        }
        Self { started_at, interval }
    }

    pub fn due(&self, now: Instant) -> bool {
        match self.interval {
            Some(interval) => now.saturating_duration_since(self.started_at) >= interval,
            None => false,
        }
    }
}

/// Replaces the running process.
pub trait RestartAction {
    /// Returns only on failure.
    fn restart(&self) -> Error;
}

/// Arguments to pass on, without the program name. Not required to be UTF-8.
fn forwarded_args<I>(argv: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    argv.into_iter().skip(1).collect()
}

/// Re-executes the current binary with the same arguments.
#[derive(Debug, Default)]
pub struct ExecRestart;

impl ExecRestart {
    fn exec() -> Result<std::convert::Infallible> {
        let exe = std::env::current_exe()?;
        let args = forwarded_args(std::env::args_os());
        info!("[RESTART] Re-executing {}", exe.display());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            let err = std::process::Command::new(&exe).args(&args).exec();
            Err(Error::Io(err))
        }

        #[cfg(not(unix))]
        {
            std::process::Command::new(&exe).args(&args).spawn()?;
            std::process::exit(0);
        }
    }
}

impl RestartAction for ExecRestart {
    fn restart(&self) -> Error {
        match Self::exec() {
            Ok(never) => match never {},
            Err(e) => e,
        }
    }
}
