// Copyright (c) 2017 Chef Software Inc. and/or applicable contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A multi-process service supervisor: forks, monitors, and restarts a
//! configurable pool of long-running worker processes, propagates
//! lifecycle signals to them, and coordinates graceful shutdown.

extern crate env_logger;
extern crate libc;
#[macro_use]
extern crate log;
extern crate roost_core;
extern crate signal_hook;
extern crate time;

#[cfg(test)]
extern crate tempdir;

pub mod config;
pub mod error;
pub mod fork_rate;
pub mod readiness;
pub mod registry;
pub mod service;
pub mod signal_intake;
pub mod supervisor;
pub mod watchdog;
pub mod worker;

pub use config::Config;
pub use error::{Error, Result};
pub use registry::{ServiceId, WorkerId};
pub use service::{ExitRequest, Service};
pub use supervisor::Supervisor;

/// Installs the `env_logger` backend reading `RUST_LOG`, matching the way
/// every binary in this workspace initializes logging exactly once before
/// doing anything else.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
