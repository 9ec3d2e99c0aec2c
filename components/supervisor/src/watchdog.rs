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

//! Detects an unexpectedly-dead parent from inside a worker process.
//!
//! The supervisor holds the write end of a pipe open for as long as it
//! lives; every worker inherits a copy of the read end. A blocking read
//! on that end only ever returns once the write end is closed
//! everywhere, which happens when the supervisor process itself exits,
//! cleanly or not.

use std::os::unix::io::RawFd;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use libc;
use roost_core::error::{Error, Result};
use roost_core::os::process::{current_pid, signal, Signal};

/// A pipe whose write end only the supervisor holds open.
pub struct ParentDeathChannel {
    read_fd: RawFd,
    write_fd: RawFd,
}

impl ParentDeathChannel {
    pub fn create() -> Result<Self> {
        let mut fds = [0 as RawFd; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(Error::Pipe(std::io::Error::last_os_error()));
        }
        Ok(ParentDeathChannel { read_fd: fds[0], write_fd: fds[1] })
    }

    pub fn read_fd(&self) -> RawFd {
        self.read_fd
    }

    pub fn write_fd(&self) -> RawFd {
        self.write_fd
    }

    /// Called once, in a freshly forked child, so the child's copy of the
    /// write end doesn't keep the pipe artificially alive.
    pub fn close_write_in_child(&self) {
        unsafe {
            libc::close(self.write_fd);
        }
    }
}

/// Runs on a background thread in every worker. `worker_started` is
/// flipped to `true` once the worker's `Worker` value exists; a parent
/// death observed before that point means there's nothing running yet to
/// gracefully terminate.
pub fn spawn(read_fd: RawFd, worker_started: Arc<AtomicBool>) {
    thread::Builder::new()
        .name("parent-watchdog".to_string())
        .spawn(move || {
            let mut buf = [0u8; 1];
            unsafe {
                libc::read(read_fd, buf.as_mut_ptr() as *mut libc::c_void, 1);
            }
            if worker_started.load(Ordering::SeqCst) {
                info!("Parent process has died unexpectedly, exiting");
                let _ = signal(current_pid(), Signal::TERM);
            } else {
                process::exit(0);
            }
        })
        .expect("failed to spawn parent-watchdog thread");
}
