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

//! A signal-to-queue adapter shared by the master and every worker.
//!
//! Signal handlers alone cannot safely wake a thread blocked in a plain
//! sleep; a self-pipe is the standard way around that
//! (`signal_hook::iterator::Signals` implements one internally and hands
//! us delivered signal numbers through a background thread instead of a
//! raw OS handler, so nothing here runs signal-unsafe code on the signal
//! path itself).

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use libc;
use signal_hook::iterator::Signals;

use roost_core::error::{Error, Result};
use roost_core::os::process::Signal;

fn is_terminate_class(sig: i32) -> bool {
    sig == libc::SIGTERM || sig == libc::SIGALRM || sig == libc::SIGINT
}

struct Inner {
    queue: Mutex<VecDeque<i32>>,
    wake: Condvar,
}

/// Owns a background thread draining OS signal delivery into an ordered
/// queue: terminate-class signals (TERM, ALRM, INT) are handled before
/// any reload-class signal (HUP) that was queued earlier.
pub struct SignalIntake {
    inner: Arc<Inner>,
    handle: signal_hook::iterator::Handle,
    reader: Option<JoinHandle<()>>,
}

impl SignalIntake {
    /// Register for `signals` (raw signal numbers) and start the
    /// background reader immediately.
    pub fn install(signals: &[Signal]) -> Result<Self> {
        let raw: Vec<i32> = signals.iter().map(|s| (*s).into()).collect();
        let mut handler = Signals::new(&raw).map_err(Error::Pipe)?;
        let handle = handler.handle();
        let inner = Arc::new(Inner {
            queue: Mutex::new(VecDeque::new()),
            wake: Condvar::new(),
        });
        let reader_inner = inner.clone();
        let reader = thread::Builder::new()
            .name("signal-intake".to_string())
            .spawn(move || {
                for sig in handler.forever() {
                    let mut queue = reader_inner.queue.lock().expect("signal queue poisoned");
                    if is_terminate_class(sig) {
                        queue.push_front(sig);
                    } else {
                        queue.push_back(sig);
                    }
                    drop(queue);
                    reader_inner.wake.notify_all();
                }
            })
            .expect("failed to spawn signal-intake thread");
        Ok(SignalIntake {
            inner: inner,
            handle: handle,
            reader: Some(reader),
        })
    }

    /// Block until a signal arrives or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) {
        let queue = self.inner.queue.lock().expect("signal queue poisoned");
        let _ = self
            .inner
            .wake
            .wait_timeout_while(queue, timeout, |q| q.is_empty());
    }

    /// Dequeue every pending signal, in the queue's documented order.
    pub fn pop_all(&self) -> Vec<i32> {
        let mut queue = self.inner.queue.lock().expect("signal queue poisoned");
        queue.drain(..).collect()
    }
}

impl Drop for SignalIntake {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}
