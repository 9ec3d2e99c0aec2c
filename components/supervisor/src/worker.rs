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

//! The harness that runs inside a freshly forked child: constructs the
//! registered service, sets the process title, and dispatches signals to
//! it for the rest of the process's life.

use std::process;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use libc;
use roost_core;
use roost_core::os::process::{current_pid, Signal};
use roost_core::os::title;

use registry::WorkerId;
use service::{exit_on_exception, Service};
use signal_intake::SignalIntake;

const WORKER_SIGNALS: &[Signal] = &[Signal::TERM, Signal::HUP, Signal::ALRM];

/// A worker's signal wait loop wakes up at least this often even with no
/// signal pending, bounding how stale its view of the world can get.
const WORKER_WAIT: Duration = Duration::from_secs(60);

pub struct Worker {
    service: Arc<dyn Service>,
    worker_id: WorkerId,
    title: String,
    /// Mirrors the service's own `threading.Lock` in the original design:
    /// serializes `terminate` and `reload`, never held across `run`.
    signal_lock: Arc<Mutex<()>>,
    intake: SignalIntake,
}

impl Worker {
    pub fn new(service: Box<dyn Service>, worker_id: WorkerId) -> roost_core::error::Result<Self> {
        let service: Arc<dyn Service> = Arc::from(service);
        let pid = current_pid();
        let worker_title = format!("{}({}) [{}]", service.name(), worker_id, pid);

        title::set(&format!(
            "{}: {} worker({})",
            title::process_name(),
            service.name(),
            worker_id
        ));

        let intake = SignalIntake::install(WORKER_SIGNALS)?;

        Ok(Worker {
            service: service,
            worker_id: worker_id,
            title: worker_title,
            signal_lock: Arc::new(Mutex::new(())),
            intake: intake,
        })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Runs the service body on a background thread, then serves signals
    /// on the calling thread until one of them ends the process.
    pub fn run_forever(self) -> ! {
        debug!("Running service {}", self.title);
        let run_service = self.service.clone();
        thread::Builder::new()
            .name(format!("worker-{}-run", self.worker_id))
            .spawn(move || exit_on_exception(move || run_service.run()))
            .expect("failed to spawn service run thread");

        loop {
            self.intake.wait(WORKER_WAIT);
            for sig in self.intake.pop_all() {
                self.handle_signal(Signal::from(sig));
            }
        }
    }

    fn handle_signal(&self, sig: Signal) {
        match sig {
            Signal::ALRM => {
                info!(
                    "Graceful shutdown timeout exceeded, exiting {} now.",
                    self.title
                );
                process::exit(1);
            }
            Signal::TERM => {
                info!(
                    "Caught TERM signal, graceful exiting of service {}",
                    self.title
                );
                let timeout = self.service.graceful_shutdown_timeout();
                if timeout > 0 {
                    unsafe {
                        libc::alarm(timeout);
                    }
                }
                let service = self.service.clone();
                let lock = self.signal_lock.clone();
                thread::Builder::new()
                    .name(format!("worker-{}-terminate", self.worker_id))
                    .spawn(move || {
                        exit_on_exception(move || {
                            let _guard = lock.lock().expect("signal lock poisoned");
                            service.terminate();
                        })
                    })
                    .expect("failed to spawn terminate thread");
            }
            Signal::HUP => {
                let service = self.service.clone();
                let lock = self.signal_lock.clone();
                thread::Builder::new()
                    .name(format!("worker-{}-reload", self.worker_id))
                    .spawn(move || {
                        if let Ok(_guard) = lock.try_lock() {
                            service.reload();
                        }
                    })
                    .expect("failed to spawn reload thread");
            }
            other => debug!("Ignoring unexpected signal {} in worker", other),
        }
    }
}
