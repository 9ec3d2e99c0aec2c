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

//! The master loop: owns the service registry, the live-worker table, the
//! fork-rate governor, and the master-side signal behavior.

use std::collections::HashMap;
use std::io;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use libc;
use roost_core;
use roost_core::os::process::{become_session_leader, current_pid, signal, signal_group, Pid, Signal};
use roost_core::os::title;

use config::Config;
use error::{Error, Result};
use fork_rate::ForkRateLedger;
use readiness;
use registry::{ServiceId, ServiceRegistry, WorkerId};
use service::{exit_on_exception, Service};
use signal_intake::SignalIntake;
use watchdog::{self, ParentDeathChannel};
use worker::Worker;

static SUPERVISOR_RUNNING: AtomicBool = AtomicBool::new(false);

const MASTER_SIGNALS: &[Signal] = &[Signal::INT, Signal::TERM, Signal::ALRM, Signal::HUP];

pub struct Supervisor {
    registry: ServiceRegistry,
    running: HashMap<ServiceId, HashMap<Pid, WorkerId>>,
    fork_rate: ForkRateLedger,
    config: Config,
    parent_channel: ParentDeathChannel,
    intake: Option<SignalIntake>,
}

impl Supervisor {
    /// Fails if another `Supervisor` is already alive in this process:
    /// signal dispositions and the process group are process-global, so
    /// a second instance would fight the first over both.
    pub fn new() -> Result<Self> {
        if SUPERVISOR_RUNNING
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyRunning);
        }
        let parent_channel = ParentDeathChannel::create()?;
        Ok(Supervisor {
            registry: ServiceRegistry::new(),
            running: HashMap::new(),
            fork_rate: ForkRateLedger::new(),
            config: Config::from_env(),
            parent_channel: parent_channel,
            intake: None,
        })
    }

    /// Register a new family of `workers` instances built by `factory`.
    /// Legal before and after `run()`; a post-`run()` registration takes
    /// effect on the supervisor's next tick.
    pub fn add<F>(&mut self, factory: F, workers: usize) -> ServiceId
    where
        F: Fn(WorkerId) -> Box<dyn Service> + Send + Sync + 'static,
    {
        self.registry.add(factory, workers)
    }

    pub fn reconfigure(&mut self, service_id: ServiceId, workers: usize) -> Result<()> {
        if !self.registry.reconfigure(service_id, workers) {
            return Err(Error::UnknownService);
        }
        self.fork_rate.reset();
        Ok(())
    }

    fn expected_children(&self) -> usize {
        self.registry.iter().map(|d| d.workers).sum()
    }

    pub fn run(&mut self) -> ! {
        title::set(&format!("{}: master process", title::process_name()));
        become_session_leader();

        let intake = SignalIntake::install(MASTER_SIGNALS).expect("failed to install master signal intake");
        self.intake = Some(intake);

        readiness::notify_once();

        loop {
            let pending = {
                let intake = self.intake.as_ref().unwrap();
                intake.pop_all()
            };
            for sig in pending {
                self.dispatch(Signal::from(sig));
            }

            if let Err(err) = self.reap_and_adjust() {
                error!("Unrecoverable error while reaping workers: {}", err);
                process::exit(2);
            }

            let wait_interval = self.config.wait_interval;
            self.intake.as_ref().unwrap().wait(wait_interval);
        }
    }

    fn dispatch(&mut self, sig: Signal) {
        match sig {
            Signal::INT => self.fast_exit("Interrupted"),
            Signal::TERM => self.shutdown(),
            Signal::ALRM => self.fast_exit("Graceful shutdown deadline exceeded"),
            Signal::HUP => self.reload(),
            other => debug!("Ignoring unexpected master signal {}", other),
        }
    }

    /// Reaps every exited child with a non-blocking wait, restarts each at
    /// its old worker id, then brings `running` in line with the desired
    /// worker count for every registered service. A `waitpid` failure
    /// other than "no children left" is a system invariant violation and
    /// is propagated so the caller can crash the master intentionally,
    /// per the wait-error policy.
    fn reap_and_adjust(&mut self) -> Result<()> {
        loop {
            let mut status: libc::c_int = 0;
            let pid = unsafe { libc::waitpid(-1, &mut status, libc::WNOHANG) };
            if pid == 0 {
                break;
            }
            if pid < 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::ECHILD) {
                    break;
                }
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(roost_core::Error::Wait(err).into());
            }

            let mut reaped = None;
            for (service_id, workers) in self.running.iter_mut() {
                if let Some(worker_id) = workers.remove(&pid) {
                    reaped = Some((*service_id, worker_id));
                    break;
                }
            }
            match reaped {
                Some((service_id, worker_id)) => {
                    info!("Worker {} of service {:?} exited (pid {}), restarting", worker_id, service_id, pid);
                    self.start_worker(service_id, worker_id)?;
                }
                None => error!("Reaped unknown pid {}", pid),
            }
        }

        let descriptors: Vec<(ServiceId, usize)> =
            self.registry.iter().map(|d| (d.service_id, d.workers)).collect();

        for (service_id, desired) in descriptors {
            let running_ids: Vec<WorkerId> = self
                .running
                .get(&service_id)
                .map(|m| m.values().cloned().collect())
                .unwrap_or_default();
            let running_count = running_ids.len();

            if running_count < desired {
                for worker_id in running_count..desired {
                    self.start_worker(service_id, worker_id)?;
                }
            } else if running_count > desired {
                for worker_id in running_ids {
                    if worker_id >= desired {
                        if let Some(pid) = self.pid_for(service_id, worker_id) {
                            let _ = signal(pid, Signal::TERM);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn pid_for(&self, service_id: ServiceId, worker_id: WorkerId) -> Option<Pid> {
        self.running.get(&service_id).and_then(|workers| {
            workers.iter().find(|&(_, w)| *w == worker_id).map(|(pid, _)| *pid)
        })
    }

    /// Forks a replacement or fresh worker for `(service_id, worker_id)`.
    /// A fork failure is a `ChildLaunchFailure`: it is surfaced to the
    /// caller rather than swallowed, since the master cannot make
    /// forward progress while `fork()` itself is broken.
    fn start_worker(&mut self, service_id: ServiceId, worker_id: WorkerId) -> Result<()> {
        let expected = self.expected_children();
        self.fork_rate.throttle(expected);

        let factory = match self.registry.iter().find(|d| d.service_id == service_id) {
            Some(desc) => &desc.factory,
            None => return Ok(()),
        };

        let read_fd = self.parent_channel.read_fd();

        match unsafe { libc::fork() } {
            -1 => {
                return Err(roost_core::Error::Fork(io::Error::last_os_error()).into());
            }
            0 => {
                unsafe {
                    libc::signal(libc::SIGTERM, libc::SIG_DFL);
                    libc::signal(libc::SIGHUP, libc::SIG_DFL);
                    libc::signal(libc::SIGALRM, libc::SIG_DFL);
                    libc::signal(libc::SIGINT, libc::SIG_DFL);
                }
                self.parent_channel.close_write_in_child();

                let started = Arc::new(AtomicBool::new(false));
                watchdog::spawn(read_fd, started.clone());

                let service = factory(worker_id);
                exit_on_exception(move || {
                    let worker = Worker::new(service, worker_id).expect("failed to initialize worker");
                    started.store(true, Ordering::SeqCst);
                    worker.run_forever();
                });
            }
            pid => {
                self.running.entry(service_id).or_insert_with(HashMap::new).insert(pid, worker_id);
            }
        }
        Ok(())
    }

    fn shutdown(&mut self) -> ! {
        info!("Caught TERM signal, shutting down gracefully");
        let _ = signal_group(current_pid(), Signal::TERM);

        for workers in self.running.values() {
            for pid in workers.keys() {
                let mut status: libc::c_int = 0;
                loop {
                    let result = unsafe { libc::waitpid(*pid, &mut status, 0) };
                    if result >= 0 {
                        break;
                    }
                    let err = std::io::Error::last_os_error();
                    if err.raw_os_error() == Some(libc::ECHILD) {
                        break;
                    }
                    if err.kind() != std::io::ErrorKind::Interrupted {
                        break;
                    }
                }
            }
        }
        process::exit(0);
    }

    fn fast_exit(&mut self, reason: &str) -> ! {
        error!("{}", reason);
        let _ = signal_group(current_pid(), Signal::INT);
        process::exit(1);
    }

    fn reload(&mut self) {
        info!("Caught HUP signal, reloading");
        self.fork_rate.reset();
        let _ = signal_group(current_pid(), Signal::HUP);
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        SUPERVISOR_RUNNING.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service::Service;

    struct Noop;
    impl Service for Noop {}

    #[test]
    fn second_construction_fails() {
        let first = Supervisor::new();
        assert!(first.is_ok());
        let second = Supervisor::new();
        assert!(second.is_err());
        drop(first);
        let third = Supervisor::new();
        assert!(third.is_ok());
    }

    #[test]
    fn reconfigure_known_service_succeeds() {
        let mut sup = Supervisor::new().unwrap();
        let id = sup.add(|_id| Box::new(Noop) as Box<dyn Service>, 1);
        assert!(sup.reconfigure(id, 2).is_ok());
    }

    #[test]
    fn expected_children_sums_worker_counts() {
        let mut sup = Supervisor::new().unwrap();
        sup.add(|_id| Box::new(Noop) as Box<dyn Service>, 2);
        sup.add(|_id| Box::new(Noop) as Box<dyn Service>, 3);
        assert_eq!(sup.expected_children(), 5);
    }
}
