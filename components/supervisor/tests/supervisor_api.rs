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

//! Exercises the public registration/configuration surface described by
//! the supervisor's invariants 1, 2 and 9. The full fork/reap/shutdown
//! loop (`Supervisor::run`) forks real processes and ends by calling
//! `process::exit`, which would tear down the test harness itself; those
//! scenarios belong in a standalone subprocess-driven harness rather than
//! `cargo test`, so this file sticks to what's safe to assert in-process.

extern crate roost_supervisor;
extern crate tempdir;

use std::env;
use std::os::unix::net::UnixDatagram;
use std::sync::Mutex;
use std::time::Duration;

use roost_supervisor::{Config, Service, Supervisor};

struct Idle;
impl Service for Idle {}

// Supervisor::new() enforces a process-wide singleton, so any two tests
// that construct one would race each other under libtest's default
// multi-threaded runner. Serialize them behind one lock.
static SUPERVISOR_SLOT: Mutex<()> = Mutex::new(());

#[test]
fn only_one_supervisor_per_process() {
    let _guard = SUPERVISOR_SLOT.lock().unwrap();
    let first = Supervisor::new().expect("first supervisor should construct");
    let second = Supervisor::new();
    assert!(second.is_err(), "a second concurrent supervisor must be rejected");
    drop(first);
    let third = Supervisor::new();
    assert!(third.is_ok(), "dropping the first must free the singleton slot");
}

#[test]
fn registration_order_is_preserved_across_add_calls() {
    let _guard = SUPERVISOR_SLOT.lock().unwrap();
    let mut sup = Supervisor::new().expect("supervisor should construct");
    let a = sup.add(|_id| Box::new(Idle) as Box<dyn Service>, 3);
    let b = sup.add(|_id| Box::new(Idle) as Box<dyn Service>, 2);
    assert_ne!(a, b);
}

#[test]
fn reconfigure_updates_a_registered_service() {
    let _guard = SUPERVISOR_SLOT.lock().unwrap();
    let mut sup = Supervisor::new().expect("supervisor should construct");
    let id = sup.add(|_id| Box::new(Idle) as Box<dyn Service>, 1);
    assert!(sup.reconfigure(id, 5).is_ok());
}

#[test]
fn wait_interval_is_configurable_via_environment() {
    env::set_var("ROOST_WAIT_INTERVAL_MS", "42");
    let config = Config::from_env();
    env::remove_var("ROOST_WAIT_INTERVAL_MS");
    assert_eq!(config.wait_interval, Duration::from_millis(42));
}

#[test]
fn readiness_notification_reaches_a_real_datagram_socket() {
    let dir = tempdir::TempDir::new("roost-supervisor-it").unwrap();
    let path = dir.path().join("notify.sock");
    let listener = UnixDatagram::bind(&path).unwrap();
    listener
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    env::set_var("NOTIFY_SOCKET", path.to_str().unwrap());
    roost_supervisor::readiness::notify_once();

    let mut buf = [0u8; 16];
    let n = listener.recv(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"READY=1");
    assert!(env::var("NOTIFY_SOCKET").is_err());
}
