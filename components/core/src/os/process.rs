// Copyright (c) 2016-2017 Chef Software Inc. and/or applicable contributors
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

use std::fmt::{self, Display, Formatter};
use std::io;
use std::str::FromStr;

use libc::{self, pid_t};

use error::{Error, Result};

/// The OS process identifier type used throughout the supervisor.
pub type Pid = pid_t;

#[allow(non_snake_case)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Signal {
    INT,
    ILL,
    ABRT,
    FPE,
    KILL,
    SEGV,
    TERM,
    HUP,
    QUIT,
    ALRM,
    USR1,
    USR2,
}

impl From<i32> for Signal {
    fn from(val: i32) -> Signal {
        match val {
            1 => Signal::HUP,
            2 => Signal::INT,
            3 => Signal::QUIT,
            4 => Signal::ILL,
            6 => Signal::ABRT,
            8 => Signal::FPE,
            9 => Signal::KILL,
            10 => Signal::USR1,
            11 => Signal::SEGV,
            12 => Signal::USR2,
            14 => Signal::ALRM,
            15 => Signal::TERM,
            _ => Signal::KILL,
        }
    }
}

impl From<Signal> for i32 {
    fn from(value: Signal) -> i32 {
        match value {
            Signal::HUP => 1,
            Signal::INT => 2,
            Signal::QUIT => 3,
            Signal::ILL => 4,
            Signal::ABRT => 6,
            Signal::FPE => 8,
            Signal::KILL => 9,
            Signal::USR1 => 10,
            Signal::SEGV => 11,
            Signal::USR2 => 12,
            Signal::ALRM => 14,
            Signal::TERM => 15,
        }
    }
}

impl FromStr for Signal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ABRT" => Ok(Signal::ABRT),
            "ALRM" => Ok(Signal::ALRM),
            "FPE" => Ok(Signal::FPE),
            "HUP" => Ok(Signal::HUP),
            "ILL" => Ok(Signal::ILL),
            "INT" => Ok(Signal::INT),
            "KILL" => Ok(Signal::KILL),
            "QUIT" => Ok(Signal::QUIT),
            "SEGV" => Ok(Signal::SEGV),
            "TERM" => Ok(Signal::TERM),
            "USR1" => Ok(Signal::USR1),
            "USR2" => Ok(Signal::USR2),
            other => Err(Error::InvalidSignalName(other.to_string())),
        }
    }
}

impl Display for Signal {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let s = match *self {
            Signal::ABRT => "ABRT",
            Signal::ALRM => "ALRM",
            Signal::FPE => "FPE",
            Signal::HUP => "HUP",
            Signal::ILL => "ILL",
            Signal::INT => "INT",
            Signal::KILL => "KILL",
            Signal::QUIT => "QUIT",
            Signal::SEGV => "SEGV",
            Signal::TERM => "TERM",
            Signal::USR1 => "USR1",
            Signal::USR2 => "USR2",
        };
        write!(f, "{}", s)
    }
}

/// Send a signal to a single process (or, if `pid` is negative, to a
/// process group). Treats "no such process" as success: the target may
/// have already exited.
pub fn signal(pid: Pid, sig: Signal) -> Result<()> {
    let raw: i32 = sig.into();
    match unsafe { libc::kill(pid, raw) } {
        0 => Ok(()),
        _ => {
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::ESRCH) => Ok(()),
                _ => Err(Error::Signal(err)),
            }
        }
    }
}

/// Send a signal to every process in `pid`'s process group.
pub fn signal_group(pid: Pid, sig: Signal) -> Result<()> {
    signal(-pid.abs(), sig)
}

pub fn current_pid() -> Pid {
    unsafe { libc::getpid() }
}

/// Attempt to become a session leader, detaching from any controlling
/// terminal. Failure (e.g. we're already a process group leader) is not
/// fatal; the supervisor still works for its direct children.
pub fn become_session_leader() {
    unsafe {
        libc::setsid();
    }
}
