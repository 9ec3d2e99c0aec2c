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

use std::error;
use std::fmt;
use std::result;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// An OS-facing failure from `roost_core` (fork, wait, signal, pipe,
    /// process title).
    Core(roost_core::Error),
    /// `reconfigure` named a `ServiceId` that was never registered.
    UnknownService,
    /// A second `Supervisor` was constructed in a process that already
    /// has one.
    AlreadyRunning,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Core(ref err) => write!(f, "{}", err),
            Error::UnknownService => write!(f, "Unknown service id"),
            Error::AlreadyRunning => {
                write!(f, "A supervisor is already running in this process")
            }
        }
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        match *self {
            Error::Core(ref err) => error::Error::description(err),
            Error::UnknownService => "Unknown service id",
            Error::AlreadyRunning => "A supervisor is already running in this process",
        }
    }
}

impl From<roost_core::Error> for Error {
    fn from(err: roost_core::Error) -> Error {
        Error::Core(err)
    }
}
