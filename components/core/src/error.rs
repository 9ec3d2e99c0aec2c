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

use std::error;
use std::fmt;
use std::io;
use std::result;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// `fork(2)` failed.
    Fork(io::Error),
    /// `waitpid(2)` failed for a reason other than "no such child".
    Wait(io::Error),
    /// `kill(2)`/`killpg(2)` failed for a reason other than "no such
    /// process".
    Signal(io::Error),
    /// Creating the self-pipe or the parent-death pipe failed.
    Pipe(io::Error),
    /// The signal name could not be parsed.
    InvalidSignalName(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match *self {
            Error::Fork(ref err) => format!("Unable to fork a child process, {}", err),
            Error::Wait(ref err) => format!("Unable to wait on a child process, {}", err),
            Error::Signal(ref err) => format!("Unable to deliver a signal, {}", err),
            Error::Pipe(ref err) => format!("Unable to create a pipe, {}", err),
            Error::InvalidSignalName(ref name) => format!("Invalid signal name, {}", name),
        };
        write!(f, "{}", msg)
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        match *self {
            Error::Fork(_) => "Unable to fork a child process",
            Error::Wait(_) => "Unable to wait on a child process",
            Error::Signal(_) => "Unable to deliver a signal",
            Error::Pipe(_) => "Unable to create a pipe",
            Error::InvalidSignalName(_) => "Invalid signal name",
        }
    }
}
