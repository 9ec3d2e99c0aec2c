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

//! Environment-driven tunables. No config file, no CLI: every knob has a
//! sane default and can be overridden with an environment variable,
//! matching the way `HAB_SUP_BINARY` configures the launcher upstream.

use std::env;
use std::time::Duration;

const WAIT_INTERVAL_ENVVAR: &str = "ROOST_WAIT_INTERVAL_MS";
const DEFAULT_WAIT_INTERVAL_MS: u64 = 500;

pub const NOTIFY_SOCKET_ENVVAR: &str = "NOTIFY_SOCKET";

#[derive(Clone, Debug)]
pub struct Config {
    /// Upper bound on how long the supervisor sleeps between ticks when
    /// no signal arrives.
    pub wait_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let wait_interval = env::var(WAIT_INTERVAL_ENVVAR)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_WAIT_INTERVAL_MS);
        Config { wait_interval: Duration::from_millis(wait_interval) }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config { wait_interval: Duration::from_millis(DEFAULT_WAIT_INTERVAL_MS) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // env::set_var mutates global process state; serialize the tests
    // that touch it so they don't race each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn default_wait_interval() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var(WAIT_INTERVAL_ENVVAR);
        assert_eq!(Config::from_env().wait_interval, Duration::from_millis(500));
    }

    #[test]
    fn overridden_wait_interval() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var(WAIT_INTERVAL_ENVVAR, "25");
        assert_eq!(Config::from_env().wait_interval, Duration::from_millis(25));
        env::remove_var(WAIT_INTERVAL_ENVVAR);
    }
}
