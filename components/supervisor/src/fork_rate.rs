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

//! Bounds how fast the supervisor forks replacement workers, so a crash
//! loop can't starve the host.

use std::thread;
use std::time::Duration;

use time::SteadyTime;

/// Limit ourselves to one process a second (over a period of
/// `expected_children` seconds). Allows a burst at startup but keeps a
/// tight crash loop from forking as fast as the CPU allows.
#[derive(Default)]
pub struct ForkRateLedger {
    times: Vec<SteadyTime>,
}

impl ForkRateLedger {
    pub fn new() -> Self {
        ForkRateLedger { times: Vec::new() }
    }

    /// Called immediately before every fork. May sleep.
    pub fn throttle(&mut self, expected_children: usize) {
        if self.times.len() > expected_children {
            let elapsed = SteadyTime::now() - self.times[0];
            if elapsed < time::Duration::seconds(expected_children as i64) {
                thread::sleep(Duration::from_secs(1));
                self.times.remove(0);
                self.times.push(SteadyTime::now());
                return;
            }
        }
        self.times.push(SteadyTime::now());
    }

    /// Reset history so the next round of forks isn't throttled by
    /// history accrued before a reconfiguration or reload.
    pub fn reset(&mut self) {
        self.times.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.times.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_a_timestamp_per_call_under_the_limit() {
        let mut ledger = ForkRateLedger::new();
        for _ in 0..3 {
            ledger.throttle(10);
        }
        assert_eq!(ledger.len(), 3);
    }

    #[test]
    fn reset_clears_history() {
        let mut ledger = ForkRateLedger::new();
        ledger.throttle(10);
        ledger.reset();
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn throttles_when_over_budget_and_recent() {
        let mut ledger = ForkRateLedger::new();
        // expected_children = 0 means any single recorded fork already
        // exceeds the budget, and "just now" is always within the
        // window, so the very next throttle() call must sleep one
        // second instead of growing the ledger unbounded.
        ledger.throttle(0);
        assert_eq!(ledger.len(), 1);
        let before = ledger.len();
        ledger.throttle(0);
        // the over-budget branch replaces the oldest entry rather than
        // appending, so the ledger length does not grow.
        assert_eq!(ledger.len(), before);
    }
}
