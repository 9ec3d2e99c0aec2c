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

use std::env;
use std::ffi::CString;
use std::path::Path;

use libc;

/// Best-effort `ps`-visible process title. On Linux this sets the thread
/// "comm" name via `prctl(PR_SET_NAME, ...)`, which is truncated to 15
/// bytes by the kernel; callers should put the most identifying part of
/// the title first.
pub fn set(title: &str) {
    if let Ok(c_title) = CString::new(title) {
        unsafe {
            libc::prctl(libc::PR_SET_NAME, c_title.as_ptr() as libc::c_ulong, 0, 0, 0);
        }
    }
}

/// `argv[0]`'s basename, mirroring what most supervisors show in a
/// process title's first segment.
pub fn process_name() -> String {
    env::args()
        .next()
        .map(|a| {
            Path::new(&a)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(a)
        })
        .unwrap_or_else(|| "unknown".to_string())
}
