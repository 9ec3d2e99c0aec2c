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

//! One-shot readiness notification to a host init system, compatible
//! with the `sd_notify` convention: the host sets `NOTIFY_SOCKET`, we
//! send a single "READY=1" datagram and unset the variable so a later
//! reinitialization can never send a second one.

use std::env;
use std::io;
use std::mem;
use std::os::unix::net::UnixDatagram;

use libc;

use config::NOTIFY_SOCKET_ENVVAR;

/// Connects to an abstract-namespace datagram socket and sends `READY=1`.
///
/// `std::os::unix::net::UnixDatagram::connect` goes through `Path`/`CString`
/// and rejects any interior NUL, so it cannot reach `@name` sockets: the
/// abstract-namespace convention is a leading NUL in `sun_path` followed by
/// the name, with the address length (not a NUL terminator) marking where
/// the name ends. Reaching that address means building `sockaddr_un` by
/// hand and connecting the raw fd ourselves.
fn notify_abstract(name: &[u8]) -> io::Result<()> {
    unsafe {
        let fd = libc::socket(libc::AF_UNIX, libc::SOCK_DGRAM, 0);
        if fd == -1 {
            return Err(io::Error::last_os_error());
        }

        let result = (|| -> io::Result<()> {
            let mut addr: libc::sockaddr_un = mem::zeroed();
            addr.sun_family = libc::AF_UNIX as libc::sa_family_t;

            if name.len() > addr.sun_path.len() - 1 {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "abstract socket name too long"));
            }
            // sun_path[0] stays 0: that leading NUL is the abstract-namespace
            // marker, not a string terminator.
            for (i, b) in name.iter().enumerate() {
                addr.sun_path[i + 1] = *b as libc::c_char;
            }
            let addr_len = (mem::size_of::<libc::sa_family_t>() + 1 + name.len()) as libc::socklen_t;

            if libc::connect(fd, &addr as *const libc::sockaddr_un as *const libc::sockaddr, addr_len) != 0 {
                return Err(io::Error::last_os_error());
            }
            let msg = b"READY=1";
            if libc::send(fd, msg.as_ptr() as *const libc::c_void, msg.len(), 0) < 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        })();

        libc::close(fd);
        result
    }
}

fn notify_path(path: &str) -> io::Result<()> {
    let sock = UnixDatagram::unbound()?;
    sock.connect(path)?;
    sock.send(b"READY=1")?;
    Ok(())
}

pub fn notify_once() {
    let notify_socket = match env::var(NOTIFY_SOCKET_ENVVAR) {
        Ok(s) => s,
        Err(_) => return,
    };

    let result = if let Some(rest) = notify_socket.strip_prefix('@') {
        notify_abstract(rest.as_bytes())
    } else {
        notify_path(&notify_socket)
    };

    match result {
        Ok(()) => env::remove_var(NOTIFY_SOCKET_ENVVAR),
        Err(err) => debug!("Readiness notification failed: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::io::RawFd;
    use std::os::unix::net::UnixDatagram;
    use std::sync::Mutex;
    use tempdir::TempDir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn sends_ready_and_unsets_variable() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = TempDir::new("roost-readiness").unwrap();
        let path = dir.path().join("notify.sock");
        let listener = UnixDatagram::bind(&path).unwrap();
        listener.set_read_timeout(Some(std::time::Duration::from_secs(5))).unwrap();

        env::set_var(NOTIFY_SOCKET_ENVVAR, path.to_str().unwrap());
        notify_once();

        let mut buf = [0u8; 16];
        let n = listener.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"READY=1");
        assert!(env::var(NOTIFY_SOCKET_ENVVAR).is_err());
    }

    #[test]
    fn no_op_when_variable_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var(NOTIFY_SOCKET_ENVVAR);
        notify_once();
    }

    /// Binds an abstract-namespace datagram socket by hand, since
    /// `UnixDatagram::bind` has the same interior-NUL restriction as
    /// `connect`.
    fn bind_abstract(name: &[u8]) -> RawFd {
        unsafe {
            let fd = libc::socket(libc::AF_UNIX, libc::SOCK_DGRAM, 0);
            assert_ne!(fd, -1);
            let mut addr: libc::sockaddr_un = mem::zeroed();
            addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
            for (i, b) in name.iter().enumerate() {
                addr.sun_path[i + 1] = *b as libc::c_char;
            }
            let addr_len = (mem::size_of::<libc::sa_family_t>() + 1 + name.len()) as libc::socklen_t;
            let ret = libc::bind(fd, &addr as *const libc::sockaddr_un as *const libc::sockaddr, addr_len);
            assert_eq!(ret, 0);
            fd
        }
    }

    #[test]
    fn sends_ready_over_abstract_namespace_socket() {
        let _guard = ENV_LOCK.lock().unwrap();
        let name = b"roost-readiness-abstract-test";
        let fd = bind_abstract(name);

        env::set_var(NOTIFY_SOCKET_ENVVAR, "@roost-readiness-abstract-test");
        notify_once();

        let mut buf = [0u8; 16];
        let n = unsafe { libc::recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0) };
        unsafe { libc::close(fd) };
        assert_eq!(&buf[..n as usize], b"READY=1");
        assert!(env::var(NOTIFY_SOCKET_ENVVAR).is_err());
    }
}
