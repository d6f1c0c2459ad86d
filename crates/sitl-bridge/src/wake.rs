//! Shutdown wake mechanism for the receive loop.
//!
//! The rx thread blocks in `poll(2)` on two descriptors: the UDP socket and
//! the read end of a pipe. Writing one byte to the pipe makes the blocked
//! poll return promptly so the loop can observe termination. `EINTR` is
//! retried transparently; it is not an error.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

/// Which descriptor became readable.
#[derive(Debug, PartialEq, Eq)]
pub enum Readable {
    Socket,
    Wake,
}

/// A self-pipe used solely to unblock the receive loop for shutdown.
pub struct WakePipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl WakePipe {
    pub fn new() -> io::Result<Self> {
        let mut fds = [0i32; 2];
        // SAFETY: fds is a valid 2-element array for the duration of the call.
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: on success pipe2 hands us two freshly opened fds we own.
        unsafe {
            Ok(Self {
                read: OwnedFd::from_raw_fd(fds[0]),
                write: OwnedFd::from_raw_fd(fds[1]),
            })
        }
    }

    /// Wake a loop blocked in [`wait_readable`]. Best-effort: the result is
    /// ignored, a full pipe already guarantees a pending wake.
    pub fn signal(&self) {
        let byte = [1u8];
        // SAFETY: the write fd stays open for self's lifetime.
        let _ = unsafe { libc::write(self.write.as_raw_fd(), byte.as_ptr().cast(), 1) };
    }

    pub fn read_fd(&self) -> RawFd {
        self.read.as_raw_fd()
    }
}

/// Block until the socket or the wake pipe is readable.
///
/// The wake pipe wins when both are ready, so shutdown is always prompt.
/// Error and hangup conditions on the socket are mapped to `Readable::Socket`
/// so the caller's `recv_from` surfaces the actual error.
pub fn wait_readable(socket: RawFd, wake: RawFd) -> io::Result<Readable> {
    let mut fds = [
        libc::pollfd {
            fd: socket,
            events: libc::POLLIN,
            revents: 0,
        },
        libc::pollfd {
            fd: wake,
            events: libc::POLLIN,
            revents: 0,
        },
    ];

    loop {
        // SAFETY: fds is a valid array of 2 pollfd for the duration of the call.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if (fds[1].revents & libc::POLLIN) != 0 {
            return Ok(Readable::Wake);
        }
        if (fds[0].revents & (libc::POLLIN | libc::POLLERR | libc::POLLHUP)) != 0 {
            return Ok(Readable::Socket);
        }
    }
}
