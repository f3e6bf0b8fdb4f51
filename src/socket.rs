//! Raw ICMPv4 socket on top of libc, and the transport seam the engine uses.

use std::io;
use std::mem;
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

use log::debug;

use crate::error::PingError;

pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(1);
/// SO_RCVTIMEO has microsecond resolution; anything shorter rounds to zero,
/// which the kernel reads as "no timeout".
pub const MIN_RECV_TIMEOUT: Duration = Duration::from_micros(1);
/// Receive buffer large enough for an IP header with options plus a
/// default-sized echo reply.
pub const RECV_BUFFER_LEN: usize = 1024;
const IPV4_MAX_HEADER_LEN: usize = 60;

/// Receive buffer length that holds the echo of a `packet_len`-byte request
/// behind a maximal IPv4 header.
pub fn recv_buffer_len(packet_len: usize) -> usize {
    (packet_len + IPV4_MAX_HEADER_LEN).max(RECV_BUFFER_LEN)
}

#[derive(Debug)]
pub enum RecvError {
    /// The receive timeout elapsed with nothing to read.
    Timeout,
    Io(io::Error),
}

impl From<io::Error> for RecvError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            // EINTR is not restarted once SO_RCVTIMEO is set.
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
                RecvError::Timeout
            }
            _ => RecvError::Io(err),
        }
    }
}

/// Send/receive primitives needed by the probe engine.
pub trait Transport {
    fn send_to(&mut self, target: Ipv4Addr, packet: &[u8]) -> io::Result<usize>;

    /// Blocks for at most the transport's receive timeout. Returns the sender
    /// and the number of bytes written into `buf`.
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(Ipv4Addr, usize), RecvError>;
}

/// Options applied to the socket after it is opened.
#[derive(Debug, Clone, Copy)]
pub struct SocketOptions {
    pub recv_timeout: Duration,
    pub ttl: Option<u32>,
    pub tos: Option<u8>,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            ttl: None,
            tos: None,
        }
    }
}

/// An `AF_INET`/`SOCK_RAW`/`IPPROTO_ICMP` socket. Closed on drop.
#[derive(Debug)]
pub struct IcmpSocket {
    fd: RawFd,
}

impl IcmpSocket {
    pub fn open(options: &SocketOptions) -> Result<Self, PingError> {
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_RAW, libc::IPPROTO_ICMP) };
        if fd == -1 {
            return Err(PingError::from_open(io::Error::last_os_error()));
        }
        // Owned from here on, so every early return below closes the fd.
        let socket = Self { fd };
        debug!("opened raw ICMP socket fd={fd}");

        socket
            .set_recv_timeout(options.recv_timeout)
            .map_err(PingError::SocketConfig)?;
        if let Some(ttl) = options.ttl {
            socket
                .set_ip_option(libc::IP_TTL, ttl as libc::c_int)
                .map_err(PingError::SocketConfig)?;
        }
        if let Some(tos) = options.tos {
            socket
                .set_ip_option(libc::IP_TOS, libc::c_int::from(tos))
                .map_err(PingError::SocketConfig)?;
        }

        Ok(socket)
    }

    fn set_recv_timeout(&self, timeout: Duration) -> io::Result<()> {
        let tv = timeval_from(timeout)?;
        let res = unsafe {
            libc::setsockopt(
                self.fd,
                libc::SOL_SOCKET,
                libc::SO_RCVTIMEO,
                &tv as *const libc::timeval as *const libc::c_void,
                mem::size_of::<libc::timeval>() as libc::socklen_t,
            )
        };
        if res == -1 {
            return Err(io::Error::last_os_error());
        }
        debug!("SO_RCVTIMEO set to {timeout:?}");
        Ok(())
    }

    fn set_ip_option(&self, name: libc::c_int, value: libc::c_int) -> io::Result<()> {
        let res = unsafe {
            libc::setsockopt(
                self.fd,
                libc::IPPROTO_IP,
                name,
                &value as *const libc::c_int as *const libc::c_void,
                mem::size_of_val(&value) as libc::socklen_t,
            )
        };
        if res == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Transport for IcmpSocket {
    fn send_to(&mut self, target: Ipv4Addr, packet: &[u8]) -> io::Result<usize> {
        let addr = sockaddr_from(target);
        let sent = unsafe {
            libc::sendto(
                self.fd,
                packet.as_ptr() as *const libc::c_void,
                packet.len(),
                0,
                &addr as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if sent < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(sent as usize)
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> Result<(Ipv4Addr, usize), RecvError> {
        let mut from: libc::sockaddr_in = unsafe { mem::zeroed() };
        let mut from_len = mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        let n = unsafe {
            libc::recvfrom(
                self.fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
                &mut from as *mut libc::sockaddr_in as *mut libc::sockaddr,
                &mut from_len,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error().into());
        }
        let sender = Ipv4Addr::from(u32::from_be(from.sin_addr.s_addr));
        Ok((sender, n as usize))
    }
}

impl AsRawFd for IcmpSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for IcmpSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
        debug!("closed raw ICMP socket fd={}", self.fd);
    }
}

fn timeval_from(timeout: Duration) -> io::Result<libc::timeval> {
    if timeout < MIN_RECV_TIMEOUT {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("receive timeout {timeout:?} is below {MIN_RECV_TIMEOUT:?}"),
        ));
    }
    Ok(libc::timeval {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_usec: timeout.subsec_micros() as libc::suseconds_t,
    })
}

fn sockaddr_from(addr: Ipv4Addr) -> libc::sockaddr_in {
    let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };
    sin.sin_family = libc::AF_INET as libc::sa_family_t;
    sin.sin_port = 0;
    sin.sin_addr = libc::in_addr {
        s_addr: u32::from(addr).to_be(),
    };
    sin
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eagain_is_a_timeout() {
        let err: RecvError = io::Error::from_raw_os_error(libc::EAGAIN).into();
        assert!(matches!(err, RecvError::Timeout));
    }

    #[test]
    fn interrupted_receive_is_a_timeout() {
        let err: RecvError = io::Error::from_raw_os_error(libc::EINTR).into();
        assert!(matches!(err, RecvError::Timeout));
    }

    #[test]
    fn sub_microsecond_timeout_is_rejected() {
        for timeout in [Duration::ZERO, Duration::from_nanos(100), Duration::from_nanos(999)] {
            match timeval_from(timeout) {
                Err(err) => assert_eq!(err.kind(), io::ErrorKind::InvalidInput),
                Ok(_) => panic!("{timeout:?} would disable the timeout"),
            }
        }
    }

    #[test]
    fn timeval_keeps_microseconds() {
        let tv = timeval_from(Duration::from_micros(1)).map_err(|e| e.to_string());
        assert_eq!(tv.map(|tv| (tv.tv_sec, tv.tv_usec)), Ok((0, 1)));
        let tv = timeval_from(Duration::from_millis(1500)).map_err(|e| e.to_string());
        assert_eq!(tv.map(|tv| (tv.tv_sec, tv.tv_usec)), Ok((1, 500_000)));
    }

    #[test]
    fn buffer_fits_large_echo() {
        assert_eq!(recv_buffer_len(64), RECV_BUFFER_LEN);
        assert_eq!(recv_buffer_len(2008), 2068);
    }

    #[test]
    fn other_recv_errors_are_io() {
        let err: RecvError = io::Error::from_raw_os_error(libc::ECONNREFUSED).into();
        assert!(matches!(err, RecvError::Io(_)));
    }

    #[test]
    fn sockaddr_is_network_order() {
        let sin = sockaddr_from(Ipv4Addr::new(192, 0, 2, 1));
        assert_eq!(sin.sin_family, libc::AF_INET as libc::sa_family_t);
        assert_eq!(sin.sin_addr.s_addr.to_ne_bytes(), [192, 0, 2, 1]);
    }
}
