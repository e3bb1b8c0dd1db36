//! Reference link-layer frame source: an `AF_PACKET` raw socket, optionally
//! bound to a single interface. Promiscuous mode and privilege acquisition
//! (`CAP_NET_RAW`/root) are the operator's responsibility, per spec.md §6.

use super::FrameSource;
use crate::error::{CaptureError, CaptureResult};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// `ETH_P_ALL`, network byte order, for `socket(AF_PACKET, SOCK_RAW, ...)`.
const ETH_P_ALL_BE: u16 = (libc::ETH_P_ALL as u16).to_be();

pub struct RawSocketFrameSource {
    socket: Socket,
}

impl RawSocketFrameSource {
    /// Open a raw packet socket. `iface` of `"any"` binds to every
    /// interface; any other value is resolved with `if_nametoindex` and
    /// bound to that interface only.
    pub fn bind(iface: &str) -> CaptureResult<Self> {
        let domain = Domain::from(libc::AF_PACKET);
        let protocol = Protocol::from(ETH_P_ALL_BE as i32);
        let socket = Socket::new(domain, Type::RAW, Some(protocol)).map_err(|e| {
            CaptureError::Bind { iface: iface.to_string(), source: e }
        })?;
        socket.set_read_timeout(Some(Duration::from_millis(200))).map_err(|e| CaptureError::Bind {
            iface: iface.to_string(),
            source: e,
        })?;

        if iface != "any" {
            let ifindex = interface_index(iface).map_err(|e| CaptureError::Bind {
                iface: iface.to_string(),
                source: e,
            })?;
            bind_to_interface(&socket, ifindex).map_err(|e| CaptureError::Bind {
                iface: iface.to_string(),
                source: e,
            })?;
        }

        Ok(Self { socket })
    }
}

impl FrameSource for RawSocketFrameSource {
    fn recv_timeout(&mut self, timeout: Duration) -> CaptureResult<Option<Vec<u8>>> {
        // `read_timeout` is set once at bind time to a short poll interval
        // so the capture loop can re-check its shutdown flag; `timeout`
        // here is only advisory for callers that construct their own
        // source, the socket already enforces its own bound.
        let _ = timeout;
        let mut buf = [0u8; 65535];
        match (&self.socket).read(&mut buf) {
            Ok(n) => Ok(Some(buf[..n].to_vec())),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(CaptureError::Recv(e)),
        }
    }
}

fn interface_index(name: &str) -> io::Result<libc::c_uint> {
    let cname = std::ffi::CString::new(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interface name contains NUL"))?;
    let idx = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if idx == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(idx)
}

fn bind_to_interface(socket: &Socket, ifindex: libc::c_uint) -> io::Result<()> {
    let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as u16;
    addr.sll_protocol = ETH_P_ALL_BE;
    addr.sll_ifindex = ifindex as i32;

    let ret = unsafe {
        libc::bind(
            socket.as_raw_fd(),
            &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
