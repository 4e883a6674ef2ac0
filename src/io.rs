//! Platform I/O shim (C1): socket option tuning, vectored send/recv helpers,
//! and a monotonic clock. None of this is load-bearing for correctness —
//! it is tuning and portability, kept separate from the connection logic
//! that uses it.

use std::io::{IoSlice, Read, Write};
use std::net::TcpStream;
use std::os::unix::io::AsRawFd;

use crate::error::RiocResult;

/// Tune a client socket for low-latency request/response traffic:
/// `TCP_NODELAY`, 1 MiB send/receive buffers, short keepalive probes,
/// `IP_TOS=LOWDELAY`, and (Linux only) `TCP_QUICKACK`.
pub fn tune_socket(stream: &TcpStream) -> RiocResult<()> {
    stream.set_nodelay(true)?;

    let fd = stream.as_raw_fd();
    unsafe {
        set_opt(fd, libc::SOL_SOCKET, libc::SO_SNDBUF, 1024 * 1024);
        set_opt(fd, libc::SOL_SOCKET, libc::SO_RCVBUF, 1024 * 1024);
        set_opt(fd, libc::SOL_SOCKET, libc::SO_KEEPALIVE, 1);
        #[cfg(target_os = "linux")]
        {
            set_opt(fd, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE, 30);
            set_opt(fd, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL, 5);
            set_opt(fd, libc::IPPROTO_TCP, libc::TCP_KEEPCNT, 3);
            set_opt(fd, libc::IPPROTO_TCP, libc::TCP_QUICKACK, 1);
        }
        let tos: libc::c_int = 0x10; // IPTOS_LOWDELAY
        libc::setsockopt(
            fd,
            libc::IPPROTO_IP,
            libc::IP_TOS,
            &tos as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
    Ok(())
}

unsafe fn set_opt(fd: libc::c_int, level: libc::c_int, name: libc::c_int, value: libc::c_int) {
    libc::setsockopt(
        fd,
        level,
        name,
        &value as *const _ as *const libc::c_void,
        std::mem::size_of::<libc::c_int>() as libc::socklen_t,
    );
}

/// Enable `TCP_CORK` (Linux) / `TCP_NOPUSH` (macOS) around a vectored batch
/// send so the kernel doesn't emit a short leading segment.
pub fn enable_cork(stream: &TcpStream) {
    let fd = stream.as_raw_fd();
    unsafe {
        #[cfg(target_os = "linux")]
        set_opt(fd, libc::IPPROTO_TCP, libc::TCP_CORK, 1);
        #[cfg(target_os = "macos")]
        set_opt(fd, libc::IPPROTO_TCP, libc::TCP_NOPUSH, 1);
    }
}

/// Disable cork/nopush after a batch send. On macOS, corking alone won't
/// flush a buffer that never filled a segment, so we additionally send a
/// zero-byte packet to force it out.
pub fn disable_cork(stream: &mut TcpStream) {
    let fd = stream.as_raw_fd();
    unsafe {
        #[cfg(target_os = "linux")]
        set_opt(fd, libc::IPPROTO_TCP, libc::TCP_CORK, 0);
        #[cfg(target_os = "macos")]
        {
            set_opt(fd, libc::IPPROTO_TCP, libc::TCP_NOPUSH, 0);
        }
    }
    #[cfg(target_os = "macos")]
    {
        let _ = stream.write(&[]);
    }
}

/// Send an IO vector list, retrying short writes, surrounded by cork/nopush.
pub fn writev_all(stream: &mut TcpStream, iov: &[IoSlice<'_>]) -> RiocResult<()> {
    let total: usize = iov.iter().map(|s| s.len()).sum();
    enable_cork(stream);
    let result = writev_loop(stream, iov, total);
    disable_cork(stream);
    result
}

fn writev_loop(stream: &mut TcpStream, iov: &[IoSlice<'_>], total: usize) -> RiocResult<()> {
    // `write_vectored` may perform a short write across slice boundaries;
    // loop, re-slicing IoSlice::advance_slices style, until everything
    // the caller asked for has gone out.
    let mut owned: Vec<IoSlice<'_>> = iov.to_vec();
    let mut sent = 0usize;
    while sent < total {
        let n = stream.write_vectored(&owned)?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "writev returned zero",
            )
            .into());
        }
        sent += n;
        IoSlice::advance_slices(&mut owned.as_mut_slice(), n);
        owned.retain(|s| !s.is_empty());
    }
    Ok(())
}

/// Read exactly `buf.len()` bytes, short-read safe.
pub fn read_exact(stream: &mut TcpStream, buf: &mut [u8]) -> RiocResult<()> {
    stream.read_exact(buf)?;
    Ok(())
}

/// Monotonic nanosecond clock, used for default operation timestamps.
/// `CLOCK_MONOTONIC_RAW` on Linux (immune to NTP slewing), `CLOCK_MONOTONIC`
/// elsewhere — wall-clock time is unusable here since a backward NTP step
/// would violate the timestamp-ordering invariant the server relies on.
pub fn get_timestamp_ns() -> u64 {
    #[cfg(target_os = "linux")]
    const CLOCK: libc::clockid_t = libc::CLOCK_MONOTONIC_RAW;
    #[cfg(not(target_os = "linux"))]
    const CLOCK: libc::clockid_t = libc::CLOCK_MONOTONIC;

    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(CLOCK, &mut ts);
    }
    ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
}
