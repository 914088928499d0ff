//! Opaque I/O endpoints that buffers stage bytes against.

use std::{
    io::{self, Read, Write},
    net::TcpStream,
};

/// An I/O endpoint (socket, pipe) a buffer can stage bytes against.
///
/// Implementations surface three primitives: a non-consuming peek at the
/// queued readable byte count, a single read, and a single write. Reads and
/// writes may legitimately report interruption (callers retry) or would-block
/// (callers treat as zero progress); both are carried as their standard
/// [io::ErrorKind] values.
pub trait Descriptor {
    /// Number of bytes currently queued for reading without blocking.
    ///
    /// Zero means "nothing reported queued": the descriptor may still be
    /// readable, so readers fall back to a default transfer size rather than
    /// skipping the read.
    fn pending(&self) -> io::Result<usize>;

    /// Read into `buf`, returning the bytes transferred. Zero signals
    /// end-of-stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write from `buf`, returning the bytes the endpoint accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        use std::os::{fd::AsRawFd, unix::net::UnixStream};

        /// Ask the kernel how many bytes are queued on `fd`'s receive path.
        fn queued_bytes(fd: libc::c_int) -> io::Result<usize> {
            let mut queued: libc::c_int = 0;
            // SAFETY: FIONREAD writes a single c_int through the pointer.
            let rc = unsafe { libc::ioctl(fd, libc::FIONREAD, &mut queued) };
            if rc == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(queued as usize)
        }

        impl Descriptor for TcpStream {
            fn pending(&self) -> io::Result<usize> {
                queued_bytes(self.as_raw_fd())
            }

            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                Read::read(self, buf)
            }

            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                Write::write(self, buf)
            }
        }

        impl Descriptor for UnixStream {
            fn pending(&self) -> io::Result<usize> {
                queued_bytes(self.as_raw_fd())
            }

            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                Read::read(self, buf)
            }

            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                Write::write(self, buf)
            }
        }
    } else {
        impl Descriptor for TcpStream {
            fn pending(&self) -> io::Result<usize> {
                // No queued-byte query on this platform; readers fall back
                // to their default transfer size.
                Ok(0)
            }

            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                Read::read(self, buf)
            }

            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                Write::write(self, buf)
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::{net::TcpListener, thread, time::Duration};

    #[test]
    fn test_tcp_pending_reports_queued_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let mut client = TcpStream::connect(addr).expect("connect");
        let (mut server, _) = listener.accept().expect("accept");

        client.write_all(b"0123456789").expect("send");

        // Wait for the kernel to queue the bytes on the accepting side.
        let mut queued = 0;
        for _ in 0..100 {
            queued = server.pending().expect("pending");
            if queued == 10 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(queued, 10);

        let mut buf = [0u8; 10];
        let read = Descriptor::read(&mut server, &mut buf).expect("read");
        assert_eq!(read, 10);
        assert_eq!(&buf, b"0123456789");

        // Nothing remains queued after the read.
        assert_eq!(server.pending().expect("pending"), 0);
    }

    #[test]
    fn test_unix_stream_round_trip() {
        let (mut left, mut right) = UnixStream::pair().expect("socket pair");

        let accepted = Descriptor::write(&mut left, b"ping").expect("write");
        assert_eq!(accepted, 4);

        let mut queued = 0;
        for _ in 0..100 {
            queued = right.pending().expect("pending");
            if queued == 4 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(queued, 4);

        let mut buf = [0u8; 4];
        assert_eq!(Descriptor::read(&mut right, &mut buf).expect("read"), 4);
        assert_eq!(&buf, b"ping");
    }
}
