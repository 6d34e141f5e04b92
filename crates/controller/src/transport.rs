use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::time::Duration;

/// Open byte stream to the controller, split into independent halves so the
/// listener can read while commands are written.
///
/// Readers must not block indefinitely: an idle read returns `WouldBlock` or
/// `TimedOut` so the listener can check its stop flag.
pub struct Connection {
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
}

pub trait Transport: Send + Sync {
    fn open(&self) -> io::Result<Connection>;

    fn describe(&self) -> String;
}

/// Character device such as `/dev/ttyUSB0` or `/dev/ttyACM0`.
///
/// Line settings (baud, parity) are expected to be configured on the device
/// already, e.g. with `stty`.
pub struct DeviceTransport {
    path: PathBuf,
}

impl DeviceTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Transport for DeviceTransport {
    fn open(&self) -> io::Result<Connection> {
        let file: File = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(&self.path)?;
        let writer = file.try_clone()?;

        Ok(Connection {
            reader: Box::new(file),
            writer: Box::new(writer),
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Serial-over-TCP bridge (ser2net and similar).
pub struct TcpTransport {
    address: String,
    read_timeout: Duration,
}

impl TcpTransport {
    pub fn new(address: impl Into<String>, read_timeout: Duration) -> Self {
        Self {
            address: address.into(),
            read_timeout,
        }
    }
}

impl Transport for TcpTransport {
    fn open(&self) -> io::Result<Connection> {
        let stream = TcpStream::connect(&self.address)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.read_timeout.max(Duration::from_millis(1))))?;
        let writer = stream.try_clone()?;

        Ok(Connection {
            reader: Box::new(stream),
            writer: Box::new(writer),
        })
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }
}

/// Idle reads that should be retried after a short sleep.
pub(crate) fn is_idle(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;
    use std::net::TcpListener;

    #[test]
    fn tcp_transport_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let peer = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut line = String::new();
            io::BufReader::new(stream.try_clone().unwrap())
                .read_line(&mut line)
                .unwrap();
            (&stream).write_all(b"DETECTED\n").unwrap();
            line
        });

        let transport = TcpTransport::new(addr, Duration::from_millis(20));
        let mut conn = transport.open().unwrap();
        conn.writer.write_all(b"PING\n").unwrap();
        conn.writer.flush().unwrap();

        assert_eq!(peer.join().unwrap(), "PING\n");

        let mut buf = [0u8; 16];
        let n = loop {
            match conn.reader.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if is_idle(&e) => continue,
                Err(e) => panic!("read failed: {e}"),
            }
        };
        assert_eq!(&buf[..n], b"DETECTED\n");
    }

    #[test]
    fn idle_read_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let transport = TcpTransport::new(addr, Duration::from_millis(10));
        let mut conn = transport.open().unwrap();
        let _peer = listener.accept().unwrap();

        let err = conn.reader.read(&mut [0u8; 8]).unwrap_err();
        assert!(is_idle(&err));
    }

    #[test]
    fn missing_device_fails_to_open() {
        let transport = DeviceTransport::new("/dev/does-not-exist-tty");
        assert!(transport.open().is_err());
    }
}
