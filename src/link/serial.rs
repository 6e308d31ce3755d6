// Inbound byte link: serial port or stdin
//
// Reads happen on a plain OS thread because both serialport and stdin are
// blocking. The thread only forwards raw chunks; all decoding happens in the
// control tick.

use std::io::{Read, Write};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Serial read timeout; the reader loops on timeouts so it never blocks forever
pub const READ_TIMEOUT_MS: u64 = 50;

/// Largest chunk handed to the control loop at once
pub const READ_CHUNK: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Both halves of the byte link
pub struct Link {
    pub name: String,
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
}

impl Link {
    /// Open a serial port (8N1) at the given baudrate
    pub fn open_serial(port_name: &str, baudrate: u32) -> Result<Self, LinkError> {
        info!("Opening serial link on {} @ {} baud", port_name, baudrate);
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(READ_TIMEOUT_MS))
            .open()?;
        let writer = port.try_clone()?;

        Ok(Self {
            name: port_name.to_string(),
            reader: Box::new(port),
            writer: Box::new(writer),
        })
    }

    /// Use stdin for frames and stdout for replies (bench testing, piping)
    pub fn stdio() -> Self {
        info!("Using stdin/stdout as link");
        Self {
            name: "stdio".to_string(),
            reader: Box::new(std::io::stdin()),
            writer: Box::new(std::io::stdout()),
        }
    }

    /// Split the link: start the reader thread and keep the writer
    pub fn spawn_reader(
        self,
        tx: mpsc::Sender<Vec<u8>>,
    ) -> Result<(JoinHandle<()>, Box<dyn Write + Send>), LinkError> {
        let Link {
            name,
            reader,
            writer,
        } = self;
        let handle = std::thread::Builder::new()
            .name(format!("link-reader:{}", name))
            .spawn(move || read_loop(reader, tx))?;
        Ok((handle, writer))
    }
}

/// Forward chunks until EOF, a hard read error, or the control loop goes away
fn read_loop(mut reader: Box<dyn Read + Send>, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = [0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => {
                info!("Link reached end of stream");
                break;
            }
            Ok(n) => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    debug!("Control loop gone, stopping reader");
                    break;
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(e) => {
                warn!("Link read failed: {}", e);
                break;
            }
        }
    }
}
