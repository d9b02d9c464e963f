use super::SinkError;
use redis::{Client, Connection, Pipeline};
use std::time::Duration;
use tracing::{debug, info, instrument};
use waveform_analysis::Real;

fn key(stream: &str, index: &str, metric: &str) -> String {
    format!("stream:{stream}:{index}:{metric}")
}

/// Appends a `SET`, and an `EXPIRE` if `expire` is nonzero, for one point.
fn queue_point(
    pipeline: &mut Pipeline,
    stream: &str,
    index: &str,
    metric: &str,
    value: Real,
    expire: u32,
) {
    let key = key(stream, index, metric);
    pipeline
        .cmd("SET")
        .arg(&key)
        .arg(format!("{value:.6}"))
        .ignore();
    if expire != 0 {
        pipeline.cmd("EXPIRE").arg(&key).arg(expire).ignore();
    }
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const IO_TIMEOUT: Duration = Duration::from_secs(2);

/// Buffers points in a pipeline that is sent on [RedisSink::flush].
///
/// The connection is opened on the first flush and reopened on the flush
/// after any failure. Every network operation is bounded by a timeout.
pub struct RedisSink {
    client: Client,
    connection: Option<Connection>,
    pipeline: Pipeline,
    num_queued: usize,
}

impl RedisSink {
    /// Parses `url` without contacting the server.
    pub fn open(url: &str) -> Result<Self, SinkError> {
        Ok(Self {
            client: Client::open(url)?,
            connection: None,
            pipeline: redis::pipe(),
            num_queued: 0,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Opens a connection unless one is already open.
    pub fn connect(&mut self) -> Result<&mut Connection, SinkError> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => {
                let connection = self.client.get_connection_with_timeout(CONNECT_TIMEOUT)?;
                connection.set_read_timeout(Some(IO_TIMEOUT))?;
                connection.set_write_timeout(Some(IO_TIMEOUT))?;
                info!("Connected to Redis");
                connection
            }
        };
        Ok(self.connection.insert(connection))
    }

    pub fn send(&mut self, stream: &str, index: &str, metric: &str, value: Real, expire: u32) {
        queue_point(&mut self.pipeline, stream, index, metric, value, expire);
        self.num_queued += 1;
    }

    /// Sends the buffered points and returns how many there were.
    /// The buffer is emptied even if sending fails, and a failed connection
    /// is dropped so that the next flush reconnects.
    #[instrument(skip_all, level = "debug", fields(num_queued = self.num_queued))]
    pub fn flush(&mut self) -> Result<usize, SinkError> {
        if self.num_queued == 0 {
            return Ok(0);
        }
        let pipeline = std::mem::replace(&mut self.pipeline, redis::pipe());
        let num_sent = std::mem::take(&mut self.num_queued);
        let result = self
            .connect()
            .and_then(|connection| Ok(pipeline.query::<()>(connection)?));
        if let Err(e) = result {
            self.connection = None;
            return Err(e);
        }
        debug!("Sent {num_sent} points");
        Ok(num_sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(expire: u32) -> String {
        let mut pipeline = redis::pipe();
        queue_point(&mut pipeline, "tpc", "channel:4", "rms", 2.5, expire);
        String::from_utf8_lossy(&pipeline.get_packed_pipeline()).into_owned()
    }

    /// A URL nothing listens on.
    const UNREACHABLE: &str = "redis://127.0.0.1:1";

    #[test]
    fn open_does_not_connect() {
        let sink = RedisSink::open(UNREACHABLE).unwrap();
        assert!(!sink.is_connected());
        assert!(RedisSink::open("not a url").is_err());
    }

    #[test]
    fn failed_flush_drops_points_and_retries() {
        let mut sink = RedisSink::open(UNREACHABLE).unwrap();
        assert_eq!(sink.flush().unwrap(), 0);
        for attempt in 0..2 {
            sink.send("tpc", "channel:0", "rms", 1.0, 0);
            sink.send("tpc", "channel:1", "rms", 2.0, 10);
            assert!(sink.flush().is_err(), "attempt {attempt}");
            assert!(!sink.is_connected());
            assert_eq!(sink.num_queued, 0);
        }
    }

    #[test]
    fn key_layout() {
        assert_eq!(key("tpc", "group:1", "rms"), "stream:tpc:group:1:rms");
    }

    #[test]
    fn set_without_expiry() {
        let commands = packed(0);
        assert!(commands.contains("SET"));
        assert!(commands.contains("stream:tpc:channel:4:rms"));
        assert!(commands.contains("2.500000"));
        assert!(!commands.contains("EXPIRE"));
    }

    #[test]
    fn set_then_expire() {
        let commands = packed(30);
        let set = commands.find("SET");
        let expire = commands.find("EXPIRE");
        assert!(set.is_some() && expire.is_some());
        assert!(set < expire);
        assert!(commands.contains("\r\n30\r\n"));
    }
}
