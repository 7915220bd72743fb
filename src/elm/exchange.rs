//! Request/reply framing over the adapter stream
//!
//! Requests are terminated with a carriage return. The adapter ends each
//! reply with a `>` prompt once it is ready for the next request.

use bytes::BytesMut;
use obd_shared::{CommandError, InputStream, OutputStream};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tracing::trace;

/// Prompt the adapter sends when it is ready for a request
pub const PROMPT: u8 = b'>';

/// Cancellation signal shared by every command in a poller
#[derive(Debug, Clone)]
pub struct Interrupt {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    /// Create an untriggered interrupt
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Signal every holder to stop dispatching
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the interrupt has been triggered
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the interrupt is triggered
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|triggered| *triggered).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// Per-command exchange settings
#[derive(Debug, Clone)]
pub struct ExchangeOptions {
    /// Maximum wait for the prompt after a request
    pub read_timeout: Duration,
    /// Pause between writing a request and reading its reply
    pub response_delay: Option<Duration>,
    /// Cancellation signal
    pub interrupt: Interrupt,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            response_delay: None,
            interrupt: Interrupt::new(),
        }
    }
}

/// Write `request` followed by a carriage return and flush
pub async fn send_request(
    output: &mut OutputStream,
    request: &str,
    response_delay: Option<Duration>,
) -> io::Result<()> {
    trace!("-> {}", request);
    output.write_all(request.as_bytes()).await?;
    output.write_all(b"\r").await?;
    output.flush().await?;

    if let Some(delay) = response_delay {
        tokio::time::sleep(delay).await;
    }
    Ok(())
}

/// Read until the adapter prompt, returning the bytes before it
///
/// End of stream before any byte is an error. End of stream after a partial
/// reply returns what was read.
pub async fn read_until_prompt(input: &mut InputStream, read_timeout: Duration) -> io::Result<BytesMut> {
    let read = async {
        let mut buf = BytesMut::with_capacity(64);
        loop {
            let scanned = buf.len();
            if input.read_buf(&mut buf).await? == 0 {
                if buf.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "adapter closed the stream",
                    ));
                }
                return Ok(buf);
            }

            if let Some(pos) = buf[scanned..].iter().position(|b| *b == PROMPT) {
                buf.truncate(scanned + pos);
                return Ok(buf);
            }
        }
    };

    match tokio::time::timeout(read_timeout, read).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no prompt from adapter within {:?}", read_timeout),
        )),
    }
}

/// Send `request` and wait for its reply, honoring the interrupt
pub async fn exchange(
    input: &mut InputStream,
    output: &mut OutputStream,
    request: &str,
    options: &ExchangeOptions,
) -> Result<BytesMut, CommandError> {
    if options.interrupt.is_triggered() {
        return Err(CommandError::Cancelled);
    }

    let transact = async {
        send_request(output, request, options.response_delay).await?;
        read_until_prompt(input, options.read_timeout).await
    };

    tokio::select! {
        biased;
        _ = options.interrupt.triggered() => Err(CommandError::Cancelled),
        reply = transact => {
            let reply = reply?;
            trace!("<- {}", String::from_utf8_lossy(&reply).trim());
            Ok(reply)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_send_request_appends_carriage_return() {
        let (mut adapter, mut host) = duplex(64);
        send_request(&mut host, "01 0C", None).await.unwrap();

        let mut buf = [0u8; 6];
        adapter.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"01 0C\r");
    }

    #[tokio::test]
    async fn test_read_until_prompt_across_chunks() {
        let (mut adapter, mut host) = duplex(64);
        let writer = tokio::spawn(async move {
            adapter.write_all(b"41 0C ").await.unwrap();
            tokio::task::yield_now().await;
            adapter.write_all(b"1A F8\r\r>").await.unwrap();
            adapter
        });

        let reply = read_until_prompt(&mut host, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&reply[..], b"41 0C 1A F8\r\r");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_until_prompt_eof() {
        let mut empty = tokio::io::empty();
        let err = read_until_prompt(&mut empty, Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let mut partial: &[u8] = b"41 0D 32";
        let reply = read_until_prompt(&mut partial, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&reply[..], b"41 0D 32");
    }

    #[tokio::test]
    async fn test_read_until_prompt_times_out() {
        let (_adapter, mut host) = duplex(64);
        let err = read_until_prompt(&mut host, Duration::from_millis(20)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[tokio::test]
    async fn test_exchange_cancelled_before_send() {
        let options = ExchangeOptions::default();
        options.interrupt.trigger();

        let mut input = tokio::io::empty();
        let mut output = tokio::io::sink();
        let result = exchange(&mut input, &mut output, "ATZ", &options).await;
        assert!(matches!(result, Err(CommandError::Cancelled)));
    }

    #[tokio::test]
    async fn test_exchange_cancelled_while_waiting() {
        let options = ExchangeOptions {
            read_timeout: Duration::from_secs(30),
            ..Default::default()
        };
        let interrupt = options.interrupt.clone();
        let (_adapter, mut host) = duplex(64);
        let mut output = tokio::io::sink();

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            interrupt.trigger();
        });

        let result = exchange(&mut host, &mut output, "01 0C", &options).await;
        assert!(matches!(result, Err(CommandError::Cancelled)));
        trigger.await.unwrap();
    }
}
