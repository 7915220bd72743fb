//! AT set-up commands sent to the adapter before polling

use super::exchange::{exchange, ExchangeOptions};
use super::response::{check_for_errors, clean_response};
use async_trait::async_trait;
use obd_shared::{CommandError, InputStream, ObdCommand, OutputStream};
use std::time::Duration;
use tracing::{debug, warn};

/// An adapter configuration command such as `ATE0`
///
/// Replies are kept verbatim; there is nothing to decode.
#[derive(Debug, Clone)]
pub struct AtCommand {
    request: String,
    options: ExchangeOptions,
    raw: String,
    formatted: String,
}

impl AtCommand {
    /// Create a command for an arbitrary AT request
    pub fn new(request: impl Into<String>, options: ExchangeOptions) -> Self {
        Self {
            request: request.into(),
            options,
            raw: String::new(),
            formatted: String::new(),
        }
    }

    /// `ATZ`: reset the adapter. The reset takes a while, so a short delay is added.
    pub fn reset(mut options: ExchangeOptions) -> Self {
        options.response_delay = Some(
            options
                .response_delay
                .map_or(Duration::from_millis(500), |d| d.max(Duration::from_millis(500))),
        );
        Self::new("ATZ", options)
    }

    /// `ATE0`: disable echo
    pub fn echo_off(options: ExchangeOptions) -> Self {
        Self::new("ATE0", options)
    }

    /// `ATL0`: disable line feeds
    pub fn line_feed_off(options: ExchangeOptions) -> Self {
        Self::new("ATL0", options)
    }

    /// `ATH0`: hide frame headers
    pub fn headers_off(options: ExchangeOptions) -> Self {
        Self::new("ATH0", options)
    }

    /// `ATSP0`: let the adapter pick the vehicle protocol
    pub fn select_protocol_auto(options: ExchangeOptions) -> Self {
        Self::new("ATSP0", options)
    }
}

#[async_trait]
impl ObdCommand for AtCommand {
    async fn run(
        &mut self,
        input: &mut InputStream,
        output: &mut OutputStream,
    ) -> Result<(), CommandError> {
        let reply = exchange(input, output, &self.request, &self.options).await?;
        self.raw = clean_response(&reply);

        match check_for_errors(&self.raw) {
            Ok(()) => debug!("{} -> {}", self.request, self.raw),
            Err(e) => warn!("{} rejected by adapter: {}", self.request, e),
        }

        let raw = self.raw.clone();
        self.convert_raw_data(&raw);
        Ok(())
    }

    fn convert_raw_data(&mut self, raw_field: &str) {
        self.formatted = raw_field.to_string();
    }

    fn result(&self) -> String {
        self.raw.clone()
    }

    fn formatted_result(&self) -> String {
        self.formatted.clone()
    }

    fn set_convert_raw_data(&mut self, _convert: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_reset_adds_delay() {
        let reset = AtCommand::reset(ExchangeOptions::default());
        assert_eq!(reset.request, "ATZ");
        assert_eq!(reset.options.response_delay, Some(Duration::from_millis(500)));

        let options = ExchangeOptions {
            response_delay: Some(Duration::from_secs(2)),
            ..Default::default()
        };
        let reset = AtCommand::reset(options);
        assert_eq!(reset.options.response_delay, Some(Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn test_run_keeps_reply() {
        let (mut adapter, host) = duplex(64);
        let (mut host_rx, mut host_tx) = tokio::io::split(host);

        let fake = tokio::spawn(async move {
            let mut request = [0u8; 5];
            adapter.read_exact(&mut request).await.unwrap();
            adapter.write_all(b"ATE0\rOK\r\r>").await.unwrap();
            request
        });

        let mut command = AtCommand::echo_off(ExchangeOptions::default());
        command.run(&mut host_rx, &mut host_tx).await.unwrap();

        assert_eq!(&fake.await.unwrap(), b"ATE0\r");
        assert_eq!(command.result(), "ATE0OK");
        assert_eq!(command.formatted_result(), "ATE0OK");
    }
}
