//! Polling loop driving the adapter batches

use crate::config::PollerConfig;
use crate::elm::{pids, AtCommand, ExchangeOptions, Interrupt, Pid, PidCommand};
use anyhow::{Context, Result};
use crate::transport::TransportStream;
use obd_shared::{shared, CommandBatch, CommandError, InputStream, OutputStream};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// PIDs polled every cycle, in output order
pub const SENSOR_PIDS: [Pid; 6] = [
    pids::ENGINE_RPM,
    pids::VEHICLE_SPEED,
    pids::ENGINE_LOAD,
    pids::THROTTLE_POSITION,
    pids::COOLANT_TEMPERATURE,
    pids::INTAKE_AIR_TEMPERATURE,
];

/// Adapter set-up sequence run once per connection
pub fn build_init_batch(options: &ExchangeOptions) -> CommandBatch {
    let mut batch = CommandBatch::new();
    batch.add(shared(AtCommand::reset(options.clone())));
    batch.add(shared(AtCommand::echo_off(options.clone())));
    batch.add(shared(AtCommand::line_feed_off(options.clone())));
    batch.add(shared(AtCommand::headers_off(options.clone())));
    batch.add(shared(AtCommand::select_protocol_auto(options.clone())));
    batch
}

/// Sensor batch in [`SENSOR_PIDS`] order
pub fn build_sensor_batch(config: &PollerConfig, options: &ExchangeOptions) -> CommandBatch {
    let mut batch = CommandBatch::new();
    for pid in SENSOR_PIDS {
        batch.add(shared(
            PidCommand::new(pid, options.clone()).with_imperial_units(config.imperial_units),
        ));
    }
    batch
}

/// Runs the init batch once, then polls the sensor batch on an interval
pub struct Poller {
    config: PollerConfig,
    interrupt: Interrupt,
    init: CommandBatch,
    sensors: CommandBatch,
}

impl Poller {
    /// Create a poller whose commands stop when `interrupt` triggers
    pub fn new(config: PollerConfig, interrupt: Interrupt) -> Self {
        let options = ExchangeOptions {
            read_timeout: config.read_timeout,
            response_delay: config.response_delay,
            interrupt: interrupt.clone(),
        };
        let init = build_init_batch(&options);
        let sensors = build_sensor_batch(&config, &options);

        Self {
            config,
            interrupt,
            init,
            sensors,
        }
    }

    /// The batch polled every cycle
    pub fn sensors(&self) -> &CommandBatch {
        &self.sensors
    }

    /// Poll over `stream` until cancelled, the cycle limit is reached or the
    /// link fails. Returns the number of completed cycles. The stream is shut
    /// down before returning.
    pub async fn run<S: TransportStream>(&self, stream: S) -> Result<u64> {
        let (mut input, mut output) = tokio::io::split(stream);
        let result = self.poll(&mut input, &mut output).await;

        let mut stream = input.unsplit(output);
        if let Err(e) = stream.shutdown().await {
            warn!("Failed to close adapter link: {}", e);
        }

        result
    }

    async fn poll(&self, input: &mut InputStream, output: &mut OutputStream) -> Result<u64> {
        match self.init.send_commands(input, output).await {
            Ok(()) => info!("Adapter ready: {}", self.init.formatted_result().await),
            Err(CommandError::Cancelled) => {
                info!("Cancelled during adapter set-up");
                return Ok(0);
            }
            Err(e) => return Err(e).context("adapter set-up failed"),
        }

        self.sensors
            .set_convert_raw_data(self.config.convert_raw_data)
            .await;

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0u64;

        loop {
            if self.config.max_cycles.is_some_and(|max| cycles >= max) {
                info!("Reached {} poll cycles", cycles);
                return Ok(cycles);
            }

            tokio::select! {
                _ = self.interrupt.triggered() => {
                    info!("Polling cancelled after {} cycles", cycles);
                    return Ok(cycles);
                }
                _ = ticker.tick() => {}
            }

            match self.sensors.send_commands(input, output).await {
                Ok(()) => {
                    cycles += 1;
                    debug!("Raw: {}", self.sensors.raw_result().await);
                    info!("Cycle {}: {}", cycles, self.sensors.formatted_result().await);
                }
                Err(CommandError::Cancelled) => {
                    info!("Polling cancelled after {} cycles", cycles);
                    return Ok(cycles);
                }
                Err(e) => return Err(e).with_context(|| format!("poll cycle {} failed", cycles + 1)),
            }
        }
    }

    /// Decode recorded raw result lines, one batch result per line.
    /// Returns the formatted lines.
    pub async fn replay<R>(&self, reader: R) -> Result<Vec<String>>
    where
        R: AsyncBufRead + Unpin,
    {
        self.sensors
            .set_convert_raw_data(self.config.convert_raw_data)
            .await;

        let mut lines = reader.lines();
        let mut formatted = Vec::new();
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }

            let decoded = self
                .sensors
                .convert_raw_result_to_formatted_result(line.trim())
                .await
                .with_context(|| format!("line {}", line_no))?;
            info!("{}", decoded);
            formatted.push(decoded);
        }

        Ok(formatted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream};

    #[async_trait]
    impl TransportStream for DuplexStream {
        async fn shutdown(&mut self) -> Result<()> {
            AsyncWriteExt::shutdown(self).await?;
            Ok(())
        }
    }

    fn reply_for(request: &str) -> &'static [u8] {
        match request {
            "ATZ" => b"\r\rELM327 v1.5\r\r>",
            "01 0C" => b"41 0C 1A F8 \r\r>",
            "01 0D" => b"41 0D 32 \r\r>",
            "01 04" => b"41 04 80 \r\r>",
            "01 11" => b"41 11 FF \r\r>",
            "01 05" => b"41 05 7B \r\r>",
            "01 0F" => b"NO DATA\r\r>",
            r if r.starts_with("AT") => b"OK\r\r>",
            _ => b"?\r\r>",
        }
    }

    /// Answer requests like an ELM327 until `limit` requests were served
    async fn fake_adapter(mut stream: DuplexStream, limit: usize) -> Vec<String> {
        let mut requests = Vec::new();
        let mut current = Vec::new();
        let mut byte = [0u8; 1];

        while requests.len() < limit {
            if stream.read(&mut byte).await.unwrap() == 0 {
                break;
            }
            if byte[0] != b'\r' {
                current.push(byte[0]);
                continue;
            }

            let request = String::from_utf8(std::mem::take(&mut current)).unwrap();
            stream.write_all(reply_for(&request)).await.unwrap();
            requests.push(request);
        }
        requests
    }

    fn test_config() -> PollerConfig {
        PollerConfig {
            poll_interval: Duration::from_millis(5),
            read_timeout: Duration::from_secs(1),
            max_cycles: Some(2),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_polls_sensor_batch() {
        let (adapter, host) = duplex(256);
        let fake = tokio::spawn(fake_adapter(adapter, usize::MAX));

        let poller = Poller::new(test_config(), Interrupt::new());
        let cycles = poller.run(host).await.expect("polling failed");
        assert_eq!(cycles, 2);

        assert_eq!(
            poller.sensors().raw_result().await,
            "410C1AF8,410D32,410480,4111FF,41057B,NODATA,"
        );
        assert_eq!(
            poller.sensors().formatted_result().await,
            "1726RPM,50km/h,50.2%,100.0%,83.0C,NO DATA,"
        );

        drop(poller);
        let requests = fake.await.unwrap();
        assert_eq!(requests.len(), 5 + 2 * SENSOR_PIDS.len());
        assert_eq!(&requests[..5], &["ATZ", "ATE0", "ATL0", "ATH0", "ATSP0"]);
        assert_eq!(requests[5], "01 0C");
    }

    #[tokio::test]
    async fn test_raw_mode_passes_replies_through() {
        let (adapter, host) = duplex(256);
        tokio::spawn(fake_adapter(adapter, usize::MAX));

        let config = PollerConfig {
            convert_raw_data: false,
            max_cycles: Some(1),
            ..test_config()
        };
        let poller = Poller::new(config, Interrupt::new());
        poller.run(host).await.expect("polling failed");

        assert_eq!(
            poller.sensors().formatted_result().await,
            poller.sensors().raw_result().await
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (adapter, host) = duplex(256);
        tokio::spawn(fake_adapter(adapter, usize::MAX));

        let interrupt = Interrupt::new();
        interrupt.trigger();
        let poller = Poller::new(test_config(), interrupt);
        assert_eq!(poller.run(host).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_link_failure_stops_polling() {
        let (adapter, host) = duplex(256);
        // Serve the init batch and two sensor replies, then hang up
        tokio::spawn(fake_adapter(adapter, 7));

        let poller = Poller::new(test_config(), Interrupt::new());
        let err = poller.run(host).await.unwrap_err();
        assert!(err.to_string().contains("poll cycle 1"));

        // The first two sensors answered, the rest never ran
        assert_eq!(
            poller.sensors().raw_result().await,
            "410C1AF8,410D32,,,,,"
        );
    }

    #[tokio::test]
    async fn test_replay_recorded_lines() {
        let poller = Poller::new(test_config(), Interrupt::new());
        let recorded: &[u8] = b"410C1AF8,410D32,410480,4111FF,41057B,410F46,\n\n410C0FA0,410D00,\n";

        let lines = poller.replay(BufReader::new(recorded)).await.unwrap();
        assert_eq!(
            lines,
            vec![
                "1726RPM,50km/h,50.2%,100.0%,83.0C,30.0C,".to_string(),
                "1000RPM,0km/h,".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_replay_rejects_extra_fields() {
        let poller = Poller::new(test_config(), Interrupt::new());
        let recorded: &[u8] = b"410C1AF8,410D32,410480,4111FF,41057B,410F46,410C1AF8,\n";

        let err = poller.replay(BufReader::new(recorded)).await.unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
