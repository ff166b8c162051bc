//! Alert sink that writes notifications to the log.

use crate::ports::execution_port::AlertSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn send(&self, text: &str) -> Result<(), String> {
        tracing::info!(target: "zonetrader::alert", "{}", text);
        Ok(())
    }
}
