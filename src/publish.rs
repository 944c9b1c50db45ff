use crate::error::Result;
use crate::tools;
use log::info;
use std::time::Duration;

/// Name under which the resigned archive path is exposed to the pipeline.
pub const RESIGNED_IPA_PATH_KEY: &str = "BITRISE_RESIGNED_IPA_PATH";

/// Where a finished run reports named values for the invoking pipeline.
pub trait ResultSink {
    fn publish(&self, key: &str, value: &str) -> Result<()>;
}

/// Publishes through `envman add`, the step environment manager.
pub struct Envman {
    timeout: Duration,
}

impl Envman {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ResultSink for Envman {
    fn publish(&self, key: &str, value: &str) -> Result<()> {
        tools::run_checked("envman", ["add", "--key", key, "--value", value], self.timeout)?;
        info!("The resigned IPA path is now available in the Environment Variable: ${}", key);
        Ok(())
    }
}

/// Only logs the value; used when no pipeline is listening.
pub struct LogSink;

impl ResultSink for LogSink {
    fn publish(&self, key: &str, value: &str) -> Result<()> {
        info!("{}={}", key, value);
        Ok(())
    }
}
