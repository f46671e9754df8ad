//! A [`StrategyHooks`] implementation that subscribes to a set of channels and records every
//! `subscription` notification to a file, one JSON object per line.

use std::fs::File;
use std::io::Write as _;
use std::path::Path;

use serde_json::Value;

use crate::error::Error;
use crate::session::{Session, StrategyHooks};

/// Subscribes to a fixed list of channels and appends each notification's `params.data` to an
/// output file as newline-delimited JSON.
#[derive(Debug)]
pub struct SubscriptionWriter {
    channels: Vec<String>,
    output: File,
}

impl SubscriptionWriter {
    /// Opens (creating or truncating) `output_path` for writing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be created.
    pub fn new(channels: Vec<String>, output_path: impl AsRef<Path>) -> Result<Self, Error> {
        let output = File::create(output_path)?;
        Ok(Self { channels, output })
    }

    /// Subscribes to the configured channels. Must be called once, before [`Session::run`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the subscribe request could not be sent.
    pub async fn bootstrap(&mut self, session: &mut Session) -> Result<(), Error> {
        session.subscribe(self.channels.clone()).await?;
        Ok(())
    }
}

impl StrategyHooks for SubscriptionWriter {
    async fn on_notification(
        &mut self,
        _session: &mut Session,
        method: &str,
        params: &Value,
    ) -> Result<(), Error> {
        if method != "subscription" {
            return Ok(());
        }

        let data = params.get("data").unwrap_or(&Value::Null);
        let line = serde_json::to_string(data)?;
        writeln!(self.output, "{line}")?;
        self.output.flush()?;

        Ok(())
    }

    async fn on_response(
        &mut self,
        _session: &mut Session,
        _method: &str,
        _request_params: &Value,
        _result: &Value,
    ) -> Result<(), Error> {
        Ok(())
    }

    async fn on_error(
        &mut self,
        _session: &mut Session,
        _method: &str,
        _request_params: &Value,
        code: i64,
        message: &str,
    ) -> Result<(), Error> {
        Err(Error::UnexpectedError {
            code,
            message: message.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_creates_output_file() {
        let dir = std::env::temp_dir().join(format!("writer-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.jsonl");

        let writer = SubscriptionWriter::new(vec!["book.BTC-PERPETUAL.raw".to_owned()], &path);
        assert!(writer.is_ok());
        assert!(path.exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
