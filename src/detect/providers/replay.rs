use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, Result};

use crate::detect::payload::parse_frame_json;
use crate::detect::provider::DetectionProvider;
use crate::detect::result::FramePayload;
use crate::error::PipelineError;

/// Replays provider output recorded as JSON lines, one frame per line.
///
/// Blank lines and lines starting with `#` are skipped.
pub struct ReplayProvider {
    source: String,
    reader: Box<dyn BufRead + Send>,
    line_no: usize,
}

impl ReplayProvider {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| anyhow!("failed to open detections file {}: {}", path.display(), e))?;
        Ok(Self::from_reader(BufReader::new(file)).with_source(&path.display().to_string()))
    }

    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            source: "<reader>".to_string(),
            reader: Box::new(reader),
            line_no: 0,
        }
    }

    fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    /// 1-based line number of the last line read.
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

impl DetectionProvider for ReplayProvider {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn next_frame(&mut self) -> Result<Option<FramePayload>> {
        let mut raw = Vec::new();
        loop {
            raw.clear();
            if self.reader.read_until(b'\n', &mut raw)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = String::from_utf8(std::mem::take(&mut raw)).map_err(|e| {
                PipelineError::malformed(format!("line is not valid UTF-8: {e}"))
            })?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Ok(Some(parse_frame_json(trimmed)?));
        }
    }

    /// Fails early when the source cannot be read at all.
    fn warm_up(&mut self) -> Result<()> {
        let buffered = self
            .reader
            .fill_buf()
            .map_err(|e| anyhow!("detections source {} is not readable: {}", self.source, e))?;
        if buffered.is_empty() {
            log::warn!("detections source {} is empty", self.source);
        }
        Ok(())
    }
}
