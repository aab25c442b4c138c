use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::provider::DetectionProvider;
use crate::detect::result::FramePayload;

/// In-memory provider that hands out a fixed list of frames.
///
/// Stands in for the vision service in demos and tests.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    frames: VecDeque<FramePayload>,
}

impl ScriptedProvider {
    pub fn new(frames: impl IntoIterator<Item = FramePayload>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn push(&mut self, frame: FramePayload) {
        self.frames.push_back(frame);
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl DetectionProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn next_frame(&mut self) -> Result<Option<FramePayload>> {
        Ok(self.frames.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hands_out_frames_in_order() {
        let frame = |n: u64| FramePayload {
            frame_ref: format!("f{n}"),
            frame_number: n,
            detections: vec![],
        };
        let mut provider = ScriptedProvider::new([frame(1), frame(2)]);
        provider.push(frame(3));
        assert_eq!(provider.remaining(), 3);

        let numbers: Vec<u64> = std::iter::from_fn(|| provider.next_frame().unwrap())
            .map(|f| f.frame_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(provider.next_frame().unwrap().is_none());
    }
}
