// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Frame detection for the scale byte stream.
//!
//! The scale sends each value as `0xFF <value> 0xFE` with no length or
//! checksum. Frames are found by sliding a three byte window over the stream.

use crate::readings::Reading;

/// Byte that opens a frame.
pub const FRAME_START: u8 = 0xFF;

/// Byte that closes a frame.
pub const FRAME_END: u8 = 0xFE;

/// Sliding-window frame decoder.
pub struct FrameDecoder {
    /// Last three bytes, oldest first.
    window: [u8; 3],
}

impl FrameDecoder {
    /// Create a decoder with an empty window.
    pub fn new() -> Self {
        // Zero is neither sentinel, so the first two bytes can never close a frame.
        Self { window: [0; 3] }
    }

    /// Push one byte through the window.
    ///
    /// Returns `Some(reading)` when the window now holds a complete frame.
    pub fn feed(&mut self, byte: u8) -> Option<Reading> {
        self.window = [self.window[1], self.window[2], byte];
        let [oldest, middle, newest] = self.window;

        if oldest == FRAME_START
            && newest == FRAME_END
            && middle != FRAME_START
            && middle != FRAME_END
        {
            Some(Reading::new(middle))
        } else {
            None
        }
    }

    /// Feed a slice and collect every reading it completes.
    pub fn feed_all(&mut self, bytes: &[u8]) -> Vec<Reading> {
        bytes.iter().filter_map(|&b| self.feed(b)).collect()
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_frame_in_noise() {
        let mut decoder = FrameDecoder::new();
        let bytes = [0x10, 0xFF, 0x2A, 0xFE, 0x99];

        let outputs: Vec<Option<Reading>> = bytes.iter().map(|&b| decoder.feed(b)).collect();
        assert_eq!(
            outputs,
            vec![None, None, None, Some(Reading::new(42)), None]
        );
    }

    #[test]
    fn test_first_two_bytes_never_emit() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(0x2A), None);
        assert_eq!(decoder.feed(0xFE), None);
    }

    #[test]
    fn test_sentinel_middle_is_rejected() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed_all(&[0xFF, 0xFE, 0xFF, 0xFE]).is_empty());

        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed_all(&[0xFF, 0xFF, 0xFE]).is_empty());
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut decoder = FrameDecoder::new();
        let readings = decoder.feed_all(&[0xFF, 0x01, 0xFE, 0xFF, 0x00, 0xFE, 0xFF, 0xFD, 0xFE]);
        assert_eq!(
            readings,
            vec![Reading::new(1), Reading::new(0), Reading::new(253)]
        );
    }

    #[test]
    fn test_frame_split_across_calls() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed_all(&[0x00, 0xFF]).is_empty());
        assert!(decoder.feed_all(&[0x50]).is_empty());
        assert_eq!(decoder.feed_all(&[0xFE]), vec![Reading::new(0x50)]);
    }

    /// Straightforward statement of the frame rule over a whole buffer.
    fn frames_in(bytes: &[u8]) -> Vec<Reading> {
        bytes
            .windows(3)
            .filter(|w| w[0] == 0xFF && w[2] == 0xFE && w[1] != 0xFF && w[1] != 0xFE)
            .map(|w| Reading::new(w[1]))
            .collect()
    }

    proptest! {
        #[test]
        fn prop_matches_window_rule(bytes in proptest::collection::vec(
            prop_oneof![Just(0xFFu8), Just(0xFEu8), any::<u8>()],
            0..256,
        )) {
            let mut decoder = FrameDecoder::new();
            prop_assert_eq!(decoder.feed_all(&bytes), frames_in(&bytes));
        }
    }
}
