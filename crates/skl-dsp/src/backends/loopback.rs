// SPDX-License-Identifier: GPL-2.0-only

//! Loopback host DMA backend
//!
//! Implements [`DmaBackend`] with host memory buffers. Whenever a playback
//! and a capture stream are both running, the playback buffer is copied
//! into the capture buffer, so a BRA transfer reads back what it sent.

use crate::bra::DmaBackend;
use crate::error::{DspError, Result};
use skl_chip::topology::StreamDirection;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Host DMA engines on the Skylake family.
pub const DEFAULT_MAX_STREAMS: u8 = 9;

#[derive(Debug)]
struct Stream {
    direction: StreamDirection,
    format: u32,
    buffer: Vec<u8>,
    uncached_pages: usize,
    running: bool,
}

/// In-memory DMA streams with playback-to-capture loopback.
#[derive(Debug)]
pub struct LoopbackDma {
    streams: BTreeMap<u8, Stream>,
    max_streams: u8,
}

impl Default for LoopbackDma {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackDma {
    /// Backend with [`DEFAULT_MAX_STREAMS`] stream tags.
    pub fn new() -> Self {
        Self::with_max_streams(DEFAULT_MAX_STREAMS)
    }

    /// Backend with tags `1..=max_streams`.
    pub fn with_max_streams(max_streams: u8) -> Self {
        Self {
            streams: BTreeMap::new(),
            max_streams,
        }
    }

    /// Streams prepared and not yet cleaned up.
    pub fn live_streams(&self) -> usize {
        self.streams.len()
    }

    /// Whether `tag` is running.
    pub fn is_running(&self, tag: u8) -> bool {
        self.streams.get(&tag).is_some_and(|s| s.running)
    }

    /// Pages marked uncached on `tag`.
    pub fn uncached_pages(&self, tag: u8) -> Option<usize> {
        self.streams.get(&tag).map(|s| s.uncached_pages)
    }

    /// Format `tag` was prepared with.
    pub fn format(&self, tag: u8) -> Option<u32> {
        self.streams.get(&tag).map(|s| s.format)
    }

    fn stream(&self, tag: u8) -> Result<&Stream> {
        self.streams
            .get(&tag)
            .ok_or_else(|| DspError::dma(format!("unknown stream tag {tag}")))
    }

    fn stream_mut(&mut self, tag: u8) -> Result<&mut Stream> {
        self.streams
            .get_mut(&tag)
            .ok_or_else(|| DspError::dma(format!("unknown stream tag {tag}")))
    }

    fn loop_back(&mut self) {
        let Some(src) = self
            .streams
            .values()
            .find(|s| s.running && s.direction == StreamDirection::Playback)
            .map(|s| s.buffer.clone())
        else {
            return;
        };
        for (tag, dst) in self
            .streams
            .iter_mut()
            .filter(|(_, s)| s.running && s.direction == StreamDirection::Capture)
        {
            let n = src.len().min(dst.buffer.len());
            dst.buffer[..n].copy_from_slice(&src[..n]);
            trace!("loopback: {n} bytes into stream {tag}");
        }
    }
}

impl DmaBackend for LoopbackDma {
    fn prepare(&mut self, format: u32, size: usize, direction: StreamDirection) -> Result<u8> {
        let tag = (1..=self.max_streams)
            .find(|t| !self.streams.contains_key(t))
            .ok_or_else(|| DspError::dma("no free DMA stream"))?;
        self.streams.insert(
            tag,
            Stream {
                direction,
                format,
                buffer: vec![0; size],
                uncached_pages: 0,
                running: false,
            },
        );
        debug!("DMA stream {tag}: {direction:?} {size}B format {format:#x}");
        Ok(tag)
    }

    fn set_uncached(&mut self, tag: u8, pages: usize) -> Result<()> {
        self.stream_mut(tag)?.uncached_pages = pages;
        Ok(())
    }

    fn buffer(&self, tag: u8) -> Result<&[u8]> {
        Ok(&self.stream(tag)?.buffer)
    }

    fn buffer_mut(&mut self, tag: u8) -> Result<&mut [u8]> {
        Ok(&mut self.stream_mut(tag)?.buffer)
    }

    fn trigger(&mut self, start: bool, tag: u8, direction: StreamDirection) -> Result<()> {
        let stream = self.stream_mut(tag)?;
        if stream.direction != direction {
            return Err(DspError::dma(format!(
                "stream {tag} is {:?}, not {direction:?}",
                stream.direction
            )));
        }
        stream.running = start;
        debug!("DMA stream {tag}: {}", if start { "start" } else { "stop" });
        if start {
            self.loop_back();
        }
        Ok(())
    }

    fn cleanup(&mut self, tag: u8, direction: StreamDirection) -> Result<()> {
        if self.stream(tag)?.direction != direction {
            return Err(DspError::dma(format!("stream {tag} is not {direction:?}")));
        }
        self.streams.remove(&tag);
        debug!("DMA stream {tag}: released");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_reused_after_cleanup() {
        let mut dma = LoopbackDma::with_max_streams(2);
        let a = dma.prepare(0x40, 16, StreamDirection::Playback).unwrap();
        let b = dma.prepare(0x40, 16, StreamDirection::Capture).unwrap();
        assert_eq!((a, b), (1, 2));
        assert!(dma.prepare(0x40, 16, StreamDirection::Capture).is_err());

        dma.cleanup(a, StreamDirection::Playback).unwrap();
        assert_eq!(dma.prepare(0x40, 8, StreamDirection::Playback).unwrap(), 1);
    }

    #[test]
    fn test_capture_receives_playback_data() {
        let mut dma = LoopbackDma::new();
        let pb = dma.prepare(0x40, 4, StreamDirection::Playback).unwrap();
        let cp = dma.prepare(0x40, 6, StreamDirection::Capture).unwrap();
        dma.buffer_mut(pb).unwrap().copy_from_slice(&[1, 2, 3, 4]);

        dma.trigger(true, cp, StreamDirection::Capture).unwrap();
        assert_eq!(dma.buffer(cp).unwrap(), &[0; 6]);
        dma.trigger(true, pb, StreamDirection::Playback).unwrap();
        assert_eq!(dma.buffer(cp).unwrap(), &[1, 2, 3, 4, 0, 0]);
        assert!(dma.is_running(pb));
    }

    #[test]
    fn test_direction_mismatch_is_rejected() {
        let mut dma = LoopbackDma::new();
        let pb = dma.prepare(0x40, 4, StreamDirection::Playback).unwrap();
        assert!(dma.trigger(true, pb, StreamDirection::Capture).is_err());
        assert!(dma.cleanup(pb, StreamDirection::Capture).is_err());
        assert!(dma.cleanup(9, StreamDirection::Playback).is_err());
        assert_eq!(dma.live_streams(), 1);
    }
}
