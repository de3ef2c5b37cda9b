//! Fixed ring of frames shared by one producer and one consumer.
//!
//! Two monotonically increasing counters track the ring:
//!
//! ```text
//! read_index           write_index
//!     │                    │
//!     ▼                    ▼
//! ┌────────┬────────┬────────────┐
//! │ frame  │ frame  │ (building) │   slot = index % K
//! └────────┴────────┴────────────┘
//!   published, waiting   pending
//!   for the consumer
//! ```
//!
//! `write_index` counts published frames and `read_index` counts consumed
//! ones. The frame being built sits in slot `write_index % K` until it is
//! published. Since a published frame and the building one never share a
//! slot, `write_index - read_index < K` holds at every observation point and
//! no slot is ever written while it is read.
//!
//! [`FramePool::begin_frame`] never blocks: when no slot is free it returns
//! `None` and the caller skips the frame.

use super::Frame;
use crate::error::Result;
use crate::RendererConfig;

/// Ring of `K` frames with look-ahead bounded by `K`.
///
/// # Thread Safety
///
/// `FramePool` is meant to be owned by the thread that builds and submits
/// frames. Producer and consumer calls take `&mut self`.
#[derive(Debug)]
pub struct FramePool {
    frames: Vec<Frame>,
    write_index: u64,
    read_index: u64,
    /// A frame is building in slot `write_index % K`
    pending: bool,
}

impl FramePool {
    /// Allocate `config.frames_in_flight` frames.
    ///
    /// `alignment` is the driver's minimum uniform block alignment.
    pub fn new(config: &RendererConfig, alignment: u64) -> Result<Self> {
        config.validate()?;

        let frames = (0..config.frames_in_flight)
            .map(|slot| Frame::new(slot, config, alignment))
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "FramePool: {} frames, {} instances / {} materials / {} lights / {} views each",
            frames.len(),
            config.max_instances,
            config.max_materials,
            config.max_lights,
            config.max_views
        );

        Ok(Self {
            frames,
            write_index: 0,
            read_index: 0,
            pending: false,
        })
    }

    /// Number of slots (`K`)
    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }

    /// Published frames so far
    pub fn write_index(&self) -> u64 {
        self.write_index
    }

    /// Consumed frames so far
    pub fn read_index(&self) -> u64 {
        self.read_index
    }

    /// Published frames the consumer has not released yet
    pub fn in_flight(&self) -> u64 {
        self.write_index - self.read_index
    }

    /// A frame is currently being built
    pub fn has_pending(&self) -> bool {
        self.pending
    }

    fn slot_of(&self, index: u64) -> usize {
        (index % self.frames.len() as u64) as usize
    }

    /// Every slot except the building one holds a published frame
    fn is_saturated(&self) -> bool {
        self.in_flight() >= self.frames.len() as u64 - 1
    }

    fn publish(&mut self) {
        let slot = self.slot_of(self.write_index);
        self.frames[slot].finalize();
        self.write_index += 1;
        self.pending = false;
    }

    // ---- Producer ----

    /// Start building a new frame.
    ///
    /// A frame still building from the previous call is published first.
    /// Returns `None`, leaving that frame pending, when publishing it would
    /// leave no free slot; the caller should skip this frame.
    pub fn begin_frame(&mut self) -> Option<&mut Frame> {
        if self.pending {
            if self.is_saturated() {
                log::trace!(
                    "FramePool: no free slot (write {}, read {}), skipping frame",
                    self.write_index,
                    self.read_index
                );
                return None;
            }
            self.publish();
        }

        let slot = self.slot_of(self.write_index);
        self.pending = true;
        let frame = &mut self.frames[slot];
        frame.begin();
        Some(frame)
    }

    /// The frame currently being built, if any.
    pub fn current_frame(&mut self) -> Option<&mut Frame> {
        if !self.pending {
            return None;
        }
        let slot = self.slot_of(self.write_index);
        Some(&mut self.frames[slot])
    }

    /// Publish the frame being built so the consumer can take it.
    ///
    /// Returns `false` when there is no building frame or when every other
    /// slot still holds an unconsumed frame; in the latter case the frame
    /// stays pending and the next `begin_frame` retries.
    pub fn end_frame(&mut self) -> bool {
        if !self.pending || self.is_saturated() {
            return false;
        }
        self.publish();
        true
    }

    // ---- Consumer ----

    /// Oldest published frame not yet released.
    pub fn acquire_frame(&mut self) -> Option<&mut Frame> {
        if self.read_index >= self.write_index {
            return None;
        }
        let slot = self.slot_of(self.read_index);
        Some(&mut self.frames[slot])
    }

    /// Release the oldest published frame, retiring it if the consumer
    /// has not done so. Returns `false` when nothing was published.
    pub fn release_frame(&mut self) -> bool {
        if self.read_index >= self.write_index {
            return false;
        }
        let slot = self.slot_of(self.read_index);
        let frame = &mut self.frames[slot];
        if frame.state() != super::FrameState::Retired {
            frame.retire();
        }
        self.read_index += 1;
        true
    }

    /// Release every published frame without rendering it and abandon the
    /// frame being built. Returns the number of frames discarded.
    pub fn drain(&mut self) -> usize {
        let mut discarded = 0;
        while self.release_frame() {
            discarded += 1;
        }
        if self.pending {
            // Publish then release so the slot returns to `Retired`
            self.publish();
            self.release_frame();
            discarded += 1;
        }
        if discarded > 0 {
            log::debug!("FramePool: drained {discarded} frames");
        }
        discarded
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}
