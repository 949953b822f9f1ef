//! Scanout buffer management
//!
//! Drives one frame from the rendering context to the screen:
//!
//! ```text
//! Idle -> Presenting -> FlipPending -> Idle
//! ```
//!
//! swap, lock the front buffer, attach a KMS framebuffer to it on first
//! sight, program the CRTC once, page flip, wait for the flip event,
//! release the buffer.

use anyhow::Result;
use log::{debug, info, warn};

use crate::error::Error;

/// Kernel framebuffer id as returned by ADDFB
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u32);

/// Per-process operations the flip protocol needs
pub trait ScanoutTarget {
    /// Buffer object handed out by the allocator
    type Buffer;

    /// Finish the frame and queue it as the next front buffer
    fn swap_buffers(&mut self) -> Result<()>;

    /// Take the newly completed buffer; `None` if nothing is ready
    fn lock_front_buffer(&mut self) -> Result<Option<Self::Buffer>>;

    /// Framebuffer previously attached to `buffer`
    fn cached_framebuffer(&self, buffer: &Self::Buffer) -> Option<FramebufferId>;

    /// Register `buffer` with KMS and attach the framebuffer to it.
    ///
    /// The framebuffer must be removed when the allocator frees the buffer.
    fn register_framebuffer(&mut self, buffer: &mut Self::Buffer) -> Result<FramebufferId>;

    /// Program the CRTC with the output's connector and mode
    fn set_crtc(&mut self, fb: FramebufferId) -> Result<()>;

    /// Queue a page flip that signals completion through an event
    fn page_flip(&mut self, fb: FramebufferId) -> Result<()>;

    /// Block until the pending page flip completes
    fn wait_for_flip(&mut self) -> Result<()>;

    /// Return `buffer` to the allocator
    fn release_buffer(&mut self, buffer: Self::Buffer);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipState {
    Idle,
    Presenting,
    FlipPending,
}

/// Result of one present call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// The framebuffer is on screen
    Presented(FramebufferId),
    /// The allocator had no completed buffer
    NoBuffer,
    /// A step failed; the frame was discarded
    Dropped,
}

/// Page-flip state machine of one process
#[derive(Debug)]
pub struct ScanoutManager {
    state: FlipState,
    crtc_programmed: bool,
    failed: bool,
    presented: u64,
    dropped: u64,
}

impl Default for ScanoutManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanoutManager {
    pub fn new() -> Self {
        Self {
            state: FlipState::Idle,
            crtc_programmed: false,
            failed: false,
            presented: 0,
            dropped: 0,
        }
    }

    pub fn state(&self) -> FlipState {
        self.state
    }

    /// Whether the CRTC shows our buffers
    pub fn is_live(&self) -> bool {
        self.crtc_programmed
    }

    pub fn presented_frames(&self) -> u64 {
        self.presented
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    /// Present the frame rendered since the last call.
    ///
    /// Per-frame failures are logged and reported as
    /// [`PresentOutcome::Dropped`]. Only a failure to program the CRTC on the
    /// first frame is returned, as [`Error::FatalDisplay`]; the manager then
    /// refuses all further frames.
    pub fn present<T: ScanoutTarget>(
        &mut self,
        target: &mut T,
    ) -> std::result::Result<PresentOutcome, Error> {
        if self.failed {
            return Err(Error::FatalDisplay(
                "display output was never brought up".to_string(),
            ));
        }

        self.state = FlipState::Presenting;
        let outcome = self.present_frame(target);
        self.state = FlipState::Idle;

        match outcome {
            Ok(PresentOutcome::Presented(fb)) => {
                self.presented += 1;
                Ok(PresentOutcome::Presented(fb))
            }
            Ok(outcome) => Ok(outcome),
            Err(FrameError::Dropped(e)) => {
                self.dropped += 1;
                warn!("Frame dropped: {:#}", e);
                Ok(PresentOutcome::Dropped)
            }
            Err(FrameError::Fatal(e)) => {
                self.failed = true;
                Err(Error::FatalDisplay(format!("{:#}", e)))
            }
        }
    }

    fn present_frame<T: ScanoutTarget>(
        &mut self,
        target: &mut T,
    ) -> std::result::Result<PresentOutcome, FrameError> {
        target.swap_buffers().map_err(FrameError::Dropped)?;

        let mut buffer = match target.lock_front_buffer().map_err(FrameError::Dropped)? {
            Some(buffer) => buffer,
            None => {
                debug!("No front buffer available");
                return Ok(PresentOutcome::NoBuffer);
            }
        };

        let result = self.flip(target, &mut buffer);
        target.release_buffer(buffer);
        result
    }

    fn flip<T: ScanoutTarget>(
        &mut self,
        target: &mut T,
        buffer: &mut T::Buffer,
    ) -> std::result::Result<PresentOutcome, FrameError> {
        let fb = match target.cached_framebuffer(buffer) {
            Some(fb) => fb,
            None => {
                let fb = target
                    .register_framebuffer(buffer)
                    .map_err(FrameError::Dropped)?;
                debug!("Attached framebuffer {} to buffer", fb.0);
                fb
            }
        };

        if !self.crtc_programmed {
            target.set_crtc(fb).map_err(FrameError::Fatal)?;
            self.crtc_programmed = true;
            info!("Display output live (framebuffer {})", fb.0);
        }

        target.page_flip(fb).map_err(FrameError::Dropped)?;
        self.state = FlipState::FlipPending;
        target.wait_for_flip().map_err(FrameError::Dropped)?;

        Ok(PresentOutcome::Presented(fb))
    }
}

enum FrameError {
    Dropped(anyhow::Error),
    Fatal(anyhow::Error),
}
