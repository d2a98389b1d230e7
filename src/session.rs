use futures_util::future::{AbortHandle, AbortRegistration};
use image::RgbaImage;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::error::{OverlayError, OverlayResult};
use crate::ocr::Block;

/// Screen rectangle selected by the user, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl CaptureRegion {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn invalid(&self) -> OverlayError {
        OverlayError::InvalidRegion {
            width: self.width as i64,
            height: self.height as i64,
        }
    }

    pub fn validate(&self) -> OverlayResult<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(self.invalid());
        }
        Ok(())
    }

    /// Copies the region out of `screen`, clipped to the screen bounds.
    pub fn crop(&self, screen: &RgbaImage) -> OverlayResult<RgbaImage> {
        self.validate()?;
        let left = (self.x as i64).max(0);
        let top = (self.y as i64).max(0);
        let right = (self.x as i64 + self.width as i64).min(screen.width() as i64);
        let bottom = (self.y as i64 + self.height as i64).min(screen.height() as i64);
        if right <= left || bottom <= top {
            return Err(self.invalid());
        }
        Ok(image::imageops::crop_imm(
            screen,
            left as u32,
            top as u32,
            (right - left) as u32,
            (bottom - top) as u32,
        )
        .to_image())
    }
}

impl FromStr for CaptureRegion {
    type Err = String;

    /// `x,y,width,height`
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = value
            .split(',')
            .map(|part| part.trim().parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| format!("invalid region '{}': {}", value, err))?;
        match parts.as_slice() {
            [x, y, width, height] => Ok(Self::new(*x, *y, *width, *height)),
            _ => Err(format!("region must be x,y,width,height: '{}'", value)),
        }
    }
}

#[derive(Debug, Default)]
struct Cancellation {
    closed: AtomicBool,
    pending: Mutex<Pending>,
}

#[derive(Debug, Default)]
struct Pending {
    next_id: u64,
    handles: Vec<(u64, AbortHandle)>,
}

impl Cancellation {
    fn lock_pending(&self) -> MutexGuard<'_, Pending> {
        match self.pending.lock() {
            Ok(pending) => pending,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Keeps one unit of work abortable; dropping it forgets the abort handle.
#[derive(Debug)]
pub(crate) struct PendingWork {
    id: u64,
    cancellation: Arc<Cancellation>,
}

impl Drop for PendingWork {
    fn drop(&mut self) {
        self.cancellation
            .lock_pending()
            .handles
            .retain(|(id, _)| *id != self.id);
    }
}

/// Aborts the pending work of one session from anywhere.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    inner: Arc<Cancellation>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // `closed` flips under the lock so no registration can slip in after the drain.
        let pending = {
            let mut pending = self.inner.lock_pending();
            self.inner.closed.store(true, Ordering::SeqCst);
            std::mem::take(&mut pending.handles)
        };
        debug!("aborting {} pending task(s)", pending.len());
        for (_, handle) in pending {
            handle.abort();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

/// State of one selected capture region: the frozen image and the OCR blocks
/// detected in it. Blocks are reused by every later translation pass.
#[derive(Debug)]
pub struct CaptureSession {
    region_image: RgbaImage,
    blocks: Option<Vec<Block>>,
    block_counter: u32,
    cancellation: Arc<Cancellation>,
}

impl CaptureSession {
    pub fn from_screen(screen: &RgbaImage, region: CaptureRegion) -> OverlayResult<Self> {
        let region_image = region.crop(screen)?;
        Ok(Self::with_image(region_image))
    }

    /// Uses a whole image as the capture.
    pub fn from_image(image: RgbaImage) -> OverlayResult<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(OverlayError::InvalidRegion {
                width: image.width() as i64,
                height: image.height() as i64,
            });
        }
        Ok(Self::with_image(image))
    }

    fn with_image(region_image: RgbaImage) -> Self {
        Self {
            region_image,
            blocks: None,
            block_counter: 0,
            cancellation: Arc::default(),
        }
    }

    pub fn region_image(&self) -> &RgbaImage {
        &self.region_image
    }

    /// Cached OCR blocks, `None` until detection has run.
    pub fn blocks(&self) -> Option<&[Block]> {
        self.blocks.as_deref()
    }

    pub(crate) fn store_blocks(&mut self, blocks: Vec<Block>) {
        self.blocks = Some(blocks);
    }

    pub(crate) fn image_and_counter(&mut self) -> (&RgbaImage, &mut u32) {
        (&self.region_image, &mut self.block_counter)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            inner: Arc::clone(&self.cancellation),
        }
    }

    /// Aborts pending OCR/translation work. Cached blocks are left untouched.
    pub fn close(&self) {
        self.cancel_handle().cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancellation.closed.load(Ordering::SeqCst)
    }

    /// Registers a new abortable unit of work. The work stays abortable while
    /// the returned [`PendingWork`] is alive.
    pub(crate) fn register(&self) -> OverlayResult<(AbortRegistration, PendingWork)> {
        let mut pending = self.cancellation.lock_pending();
        if self.cancellation.closed.load(Ordering::SeqCst) {
            return Err(OverlayError::Cancelled);
        }
        let (handle, registration) = AbortHandle::new_pair();
        let id = pending.next_id;
        pending.next_id += 1;
        pending.handles.push((id, handle));
        Ok((
            registration,
            PendingWork {
                id,
                cancellation: Arc::clone(&self.cancellation),
            },
        ))
    }
}
