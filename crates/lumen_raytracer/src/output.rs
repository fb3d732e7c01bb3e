//! Render output boundary: pixel sinks, events and the image buffer.
//!
//! Workers call a [`PixelSink`] directly from their own threads. Anything
//! touching a UI surface should go through the channel implementation and
//! drain [`RenderEvent`]s on its own thread.

use std::path::Path;
use std::sync::mpsc::Sender;

use lumen_math::{UVec2, Vec4};

/// How a render job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Completed,
    Cancelled,
}

/// Messages sent by [`Sender<RenderEvent>`] sinks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderEvent {
    /// A pixel was written; render pixels and overlay pixels alike.
    Pixel { position: UVec2, color: Vec4 },
    /// Sent exactly once per job, after the last pixel of that job.
    Finished(RenderOutcome),
}

/// Receiver of render output, shared by all workers of a job.
pub trait PixelSink: Send + Sync {
    /// Write one linear RGBA color.
    fn set_pixel(&self, position: UVec2, color: Vec4);

    /// Called once when the job completes or is cancelled.
    fn render_finished(&self, outcome: RenderOutcome);
}

impl PixelSink for Sender<RenderEvent> {
    fn set_pixel(&self, position: UVec2, color: Vec4) {
        // A dropped receiver just means nobody is watching anymore
        let _ = self.send(RenderEvent::Pixel { position, color });
    }

    fn render_finished(&self, outcome: RenderOutcome) {
        let _ = self.send(RenderEvent::Finished(outcome));
    }
}

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Convert a linear color to 8-bit RGBA. Alpha is not gamma corrected.
pub fn color_to_rgba(color: Vec4) -> [u8; 4] {
    let r = (255.0 * linear_to_gamma(color.x).clamp(0.0, 1.0)) as u8;
    let g = (255.0 * linear_to_gamma(color.y).clamp(0.0, 1.0)) as u8;
    let b = (255.0 * linear_to_gamma(color.z).clamp(0.0, 1.0)) as u8;
    let a = (255.0 * color.w.clamp(0.0, 1.0)) as u8;
    [r, g, b, a]
}

/// Linear RGBA image assembled from render events.
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Vec4>,
}

impl ImageBuffer {
    /// Create a new image buffer filled with opaque black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Vec4::W; (width as usize) * (height as usize)],
        }
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Get the pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[self.index(x, y)]
    }

    /// Set the pixel at (x, y). Out of range writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, color: Vec4) {
        if x < self.width && y < self.height {
            let index = self.index(x, y);
            self.pixels[index] = color;
        }
    }

    /// Apply one event. Returns the outcome once the job has finished.
    pub fn apply(&mut self, event: RenderEvent) -> Option<RenderOutcome> {
        match event {
            RenderEvent::Pixel { position, color } => {
                self.set(position.x, position.y, color);
                None
            }
            RenderEvent::Finished(outcome) => Some(outcome),
        }
    }

    /// Convert to RGBA bytes (for display or saving).
    pub fn to_rgba(&self) -> Vec<u8> {
        let texels: Vec<[u8; 4]> = self.pixels.iter().map(|c| color_to_rgba(*c)).collect();
        bytemuck::cast_slice(&texels).to_vec()
    }

    /// Write the image as an 8-bit PNG.
    pub fn save_png(&self, path: impl AsRef<Path>) -> image::ImageResult<()> {
        image::save_buffer(
            path,
            &self.to_rgba(),
            self.width,
            self.height,
            image::ColorType::Rgba8,
        )
    }
}
