// src/render/framebuffer.rs
//! Indexed-color framebuffer shared by all widgets of the current screen.
//!
//! The buffer is owned exclusively by the render cycle; widgets only ever see
//! it through a `RegionCanvas`. Presentation goes through `FrameSink`, the
//! seam to the physical matrix driver (HUB75 on hardware, a logger in the
//! simulator).

use alloc::vec;
use alloc::vec::Vec;

use embedded_graphics::pixelcolor::raw::RawU8;
use embedded_graphics::prelude::*;

use crate::common::error::RenderError;
use crate::render::canvas::Region;

/// One entry of the fixed 256-color palette. Index 0 is reserved for the
/// background and is what `clear` fills with.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct PaletteColor(pub u8);

impl PaletteColor {
    pub const BACKGROUND: Self = Self(0);
    pub const BLUE: Self = Self(1);
    pub const GREEN: Self = Self(2);
    pub const CYAN: Self = Self(3);
    pub const RED: Self = Self(4);
    pub const MAGENTA: Self = Self(5);
    pub const YELLOW: Self = Self(6);
    pub const WHITE: Self = Self(7);
}

impl PixelColor for PaletteColor {
    type Raw = RawU8;
}

impl From<RawU8> for PaletteColor {
    fn from(raw: RawU8) -> Self {
        Self(raw.into_inner())
    }
}

impl From<PaletteColor> for RawU8 {
    fn from(color: PaletteColor) -> Self {
        RawU8::new(color.0)
    }
}

/// Physical output behind the framebuffer. `push_frame` is called exactly
/// once per render tick, after every widget of the frame has drawn.
pub trait FrameSink {
    fn push_frame(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<(), RenderError>;
}

pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn data(&self) -> &[u8] {
        &self.pixels
    }

    /// Out-of-range writes are dropped, not errors; clipping is the caller's
    /// normal operating mode at region edges.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: PaletteColor) {
        if x < self.width && y < self.height {
            self.pixels[(y * self.width + x) as usize] = color.0;
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<PaletteColor> {
        if x < self.width && y < self.height {
            Some(PaletteColor(self.pixels[(y * self.width + x) as usize]))
        } else {
            None
        }
    }

    pub fn clear(&mut self, color: PaletteColor) {
        self.pixels.fill(color.0);
    }

    /// Clears only the given region; used by single-widget screens that keep
    /// the rest of the frame intact between rotations.
    pub fn clear_region(&mut self, region: Region, color: PaletteColor) {
        for y in region.y..region.y.saturating_add(region.height).min(self.height) {
            for x in region.x..region.x.saturating_add(region.width).min(self.width) {
                self.pixels[(y * self.width + x) as usize] = color.0;
            }
        }
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = PaletteColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(point.x as u32, point.y as u32, color);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_pixel_in_bounds() {
        let mut fb = FrameBuffer::new(8, 8);
        fb.set_pixel(3, 2, PaletteColor::WHITE);
        assert_eq!(fb.pixel(3, 2), Some(PaletteColor::WHITE));
        assert_eq!(fb.pixel(2, 3), Some(PaletteColor::BACKGROUND));
    }

    #[test]
    fn test_set_pixel_out_of_bounds_is_dropped() {
        let mut fb = FrameBuffer::new(8, 8);
        fb.set_pixel(8, 0, PaletteColor::WHITE);
        fb.set_pixel(0, 8, PaletteColor::WHITE);
        assert!(fb.data().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_clear_region_leaves_rest() {
        let mut fb = FrameBuffer::new(8, 8);
        fb.clear(PaletteColor::WHITE);
        fb.clear_region(Region::new(0, 0, 4, 8).unwrap(), PaletteColor::BACKGROUND);
        assert_eq!(fb.pixel(3, 7), Some(PaletteColor::BACKGROUND));
        assert_eq!(fb.pixel(4, 7), Some(PaletteColor::WHITE));
    }

    #[test]
    fn test_clear_region_clamps_to_buffer() {
        let mut fb = FrameBuffer::new(8, 8);
        fb.clear(PaletteColor::WHITE);
        // Region extends past the right edge; only the in-bounds part clears.
        fb.clear_region(Region::new(6, 0, 16, 2).unwrap(), PaletteColor::BACKGROUND);
        assert_eq!(fb.pixel(7, 1), Some(PaletteColor::BACKGROUND));
        assert_eq!(fb.pixel(5, 1), Some(PaletteColor::WHITE));
    }
}
