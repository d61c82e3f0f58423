// src/render/canvas.rs
//! Region geometry and the clipped drawing window handed to widgets.

use embedded_graphics::prelude::*;

use crate::render::framebuffer::{FrameBuffer, PaletteColor};

/// Rectangular sub-area of the framebuffer assigned to one widget instance.
/// Coordinates are zero-based from the top-left; width and height are always
/// positive. Overlap between regions is a configuration concern, not checked
/// here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(Self {
            x,
            y,
            width,
            height,
        })
    }

    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width: width.max(1),
            height: height.max(1),
        }
    }
}

/// Drawing window over one widget's region. Widgets draw in local
/// coordinates; translation and clipping happen here, so a widget cannot
/// write outside the rectangle it was assigned.
pub struct RegionCanvas<'a> {
    frame: &'a mut FrameBuffer,
    region: Region,
}

impl<'a> RegionCanvas<'a> {
    pub fn new(frame: &'a mut FrameBuffer, region: Region) -> Self {
        Self { frame, region }
    }

    pub fn region(&self) -> Region {
        self.region
    }
}

impl OriginDimensions for RegionCanvas<'_> {
    fn size(&self) -> Size {
        Size::new(self.region.width, self.region.height)
    }
}

impl DrawTarget for RegionCanvas<'_> {
    type Color = PaletteColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            let (x, y) = (point.x as u32, point.y as u32);
            if x < self.region.width && y < self.region.height {
                self.frame
                    .set_pixel(self.region.x + x, self.region.y + y, color);
            }
        }
        Ok(())
    }
}
