use crate::content::Surface;

use super::text::{draw_glyph_clipped, glyph_for, GLYPH_WIDTH, SPACE_GLYPH};

/// RGBA8 drawing target over a borrowed frame buffer (normally the pixels frame).
pub struct Canvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    /// Rows beyond the end of `frame` are treated as clipped.
    pub fn new(frame: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            frame,
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        let offset = self.byte_offset(x, y)?;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.frame[offset..offset + 4]);
        Some(out)
    }

    pub fn fill(&mut self, color: [u8; 4]) {
        for chunk in self.frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&color);
        }
    }

    /// Fills a rectangle, blending by `color[3]`.
    pub fn fill_rect(&mut self, x: i32, y: i32, rect_width: i32, rect_height: i32, color: [u8; 4]) {
        let start_x = x.max(0);
        let start_y = y.max(0);
        let end_x = x.saturating_add(rect_width).min(self.width as i32);
        let end_y = y.saturating_add(rect_height).min(self.height as i32);
        if end_x <= start_x || end_y <= start_y || color[3] == 0 {
            return;
        }

        for py in start_y..end_y {
            for px in start_x..end_x {
                self.blend_pixel(px, py, color);
            }
        }
    }

    pub fn stroke_rect(
        &mut self,
        x: i32,
        y: i32,
        rect_width: i32,
        rect_height: i32,
        color: [u8; 4],
    ) {
        if rect_width <= 1 || rect_height <= 1 {
            return;
        }
        self.fill_rect(x, y, rect_width, 1, color);
        self.fill_rect(x, y + rect_height - 1, rect_width, 1, color);
        self.fill_rect(x, y, 1, rect_height, color);
        self.fill_rect(x + rect_width - 1, y, 1, rect_height, color);
    }

    /// Full-screen wash of `rgb` at `alpha` opacity.
    pub fn overlay(&mut self, rgb: [u8; 3], alpha: u8) {
        let (width, height) = (self.width as i32, self.height as i32);
        self.fill_rect(0, 0, width, height, [rgb[0], rgb[1], rgb[2], alpha]);
    }

    /// Draws `surface` with its top-left corner at (`x`, `y`), clipped to the canvas.
    pub fn blit(&mut self, surface: &Surface, x: i32, y: i32) {
        let left = x.max(0);
        let top = y.max(0);
        let right = x.saturating_add(surface.width() as i32).min(self.width as i32);
        let bottom = y.saturating_add(surface.height() as i32).min(self.height as i32);
        if left >= right || top >= bottom {
            return;
        }

        let rgba = surface.rgba();
        let source_width = surface.width() as usize;
        for out_y in top..bottom {
            let src_row = (out_y - y) as usize * source_width * 4;
            for out_x in left..right {
                let src = src_row + (out_x - x) as usize * 4;
                let color = [rgba[src], rgba[src + 1], rgba[src + 2], rgba[src + 3]];
                self.blend_pixel(out_x, out_y, color);
            }
        }
    }

    pub fn draw_text(&mut self, x: i32, y: i32, text: &str, color: [u8; 4], scale: i32) {
        let scale = scale.max(1);
        let advance = (GLYPH_WIDTH + 1) * scale;
        let mut cursor_x = x;
        for ch in text.chars() {
            let glyph = glyph_for(ch).unwrap_or(SPACE_GLYPH);
            draw_glyph_clipped(self, cursor_x, y, glyph, color, scale);
            cursor_x += advance;
        }
    }

    pub(crate) fn blend_pixel(&mut self, x: i32, y: i32, color: [u8; 4]) {
        let alpha = color[3];
        if alpha == 0 {
            return;
        }
        let Some(offset) = self.byte_offset(x, y) else {
            return;
        };
        let pixel = &mut self.frame[offset..offset + 4];
        if alpha == 255 {
            pixel.copy_from_slice(&color);
            return;
        }
        let a = alpha as u32;
        for channel in 0..3 {
            let src = color[channel] as u32;
            let dst = pixel[channel] as u32;
            pixel[channel] = ((src * a + dst * (255 - a) + 127) / 255) as u8;
        }
        pixel[3] = 255;
    }

    fn byte_offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let pixel = (y as usize)
            .checked_mul(self.width as usize)?
            .checked_add(x as usize)?;
        let offset = pixel.checked_mul(4)?;
        if offset.checked_add(4)? > self.frame.len() {
            return None;
        }
        Some(offset)
    }
}
