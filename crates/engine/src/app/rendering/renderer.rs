use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use super::{Canvas, Viewport};

/// Presents a fixed logical resolution; pixels scales it to the window surface.
pub struct Renderer {
    pixels: Pixels<'static>,
    viewport: Viewport,
    surface_width: u32,
    surface_height: u32,
}

impl Renderer {
    pub fn new(window: Arc<Window>, viewport: Viewport) -> Result<Self, Error> {
        let size = window.inner_size();
        let surface = SurfaceTexture::new(size.width.max(1), size.height.max(1), window);
        let pixels = Pixels::new(viewport.width, viewport.height, surface)?;
        Ok(Self {
            pixels,
            viewport,
            surface_width: size.width,
            surface_height: size.height,
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        if width == self.surface_width && height == self.surface_height {
            return Ok(());
        }
        self.pixels.resize_surface(width, height)?;
        self.surface_width = width;
        self.surface_height = height;
        Ok(())
    }

    pub fn render_with(&mut self, draw: impl FnOnce(&mut Canvas<'_>)) -> Result<(), Error> {
        let Viewport { width, height } = self.viewport;
        {
            let mut canvas = Canvas::new(self.pixels.frame_mut(), width, height);
            draw(&mut canvas);
        }
        self.pixels.render()
    }
}
