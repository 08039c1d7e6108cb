mod canvas;
mod renderer;
mod text;
mod transform;

pub use canvas::Canvas;
pub use renderer::Renderer;
pub use text::{line_height, text_width};
pub use transform::{camera_offset, world_to_screen, Viewport};
