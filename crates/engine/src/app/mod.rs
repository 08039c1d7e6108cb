mod geometry;
mod input;
mod loop_runner;
mod rendering;
mod scene;
mod stats;

pub use geometry::{Rect, Vec2};
pub use input::{InputAction, InputSnapshot};
pub use loop_runner::{run_app, AppError, LoopConfig};
pub use rendering::{
    camera_offset, line_height, text_width, world_to_screen, Canvas, Renderer, Viewport,
};
pub use scene::{Scene, SceneCommand, SceneError};
pub use stats::LoopStats;
