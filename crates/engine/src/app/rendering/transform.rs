use crate::app::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width as f32 * 0.5, self.height as f32 * 0.5)
    }
}

/// Amount subtracted from world coordinates so that `focus` lands on the viewport center.
pub fn camera_offset(focus: Vec2, viewport: Viewport) -> Vec2 {
    focus - viewport.center()
}

pub fn world_to_screen(world: Vec2, focus: Vec2, viewport: Viewport) -> (i32, i32) {
    let screen = world - camera_offset(focus, viewport);
    (screen.x.round() as i32, screen.y.round() as i32)
}
