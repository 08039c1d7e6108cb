use pyiam_engine::{ImageError, Surface, Vec2};

/// Facing of an actor. Declaration order matches the rows of a character sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Direction {
    Down,
    Left,
    Right,
    Up,
}

impl Direction {
    #[cfg(test)]
    pub(crate) const ALL: [Direction; 4] = [
        Direction::Down,
        Direction::Left,
        Direction::Right,
        Direction::Up,
    ];

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "up" => Some(Self::Up),
            _ => None,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
            Self::Up => "up",
        }
    }

    fn row(self) -> usize {
        match self {
            Self::Down => 0,
            Self::Left => 1,
            Self::Right => 2,
            Self::Up => 3,
        }
    }

    /// Direction from `from` towards `to`; horizontal when the vertical gap is under `tolerance`.
    pub(crate) fn towards(from: Vec2, to: Vec2, tolerance: f32) -> Self {
        let relation = to - from;
        if relation.y.abs() < tolerance {
            if relation.x > 0.0 {
                Self::Right
            } else {
                Self::Left
            }
        } else if relation.y > 0.0 {
            Self::Down
        } else {
            Self::Up
        }
    }
}

/// Walk cycles and idle poses for the four facings of one character graphic.
#[derive(Debug, Clone)]
pub(crate) struct CharacterFrames {
    walk: [Vec<Surface>; 4],
    idle: [Surface; 4],
}

impl CharacterFrames {
    pub(crate) const SHEET_COLUMNS: u32 = 4;
    pub(crate) const SHEET_ROWS: u32 = 4;

    /// Slices a 4x4 sheet: one row per facing, column 0 doubling as the idle pose.
    pub(crate) fn from_sheet(sheet: &Surface) -> Result<Self, ImageError> {
        let cells = sheet.slice_grid(Self::SHEET_COLUMNS, Self::SHEET_ROWS)?;
        let columns = Self::SHEET_COLUMNS as usize;
        let walk: [Vec<Surface>; 4] =
            std::array::from_fn(|row| cells[row * columns..(row + 1) * columns].to_vec());
        let idle: [Surface; 4] = std::array::from_fn(|row| cells[row * columns].clone());
        Ok(Self { walk, idle })
    }

    pub(crate) fn frame(&self, facing: Direction, moving: bool, cursor: f32) -> &Surface {
        if !moving {
            return &self.idle[facing.row()];
        }
        let cycle = &self.walk[facing.row()];
        &cycle[cursor.max(0.0) as usize % cycle.len()]
    }

    pub(crate) fn frame_size(&self) -> (f32, f32) {
        let idle = &self.idle[Direction::Down.row()];
        (idle.width() as f32, idle.height() as f32)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ActorRole {
    Player,
    Character { graphic: String, dialog: Vec<String> },
}

#[derive(Debug, Clone)]
pub(crate) struct Actor {
    pub(crate) role: ActorRole,
    frames: CharacterFrames,
    facing: Direction,
    direction: Vec2,
    speed: f32,
    blocked: bool,
    can_rotate: bool,
    frame_cursor: f32,
}

impl Actor {
    pub(crate) fn new(
        role: ActorRole,
        frames: CharacterFrames,
        facing: Direction,
        speed: f32,
    ) -> Self {
        Self {
            role,
            frames,
            facing,
            direction: Vec2::ZERO,
            speed,
            blocked: false,
            can_rotate: true,
            frame_cursor: 0.0,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_player(&self) -> bool {
        matches!(self.role, ActorRole::Player)
    }

    pub(crate) fn facing(&self) -> Direction {
        self.facing
    }

    pub(crate) fn direction(&self) -> Vec2 {
        self.direction
    }

    pub(crate) fn speed(&self) -> f32 {
        self.speed
    }

    pub(crate) fn frame_size(&self) -> (f32, f32) {
        self.frames.frame_size()
    }

    #[cfg(test)]
    pub(crate) fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub(crate) fn is_moving(&self) -> bool {
        !self.blocked && !self.direction.is_zero()
    }

    /// Sets the movement intent; the vector is normalised and ignored while blocked.
    pub(crate) fn set_direction(&mut self, direction: Vec2) {
        if self.blocked {
            return;
        }
        self.direction = direction.normalize_or_zero();
        if self.direction.x != 0.0 {
            self.facing = if self.direction.x > 0.0 {
                Direction::Right
            } else {
                Direction::Left
            };
        }
        if self.direction.y != 0.0 {
            self.facing = if self.direction.y > 0.0 {
                Direction::Down
            } else {
                Direction::Up
            };
        }
    }

    pub(crate) fn block(&mut self) {
        self.blocked = true;
        self.direction = Vec2::ZERO;
    }

    pub(crate) fn unblock(&mut self) {
        self.blocked = false;
    }

    pub(crate) fn lock_rotation(&mut self) {
        self.can_rotate = false;
    }

    pub(crate) fn unlock_rotation(&mut self) {
        self.can_rotate = true;
    }

    /// Turns to look at `target`; no-op while rotation is locked.
    pub(crate) fn face_towards(&mut self, own_center: Vec2, target: Vec2, tolerance: f32) {
        if self.can_rotate {
            self.facing = Direction::towards(own_center, target, tolerance);
        }
    }

    pub(crate) fn animate(&mut self, dt: f32, frames_per_second: f32) {
        let cycle = self.frames.walk[self.facing.row()].len().max(1) as f32;
        self.frame_cursor = (self.frame_cursor + frames_per_second * dt) % cycle;
    }

    pub(crate) fn current_frame(&self) -> &Surface {
        self.frames
            .frame(self.facing, self.is_moving(), self.frame_cursor)
    }

    pub(crate) fn dialog_lines(&self) -> &[String] {
        match &self.role {
            ActorRole::Character { dialog, .. } => dialog,
            ActorRole::Player => &[],
        }
    }
}

/// Whether an actor at `from` facing `facing` can talk to something centred at `to`.
pub(crate) fn in_interaction_range(
    from: Vec2,
    facing: Direction,
    to: Vec2,
    radius: f32,
    tolerance: f32,
) -> bool {
    let relation = to - from;
    if relation.length() >= radius {
        return false;
    }
    match facing {
        Direction::Left => relation.x < 0.0 && relation.y.abs() < tolerance,
        Direction::Right => relation.x > 0.0 && relation.y.abs() < tolerance,
        Direction::Up => relation.y < 0.0 && relation.x.abs() < tolerance,
        Direction::Down => relation.y > 0.0 && relation.x.abs() < tolerance,
    }
}
