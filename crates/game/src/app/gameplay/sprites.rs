use pyiam_engine::{Rect, Surface, Vec2};

use super::actors::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct EntityId(pub(crate) u32);

/// Destination of a transition region: map id plus the start id inside that map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TransitionTarget {
    pub(crate) map: String,
    pub(crate) start: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MonsterPatch {
    pub(crate) biome: String,
    pub(crate) monsters: Vec<String>,
    pub(crate) level: u32,
}

impl MonsterPatch {
    /// `monsters` is comma separated; order is kept and blank entries dropped.
    /// Returns `None` when no monster name remains.
    pub(crate) fn new(biome: &str, monsters: &str, level: u32) -> Option<Self> {
        let monsters = monsters
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        if monsters.is_empty() {
            return None;
        }
        Some(Self {
            biome: biome.to_string(),
            monsters,
            level,
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Animation {
    frames: Vec<Surface>,
    cursor: f32,
}

impl Animation {
    pub(crate) fn new(frames: Vec<Surface>) -> Option<Self> {
        (!frames.is_empty()).then_some(Self {
            frames,
            cursor: 0.0,
        })
    }

    pub(crate) fn advance(&mut self, dt: f32, frames_per_second: f32) {
        self.cursor = (self.cursor + frames_per_second * dt) % self.frames.len() as f32;
    }

    pub(crate) fn frame_index(&self) -> usize {
        self.cursor.max(0.0) as usize % self.frames.len()
    }

    pub(crate) fn current(&self) -> &Surface {
        &self.frames[self.frame_index()]
    }
}

#[derive(Debug, Clone)]
pub(crate) enum EntityKind {
    Sprite(Surface),
    /// Solid scenery whose hitbox is a vertically shrunk copy of its rect.
    Collidable(Surface),
    /// Invisible wall.
    Border,
    /// Invisible region that schedules a map swap on overlap.
    Transition(TransitionTarget),
    Animated(Animation),
    MonsterPatch { image: Surface, patch: MonsterPatch },
    Actor(Actor),
}

#[derive(Debug, Clone)]
pub(crate) struct Entity {
    pub(crate) rect: Rect,
    pub(crate) hitbox: Rect,
    pub(crate) depth: u8,
    /// Added to the rect's vertical center to get the draw-order anchor.
    pub(crate) y_sort_offset: f32,
    pub(crate) kind: EntityKind,
}

impl Entity {
    fn new(rect: Rect, depth: u8, kind: EntityKind) -> Self {
        Self {
            rect,
            hitbox: rect,
            depth,
            y_sort_offset: 0.0,
            kind,
        }
    }

    pub(crate) fn sprite(top_left: Vec2, image: Surface, depth: u8) -> Self {
        let rect = image_rect(top_left, &image);
        Self::new(rect, depth, EntityKind::Sprite(image))
    }

    pub(crate) fn collidable(
        top_left: Vec2,
        image: Surface,
        depth: u8,
        hitbox_shrink: f32,
    ) -> Self {
        let rect = image_rect(top_left, &image);
        let mut entity = Self::new(rect, depth, EntityKind::Collidable(image));
        entity.hitbox = rect.inflate(0.0, -rect.height * hitbox_shrink);
        entity
    }

    pub(crate) fn border(rect: Rect, depth: u8) -> Self {
        Self::new(rect, depth, EntityKind::Border)
    }

    pub(crate) fn transition(rect: Rect, target: TransitionTarget, depth: u8) -> Self {
        Self::new(rect, depth, EntityKind::Transition(target))
    }

    pub(crate) fn animated(top_left: Vec2, animation: Animation, depth: u8) -> Self {
        let rect = image_rect(top_left, animation.current());
        Self::new(rect, depth, EntityKind::Animated(animation))
    }

    pub(crate) fn monster_patch(
        top_left: Vec2,
        image: Surface,
        patch: MonsterPatch,
        depth: u8,
        y_sort_offset: f32,
    ) -> Self {
        let rect = image_rect(top_left, &image);
        let mut entity = Self::new(rect, depth, EntityKind::MonsterPatch { image, patch });
        entity.y_sort_offset = y_sort_offset;
        entity
    }

    /// Centres the actor's frame on `center`; the hitbox loses `width_shrink`
    /// of the frame width and `height_shrink` pixels of its height.
    pub(crate) fn actor(
        center: Vec2,
        actor: Actor,
        depth: u8,
        width_shrink: f32,
        height_shrink: f32,
    ) -> Self {
        let (width, height) = actor.frame_size();
        let rect = Rect::from_center(center, width, height);
        let mut entity = Self::new(rect, depth, EntityKind::Actor(actor));
        entity.hitbox = rect.inflate(-width * width_shrink, -height_shrink);
        entity
    }

    pub(crate) fn anchor_y(&self) -> f32 {
        self.rect.center().y + self.y_sort_offset
    }

    pub(crate) fn current_image(&self) -> Option<&Surface> {
        match &self.kind {
            EntityKind::Sprite(image) | EntityKind::Collidable(image) => Some(image),
            EntityKind::MonsterPatch { image, .. } => Some(image),
            EntityKind::Animated(animation) => Some(animation.current()),
            EntityKind::Actor(actor) => Some(actor.current_frame()),
            EntityKind::Border | EntityKind::Transition(_) => None,
        }
    }

    pub(crate) fn advance(&mut self, dt: f32, frames_per_second: f32) {
        match &mut self.kind {
            EntityKind::Animated(animation) => animation.advance(dt, frames_per_second),
            EntityKind::Actor(actor) => actor.animate(dt, frames_per_second),
            _ => {}
        }
    }

    pub(crate) fn as_actor(&self) -> Option<&Actor> {
        match &self.kind {
            EntityKind::Actor(actor) => Some(actor),
            _ => None,
        }
    }

    pub(crate) fn as_actor_mut(&mut self) -> Option<&mut Actor> {
        match &mut self.kind {
            EntityKind::Actor(actor) => Some(actor),
            _ => None,
        }
    }

    pub(crate) fn as_patch(&self) -> Option<&MonsterPatch> {
        match &self.kind {
            EntityKind::MonsterPatch { patch, .. } => Some(patch),
            _ => None,
        }
    }

    pub(crate) fn transition_target(&self) -> Option<&TransitionTarget> {
        match &self.kind {
            EntityKind::Transition(target) => Some(target),
            _ => None,
        }
    }
}

fn image_rect(top_left: Vec2, image: &Surface) -> Rect {
    Rect::from_top_left(top_left, image.width() as f32, image.height() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(count: u8) -> Vec<Surface> {
        (0..count)
            .map(|index| Surface::solid(4, 4, [index, 0, 0, 255]))
            .collect()
    }

    #[test]
    fn collidable_and_border_hitboxes_stay_inside_their_rects() {
        for height in [1u32, 7, 64, 128, 333] {
            let collidable = Entity::collidable(
                Vec2::new(13.0, -7.5),
                Surface::solid(32, height, [0; 4]),
                3,
                0.6,
            );
            assert!(collidable.rect.contains_rect(&collidable.hitbox), "height={height}");
            assert!((collidable.hitbox.height - height as f32 * 0.4).abs() < 0.001);
            assert_eq!(collidable.hitbox.width, collidable.rect.width);
        }

        let border = Entity::border(Rect::new(0.0, 0.0, 50.0, 10.0), 3);
        assert_eq!(border.hitbox, border.rect);
        assert!(border.current_image().is_none());
    }

    #[test]
    fn animation_selects_frame_by_elapsed_frame_count() {
        let mut animation = Animation::new(frames(4)).expect("frames");
        for k in 0..10 {
            assert_eq!(animation.frame_index(), k % 4, "k={k}");
            animation.advance(0.25, 4.0);
        }
    }

    #[test]
    fn animation_is_independent_of_step_splitting() {
        let mut whole = Animation::new(frames(3)).expect("frames");
        let mut split = Animation::new(frames(3)).expect("frames");

        whole.advance(1.25, 6.0);
        for _ in 0..5 {
            split.advance(0.25, 6.0);
        }

        assert_eq!(whole.frame_index(), split.frame_index());
        assert_eq!(whole.frame_index(), 7 % 3);
    }

    #[test]
    fn empty_animation_is_rejected() {
        assert!(Animation::new(Vec::new()).is_none());
    }

    #[test]
    fn monster_list_keeps_order_and_drops_blanks() {
        let patch = MonsterPatch::new("grass", " slime, bat,,", 3).expect("patch");
        assert_eq!(patch.monsters, vec!["slime".to_string(), "bat".to_string()]);
        assert_eq!(patch.level, 3);
        assert!(MonsterPatch::new("grass", " , ", 1).is_none());
    }

    #[test]
    fn monster_patch_anchor_is_shifted_up() {
        let patch = MonsterPatch::new("grass", "slime", 1).expect("patch");
        let entity = Entity::monster_patch(
            Vec2::new(0.0, 100.0),
            Surface::solid(64, 64, [0; 4]),
            patch,
            3,
            -40.0,
        );
        assert_eq!(entity.rect.center().y, 132.0);
        assert_eq!(entity.anchor_y(), 92.0);
        assert!(entity.as_patch().is_some());
    }
}
