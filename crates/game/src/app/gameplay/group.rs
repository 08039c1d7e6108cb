use std::cmp::Ordering;

use pyiam_engine::{camera_offset, Canvas, Rect, Vec2, Viewport};

use super::actors::Actor;
use super::sprites::{Entity, EntityId};

/// Non-owning index sets layered over the composition group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Subgroup {
    Collision,
    Monsters,
    Transitions,
    Characters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

/// Sole owner of a world's entities. Ids are handed out in insertion order and
/// never reused, so id order doubles as the stable tie-break for drawing and
/// overlap queries.
#[derive(Debug)]
pub(crate) struct SpriteGroup {
    slots: Vec<Option<Entity>>,
    live: usize,
    collision: Vec<EntityId>,
    monsters: Vec<EntityId>,
    transitions: Vec<EntityId>,
    characters: Vec<EntityId>,
    animation_speed: f32,
    draw_scratch: Vec<DrawKey>,
}

#[derive(Debug, Clone, Copy)]
struct DrawKey {
    depth: u8,
    anchor_y: f32,
    id: EntityId,
}

impl SpriteGroup {
    pub(crate) fn new(animation_speed: f32) -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
            collision: Vec::new(),
            monsters: Vec::new(),
            transitions: Vec::new(),
            characters: Vec::new(),
            animation_speed,
            draw_scratch: Vec::new(),
        }
    }

    pub(crate) fn add(&mut self, entity: Entity, subgroups: &[Subgroup]) -> EntityId {
        let id = EntityId(self.slots.len() as u32);
        self.slots.push(Some(entity));
        self.live += 1;
        for subgroup in subgroups {
            let members = self.members_mut(*subgroup);
            if !members.contains(&id) {
                members.push(id);
            }
        }
        id
    }

    /// Drops the entity and every subgroup tag pointing at it.
    pub(crate) fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.slots.get_mut(id.0 as usize)?.take()?;
        self.live -= 1;
        for members in [
            &mut self.collision,
            &mut self.monsters,
            &mut self.transitions,
            &mut self.characters,
        ] {
            members.retain(|member| *member != id);
        }
        Some(entity)
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    pub(crate) fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots.get(id.0 as usize)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.slots.get_mut(id.0 as usize)?.as_mut()
    }

    pub(crate) fn actor(&self, id: EntityId) -> Option<&Actor> {
        self.get(id)?.as_actor()
    }

    pub(crate) fn actor_mut(&mut self, id: EntityId) -> Option<&mut Actor> {
        self.get_mut(id)?.as_actor_mut()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.as_ref()
                    .map(|entity| (EntityId(index as u32), entity))
            })
    }

    pub(crate) fn members(&self, subgroup: Subgroup) -> &[EntityId] {
        match subgroup {
            Subgroup::Collision => &self.collision,
            Subgroup::Monsters => &self.monsters,
            Subgroup::Transitions => &self.transitions,
            Subgroup::Characters => &self.characters,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_member(&self, subgroup: Subgroup, id: EntityId) -> bool {
        self.members(subgroup).contains(&id)
    }

    fn members_mut(&mut self, subgroup: Subgroup) -> &mut Vec<EntityId> {
        match subgroup {
            Subgroup::Collision => &mut self.collision,
            Subgroup::Monsters => &mut self.monsters,
            Subgroup::Transitions => &mut self.transitions,
            Subgroup::Characters => &mut self.characters,
        }
    }

    /// First member of `subgroup`, in insertion order, whose rect overlaps `area`.
    pub(crate) fn first_overlap(&self, subgroup: Subgroup, area: &Rect) -> Option<EntityId> {
        self.members(subgroup).iter().copied().find(|id| {
            self.get(*id)
                .is_some_and(|entity| entity.rect.overlaps(area))
        })
    }

    /// Advances animations, then moves every unblocked actor with a movement
    /// intent, resolving collisions one axis at a time.
    pub(crate) fn update(&mut self, dt: f32) {
        let animation_speed = self.animation_speed;
        let mut movers = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let Some(entity) = slot else {
                continue;
            };
            if entity.as_actor().is_some_and(Actor::is_moving) {
                movers.push(EntityId(index as u32));
            }
        }
        for id in movers {
            self.move_actor(id, dt);
        }
        for entity in self.slots.iter_mut().flatten() {
            entity.advance(dt, animation_speed);
        }
    }

    fn move_actor(&mut self, id: EntityId, dt: f32) {
        let Some(entity) = self.get(id) else {
            return;
        };
        let Some(actor) = entity.as_actor() else {
            return;
        };
        let step = actor.direction() * (actor.speed() * dt);
        let mut rect = entity.rect;
        let mut hitbox = entity.hitbox;

        rect.x += step.x;
        hitbox.set_center_x(rect.center().x);
        self.resolve_collisions(id, &mut hitbox, Axis::Horizontal, step.x);
        rect.set_center_x(hitbox.center().x);

        rect.y += step.y;
        hitbox.set_center_y(rect.center().y);
        self.resolve_collisions(id, &mut hitbox, Axis::Vertical, step.y);
        rect.set_center_y(hitbox.center().y);

        if let Some(entity) = self.get_mut(id) {
            entity.rect = rect;
            entity.hitbox = hitbox;
        }
    }

    fn resolve_collisions(&self, mover: EntityId, hitbox: &mut Rect, axis: Axis, delta: f32) {
        for id in &self.collision {
            if *id == mover {
                continue;
            }
            let Some(obstacle) = self.get(*id).map(|entity| entity.hitbox) else {
                continue;
            };
            if !obstacle.overlaps(hitbox) {
                continue;
            }
            match axis {
                Axis::Horizontal if delta > 0.0 => hitbox.x = obstacle.x - hitbox.width,
                Axis::Horizontal if delta < 0.0 => hitbox.x = obstacle.right(),
                Axis::Vertical if delta > 0.0 => hitbox.y = obstacle.y - hitbox.height,
                Axis::Vertical if delta < 0.0 => hitbox.y = obstacle.bottom(),
                _ => {}
            }
        }
    }

    fn collect_draw_keys(&self, out: &mut Vec<DrawKey>) {
        out.clear();
        out.extend(self.iter().filter(|(_, entity)| entity.current_image().is_some()).map(
            |(id, entity)| DrawKey {
                depth: entity.depth,
                anchor_y: entity.anchor_y(),
                id,
            },
        ));
        // sort_by is stable: equal keys keep insertion order
        out.sort_by(|a, b| {
            a.depth
                .cmp(&b.depth)
                .then_with(|| a.anchor_y.partial_cmp(&b.anchor_y).unwrap_or(Ordering::Equal))
        });
    }

    /// Visible entities in the order they are drawn.
    #[cfg(test)]
    pub(crate) fn draw_order(&self) -> Vec<EntityId> {
        let mut keys = Vec::new();
        self.collect_draw_keys(&mut keys);
        keys.into_iter().map(|key| key.id).collect()
    }

    /// Draws every visible entity shifted so that `focus` lands on the canvas center.
    pub(crate) fn draw(&mut self, canvas: &mut Canvas<'_>, focus: Vec2) {
        let mut keys = std::mem::take(&mut self.draw_scratch);
        self.collect_draw_keys(&mut keys);

        let viewport = Viewport {
            width: canvas.width(),
            height: canvas.height(),
        };
        let offset = camera_offset(focus, viewport);
        let screen = Rect::new(0.0, 0.0, viewport.width as f32, viewport.height as f32);
        for key in &keys {
            let Some(entity) = self.get(key.id) else {
                continue;
            };
            let Some(image) = entity.current_image() else {
                continue;
            };
            let on_screen = Rect::new(
                entity.rect.x - offset.x,
                entity.rect.y - offset.y,
                image.width() as f32,
                image.height() as f32,
            );
            if !on_screen.overlaps(&screen) {
                continue;
            }
            canvas.blit(image, on_screen.x.round() as i32, on_screen.y.round() as i32);
        }

        self.draw_scratch = keys;
    }
}
