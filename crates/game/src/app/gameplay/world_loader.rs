use std::collections::BTreeMap;
use std::path::Path;

use pyiam_engine::{ImageCache, MapError, MapObject, Rect, Surface, TileMap, Vec2};
use thiserror::Error;
use tracing::{debug, info};

use super::actors::{Actor, ActorRole, CharacterFrames, Direction};
use super::assets::GameFrames;
use super::group::{SpriteGroup, Subgroup};
use super::settings::Settings;
use super::sprites::{Animation, Entity, EntityId, MonsterPatch, TransitionTarget};

const TERRAIN_LAYERS: [&str; 2] = ["Terrain", "Terrain Top"];
const WATER_LAYER: &str = "Water";
const COAST_LAYER: &str = "Coast";
const OBJECTS_LAYER: &str = "Objects";
const MONSTERS_LAYER: &str = "Monsters";
const COLLISIONS_LAYER: &str = "Collisions";
const ENTITIES_LAYER: &str = "Entities";
const TRANSITION_LAYER: &str = "Transition";

const PLAYER_OBJECT: &str = "Player";
const PLAYER_GRAPHIC: &str = "player";
const TOP_OBJECT: &str = "top";
const SAND_BIOME: &str = "sand";
const DIALOG_SEPARATOR: char = '|';

#[derive(Debug, Error)]
pub(crate) enum WorldLoadError {
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("object {object_id} in layer '{layer}' is missing property '{property}'")]
    MissingProperty {
        layer: &'static str,
        object_id: u32,
        property: &'static str,
    },
    #[error("object {object_id} in layer '{layer}' has invalid {property} '{value}'")]
    InvalidProperty {
        layer: &'static str,
        object_id: u32,
        property: &'static str,
        value: String,
    },
    #[error("object {object_id} in layer '{layer}' references unknown graphic '{key}'")]
    MissingGraphic {
        layer: &'static str,
        object_id: u32,
        key: String,
    },
    #[error("object {object_id} in layer '{layer}' has no tile image")]
    MissingObjectImage { layer: &'static str, object_id: u32 },
    #[error("tile layer '{layer}' references gid {gid} without an image")]
    MissingTileImage { layer: &'static str, gid: u32 },
    #[error("no {what} frames are loaded")]
    EmptyAnimation { what: &'static str },
    #[error("map '{map_id}' has no player start '{start}'")]
    NoPlayerStart { map_id: String, start: String },
    #[error("map '{map_id}' has more than one player start '{start}'")]
    DuplicatePlayerStart { map_id: String, start: String },
}

/// A fully populated map: every entity plus the handle of the single player.
#[derive(Debug)]
pub(crate) struct World {
    pub(crate) map_id: String,
    pub(crate) sprites: SpriteGroup,
    pub(crate) player: EntityId,
}

impl World {
    pub(crate) fn player_entity(&self) -> Option<&Entity> {
        self.sprites.get(self.player)
    }

    pub(crate) fn player_center(&self) -> Vec2 {
        self.player_entity()
            .map(|entity| entity.rect.center())
            .unwrap_or(Vec2::ZERO)
    }

    pub(crate) fn player_hitbox(&self) -> Rect {
        self.player_entity()
            .map(|entity| entity.hitbox)
            .unwrap_or_default()
    }
}

/// Parses every map listed in the settings catalog, sharing one image cache.
pub(crate) fn load_map_catalog(
    maps_dir: &Path,
    settings: &Settings,
) -> Result<BTreeMap<String, TileMap>, MapError> {
    let mut cache = ImageCache::default();
    let mut maps = BTreeMap::new();
    for (map_id, file_name) in &settings.maps {
        let map = TileMap::load(&maps_dir.join(file_name), &mut cache)?;
        maps.insert(map_id.clone(), map);
    }
    info!(maps = maps.len(), images = cache.len(), "maps_loaded");
    Ok(maps)
}

/// Builds a fresh world from `map`, spawning the player at the `Entities`
/// object whose `pos` property equals `start`.
///
/// Layers are consumed in a fixed order. Any missing layer, property or
/// graphic aborts the load; no partially built world is returned.
pub(crate) fn load_world(
    map: &TileMap,
    map_id: &str,
    start: &str,
    settings: &Settings,
    frames: &GameFrames,
) -> Result<World, WorldLoadError> {
    let depths = settings.depths;
    let tile_size = settings.tile_size as f32;
    let mut sprites = SpriteGroup::new(settings.animation_speed);

    for layer_name in TERRAIN_LAYERS {
        let layer = map.tile_layer(layer_name)?;
        for (column, row, gid) in layer.tiles() {
            let image = map
                .tile_image(gid)
                .ok_or(WorldLoadError::MissingTileImage {
                    layer: layer_name,
                    gid,
                })?;
            let top_left = Vec2::new(column as f32 * tile_size, row as f32 * tile_size);
            sprites.add(Entity::sprite(top_left, image.clone(), depths.background), &[]);
        }
    }

    let water = map.object_layer(WATER_LAYER)?;
    if !water.objects.is_empty() && frames.water.is_empty() {
        return Err(WorldLoadError::EmptyAnimation { what: "water" });
    }
    for object in &water.objects {
        for top_left in tile_grid(object, tile_size) {
            let animation = Animation::new(frames.water.clone())
                .ok_or(WorldLoadError::EmptyAnimation { what: "water" })?;
            sprites.add(Entity::animated(top_left, animation, depths.water), &[]);
        }
    }

    for object in &map.object_layer(COAST_LAYER)?.objects {
        let terrain = required(object, COAST_LAYER, "terrain")?;
        let side = required(object, COAST_LAYER, "side")?;
        let coast = frames
            .coast_frames(terrain, side)
            .ok_or_else(|| WorldLoadError::MissingGraphic {
                layer: COAST_LAYER,
                object_id: object.id,
                key: format!("{terrain}/{side}"),
            })?;
        let animation = Animation::new(coast.to_vec())
            .ok_or(WorldLoadError::EmptyAnimation { what: "coast" })?;
        sprites.add(
            Entity::animated(top_left(object), animation, depths.background),
            &[],
        );
    }

    for object in &map.object_layer(OBJECTS_LAYER)?.objects {
        let image = object_image(map, object, OBJECTS_LAYER)?;
        if object.name == TOP_OBJECT {
            sprites.add(Entity::sprite(top_left(object), image, depths.top), &[]);
        } else {
            let entity = Entity::collidable(
                top_left(object),
                image,
                depths.main,
                settings.collidable_hitbox_shrink,
            );
            sprites.add(entity, &[Subgroup::Collision]);
        }
    }

    for object in &map.object_layer(MONSTERS_LAYER)?.objects {
        let image = object_image(map, object, MONSTERS_LAYER)?;
        let biome = required(object, MONSTERS_LAYER, "biome")?;
        let monsters = required(object, MONSTERS_LAYER, "monsters")?;
        let raw_level = required(object, MONSTERS_LAYER, "level")?;
        let level = raw_level
            .trim()
            .parse::<u32>()
            .map_err(|_| invalid(object, MONSTERS_LAYER, "level", raw_level))?;
        let patch = MonsterPatch::new(biome, monsters, level)
            .ok_or_else(|| invalid(object, MONSTERS_LAYER, "monsters", monsters))?;
        let depth = if biome == SAND_BIOME {
            depths.background
        } else {
            depths.main
        };
        let entity = Entity::monster_patch(
            top_left(object),
            image,
            patch,
            depth,
            -settings.monster_patch_y_sort_offset,
        );
        sprites.add(entity, &[Subgroup::Monsters]);
    }

    for object in &map.object_layer(COLLISIONS_LAYER)?.objects {
        let rect = Rect::new(object.x, object.y, object.width, object.height);
        sprites.add(Entity::border(rect, depths.main), &[Subgroup::Collision]);
    }

    let mut player = None;
    for object in &map.object_layer(ENTITIES_LAYER)?.objects {
        let center = Vec2::new(object.x, object.y);
        if object.name == PLAYER_OBJECT {
            if required(object, ENTITIES_LAYER, "pos")? != start {
                continue;
            }
            if player.is_some() {
                return Err(WorldLoadError::DuplicatePlayerStart {
                    map_id: map_id.to_string(),
                    start: start.to_string(),
                });
            }
            let facing = facing(object)?;
            let sheet = character_frames(frames, object, PLAYER_GRAPHIC)?;
            let actor = Actor::new(ActorRole::Player, sheet, facing, settings.actor.speed);
            let entity = actor_entity(center, actor, settings);
            player = Some(sprites.add(entity, &[]));
        } else {
            let graphic = required(object, ENTITIES_LAYER, "graphic")?;
            let facing = facing(object)?;
            let sheet = character_frames(frames, object, graphic)?;
            let dialog = object
                .properties
                .get("dialog")
                .map(split_dialog)
                .unwrap_or_default();
            let role = ActorRole::Character {
                graphic: graphic.to_string(),
                dialog,
            };
            let actor = Actor::new(role, sheet, facing, settings.actor.speed);
            let entity = actor_entity(center, actor, settings);
            sprites.add(entity, &[Subgroup::Collision, Subgroup::Characters]);
        }
    }

    if let Some(layer) = map.find_object_layer(TRANSITION_LAYER)? {
        for object in &layer.objects {
            let target = TransitionTarget {
                map: required(object, TRANSITION_LAYER, "target")?.to_string(),
                start: required(object, TRANSITION_LAYER, "pos")?.to_string(),
            };
            let rect = Rect::new(object.x, object.y, object.width, object.height);
            sprites.add(
                Entity::transition(rect, target, depths.main),
                &[Subgroup::Transitions],
            );
        }
    }

    let Some(player) = player else {
        return Err(WorldLoadError::NoPlayerStart {
            map_id: map_id.to_string(),
            start: start.to_string(),
        });
    };

    debug!(
        map = map_id,
        collision = sprites.members(Subgroup::Collision).len(),
        monsters = sprites.members(Subgroup::Monsters).len(),
        transitions = sprites.members(Subgroup::Transitions).len(),
        characters = sprites.members(Subgroup::Characters).len(),
        "world_subgroups"
    );
    info!(map = map_id, start, entities = sprites.len(), "world_loaded");

    Ok(World {
        map_id: map_id.to_string(),
        sprites,
        player,
    })
}

fn top_left(object: &MapObject) -> Vec2 {
    Vec2::new(object.x, object.y)
}

/// Top-left corners of every tile cell inside the object's footprint.
fn tile_grid(object: &MapObject, tile_size: f32) -> Vec<Vec2> {
    let mut cells = Vec::new();
    let (right, bottom) = (object.x + object.width, object.y + object.height);
    let mut x = object.x;
    while x < right {
        let mut y = object.y;
        while y < bottom {
            cells.push(Vec2::new(x, y));
            y += tile_size;
        }
        x += tile_size;
    }
    cells
}

fn required<'a>(
    object: &'a MapObject,
    layer: &'static str,
    property: &'static str,
) -> Result<&'a str, WorldLoadError> {
    object
        .properties
        .get(property)
        .ok_or(WorldLoadError::MissingProperty {
            layer,
            object_id: object.id,
            property,
        })
}

fn invalid(
    object: &MapObject,
    layer: &'static str,
    property: &'static str,
    value: &str,
) -> WorldLoadError {
    WorldLoadError::InvalidProperty {
        layer,
        object_id: object.id,
        property,
        value: value.to_string(),
    }
}

fn object_image(
    map: &TileMap,
    object: &MapObject,
    layer: &'static str,
) -> Result<Surface, WorldLoadError> {
    map.object_image(object)
        .cloned()
        .ok_or(WorldLoadError::MissingObjectImage {
            layer,
            object_id: object.id,
        })
}

fn facing(object: &MapObject) -> Result<Direction, WorldLoadError> {
    let raw = required(object, ENTITIES_LAYER, "direction")?;
    Direction::parse(raw).ok_or_else(|| invalid(object, ENTITIES_LAYER, "direction", raw))
}

fn character_frames(
    frames: &GameFrames,
    object: &MapObject,
    key: &str,
) -> Result<CharacterFrames, WorldLoadError> {
    frames
        .characters
        .get(key)
        .cloned()
        .ok_or_else(|| WorldLoadError::MissingGraphic {
            layer: ENTITIES_LAYER,
            object_id: object.id,
            key: key.to_string(),
        })
}

fn actor_entity(center: Vec2, actor: Actor, settings: &Settings) -> Entity {
    Entity::actor(
        center,
        actor,
        settings.depths.main,
        settings.actor.hitbox_width_shrink,
        settings.actor.hitbox_height_shrink,
    )
}

fn split_dialog(raw: &str) -> Vec<String> {
    raw.split(DIALOG_SEPARATOR)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(x: f32, y: f32, width: f32, height: f32) -> MapObject {
        MapObject {
            id: 1,
            name: String::new(),
            x,
            y,
            width,
            height,
            gid: None,
            properties: Default::default(),
        }
    }

    #[test]
    fn water_grid_covers_footprint_in_tile_steps() {
        let cells = tile_grid(&object(64.0, 0.0, 128.0, 100.0), 64.0);
        assert_eq!(
            cells,
            vec![
                Vec2::new(64.0, 0.0),
                Vec2::new(64.0, 64.0),
                Vec2::new(128.0, 0.0),
                Vec2::new(128.0, 64.0),
            ]
        );
        assert!(tile_grid(&object(0.0, 0.0, 0.0, 64.0), 64.0).is_empty());
    }

    #[test]
    fn dialog_lines_split_on_bars() {
        assert_eq!(
            split_dialog("Hi there| Nice day ||Bye"),
            vec!["Hi there".to_string(), "Nice day".to_string(), "Bye".to_string()]
        );
        assert!(split_dialog("  ").is_empty());
    }

    #[test]
    fn missing_property_names_layer_and_object() {
        let error = required(&object(0.0, 0.0, 1.0, 1.0), COAST_LAYER, "side")
            .expect_err("missing");
        assert_eq!(
            error.to_string(),
            "object 1 in layer 'Coast' is missing property 'side'"
        );
    }
}
