use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use pyiam_engine::{
    Canvas, ImageCache, InputAction, InputSnapshot, MapError, Scene, SceneCommand, SceneError,
    Surface, TileMap, Vec2,
};
use tempfile::TempDir;

use super::actors::{CharacterFrames, Direction};
use super::assets::{import_coast, GameFrames};
use super::group::Subgroup;
use super::scene::{OverworldError, OverworldScene};
use super::settings::Settings;
use super::sprites::{EntityId, EntityKind};
use super::world_loader::{load_world, World, WorldLoadError};

const DT: f32 = 1.0 / 30.0;
const PLAYER_COLOR: [u8; 4] = [200, 0, 0, 255];
const GRASS_COLOR: [u8; 4] = [0, 120, 0, 255];

const HOUSE_PLAYER: &str = r#"
  <object id="20" name="Player" x="100" y="100">
   <properties>
    <property name="pos" value="house"/>
    <property name="direction" value="down"/>
   </properties>
  </object>
  <object id="21" name="Player" x="300" y="400">
   <properties>
    <property name="pos" value="hospital"/>
    <property name="direction" value="up"/>
   </properties>
  </object>"#;

fn player_at(start: &str, x: f32, y: f32, direction: &str) -> String {
    format!(
        r#"
  <object id="30" name="Player" x="{x}" y="{y}">
   <properties>
    <property name="pos" value="{start}"/>
    <property name="direction" value="{direction}"/>
   </properties>
  </object>"#
    )
}

fn character_at(id: u32, graphic: &str, x: f32, y: f32, dialog: &str) -> String {
    format!(
        r#"
  <object id="{id}" name="{graphic}" x="{x}" y="{y}">
   <properties>
    <property name="graphic" value="{graphic}"/>
    <property name="direction" value="down"/>
    <property name="dialog" value="{dialog}"/>
   </properties>
  </object>"#
    )
}

fn exit_at(x: f32, y: f32, map: &str, start: &str) -> String {
    format!(
        r#"
 <objectgroup id="9" name="Transition">
  <object id="40" x="{x}" y="{y}" width="64" height="64">
   <properties>
    <property name="target" value="{map}"/>
    <property name="pos" value="{start}"/>
   </properties>
  </object>
 </objectgroup>"#
    )
}

/// An 8x8 map of 64px tiles: a tree collidable at (192, 0), a "top" tree at
/// (0, 0), a grass patch at (384, 384), water at (128, 256) and a border
/// along the top edge.
fn map_xml(entities: &str, extra_layers: &str) -> String {
    let terrain = vec!["1"; 64].join(",");
    let empty = vec!["0"; 64].join(",");
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.10" orientation="orthogonal" renderorder="right-down" width="8" height="8" tilewidth="64" tileheight="64" infinite="0">
 <tileset firstgid="1" name="overworld" tilewidth="64" tileheight="128" tilecount="3" columns="0">
  <grid orientation="orthogonal" width="1" height="1"/>
  <tile id="0"><image source="../graphics/grass.png" width="64" height="64"/></tile>
  <tile id="1"><image source="../graphics/tree.png" width="64" height="128"/></tile>
  <tile id="2"><image source="../graphics/patch.png" width="64" height="64"/></tile>
 </tileset>
 <layer id="1" name="Terrain" width="8" height="8">
  <data encoding="csv">{terrain}</data>
 </layer>
 <layer id="2" name="Terrain Top" width="8" height="8">
  <data encoding="csv">{empty}</data>
 </layer>
 <objectgroup id="3" name="Water">
  <object id="10" x="128" y="256" width="128" height="64"/>
 </objectgroup>
 <objectgroup id="4" name="Coast">
  <object id="11" x="256" y="256" width="64" height="64">
   <properties>
    <property name="terrain" value="grass"/>
    <property name="side" value="top"/>
   </properties>
  </object>
 </objectgroup>
 <objectgroup id="5" name="Objects">
  <object id="12" gid="2" x="192" y="128" width="64" height="128"/>
  <object id="13" name="top" gid="2" x="0" y="128" width="64" height="128"/>
 </objectgroup>
 <objectgroup id="6" name="Monsters">
  <object id="14" gid="3" x="384" y="448" width="64" height="64">
   <properties>
    <property name="biome" value="grass"/>
    <property name="monsters" value="slime,bat"/>
    <property name="level" value="3"/>
   </properties>
  </object>
 </objectgroup>
 <objectgroup id="7" name="Collisions">
  <object id="15" x="0" y="0" width="256" height="8"/>
 </objectgroup>
 <objectgroup id="8" name="Entities">{entities}
 </objectgroup>{extra_layers}
</map>
"#
    )
}

fn image_cache() -> ImageCache {
    let mut cache = ImageCache::default();
    cache.insert("graphics/grass.png", Surface::solid(64, 64, GRASS_COLOR));
    cache.insert("graphics/tree.png", Surface::solid(64, 128, [0, 60, 0, 255]));
    cache.insert("graphics/patch.png", Surface::solid(64, 64, [0, 200, 0, 255]));
    cache
}

fn parse_map(xml: &str, file: &str) -> Result<TileMap, MapError> {
    let mut cache = image_cache();
    TileMap::parse_str(xml, &Path::new("maps").join(file), &mut cache)
}

fn frames() -> GameFrames {
    let sheet = Surface::solid(256, 512, PLAYER_COLOR);
    let character = CharacterFrames::from_sheet(&sheet).expect("character frames");
    let mut characters = HashMap::new();
    characters.insert("player".to_string(), character.clone());
    characters.insert("nurse".to_string(), character);

    GameFrames {
        water: vec![
            Surface::solid(64, 64, [0, 0, 200, 255]),
            Surface::solid(64, 64, [0, 0, 180, 255]),
        ],
        coast: import_coast(&Surface::solid(24, 12, [90, 90, 0, 255]), Path::new("coast.png"))
            .expect("coast"),
        characters,
    }
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.encounter.seed = Some(7);
    settings
}

fn world_from(entities: &str, extra_layers: &str, start: &str) -> Result<World, WorldLoadError> {
    let map = parse_map(&map_xml(entities, extra_layers), "world.tmx")?;
    load_world(&map, "world", start, &settings(), &frames())
}

struct Harness {
    _temp: TempDir,
    snapshot_path: PathBuf,
    scene: OverworldScene,
}

fn scene_with(world_entities: &str, world_extra: &str) -> Harness {
    let mut maps = BTreeMap::new();
    maps.insert(
        "world".to_string(),
        parse_map(&map_xml(world_entities, world_extra), "world.tmx").expect("world map"),
    );
    let hospital_entities = player_at("world", 288.0, 96.0, "down");
    maps.insert(
        "hospital".to_string(),
        parse_map(&map_xml(&hospital_entities, ""), "hospital.tmx").expect("hospital map"),
    );

    let temp = TempDir::new().expect("temp");
    let snapshot_path = temp.path().join("gamesave.json");
    let scene = OverworldScene::new(settings(), frames(), maps, snapshot_path.clone())
        .expect("scene");
    Harness {
        _temp: temp,
        snapshot_path,
        scene,
    }
}

fn idle() -> InputSnapshot {
    InputSnapshot::empty()
}

fn holding(action: InputAction) -> InputSnapshot {
    InputSnapshot::empty().with_action_down(action, true)
}

fn interact() -> InputSnapshot {
    InputSnapshot::empty().with_interact_pressed(true)
}

fn tick(scene: &mut OverworldScene, input: &InputSnapshot) -> SceneCommand {
    scene.update(DT, input).expect("update")
}

fn player_center(scene: &OverworldScene) -> Vec2 {
    scene.world().player_center()
}

fn player_blocked(scene: &OverworldScene) -> bool {
    let world = scene.world();
    world
        .sprites
        .actor(world.player)
        .expect("player actor")
        .is_blocked()
}

fn characters(world: &World) -> Vec<EntityId> {
    world.sprites.members(Subgroup::Characters).to_vec()
}

#[test]
fn scenario_a_player_spawns_at_matching_start() {
    let world = world_from(HOUSE_PLAYER, "", "house").expect("world");

    let players = world
        .sprites
        .iter()
        .filter(|(_, entity)| entity.as_actor().is_some_and(|actor| actor.is_player()))
        .map(|(id, _)| id)
        .collect::<Vec<_>>();
    assert_eq!(players, vec![world.player]);
    assert_eq!(world.player_center(), Vec2::new(100.0, 100.0));
    let player = world.sprites.actor(world.player).expect("actor");
    assert_eq!(player.facing(), Direction::Down);

    let other = world_from(HOUSE_PLAYER, "", "hospital").expect("world");
    assert_eq!(other.player_center(), Vec2::new(300.0, 400.0));
    assert_eq!(
        other.sprites.actor(other.player).expect("actor").facing(),
        Direction::Up
    );
}

#[test]
fn loader_fills_collision_monster_and_character_subgroups() {
    let entities = format!(
        "{HOUSE_PLAYER}{}",
        character_at(31, "nurse", 400.0, 100.0, "Hello")
    );
    let world = world_from(&entities, &exit_at(0.0, 448.0, "hospital", "world"), "house")
        .expect("world");
    let sprites = &world.sprites;
    let settings = settings();

    let collision_kinds = sprites
        .members(Subgroup::Collision)
        .iter()
        .map(|id| match &sprites.get(*id).expect("entity").kind {
            EntityKind::Collidable(_) => "collidable",
            EntityKind::Border => "border",
            EntityKind::Actor(_) => "character",
            _ => "other",
        })
        .collect::<Vec<_>>();
    assert_eq!(collision_kinds, vec!["collidable", "border", "character"]);
    assert!(!sprites.is_member(Subgroup::Collision, world.player));

    let top = sprites
        .iter()
        .find(|(_, entity)| entity.depth == settings.depths.top)
        .map(|(id, _)| id)
        .expect("top object");
    assert!(!sprites.is_member(Subgroup::Collision, top));

    let monsters = sprites.members(Subgroup::Monsters);
    assert_eq!(monsters.len(), 1);
    let patch = sprites.get(monsters[0]).and_then(|e| e.as_patch()).expect("patch");
    assert_eq!(patch.monsters, vec!["slime".to_string(), "bat".to_string()]);
    assert_eq!(patch.level, 3);

    assert_eq!(sprites.members(Subgroup::Transitions).len(), 1);
    assert_eq!(characters(&world).len(), 1);

    let water = sprites
        .iter()
        .filter(|(_, entity)| entity.depth == settings.depths.water)
        .count();
    assert_eq!(water, 2);
    let terrain = sprites
        .iter()
        .filter(|(_, entity)| matches!(entity.kind, EntityKind::Sprite(_)))
        .filter(|(_, entity)| entity.depth == settings.depths.background)
        .count();
    assert_eq!(terrain, 64);
}

#[test]
fn every_hitbox_in_a_loaded_world_is_inside_its_rect() {
    let world = world_from(HOUSE_PLAYER, "", "house").expect("world");
    for (_, entity) in world.sprites.iter() {
        if matches!(entity.kind, EntityKind::Collidable(_) | EntityKind::Border) {
            assert!(entity.rect.contains_rect(&entity.hitbox));
        }
    }
}

#[test]
fn missing_layer_aborts_the_load() {
    let xml = map_xml(HOUSE_PLAYER, "").replace(r#"name="Coast""#, r#"name="Shore""#);
    let map = parse_map(&xml, "world.tmx").expect("map");
    let result = load_world(&map, "world", "house", &settings(), &frames());
    assert!(matches!(
        result,
        Err(WorldLoadError::Map(MapError::MissingLayer { layer, .. })) if layer == "Coast"
    ));
}

#[test]
fn missing_property_and_graphic_are_fatal() {
    let xml = map_xml(HOUSE_PLAYER, "").replace(r#"<property name="level" value="3"/>"#, "");
    let map = parse_map(&xml, "world.tmx").expect("map");
    assert!(matches!(
        load_world(&map, "world", "house", &settings(), &frames()),
        Err(WorldLoadError::MissingProperty {
            property: "level",
            object_id: 14,
            ..
        })
    ));

    let entities = format!("{HOUSE_PLAYER}{}", character_at(31, "ghost", 400.0, 100.0, ""));
    assert!(matches!(
        world_from(&entities, "", "house"),
        Err(WorldLoadError::MissingGraphic { key, .. }) if key == "ghost"
    ));

    let xml = map_xml(HOUSE_PLAYER, "").replace(r#"value="3""#, r#"value="three""#);
    let map = parse_map(&xml, "world.tmx").expect("map");
    assert!(matches!(
        load_world(&map, "world", "house", &settings(), &frames()),
        Err(WorldLoadError::InvalidProperty { property: "level", .. })
    ));
}

#[test]
fn unknown_or_duplicate_start_is_rejected() {
    assert!(matches!(
        world_from(HOUSE_PLAYER, "", "cave"),
        Err(WorldLoadError::NoPlayerStart { start, .. }) if start == "cave"
    ));

    let entities = format!(
        "{}{}",
        player_at("house", 10.0, 10.0, "down"),
        player_at("house", 50.0, 50.0, "down")
    );
    assert!(matches!(
        world_from(&entities, "", "house"),
        Err(WorldLoadError::DuplicatePlayerStart { .. })
    ));
}

#[test]
fn player_movement_stops_at_collidable_hitbox() {
    let mut harness = scene_with(&player_at("house", 100.0, 100.0, "down"), "");
    let scene = &mut harness.scene;

    for _ in 0..60 {
        tick(scene, &holding(InputAction::MoveRight));
    }

    let world = scene.world();
    let player = world.player_entity().expect("player");
    assert_eq!(player.hitbox.right(), 192.0);
    assert_eq!(player.rect.center().y, 100.0);
    assert_eq!(
        world.sprites.actor(world.player).expect("actor").facing(),
        Direction::Right
    );
}

#[test]
fn interact_starts_dialog_with_nearest_character_and_blocks_player() {
    let entities = format!(
        "{}{}{}",
        player_at("house", 100.0, 100.0, "right"),
        character_at(31, "nurse", 180.0, 110.0, "Far away"),
        character_at(32, "nurse", 160.0, 95.0, "Hello|Bye"),
    );
    let mut harness = scene_with(&entities, "");
    let scene = &mut harness.scene;
    let ids = characters(scene.world());
    let nearer = ids[1];

    tick(scene, &interact());

    let dialog = scene.dialog().expect("dialog");
    assert_eq!(dialog.character(), nearer);
    assert_eq!(dialog.current_line(), "Hello");
    assert!(player_blocked(scene));
    let nurse = scene.world().sprites.actor(nearer).expect("nurse");
    assert_eq!(nurse.facing(), Direction::Left);

    let before = player_center(scene);
    tick(scene, &holding(InputAction::MoveLeft));
    assert_eq!(player_center(scene), before);

    tick(scene, &interact());
    assert_eq!(scene.dialog().expect("dialog").current_line(), "Bye");
    tick(scene, &interact());
    assert!(scene.dialog().is_none());

    tick(scene, &holding(InputAction::MoveLeft));
    assert!(!player_blocked(scene));
    assert!(player_center(scene).x < before.x);
}

#[test]
fn interact_ignores_characters_behind_the_player() {
    let entities = format!(
        "{}{}",
        player_at("house", 100.0, 100.0, "left"),
        character_at(31, "nurse", 160.0, 100.0, "Hi"),
    );
    let mut harness = scene_with(&entities, "");
    tick(&mut harness.scene, &interact());
    assert!(harness.scene.dialog().is_none());
    assert!(!player_blocked(&harness.scene));
}

#[test]
fn scenario_b_encounters_come_from_the_patch() {
    let mut harness = scene_with(&player_at("grass", 416.0, 416.0, "down"), "");
    let scene = &mut harness.scene;
    let mut encounters = 0;
    for _ in 0..3_000 {
        tick(scene, &idle());
        if scene.encounters().elapsed() == 0.0 {
            if let Some(encounter) = scene.last_encounter() {
                assert!(["slime", "bat"].contains(&encounter.monster.as_str()));
                assert_eq!(encounter.level, 3);
                assert_eq!(encounter.biome, "grass");
                encounters += 1;
            }
        }
    }
    assert!(encounters > 0);
}

#[test]
fn encounter_timers_stay_reset_outside_patches() {
    let mut harness = scene_with(&player_at("house", 100.0, 100.0, "down"), "");
    for _ in 0..200 {
        tick(&mut harness.scene, &idle());
        assert_eq!(harness.scene.encounters().elapsed(), 0.0);
        assert_eq!(harness.scene.encounters().cooldown(), 0.5);
    }
    assert!(harness.scene.last_encounter().is_none());
}

#[test]
fn scenario_c_transition_swaps_world_exactly_once() {
    let mut harness = scene_with(
        &player_at("house", 32.0, 480.0, "down"),
        &exit_at(0.0, 448.0, "hospital", "world"),
    );
    let scene = &mut harness.scene;

    tick(scene, &idle());
    assert_eq!(
        scene.tint().pending_target().map(|target| target.map.as_str()),
        Some("hospital")
    );
    assert!(player_blocked(scene));

    tick(scene, &holding(InputAction::MoveRight));
    assert_eq!(player_center(scene), Vec2::new(32.0, 480.0));

    let mut swaps = 0;
    let mut map_id = scene.world().map_id.clone();
    for _ in 0..60 {
        tick(scene, &idle());
        if scene.world().map_id != map_id {
            swaps += 1;
            map_id = scene.world().map_id.clone();
            assert!(scene.tint().pending_target().is_none());
        }
        assert!((0.0..=255.0).contains(&scene.tint().progress()));
    }

    assert_eq!(swaps, 1);
    assert_eq!(map_id, "hospital");
    assert_eq!(player_center(scene), Vec2::new(288.0, 96.0));
    assert_eq!(scene.tint().progress(), 0.0);

    tick(scene, &holding(InputAction::MoveDown));
    assert!(!player_blocked(scene));
    assert!(player_center(scene).y > 96.0);
}

fn run_until_failure(scene: &mut OverworldScene) -> SceneError {
    for _ in 0..30 {
        if let Err(error) = scene.update(DT, &idle()) {
            return error;
        }
    }
    panic!("scene kept running");
}

fn assert_old_world_kept(scene: &OverworldScene, map: &str) {
    assert_eq!(scene.world().map_id, "world");
    assert_eq!(player_center(scene), Vec2::new(32.0, 480.0));
    assert_eq!(
        scene.tint().pending_target().map(|target| target.map.as_str()),
        Some(map)
    );
}

#[test]
fn transition_to_unknown_map_fails_the_scene() {
    let mut harness = scene_with(
        &player_at("house", 32.0, 480.0, "down"),
        &exit_at(0.0, 448.0, "moon", "crater"),
    );
    let scene = &mut harness.scene;

    let failure = run_until_failure(scene);

    assert!(failure.to_string().contains("moon"));
    assert!(matches!(
        failure.downcast_ref::<OverworldError>(),
        Some(OverworldError::UnknownMap { map_id }) if map_id == "moon"
    ));
    assert_old_world_kept(scene, "moon");
    assert!(scene.update(DT, &idle()).is_err());
    assert_old_world_kept(scene, "moon");
}

#[test]
fn transition_to_missing_start_keeps_the_old_world() {
    let mut harness = scene_with(
        &player_at("house", 32.0, 480.0, "down"),
        &exit_at(0.0, 448.0, "hospital", "cave"),
    );
    let scene = &mut harness.scene;

    let failure = run_until_failure(scene);

    assert!(matches!(
        failure.downcast_ref::<OverworldError>(),
        Some(OverworldError::World {
            map_id,
            source: WorldLoadError::NoPlayerStart { start, .. },
            ..
        }) if map_id == "hospital" && start == "cave"
    ));
    assert_old_world_kept(scene, "hospital");
}

#[test]
fn sand_patches_sit_below_main_depth() {
    let sand_patch = r#"<objectgroup id="6" name="Monsters">
  <object id="16" gid="3" x="64" y="448" width="64" height="64">
   <properties>
    <property name="biome" value="sand"/>
    <property name="monsters" value="crab"/>
    <property name="level" value="5"/>
   </properties>
  </object>"#;
    let xml = map_xml(HOUSE_PLAYER, "")
        .replace(r#"<objectgroup id="6" name="Monsters">"#, sand_patch);
    let map = parse_map(&xml, "world.tmx").expect("map");
    let world = load_world(&map, "world", "house", &settings(), &frames()).expect("world");
    let depths = settings().depths;

    let patch_depths = world
        .sprites
        .members(Subgroup::Monsters)
        .iter()
        .map(|id| {
            let entity = world.sprites.get(*id).expect("entity");
            let patch = entity.as_patch().expect("patch");
            (patch.biome.as_str(), entity.depth)
        })
        .collect::<Vec<_>>();
    assert_eq!(
        patch_depths,
        vec![("sand", depths.background), ("grass", depths.main)]
    );
}

#[test]
fn quit_writes_position_snapshot() {
    let mut harness = scene_with(&player_at("house", 100.0, 100.0, "down"), "");

    let command = tick(&mut harness.scene, &InputSnapshot::empty().with_quit_requested(true));

    assert_eq!(command, SceneCommand::Quit);
    let raw = fs::read_to_string(&harness.snapshot_path).expect("snapshot");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(value, serde_json::json!({ "pos_x": 100.0, "pos_y": 100.0 }));
}

#[test]
fn render_centers_player_over_terrain() {
    let mut harness = scene_with(&player_at("house", 100.0, 100.0, "down"), "");
    let scene = &mut harness.scene;
    let mut frame = vec![0u8; 320 * 180 * 4];
    let mut canvas = Canvas::new(&mut frame, 320, 180);

    scene.render(&mut canvas);

    assert_eq!(canvas.pixel(160, 90), Some(PLAYER_COLOR));
    assert_eq!(canvas.pixel(300, 170), Some(GRASS_COLOR));
    assert_eq!(scene.debug_title().as_deref(), Some("Pyiam - world"));
    assert!(scene.entity_count() > 64);
}
