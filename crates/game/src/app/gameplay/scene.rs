use std::collections::BTreeMap;
use std::path::PathBuf;

use pyiam_engine::{
    text_width, Canvas, InputAction, InputSnapshot, Scene, SceneCommand, SceneError, TileMap,
    Vec2,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info};

use super::actors::{in_interaction_range, ActorRole};
use super::assets::GameFrames;
use super::dialog::{DialogSession, DialogStep};
use super::encounter::{Encounter, EncounterState};
use super::group::Subgroup;
use super::save::{write_snapshot, SaveError};
use super::settings::Settings;
use super::sprites::EntityId;
use super::transition::TintState;
use super::world_loader::{load_world, World, WorldLoadError};

const CLEAR_COLOR: [u8; 4] = [0, 0, 0, 255];
const TINT_RGB: [u8; 3] = [0, 0, 0];
const BANNER_SCALE: i32 = 3;
const BANNER_TOP: i32 = 32;
const BANNER_COLOR: [u8; 4] = [255, 255, 255, 255];
const BANNER_SHADOW: [u8; 4] = [0, 0, 0, 200];

#[derive(Debug, Error)]
pub(crate) enum OverworldError {
    #[error("map '{map_id}' is not in the map catalog")]
    UnknownMap { map_id: String },
    #[error("failed to build world '{map_id}' at '{start}': {source}")]
    World {
        map_id: String,
        start: String,
        #[source]
        source: WorldLoadError,
    },
    #[error(transparent)]
    Save(#[from] SaveError),
}

/// The overworld game loop: input, entity update, encounters, transitions, draw.
pub(crate) struct OverworldScene {
    settings: Settings,
    frames: GameFrames,
    maps: BTreeMap<String, TileMap>,
    world: World,
    tint: TintState,
    encounters: EncounterState,
    rng: StdRng,
    dialog: Option<DialogSession>,
    last_encounter: Option<Encounter>,
    banner_seconds_left: f32,
    snapshot_path: PathBuf,
}

impl OverworldScene {
    pub(crate) fn new(
        settings: Settings,
        frames: GameFrames,
        maps: BTreeMap<String, TileMap>,
        snapshot_path: PathBuf,
    ) -> Result<Self, OverworldError> {
        let world = build_world(
            &maps,
            &settings,
            &frames,
            &settings.start_map,
            &settings.start_pos,
        )?;
        let rng = match settings.encounter.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            tint: TintState::new(settings.tint_speed),
            encounters: EncounterState::new(settings.encounter),
            settings,
            frames,
            maps,
            world,
            rng,
            dialog: None,
            last_encounter: None,
            banner_seconds_left: 0.0,
            snapshot_path,
        })
    }

    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    pub(crate) fn tint(&self) -> &TintState {
        &self.tint
    }

    pub(crate) fn encounters(&self) -> &EncounterState {
        &self.encounters
    }

    pub(crate) fn dialog(&self) -> Option<&DialogSession> {
        self.dialog.as_ref()
    }

    pub(crate) fn last_encounter(&self) -> Option<&Encounter> {
        self.last_encounter.as_ref()
    }

    fn step(&mut self, dt: f32, input: &InputSnapshot) -> Result<SceneCommand, OverworldError> {
        if input.quit_requested() {
            write_snapshot(&self.snapshot_path, self.world.player_center().into())?;
            info!(map = %self.world.map_id, "quit_requested");
            return Ok(SceneCommand::Quit);
        }

        if input.interact_pressed() {
            if self.dialog.is_some() {
                self.advance_dialog();
            } else {
                self.try_start_dialog();
            }
        }

        self.apply_player_control(input);
        self.world.sprites.update(dt);

        if self.dialog.is_none() {
            self.check_encounter(dt);
        }

        self.check_transition();
        self.advance_tint(dt)?;

        self.banner_seconds_left = (self.banner_seconds_left - dt).max(0.0);
        Ok(SceneCommand::None)
    }

    fn apply_player_control(&mut self, input: &InputSnapshot) {
        let locked = self.dialog.is_some() || self.tint.blocks_movement();
        let Some(player) = self.world.sprites.actor_mut(self.world.player) else {
            return;
        };
        if locked {
            player.block();
            return;
        }
        player.unblock();
        player.set_direction(movement_vector(input));
    }

    fn try_start_dialog(&mut self) {
        let player_id = self.world.player;
        let Some(player_entity) = self.world.sprites.get(player_id) else {
            return;
        };
        let Some(player_facing) = player_entity.as_actor().map(|actor| actor.facing()) else {
            return;
        };
        let player_center = player_entity.rect.center();
        let actor = self.settings.actor;

        let mut nearest: Option<(EntityId, f32)> = None;
        for id in self.world.sprites.members(Subgroup::Characters) {
            let Some(character) = self.world.sprites.get(*id) else {
                continue;
            };
            let center = character.rect.center();
            if !in_interaction_range(
                player_center,
                player_facing,
                center,
                actor.interaction_radius,
                actor.facing_tolerance,
            ) {
                continue;
            }
            let distance = (center - player_center).length();
            if nearest.map_or(true, |(_, best)| distance < best) {
                nearest = Some((*id, distance));
            }
        }
        let Some((character_id, _)) = nearest else {
            return;
        };

        if let Some(player) = self.world.sprites.actor_mut(player_id) {
            player.block();
        }
        let Some(character_entity) = self.world.sprites.get_mut(character_id) else {
            return;
        };
        let character_center = character_entity.rect.center();
        let Some(character) = character_entity.as_actor_mut() else {
            return;
        };
        character.face_towards(character_center, player_center, actor.facing_tolerance);
        character.lock_rotation();

        let speaker = match &character.role {
            ActorRole::Character { graphic, .. } => graphic.clone(),
            ActorRole::Player => String::new(),
        };
        info!(
            character = character_id.0,
            speaker = %speaker,
            facing = character.facing().as_str(),
            "dialog_started"
        );
        self.dialog = Some(DialogSession::new(
            character_id,
            player_id,
            speaker,
            character.dialog_lines(),
        ));
    }

    fn advance_dialog(&mut self) {
        let Some(dialog) = self.dialog.as_mut() else {
            return;
        };
        let player = dialog.player();
        if let DialogStep::Finished { character } = dialog.advance() {
            self.end_dialog(character, player);
        }
    }

    /// Completion callback of a dialog session.
    fn end_dialog(&mut self, character: EntityId, player: EntityId) {
        self.dialog = None;
        if let Some(actor) = self.world.sprites.actor_mut(character) {
            actor.unlock_rotation();
        }
        if let Some(actor) = self.world.sprites.actor_mut(player) {
            actor.unblock();
        }
        debug!(character = character.0, "dialog_ended");
    }

    fn check_encounter(&mut self, dt: f32) {
        let hitbox = self.world.player_hitbox();
        let patch = self
            .world
            .sprites
            .first_overlap(Subgroup::Monsters, &hitbox)
            .and_then(|id| self.world.sprites.get(id))
            .and_then(|entity| entity.as_patch());
        let Some(encounter) = self.encounters.step(dt, patch, &mut self.rng) else {
            return;
        };
        info!(
            monster = %encounter.monster,
            level = encounter.level,
            biome = %encounter.biome,
            "encounter_triggered"
        );
        self.banner_seconds_left = self.settings.encounter_banner_seconds;
        self.last_encounter = Some(encounter);
    }

    fn check_transition(&mut self) {
        let hitbox = self.world.player_hitbox();
        let Some(target) = self
            .world
            .sprites
            .first_overlap(Subgroup::Transitions, &hitbox)
            .and_then(|id| self.world.sprites.get(id))
            .and_then(|entity| entity.transition_target())
        else {
            return;
        };
        if self.tint.request(target) {
            if let Some(player) = self.world.sprites.actor_mut(self.world.player) {
                player.block();
            }
        }
    }

    fn advance_tint(&mut self, dt: f32) -> Result<(), OverworldError> {
        let mut next_world = None;
        let maps = &self.maps;
        let settings = &self.settings;
        let frames = &self.frames;
        self.tint.advance(dt, |target| {
            next_world = Some(build_world(maps, settings, frames, &target.map, &target.start)?);
            Ok::<_, OverworldError>(())
        })?;

        if let Some(world) = next_world {
            info!(
                from = %self.world.map_id,
                to = %world.map_id,
                entities = world.sprites.len(),
                "map_swap"
            );
            self.world = world;
            self.dialog = None;
            self.encounters.reset();
        }
        Ok(())
    }

    fn render_banner(&self, canvas: &mut Canvas<'_>) {
        if self.banner_seconds_left <= 0.0 {
            return;
        }
        let Some(encounter) = &self.last_encounter else {
            return;
        };
        let text = format!(
            "A wild {} (Lv {}) appeared!",
            encounter.monster, encounter.level
        );
        let x = (canvas.width() as i32 - text_width(&text, BANNER_SCALE)) / 2;
        canvas.draw_text(x + 2, BANNER_TOP + 2, &text, BANNER_SHADOW, BANNER_SCALE);
        canvas.draw_text(x, BANNER_TOP, &text, BANNER_COLOR, BANNER_SCALE);
    }
}

impl Scene for OverworldScene {
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
    ) -> Result<SceneCommand, SceneError> {
        self.step(fixed_dt_seconds, input).map_err(SceneError::new)
    }

    fn render(&mut self, canvas: &mut Canvas<'_>) {
        canvas.fill(CLEAR_COLOR);
        let focus = self.world.player_center();
        self.world.sprites.draw(canvas, focus);
        let alpha = self.tint.overlay_alpha();
        if alpha > 0 {
            canvas.overlay(TINT_RGB, alpha);
        }
        if let Some(dialog) = &self.dialog {
            dialog.render(canvas);
        }
        self.render_banner(canvas);
    }

    fn entity_count(&self) -> usize {
        self.world.sprites.len()
    }

    fn debug_title(&self) -> Option<String> {
        Some(format!("Pyiam - {}", self.world.map_id))
    }
}

fn build_world(
    maps: &BTreeMap<String, TileMap>,
    settings: &Settings,
    frames: &GameFrames,
    map_id: &str,
    start: &str,
) -> Result<World, OverworldError> {
    let map = maps.get(map_id).ok_or_else(|| OverworldError::UnknownMap {
        map_id: map_id.to_string(),
    })?;
    load_world(map, map_id, start, settings, frames).map_err(|source| OverworldError::World {
        map_id: map_id.to_string(),
        start: start.to_string(),
        source,
    })
}

fn movement_vector(input: &InputSnapshot) -> Vec2 {
    let axis = |negative: InputAction, positive: InputAction| {
        f32::from(u8::from(input.is_down(positive))) - f32::from(u8::from(input.is_down(negative)))
    };
    Vec2::new(
        axis(InputAction::MoveLeft, InputAction::MoveRight),
        axis(InputAction::MoveUp, InputAction::MoveDown),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_keys_cancel() {
        let input = InputSnapshot::empty()
            .with_action_down(InputAction::MoveLeft, true)
            .with_action_down(InputAction::MoveRight, true)
            .with_action_down(InputAction::MoveUp, true);
        assert_eq!(movement_vector(&input), Vec2::new(0.0, -1.0));
        assert_eq!(movement_vector(&InputSnapshot::empty()), Vec2::ZERO);
    }
}
