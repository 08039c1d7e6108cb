use rand::Rng;

use super::settings::EncounterSettings;
use super::sprites::MonsterPatch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Encounter {
    pub(crate) monster: String,
    pub(crate) level: u32,
    pub(crate) biome: String,
}

/// Dwell timers shared by every patch in the session.
#[derive(Debug, Clone)]
pub(crate) struct EncounterState {
    elapsed: f32,
    cooldown: f32,
    settings: EncounterSettings,
}

impl EncounterState {
    pub(crate) fn new(settings: EncounterSettings) -> Self {
        Self {
            elapsed: 0.0,
            cooldown: settings.cooldown_seconds,
            settings,
        }
    }

    pub(crate) fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub(crate) fn cooldown(&self) -> f32 {
        self.cooldown
    }

    pub(crate) fn reset(&mut self) {
        self.elapsed = 0.0;
        self.cooldown = self.settings.cooldown_seconds;
    }

    /// Trigger probability for the current dwell time, capped at `max_chance`.
    pub(crate) fn chance(&self) -> f64 {
        let s = &self.settings;
        let past_threshold = (self.elapsed - s.threshold_seconds).max(0.0);
        let chance = s.base_chance + past_threshold * s.chance_growth_per_second;
        f64::from(chance.min(s.max_chance).max(0.0))
    }

    /// One frame of encounter evaluation. `patch` is the first monster patch
    /// overlapping the player, if any.
    pub(crate) fn step<R: Rng + ?Sized>(
        &mut self,
        dt: f32,
        patch: Option<&MonsterPatch>,
        rng: &mut R,
    ) -> Option<Encounter> {
        let Some(patch) = patch else {
            self.reset();
            return None;
        };

        self.elapsed += dt;
        if self.elapsed < self.settings.threshold_seconds {
            return None;
        }
        self.cooldown -= dt;
        if self.cooldown > 0.0 {
            return None;
        }
        self.cooldown = self.settings.cooldown_seconds;

        if rng.gen::<f64>() >= self.chance() {
            return None;
        }
        // cooldown keeps its freshly re-armed value
        self.elapsed = 0.0;
        let monster = patch.monsters[rng.gen_range(0..patch.monsters.len())].clone();
        Some(Encounter {
            monster,
            level: patch.level,
            biome: patch.biome.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const DT: f32 = 1.0 / 30.0;

    fn patch() -> MonsterPatch {
        MonsterPatch::new("grass", "slime,bat", 3).expect("patch")
    }

    /// An rng whose `gen::<f64>()` is always 0.0, so every roll succeeds.
    fn always_hit() -> StepRng {
        StepRng::new(0, 0)
    }

    /// An rng whose rolls land just under 1.0, so every roll fails.
    fn always_miss() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    #[test]
    fn nothing_happens_before_threshold() {
        let mut state = EncounterState::new(EncounterSettings::default());
        let mut rng = always_hit();
        let patch = patch();
        for _ in 0..74 {
            assert!(state.step(DT, Some(&patch), &mut rng).is_none());
        }
        assert_eq!(state.cooldown(), 0.5);
    }

    #[test]
    fn leaving_the_patch_resets_both_timers() {
        let mut state = EncounterState::new(EncounterSettings::default());
        let mut rng = always_miss();
        let patch = patch();
        for frames in [1usize, 80, 200] {
            for _ in 0..frames {
                state.step(DT, Some(&patch), &mut rng);
            }
            assert!(state.step(DT, None, &mut rng).is_none());
            assert_eq!(state.elapsed(), 0.0);
            assert_eq!(state.cooldown(), 0.5);
        }
    }

    #[test]
    fn misses_keep_accumulating() {
        let mut state = EncounterState::new(EncounterSettings::default());
        let mut rng = always_miss();
        let patch = patch();
        for _ in 0..300 {
            assert!(state.step(DT, Some(&patch), &mut rng).is_none());
        }
        assert!(state.elapsed() > 9.9);
        assert!(state.cooldown() > 0.0 && state.cooldown() <= 0.5);
    }

    #[test]
    fn hit_resets_elapsed_only() {
        let mut state = EncounterState::new(EncounterSettings::default());
        let mut rng = always_hit();
        let patch = patch();
        let mut encounter = None;
        for _ in 0..200 {
            encounter = state.step(DT, Some(&patch), &mut rng);
            if encounter.is_some() {
                break;
            }
        }

        let encounter = encounter.expect("encounter after threshold and cooldown");
        assert_eq!(encounter.level, 3);
        assert_eq!(encounter.biome, "grass");
        assert_eq!(state.elapsed(), 0.0);
        assert_eq!(state.cooldown(), 0.5);
    }

    #[test]
    fn encounters_pick_from_the_patch() {
        let mut state = EncounterState::new(EncounterSettings::default());
        let mut rng = StdRng::seed_from_u64(11);
        let patch = patch();
        let mut seen = Vec::new();
        for _ in 0..30_000 {
            if let Some(encounter) = state.step(DT, Some(&patch), &mut rng) {
                assert!(patch.monsters.contains(&encounter.monster));
                assert_eq!(encounter.level, 3);
                seen.push(encounter.monster);
            }
        }
        assert!(!seen.is_empty());
    }

    #[test]
    fn chance_grows_linearly_and_caps() {
        let mut state = EncounterState::new(EncounterSettings::default());
        let mut rng = always_miss();
        let patch = patch();
        let mut previous = state.chance();
        for _ in 0..3_000 {
            state.step(DT, Some(&patch), &mut rng);
            let chance = state.chance();
            assert!(chance >= previous - 1e-9);
            assert!(chance <= 0.5 + 1e-9);
            previous = chance;
        }
        assert!((state.chance() - 0.5).abs() < 1e-6);
    }
}
