use tracing::info;

use super::sprites::TransitionTarget;

pub(crate) const TINT_MAX: f32 = 255.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TintMode {
    Tinting,
    Untinting,
}

/// Full-screen fade that hides map swaps.
///
/// Progress lives in `[0, 255]`. A request switches to tinting; once progress
/// reaches the top while tinting, the swap runs exactly once and the machine
/// fades back out.
#[derive(Debug, Clone)]
pub(crate) struct TintState {
    progress: f32,
    mode: TintMode,
    speed: f32,
    target: Option<TransitionTarget>,
}

impl TintState {
    pub(crate) fn new(speed: f32) -> Self {
        Self {
            progress: 0.0,
            mode: TintMode::Untinting,
            speed,
            target: None,
        }
    }

    pub(crate) fn progress(&self) -> f32 {
        self.progress
    }

    #[cfg(test)]
    pub(crate) fn mode(&self) -> TintMode {
        self.mode
    }

    #[cfg(test)]
    pub(crate) fn pending_target(&self) -> Option<&TransitionTarget> {
        self.target.as_ref()
    }

    /// Player control is suspended while a swap is pending or the screen is tinted.
    pub(crate) fn blocks_movement(&self) -> bool {
        self.target.is_some() || self.progress > 0.0
    }

    pub(crate) fn overlay_alpha(&self) -> u8 {
        self.progress.clamp(0.0, TINT_MAX).round() as u8
    }

    /// Schedules a swap to `target`. Ignored while another target is pending.
    pub(crate) fn request(&mut self, target: &TransitionTarget) -> bool {
        if self.target.is_some() {
            return false;
        }
        info!(map = %target.map, start = %target.start, "transition_started");
        self.target = Some(target.clone());
        self.mode = TintMode::Tinting;
        true
    }

    /// Advances the fade by `dt`. Returns `Ok(true)` on the frame the swap ran.
    ///
    /// A failed swap leaves the target pending and the screen fully tinted.
    pub(crate) fn advance<E>(
        &mut self,
        dt: f32,
        mut swap: impl FnMut(&TransitionTarget) -> Result<(), E>,
    ) -> Result<bool, E> {
        let mut swapped = false;
        match self.mode {
            TintMode::Untinting => self.progress -= self.speed * dt,
            TintMode::Tinting => {
                self.progress += self.speed * dt;
                if self.progress >= TINT_MAX {
                    self.progress = TINT_MAX;
                    if let Some(target) = self.target.as_ref() {
                        swap(target)?;
                        swapped = true;
                    }
                    self.mode = TintMode::Untinting;
                    self.target = None;
                }
            }
        }
        self.progress = self.progress.clamp(0.0, TINT_MAX);
        Ok(swapped)
    }
}
