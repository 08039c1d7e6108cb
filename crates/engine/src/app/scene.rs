use std::error::Error as StdError;
use std::fmt;

use super::input::InputSnapshot;
use super::rendering::Canvas;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

/// Failure raised by a scene; the loop stops and the process exits with a failure code.
#[derive(Debug)]
pub struct SceneError(Box<dyn StdError + Send + Sync + 'static>);

impl SceneError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Box::new(error))
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for SceneError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

/// A single simulation owned by the loop. All state lives on the loop thread.
pub trait Scene {
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
    ) -> Result<SceneCommand, SceneError>;
    fn render(&mut self, canvas: &mut Canvas<'_>);
    fn entity_count(&self) -> usize;
    fn debug_title(&self) -> Option<String> {
        None
    }
}
