use pyiam_engine::{line_height, Canvas};
use tracing::debug;

use super::sprites::EntityId;

const FALLBACK_LINE: &str = "...";
const PANEL_MARGIN: i32 = 24;
const PANEL_HEIGHT: i32 = 120;
const PANEL_PADDING: i32 = 16;
const TEXT_SCALE: i32 = 3;
const PANEL_FILL: [u8; 4] = [20, 20, 28, 220];
const PANEL_BORDER: [u8; 4] = [230, 230, 230, 255];
const SPEAKER_COLOR: [u8; 4] = [250, 210, 90, 255];
const LINE_COLOR: [u8; 4] = [245, 245, 245, 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DialogStep {
    Continue,
    Finished { character: EntityId },
}

/// A conversation between the player and one character.
#[derive(Debug, Clone)]
pub(crate) struct DialogSession {
    character: EntityId,
    player: EntityId,
    speaker: String,
    lines: Vec<String>,
    index: usize,
}

impl DialogSession {
    /// Characters without lines still get a single placeholder line.
    pub(crate) fn new(
        character: EntityId,
        player: EntityId,
        speaker: impl Into<String>,
        lines: &[String],
    ) -> Self {
        let lines = if lines.is_empty() {
            vec![FALLBACK_LINE.to_string()]
        } else {
            lines.to_vec()
        };
        Self {
            character,
            player,
            speaker: speaker.into(),
            lines,
            index: 0,
        }
    }

    pub(crate) fn character(&self) -> EntityId {
        self.character
    }

    pub(crate) fn player(&self) -> EntityId {
        self.player
    }

    pub(crate) fn current_line(&self) -> &str {
        self.lines
            .get(self.index)
            .map(String::as_str)
            .unwrap_or(FALLBACK_LINE)
    }

    pub(crate) fn advance(&mut self) -> DialogStep {
        self.index += 1;
        if self.index >= self.lines.len() {
            debug!(character = self.character.0, "dialog_finished");
            return DialogStep::Finished {
                character: self.character,
            };
        }
        DialogStep::Continue
    }

    pub(crate) fn render(&self, canvas: &mut Canvas<'_>) {
        let width = canvas.width() as i32;
        let height = canvas.height() as i32;
        let panel_width = (width - PANEL_MARGIN * 2).max(0);
        let x = PANEL_MARGIN;
        let y = height - PANEL_HEIGHT - PANEL_MARGIN;

        canvas.fill_rect(x, y, panel_width, PANEL_HEIGHT, PANEL_FILL);
        canvas.stroke_rect(x, y, panel_width, PANEL_HEIGHT, PANEL_BORDER);
        let text_x = x + PANEL_PADDING;
        let text_y = y + PANEL_PADDING;
        canvas.draw_text(text_x, text_y, &self.speaker, SPEAKER_COLOR, TEXT_SCALE);
        canvas.draw_text(
            text_x,
            text_y + line_height(TEXT_SCALE) + PANEL_PADDING / 2,
            self.current_line(),
            LINE_COLOR,
            TEXT_SCALE,
        );
    }
}
