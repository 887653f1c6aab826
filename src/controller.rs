use std::time::Duration;
use tracing::trace;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crate::dataset::DatasetName;
use crate::domain::{DVConfig, DVError, Message};
use crate::model::Model;

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &DVConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, DVError> {
        // Resize needs no message, every loop iteration draws at the current size.
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            return Ok(self.handle_key(key, model.showing_popup()));
        }
        Ok(None)
    }

    fn handle_key(&self, key: KeyEvent, popup: bool) -> Option<Message> {
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Esc => Some(Message::Exit),
            // Any other key closes the help popup.
            _ if popup => Some(Message::Exit),
            KeyCode::Tab => Some(Message::NextDataset),
            KeyCode::BackTab => Some(Message::PrevDataset),
            KeyCode::Char('1') => Some(Message::SelectDataset(DatasetName::Cust)),
            KeyCode::Char('2') => Some(Message::SelectDataset(DatasetName::Claim)),
            KeyCode::Char('3') => Some(Message::SelectDataset(DatasetName::Cntt)),
            KeyCode::Char('v') => Some(Message::NextView),
            KeyCode::Char('V') => Some(Message::PrevView),
            KeyCode::Right => Some(Message::NextColumn),
            KeyCode::Left => Some(Message::PrevColumn),
            KeyCode::Down => Some(Message::NextGroup),
            KeyCode::Up => Some(Message::PrevGroup),
            KeyCode::Char('+') | KeyCode::Char('=') => Some(Message::MoreBins),
            KeyCode::Char('-') => Some(Message::FewerBins),
            KeyCode::Enter => Some(Message::Trigger),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}
