use super::Action;
use crate::config::CaptureMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Space,
    Enter,
    Esc,
    /// Function key `F<n>`.
    F(u8),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Press,
    Repeat,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub kind: KeyKind,
}

impl KeyInput {
    pub fn press(key: Key) -> Self {
        Self {
            key,
            kind: KeyKind::Press,
        }
    }

    pub fn release(key: Key) -> Self {
        Self {
            key,
            kind: KeyKind::Release,
        }
    }
}

/// Fixed key bindings for one session: digits pick poses, function keys pick
/// persons, space/enter capture, `q`/Esc quit.
#[derive(Debug, Clone)]
pub struct KeyMap {
    pose_count: usize,
    person_count: u32,
    mode: CaptureMode,
}

impl KeyMap {
    pub fn new(pose_count: usize, person_count: u32, mode: CaptureMode) -> Self {
        Self {
            pose_count,
            person_count,
            mode,
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn with_mode(&self, mode: CaptureMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }

    pub fn action(&self, input: KeyInput) -> Option<Action> {
        let key = match input.key {
            Key::Char(' ') => Key::Space,
            Key::Char('\r') | Key::Char('\n') => Key::Enter,
            key => key,
        };

        if input.kind == KeyKind::Release {
            return match (key, self.mode) {
                (Key::Space, CaptureMode::Hold) => Some(Action::StopCapture),
                _ => None,
            };
        }

        match key {
            Key::Esc | Key::Char('q') | Key::Char('Q') => Some(Action::Quit),
            Key::Char(c) => {
                let slot = c.to_digit(10)? as usize;
                (1..=self.pose_count)
                    .contains(&slot)
                    .then_some(Action::SelectPose(slot))
            }
            Key::F(n) => {
                let slot = u32::from(n);
                (1..=self.person_count)
                    .contains(&slot)
                    .then_some(Action::SelectPerson(slot))
            }
            Key::Enter => Some(Action::CaptureOnce),
            Key::Space => match self.mode {
                CaptureMode::Manual => Some(Action::CaptureOnce),
                CaptureMode::Hold => Some(Action::StartCapture),
                // auto-repeat would flip the burst on and off
                CaptureMode::Burst if input.kind == KeyKind::Repeat => None,
                CaptureMode::Burst => Some(Action::ToggleCapture),
            },
            Key::Other => None,
        }
    }
}
