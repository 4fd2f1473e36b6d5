use colored::*;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{cursor, execute, terminal};
use std::io::{self, stderr};
use std::time::Duration;
use tracing::warn;

use pose_capture_core::session::{Key, KeyInput, KeyKind};
use pose_capture_core::{AppConfig, Error, InputSource};

/// Raw mode and hidden cursor for the duration of a capture session.
/// Restores the terminal when dropped, including on error paths.
pub struct TerminalGuard {
    enhanced: bool,
}

impl TerminalGuard {
    pub fn enter(want_key_release: bool) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        // from here on, an early return restores the terminal through Drop
        let mut guard = Self { enhanced: false };
        execute!(stderr(), cursor::Hide)?;

        if want_key_release && terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                stderr(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            guard.enhanced = true;
        }
        Ok(guard)
    }

    /// Whether the terminal delivers key-release events.
    pub fn reports_key_release(&self) -> bool {
        self.enhanced
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = execute!(stderr(), PopKeyboardEnhancementFlags);
        }
        let _ = execute!(stderr(), cursor::Show);
        if let Err(err) = terminal::disable_raw_mode() {
            warn!("Could not restore terminal: {}", err);
        }
    }
}

/// Non-blocking keyboard polling through crossterm.
pub struct TerminalInput;

impl InputSource for TerminalInput {
    fn poll(&mut self) -> Result<Option<KeyInput>, Error> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key_event) = event::read()? {
                return Ok(Some(to_key_input(key_event)));
            }
        }
        Ok(None)
    }
}

fn to_key_input(event: KeyEvent) -> KeyInput {
    let kind = match event.kind {
        KeyEventKind::Press => KeyKind::Press,
        KeyEventKind::Repeat => KeyKind::Repeat,
        KeyEventKind::Release => KeyKind::Release,
    };
    let key = match event.code {
        // raw mode swallows SIGINT
        KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => Key::Esc,
        KeyCode::Char(' ') => Key::Space,
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Enter => Key::Enter,
        KeyCode::Esc => Key::Esc,
        KeyCode::F(n) => Key::F(n),
        _ => Key::Other,
    };
    KeyInput { key, kind }
}

/// Printed before the terminal enters raw mode.
pub fn print_banner(config: &AppConfig) {
    let rule = "═══════════════════════════════════════════════";
    let _ = execute!(
        stderr(),
        terminal::Clear(terminal::ClearType::All),
        cursor::MoveTo(0, 0)
    );
    eprintln!("{}", rule.cyan());
    eprintln!("{}", "             POSE CAPTURE DATA COLLECTOR".cyan());
    eprintln!("{}", rule.cyan());
    eprintln!("{}", capture_hint(config).yellow());
    eprintln!();
    eprintln!("{}", "Available poses:".green());
    for (slot, pose) in config.poses.iter().enumerate() {
        eprintln!("  {}. {}", slot + 1, pose);
    }
    if config.max_persons > 0 {
        eprintln!(
            "{}",
            format!(
                "Persons: F1..F{} ({} samples each, auto-advance)",
                config.max_persons, config.max_samples
            )
            .green()
        );
    }
    eprintln!();
}

fn capture_hint(config: &AppConfig) -> &'static str {
    use pose_capture_core::config::CaptureMode;
    match config.capture_mode {
        CaptureMode::Manual => "Digit = pose | SPACE/ENTER = capture | q/ESC = quit",
        CaptureMode::Hold => "Digit = pose | hold SPACE = stream | ENTER = capture | q/ESC = quit",
        CaptureMode::Burst => "Digit = pose | SPACE = start/stop burst | ENTER = capture | q/ESC = quit",
    }
}
