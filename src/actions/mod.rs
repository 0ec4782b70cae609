//! # Action Boundary - Abstract OS commands and collaborator interfaces
//!
//! The translation engine never touches the OS directly. Every outcome of a
//! gesture or button event is expressed as an [`Action`] value and handed to
//! an [`ActionSink`]; window lookups go through a [`WindowProbe`]. Platform
//! backends (SendInput on Windows, uinput on Linux, ...) implement these two
//! traits; the engine stays portable and testable with the fakes in this
//! module.
//!
//! ## Error Handling Strategy
//! Target-resolution failures are normal, not errors: a cursor over the bare
//! desktop resolves to no window, and a window can vanish between resolution
//! and use. Sinks must treat an invalid or stale handle as a silent no-op.
//! Nothing at this boundary returns a `Result`; the worst case is always
//! "no action taken this tick".

use std::fmt;
use tracing::{debug, info};

/// Opaque handle to an OS window. Only ever produced by a [`WindowProbe`];
/// may go stale at any time, which sinks must tolerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

/// Window rectangle in physical screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// The virtual-screen area cursor coordinates map into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenExtent {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for ScreenExtent {
    fn default() -> Self {
        Self {
            left: 0,
            top: 0,
            width: 1920,
            height: 1080,
        }
    }
}

impl ScreenExtent {
    /// Width/height ratio, used to size the default control region.
    pub fn wh_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Keys the engine emits. Deliberately small; this is the engine's key
/// vocabulary, not a full keymap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Tab,
    Return,
    /// The OS/meta key (Windows key, Super).
    Super,
    Control,
    Alt,
    PrintScreen,
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAxis {
    Vertical,
    Horizontal,
}

/// Virtual-desktop operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopCommand {
    Next,
    Previous,
    New,
    Close,
}

/// Operations on a resolved window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCommand {
    Focus,
    Close,
    Minimize,
    Restore,
    /// Toggle between maximized and the regular window frame.
    MaxRestore,
    /// Reposition preserving the caller-computed rectangle.
    Move(Rect),
}

/// One abstract OS command. The engine emits these in order; a driver task
/// forwards them to the platform [`ActionSink`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    KeyDown(Key),
    KeyUp(Key),
    MouseDown(MouseButton),
    MouseUp(MouseButton),
    /// Absolute cursor position in physical screen pixels.
    MoveCursor { x: i32, y: i32 },
    /// `delta` in wheel units (multiples of the OS wheel tick).
    Scroll { axis: ScrollAxis, delta: i32 },
    Window {
        target: WindowHandle,
        command: WindowCommand,
    },
    Desktop(DesktopCommand),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Receiver for abstract OS commands.
///
/// Implementations must be safe to call with handles that no longer resolve;
/// every method is fire-and-forget.
pub trait ActionSink: Send {
    fn key_down(&mut self, key: Key);
    fn key_up(&mut self, key: Key);
    fn mouse_down(&mut self, button: MouseButton);
    fn mouse_up(&mut self, button: MouseButton);
    fn move_cursor(&mut self, x: i32, y: i32);
    fn scroll(&mut self, axis: ScrollAxis, delta: i32);
    fn window(&mut self, target: WindowHandle, command: WindowCommand);
    fn desktop(&mut self, command: DesktopCommand);

    /// Routes an [`Action`] value to the matching method.
    fn dispatch(&mut self, action: Action) {
        match action {
            Action::KeyDown(key) => self.key_down(key),
            Action::KeyUp(key) => self.key_up(key),
            Action::MouseDown(button) => self.mouse_down(button),
            Action::MouseUp(button) => self.mouse_up(button),
            Action::MoveCursor { x, y } => self.move_cursor(x, y),
            Action::Scroll { axis, delta } => self.scroll(axis, delta),
            Action::Window { target, command } => self.window(target, command),
            Action::Desktop(command) => self.desktop(command),
        }
    }
}

/// Read-only window lookups the engine needs for targeting and dragging.
///
/// Both queries are allowed to fail at any time; `None` means "no usable
/// window" and the engine treats it as a no-op.
pub trait WindowProbe: Send {
    /// Window under the given screen position, if any.
    fn window_at(&self, x: i32, y: i32) -> Option<WindowHandle>;

    /// Current frame of a window; `None` when the handle is stale.
    fn frame(&self, window: WindowHandle) -> Option<Rect>;
}

/// Probe for headless operation and tests: there are never any windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWindows;

impl WindowProbe for NoWindows {
    fn window_at(&self, _x: i32, _y: i32) -> Option<WindowHandle> {
        None
    }

    fn frame(&self, _window: WindowHandle) -> Option<Rect> {
        None
    }
}

/// Sink that logs every action through `tracing`. Used by the binary until a
/// platform backend is wired in, and handy for debugging gesture tuning.
#[derive(Debug, Default)]
pub struct LogSink;

impl ActionSink for LogSink {
    fn key_down(&mut self, key: Key) {
        info!("key down {:?}", key);
    }

    fn key_up(&mut self, key: Key) {
        info!("key up {:?}", key);
    }

    fn mouse_down(&mut self, button: MouseButton) {
        info!("mouse down {:?}", button);
    }

    fn mouse_up(&mut self, button: MouseButton) {
        info!("mouse up {:?}", button);
    }

    fn move_cursor(&mut self, x: i32, y: i32) {
        debug!("cursor -> {},{}", x, y);
    }

    fn scroll(&mut self, axis: ScrollAxis, delta: i32) {
        info!("scroll {:?} {}", axis, delta);
    }

    fn window(&mut self, target: WindowHandle, command: WindowCommand) {
        info!("window {:?} {:?}", target, command);
    }

    fn desktop(&mut self, command: DesktopCommand) {
        info!("desktop {:?}", command);
    }
}

/// Sink that records everything it receives. Test double.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub actions: Vec<Action>,
}

impl ActionSink for RecordingSink {
    fn key_down(&mut self, key: Key) {
        self.actions.push(Action::KeyDown(key));
    }

    fn key_up(&mut self, key: Key) {
        self.actions.push(Action::KeyUp(key));
    }

    fn mouse_down(&mut self, button: MouseButton) {
        self.actions.push(Action::MouseDown(button));
    }

    fn mouse_up(&mut self, button: MouseButton) {
        self.actions.push(Action::MouseUp(button));
    }

    fn move_cursor(&mut self, x: i32, y: i32) {
        self.actions.push(Action::MoveCursor { x, y });
    }

    fn scroll(&mut self, axis: ScrollAxis, delta: i32) {
        self.actions.push(Action::Scroll { axis, delta });
    }

    fn window(&mut self, target: WindowHandle, command: WindowCommand) {
        self.actions.push(Action::Window { target, command });
    }

    fn desktop(&mut self, command: DesktopCommand) {
        self.actions.push(Action::Desktop(command));
    }
}
