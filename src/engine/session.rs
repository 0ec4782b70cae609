//! # Session State Machine - button/pose events in, abstract OS actions out
//!
//! One [`SessionState`] owns everything one controller can influence: the
//! active primary mode, the overlay, the gesture latch, button timers, the
//! pose filter and the calibration sequencer. Events are applied one at a
//! time and fully processed (all actions emitted) before the next, so the
//! session needs no interior locking.
//!
//! ## Mode model
//! Primary modes are a proper enum - at most one of Mouse, Scroll, Drag,
//! Drag2, Keyboard can ever be active. Overlays are an `Option<Overlay>`,
//! making overlay exclusivity structural as well; the app-switch overlays
//! take precedence over the gesture overlays.
//!
//! ## Button map
//! | Button   | Quick click            | Long / held                          |
//! |----------|------------------------|--------------------------------------|
//! | Triangle | right click (Mouse)    | Zoom overlay (Scroll)                |
//! | Circle   | middle click (Mouse)   | Desktop overlay (Scroll)             |
//! | Square   | Super key              | Snap overlay; AppSwitch in Scroll    |
//! | Cross    | Escape / cancel calib. | minimize, or close target in Scroll  |
//! | Select   | show status + pose dump| hide status                          |
//! | Start    | toggle Keyboard mode   | -                                    |
//! | PS       | master on/off          | calibration / restore defaults       |
//! | Move     | left click / calib step| Drag with Trigger held               |
//! | Trigger  | maximize-restore       | Scroll; Drag2/AppSwitch2 with chords |

use chrono::{DateTime, Duration, Local};
use tracing::{debug, info, warn};

use crate::actions::{
    Action, DesktopCommand, Key, MouseButton, Rect, ScreenExtent, ScrollAxis, WindowCommand,
    WindowHandle, WindowProbe,
};
use crate::controller::button_timers::{ButtonTimers, PressClass};
use crate::controller::pose_filter::{NormalizedPosition, PoseFilter};
use crate::controller::types::{
    ButtonState, ControllerSample, MoveButton, RawControllerEvent, Vec3,
};
use crate::engine::calibration::{CalibrationAdvance, CalibrationSequencer, CalibrationStep};
use crate::engine::gesture::{GestureDebouncer, GestureDirection, GestureFire, SnapLatch};
use crate::persistence::{Settings, SettingsStore};
use crate::status::StatusSurface;

/// Tilt delta (vs. the slow orientation average) that counts as a deliberate
/// tilt in Keyboard mode.
const TILT_THRESHOLD: f32 = 0.15;

/// Mutually exclusive locomotion modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryMode {
    /// Cursor follows the controller; face buttons click.
    Mouse,
    /// Position excursions scroll; held while the Trigger is down.
    Scroll,
    /// Window under the cursor follows it (entered Trigger-then-Move).
    Drag,
    /// Same, entered Move-then-Trigger with the left button held.
    Drag2,
    /// Tilt gestures emit arrow keys.
    Keyboard,
}

/// Overlays refining how gestures are interpreted. Only one can be active;
/// the app-switch overlays win over the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    /// Alt-Tab session entered Trigger-first (Square pressed in Scroll).
    AppSwitch,
    /// Alt-Tab session entered Square-first (Trigger pressed with Square held).
    AppSwitch2,
    /// Window snapping (Square held outside Scroll).
    Snap,
    /// Ctrl-wheel zoom / Alt-arrow history (Triangle held in Scroll).
    Zoom,
    /// Virtual-desktop switching (Circle held in Scroll).
    Desktop,
}

impl Overlay {
    fn is_app_switch(self) -> bool {
        matches!(self, Overlay::AppSwitch | Overlay::AppSwitch2)
    }
}

/// Captured geometry for a drag in progress.
#[derive(Debug, Clone, Copy)]
struct DragContext {
    target: WindowHandle,
    width: i32,
    height: i32,
    /// Cursor offset inside the window frame, preserved while dragging.
    offset_x: i32,
    offset_y: i32,
}

/// Complete per-controller session state. Owned exclusively by one engine
/// task; independent controllers get independent sessions.
pub struct SessionState {
    settings: Settings,
    screen: ScreenExtent,

    primary: PrimaryMode,
    overlay: Option<Overlay>,
    controller_on: bool,
    latch: SnapLatch,

    timers: ButtonTimers,
    filter: PoseFilter,
    debouncer: GestureDebouncer,
    calibration: CalibrationSequencer,

    store: Box<dyn SettingsStore>,
    probe: Box<dyn WindowProbe>,
    status: Box<dyn StatusSurface>,

    /// Position at which the last discrete action was committed. `None` is
    /// the unset sentinel; the first sample seeds it so the first tick can
    /// never fire a gesture.
    old_pos: Option<Vec3>,
    old_committed_at: DateTime<Local>,
    last_sample: Option<ControllerSample>,

    cursor_x: i32,
    cursor_y: i32,

    /// Press time of the button that armed gesture processing (Trigger for
    /// Scroll, Square for standalone Snap).
    gesture_gate: Option<DateTime<Local>>,
    last_tilt: Option<DateTime<Local>>,

    drag: Option<DragContext>,
    /// Window captured for snap/focus operations.
    target: Option<WindowHandle>,
    /// One-shot: a long Cross press that closed a window must not minimize
    /// the next one.
    target_closed: bool,
    /// One-shot pose debug print armed by a Select quick-click.
    debug_print_armed: bool,

    pending: Vec<Action>,
}

impl SessionState {
    pub fn new(
        settings: Settings,
        screen: ScreenExtent,
        store: Box<dyn SettingsStore>,
        probe: Box<dyn WindowProbe>,
        status: Box<dyn StatusSurface>,
    ) -> Self {
        let settings = settings.sanitized();
        let timers = ButtonTimers::new(settings.scroll_delay_ms());
        let filter = PoseFilter::new(settings.cur_pos_weight);
        let debouncer = GestureDebouncer::new(settings.auto_repeat_ms);
        info!("Session created with settings: {:?}", settings);
        Self {
            settings,
            screen,
            primary: PrimaryMode::Mouse,
            overlay: None,
            controller_on: true,
            latch: SnapLatch::None,
            timers,
            filter,
            debouncer,
            calibration: CalibrationSequencer::new(),
            store,
            probe,
            status,
            old_pos: None,
            old_committed_at: Local::now(),
            last_sample: None,
            cursor_x: screen.left + screen.width / 2,
            cursor_y: screen.top + screen.height / 2,
            gesture_gate: None,
            last_tilt: None,
            drag: None,
            target: None,
            target_closed: false,
            debug_print_armed: false,
            pending: Vec::new(),
        }
    }

    /// Applies one event and returns the actions it produced, in order.
    pub fn on_event(&mut self, event: &RawControllerEvent) -> Vec<Action> {
        match event {
            RawControllerEvent::Sample(sample) => self.on_sample(sample),
            RawControllerEvent::ButtonEvent {
                button,
                state,
                timestamp,
            } => self.on_button(*button, *state, *timestamp),
        }
        std::mem::take(&mut self.pending)
    }

    pub fn primary(&self) -> PrimaryMode {
        self.primary
    }

    pub fn overlay(&self) -> Option<Overlay> {
        self.overlay
    }

    pub fn is_on(&self) -> bool {
        self.controller_on
    }

    pub fn calibration_step(&self) -> CalibrationStep {
        self.calibration.step()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cursor(&self) -> (i32, i32) {
        (self.cursor_x, self.cursor_y)
    }

    // ---- event entry points -------------------------------------------------

    fn on_button(&mut self, button: MoveButton, state: ButtonState, now: DateTime<Local>) {
        // PS (master toggle) and Select (status chrome) work with the
        // controller switched off; everything else early-returns.
        let gated = !matches!(button, MoveButton::Ps | MoveButton::Select);
        match state {
            ButtonState::Pressed => {
                self.timers.on_press(button, now);
                if gated && !self.controller_on {
                    return;
                }
                self.button_pressed(button, now);
            }
            ButtonState::Released => {
                let class = self.timers.on_release(button, now);
                if gated && !self.controller_on {
                    return;
                }
                self.button_released(button, class, now);
            }
        }
    }

    fn on_sample(&mut self, sample: &ControllerSample) {
        let now = sample.timestamp;
        self.last_sample = Some(*sample);
        let norm = PoseFilter::normalize(sample.position, &self.settings.region);
        self.filter.update(sample);

        // Seed the committed position so the first tick never fires.
        if self.old_pos.is_none() {
            self.commit_position(sample.position, now);
        }

        // Calibration pre-empts the whole pipeline.
        if self.calibration.is_active() {
            if let Some(prompt) = self.calibration.observe(sample) {
                self.status.line(prompt);
            }
            return;
        }

        // The armed one-shot print works with the controller switched off,
        // like the Select button that arms it.
        if self.debug_print_armed {
            self.print_pose(sample, &norm);
            self.debug_print_armed = false;
        }

        if !self.controller_on {
            return;
        }

        let move_delay = Duration::milliseconds(self.settings.move_delay_ms);
        let scroll_delay = Duration::milliseconds(self.settings.scroll_delay_ms());

        let gesture_active = self.primary == PrimaryMode::Scroll
            || matches!(self.overlay, Some(Overlay::Snap | Overlay::Desktop));

        if gesture_active {
            if self.gate_open(self.gesture_gate, now, scroll_delay) {
                self.scroll_tick(sample, now);
            }
        } else if matches!(
            self.primary,
            PrimaryMode::Mouse | PrimaryMode::Drag | PrimaryMode::Drag2
        ) {
            if self.gate_open(self.timers.last_press(MoveButton::Move), now, move_delay) {
                self.cursor_tick(sample, &norm);
                if matches!(self.primary, PrimaryMode::Drag | PrimaryMode::Drag2) {
                    self.drag_tick();
                }
            }
        } else if self.primary == PrimaryMode::Keyboard
            && self.gate_open(self.last_tilt, now, move_delay)
        {
            self.tilt_tick(sample, now);
        }
    }

    /// A gate with no recorded timestamp is open.
    fn gate_open(
        &self,
        since: Option<DateTime<Local>>,
        now: DateTime<Local>,
        delay: Duration,
    ) -> bool {
        since.map_or(true, |t| now - t > delay)
    }

    // ---- button handlers ----------------------------------------------------

    fn button_pressed(&mut self, button: MoveButton, now: DateTime<Local>) {
        match button {
            MoveButton::Triangle => {
                self.commit_old_pos(now);
                if self.primary == PrimaryMode::Scroll || self.overlay == Some(Overlay::Zoom) {
                    self.set_overlay(Overlay::Zoom);
                } else if self.primary == PrimaryMode::Mouse {
                    self.act(Action::MouseDown(MouseButton::Right));
                } else if self.primary == PrimaryMode::Keyboard {
                    self.act(Action::KeyDown(Key::Tab));
                }
            }
            MoveButton::Circle => {
                if self.primary == PrimaryMode::Scroll || self.overlay == Some(Overlay::Desktop) {
                    self.set_overlay(Overlay::Desktop);
                } else if self.primary == PrimaryMode::Mouse {
                    self.act(Action::MouseDown(MouseButton::Middle));
                } else if self.primary == PrimaryMode::Keyboard {
                    self.act(Action::KeyDown(Key::PrintScreen));
                }
            }
            MoveButton::Square => {
                self.commit_old_pos(now);
                if self.primary == PrimaryMode::Scroll {
                    // Trigger was held first: start Alt-Tab, Tab repeats on
                    // further Square clicks.
                    self.set_overlay(Overlay::AppSwitch);
                    self.act(Action::KeyDown(Key::Alt));
                    self.act(Action::KeyDown(Key::Tab));
                } else {
                    self.set_overlay(Overlay::Snap);
                    self.target = self.probe.window_at(self.cursor_x, self.cursor_y);
                    self.gesture_gate = Some(now);
                }
            }
            MoveButton::Cross => {
                self.commit_old_pos(now);
                if self.timers.is_pressed(MoveButton::Square) {
                    // Square+Cross chord closes the current virtual desktop.
                    self.act(Action::Desktop(DesktopCommand::Close));
                    self.latch = SnapLatch::Closed;
                }
            }
            MoveButton::Move => {
                self.commit_old_pos(now);
                if self.calibration.is_active() {
                    // Steps advance on release.
                } else {
                    match self.primary {
                        PrimaryMode::Scroll => {
                            // Trigger held first: drag the window under the
                            // cursor.
                            self.capture_drag_target();
                            self.enter_primary(PrimaryMode::Drag);
                        }
                        PrimaryMode::Keyboard => self.act(Action::KeyDown(Key::Return)),
                        PrimaryMode::Mouse => self.act(Action::MouseDown(MouseButton::Left)),
                        PrimaryMode::Drag | PrimaryMode::Drag2 => {}
                    }
                }
            }
            MoveButton::Trigger => {
                self.commit_old_pos(now);
                if self.timers.is_pressed(MoveButton::Square) {
                    // Square held first: the other app-switch entry path.
                    self.set_overlay(Overlay::AppSwitch2);
                    self.act(Action::KeyDown(Key::Alt));
                    self.act(Action::KeyDown(Key::Tab));
                } else if self.timers.is_pressed(MoveButton::Move) {
                    self.capture_drag_target();
                    self.enter_primary(PrimaryMode::Drag2);
                } else if !self.timers.is_pressed(MoveButton::Cross) {
                    self.enter_primary(PrimaryMode::Scroll);
                    self.gesture_gate = Some(now);
                    self.target = self.probe.window_at(self.cursor_x, self.cursor_y);
                    if let Some(target) = self.target {
                        self.act(Action::Window {
                            target,
                            command: WindowCommand::Focus,
                        });
                    }
                }
            }
            MoveButton::Select | MoveButton::Start | MoveButton::Ps => {
                // Timing only; everything happens at release.
            }
        }
    }

    fn button_released(&mut self, button: MoveButton, class: PressClass, _now: DateTime<Local>) {
        match button {
            MoveButton::Triangle => {
                if self.overlay == Some(Overlay::Zoom) {
                    self.clear_overlay();
                } else if self.primary == PrimaryMode::Mouse {
                    self.act(Action::MouseUp(MouseButton::Right));
                } else if self.primary == PrimaryMode::Keyboard {
                    self.act(Action::KeyUp(Key::Tab));
                }
            }
            MoveButton::Circle => {
                if self.overlay == Some(Overlay::Desktop) {
                    self.clear_overlay();
                } else if self.primary == PrimaryMode::Mouse {
                    self.act(Action::MouseUp(MouseButton::Middle));
                } else if self.primary == PrimaryMode::Keyboard {
                    self.act(Action::KeyUp(Key::PrintScreen));
                }
            }
            MoveButton::Square => {
                match self.overlay {
                    Some(Overlay::AppSwitch) => {
                        // Alt stays held until the Trigger is released.
                        self.act(Action::KeyUp(Key::Tab));
                    }
                    Some(Overlay::AppSwitch2) => {
                        self.act(Action::KeyUp(Key::Alt));
                        self.clear_overlay();
                    }
                    _ => {
                        if class == PressClass::Quick {
                            self.key_click(Key::Super);
                        }
                        // Square always hands control back to the cursor,
                        // including out of keyboard mode.
                        if self.primary == PrimaryMode::Keyboard {
                            self.enter_primary(PrimaryMode::Mouse);
                        }
                    }
                }
                if self.overlay == Some(Overlay::Snap) {
                    self.clear_overlay();
                }
                self.latch = SnapLatch::None;
            }
            MoveButton::Cross => match class {
                PressClass::Long => {
                    if self.primary == PrimaryMode::Scroll {
                        self.close_window_under_cursor();
                    } else if self.target_closed {
                        // The close already happened; swallow the minimize.
                        self.target_closed = false;
                    } else if let Some(target) =
                        self.probe.window_at(self.cursor_x, self.cursor_y)
                    {
                        self.act(Action::Window {
                            target,
                            command: WindowCommand::Minimize,
                        });
                    }
                }
                PressClass::Quick => {
                    if self.calibration.is_active() {
                        self.calibration.cancel();
                        self.status.line("Calibration canceled.");
                    } else {
                        self.key_click(Key::Escape);
                    }
                }
            },
            MoveButton::Select => match class {
                PressClass::Quick => {
                    self.status.show();
                    self.debug_print_armed = !self.debug_print_armed;
                }
                PressClass::Long => self.status.hide(),
            },
            MoveButton::Start => {
                if class == PressClass::Quick {
                    match self.primary {
                        PrimaryMode::Keyboard => self.enter_primary(PrimaryMode::Mouse),
                        PrimaryMode::Mouse => {
                            self.filter.request_orientation_reseed();
                            self.enter_primary(PrimaryMode::Keyboard);
                            self.status
                                .line("Keyboard mode: tilt the controller to move with arrow keys.");
                        }
                        _ => {}
                    }
                }
            }
            MoveButton::Ps => match class {
                PressClass::Long => {
                    if self.calibration.is_active() {
                        self.restore_defaults();
                    } else {
                        self.filter.request_orientation_reseed();
                        if self.controller_on {
                            self.status.show();
                            let prompt = self.calibration.begin(self.settings.region);
                            self.status.line("Orientation reference captured.");
                            self.status.line(prompt);
                        }
                    }
                }
                PressClass::Quick => {
                    self.controller_on = !self.controller_on;
                    info!(
                        "Controller {}",
                        if self.controller_on { "on" } else { "off" }
                    );
                    if self.controller_on {
                        self.enter_primary(PrimaryMode::Mouse);
                    } else {
                        self.overlay = None;
                        self.latch = SnapLatch::None;
                        self.drag = None;
                    }
                }
            },
            MoveButton::Move => {
                if self.calibration.is_active() {
                    if class == PressClass::Quick {
                        self.calibration_advance();
                    }
                } else {
                    match self.primary {
                        PrimaryMode::Drag => {
                            self.drag = None;
                            self.enter_primary(PrimaryMode::Mouse);
                        }
                        PrimaryMode::Drag2 => {
                            self.drag = None;
                            self.enter_primary(PrimaryMode::Mouse);
                            // Symmetric cleanup: Drag2 entered with the left
                            // button held from the Move press.
                            self.act(Action::MouseUp(MouseButton::Left));
                        }
                        PrimaryMode::Keyboard => self.act(Action::KeyUp(Key::Return)),
                        PrimaryMode::Mouse => self.act(Action::MouseUp(MouseButton::Left)),
                        PrimaryMode::Scroll => {}
                    }
                }
            }
            MoveButton::Trigger => {
                if self.primary == PrimaryMode::Scroll {
                    // Drags survive a Trigger release; Scroll does not.
                    self.enter_primary(PrimaryMode::Mouse);
                    self.gesture_gate = None;
                }
                match self.overlay {
                    Some(Overlay::AppSwitch) => {
                        self.act(Action::KeyUp(Key::Alt));
                        self.clear_overlay();
                    }
                    Some(Overlay::AppSwitch2) => {
                        // Square still held; it releases Alt.
                        self.act(Action::KeyUp(Key::Tab));
                    }
                    _ => {
                        if self.timers.is_pressed(MoveButton::Cross) {
                            self.close_window_under_cursor();
                        } else if class == PressClass::Quick {
                            if let Some(target) =
                                self.probe.window_at(self.cursor_x, self.cursor_y)
                            {
                                self.act(Action::Window {
                                    target,
                                    command: WindowCommand::MaxRestore,
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    // ---- mode bookkeeping ---------------------------------------------------

    fn enter_primary(&mut self, mode: PrimaryMode) {
        if self.primary != mode {
            debug!("Primary mode {:?} -> {:?}", self.primary, mode);
            self.primary = mode;
            self.latch = SnapLatch::None;
        }
    }

    fn set_overlay(&mut self, overlay: Overlay) {
        // App-switch overlays win over the gesture overlays.
        if self
            .overlay
            .is_some_and(|current| current.is_app_switch() && !overlay.is_app_switch())
        {
            return;
        }
        if self.overlay != Some(overlay) {
            debug!("Overlay {:?} -> {:?}", self.overlay, overlay);
            self.overlay = Some(overlay);
            self.latch = SnapLatch::None;
        }
    }

    fn clear_overlay(&mut self) {
        if self.overlay.is_some() {
            debug!("Overlay {:?} cleared", self.overlay);
            self.overlay = None;
            self.latch = SnapLatch::None;
        }
    }

    // ---- pose processing ----------------------------------------------------

    fn scroll_tick(&mut self, sample: &ControllerSample, now: DateTime<Local>) {
        let threshold = match self.overlay {
            Some(Overlay::AppSwitch | Overlay::AppSwitch2) => self.settings.app_scroll_threshold,
            Some(Overlay::Snap | Overlay::Zoom | Overlay::Desktop) => {
                self.settings.app_scroll_threshold * 1.5
            }
            None => self.settings.scroll_threshold * self.settings.scroll_percent,
        };
        let old = match self.old_pos {
            Some(old) => old,
            None => return,
        };
        let region = self.settings.region;
        let elapsed_ms = (now - self.old_committed_at).num_milliseconds() as f64;

        // Vertical axis has precedence over horizontal, like a mouse wheel.
        let vertical = self.debouncer.evaluate(
            sample.position.y,
            old.y,
            threshold,
            region.bottom,
            region.top,
            elapsed_ms,
        );
        let direction = match vertical {
            GestureFire::Positive => Some(GestureDirection::Up),
            GestureFire::Negative => Some(GestureDirection::Down),
            GestureFire::None => {
                let horizontal = self.debouncer.evaluate(
                    sample.position.x,
                    old.x,
                    threshold,
                    region.left,
                    region.right,
                    elapsed_ms,
                );
                match horizontal {
                    GestureFire::Negative => Some(GestureDirection::Left),
                    GestureFire::Positive => Some(GestureDirection::Right),
                    GestureFire::None => None,
                }
            }
        };

        if let Some(direction) = direction {
            self.gesture_fire(direction, old);
            self.commit_position(sample.position, now);
        }
    }

    fn gesture_fire(&mut self, direction: GestureDirection, old: Vec3) {
        debug!(
            "Gesture fire {:?} (overlay {:?}, latch {:?})",
            direction, self.overlay, self.latch
        );
        match self.overlay {
            Some(Overlay::Snap) => self.snap_fire(direction, old),
            Some(Overlay::Zoom) => self.zoom_fire(direction),
            Some(Overlay::Desktop) => self.desktop_fire(direction),
            // App-switching only raises the threshold; the fire itself is a
            // plain wheel tick driving the switcher.
            Some(Overlay::AppSwitch | Overlay::AppSwitch2) | None => {
                let tick = self.wheel_tick();
                let (axis, delta) = match direction {
                    GestureDirection::Up => (ScrollAxis::Vertical, tick),
                    GestureDirection::Down => (ScrollAxis::Vertical, -tick),
                    GestureDirection::Left => (ScrollAxis::Horizontal, -tick),
                    GestureDirection::Right => (ScrollAxis::Horizontal, tick),
                };
                self.act(Action::Scroll { axis, delta });
            }
        }
    }

    fn snap_fire(&mut self, direction: GestureDirection, old: Vec3) {
        // An excursion spanning the whole region escalates from snapping the
        // window to switching desktops.
        let region = self.settings.region;
        let spans_region = match direction {
            GestureDirection::Up => old.y < region.bottom,
            GestureDirection::Down => old.y > region.top,
            GestureDirection::Left => old.x > region.right,
            GestureDirection::Right => old.x < region.left,
        };
        if spans_region {
            self.desktop_fire(direction);
            return;
        }
        if self.latch.matches(direction) {
            return;
        }
        let Some(target) = self.target else {
            // No window was under the cursor when Square went down; remember
            // the failure so the held excursion does not retry every tick.
            self.latch = SnapLatch::Failed;
            return;
        };
        self.latch = SnapLatch::from_direction(direction);
        info!("Snapping {:?}", direction);
        self.act(Action::Window {
            target,
            command: WindowCommand::Focus,
        });
        self.act(Action::KeyDown(Key::Super));
        self.key_click(direction_key(direction));
        self.act(Action::KeyUp(Key::Super));
    }

    fn zoom_fire(&mut self, direction: GestureDirection) {
        match direction {
            // Continuous zoom, not latched.
            GestureDirection::Up | GestureDirection::Down => {
                let tick = self.wheel_tick();
                let delta = if direction == GestureDirection::Up {
                    tick
                } else {
                    -tick
                };
                info!("Zooming {:?}", direction);
                self.act(Action::KeyDown(Key::Control));
                self.act(Action::Scroll {
                    axis: ScrollAxis::Vertical,
                    delta,
                });
                self.act(Action::KeyUp(Key::Control));
            }
            // History navigation, one step per excursion.
            GestureDirection::Left | GestureDirection::Right => {
                if self.latch.matches(direction) {
                    return;
                }
                self.latch = SnapLatch::from_direction(direction);
                info!(
                    "{}",
                    if direction == GestureDirection::Left {
                        "Back"
                    } else {
                        "Forward"
                    }
                );
                self.act(Action::KeyDown(Key::Alt));
                self.key_click(direction_key(direction));
                self.act(Action::KeyUp(Key::Alt));
            }
        }
    }

    fn desktop_fire(&mut self, direction: GestureDirection) {
        if self.latch.matches(direction) {
            return;
        }
        self.latch = SnapLatch::from_direction(direction);
        let command = match direction {
            GestureDirection::Up => DesktopCommand::New,
            GestureDirection::Down => DesktopCommand::Close,
            GestureDirection::Left => DesktopCommand::Next,
            GestureDirection::Right => DesktopCommand::Previous,
        };
        info!("Desktop {:?}", command);
        self.act(Action::Desktop(command));
    }

    fn cursor_tick(&mut self, sample: &ControllerSample, norm: &NormalizedPosition) {
        let pos = sample.position;
        let avg = self.filter.avg_pos();

        // Depth-aware damping, only applied when the extra-stable options
        // are on: far-out or deep positions get a smaller weight.
        let dist_weight = ((1.0 / (pos.x.abs().max(pos.y.abs()) + 2.0).ln())
            * (pos.z / 70.0).max(1.0))
        .clamp(0.0, 1.0);

        let x_damp = if self.settings.extra_stable_x {
            dist_weight
        } else {
            1.0
        };
        let y_damp = if self.settings.extra_stable_y {
            dist_weight
        } else {
            1.0
        };

        // Soft deadzone: sub-threshold jitter barely moves the cursor,
        // deliberate motion tracks 1:1.
        let x_weight =
            ((pos.x - avg.x).abs() / self.settings.mouse_threshold * x_damp).clamp(0.0, 1.0);
        let y_weight =
            ((pos.y - avg.y).abs() / self.settings.mouse_threshold * y_damp).clamp(0.0, 1.0);

        let target_x = norm.x * self.screen.width as f32 + self.screen.left as f32;
        let target_y = norm.y * self.screen.height as f32 + self.screen.top as f32;

        self.cursor_x =
            ((1.0 - x_weight) * self.cursor_x as f32 + x_weight * target_x).round() as i32;
        self.cursor_y =
            ((1.0 - y_weight) * self.cursor_y as f32 + y_weight * target_y).round() as i32;

        self.act(Action::MoveCursor {
            x: self.cursor_x,
            y: self.cursor_y,
        });
    }

    fn drag_tick(&mut self) {
        let Some(drag) = self.drag else {
            // Drag entered with no window under the cursor; every tick is a
            // silent no-op.
            return;
        };
        self.act(Action::Window {
            target: drag.target,
            command: WindowCommand::Move(Rect {
                x: self.cursor_x - drag.offset_x,
                y: self.cursor_y - drag.offset_y,
                width: drag.width,
                height: drag.height,
            }),
        });
    }

    fn tilt_tick(&mut self, sample: &ControllerSample, now: DateTime<Local>) {
        let orient = sample.orientation;
        let avg = self.filter.avg_orient();

        if orient.y - avg.y > TILT_THRESHOLD {
            self.key_click(Key::Left);
        } else if orient.y - avg.y < -TILT_THRESHOLD {
            self.key_click(Key::Right);
        }

        if orient.x - avg.x > TILT_THRESHOLD {
            self.key_click(Key::Up);
        } else if orient.x - avg.x < -TILT_THRESHOLD {
            self.key_click(Key::Down);
        }

        self.last_tilt = Some(now);
    }

    // ---- targets and drags --------------------------------------------------

    fn capture_drag_target(&mut self) {
        self.drag = None;
        self.target = self.probe.window_at(self.cursor_x, self.cursor_y);
        let Some(target) = self.target else {
            return;
        };
        // Bring it up and un-maximize it so the frame we record is the one
        // we keep repositioning.
        self.act(Action::Window {
            target,
            command: WindowCommand::Focus,
        });
        self.act(Action::Window {
            target,
            command: WindowCommand::Restore,
        });
        let Some(frame) = self.probe.frame(target) else {
            return;
        };
        self.drag = Some(DragContext {
            target,
            width: frame.width,
            height: frame.height,
            offset_x: self.cursor_x - frame.x,
            offset_y: self.cursor_y - frame.y,
        });
        debug!("Drag target {:?}, frame {:?}", target, frame);
    }

    fn close_window_under_cursor(&mut self) {
        if let Some(target) = self.probe.window_at(self.cursor_x, self.cursor_y) {
            self.act(Action::Window {
                target,
                command: WindowCommand::Close,
            });
            self.target_closed = true;
        }
    }

    // ---- calibration and settings -------------------------------------------

    fn calibration_advance(&mut self) {
        match self.calibration.advance() {
            CalibrationAdvance::Armed | CalibrationAdvance::AwaitingSample => {}
            CalibrationAdvance::Inactive => {}
            CalibrationAdvance::Commit(Ok(region)) => {
                self.settings.region = region;
                // Fresh region, fresh reference: the next sample reseeds the
                // committed position.
                self.old_pos = None;
                self.status.line(&format!(
                    "Calibration completed: top {:.2} bottom {:.2} left {:.2} right {:.2}",
                    region.top, region.bottom, region.left, region.right
                ));
                if region.height().abs() < 20.0 {
                    self.status.line(
                        "WARNING: vertical span below 20 units, the cursor may move very fast. \
                         Around 30 is recommended.",
                    );
                }
                if region.width().abs() < 30.0 {
                    self.status.line(
                        "WARNING: horizontal span below 30 units, the cursor may move very fast. \
                         Around 60 is recommended.",
                    );
                }
                if let Err(err) = self.store.save(&self.settings) {
                    warn!("Failed to persist settings after calibration: {}", err);
                }
            }
            CalibrationAdvance::Commit(Err(err)) => {
                warn!("Calibration rejected: {}", err);
                self.status
                    .line("Calibration rejected: captured region has zero width or height. \
                           Keeping the previous values.");
            }
        }
    }

    fn restore_defaults(&mut self) {
        self.settings = Settings {
            region: crate::controller::pose_filter::ControlRegion::default_for_ratio(
                self.screen.wh_ratio(),
            ),
            ..Settings::default()
        };
        self.timers.set_long_press_ms(self.settings.scroll_delay_ms());
        self.filter.set_pos_weight(self.settings.cur_pos_weight);
        self.debouncer = GestureDebouncer::new(self.settings.auto_repeat_ms);
        self.calibration.cancel();
        if let Err(err) = self.store.save(&self.settings) {
            warn!("Failed to persist restored defaults: {}", err);
        }
        self.status.line("Default values restored.");
    }

    // ---- small helpers ------------------------------------------------------

    fn wheel_tick(&self) -> i32 {
        (120.0 * self.settings.scroll_percent).round() as i32
    }

    fn commit_position(&mut self, position: Vec3, now: DateTime<Local>) {
        self.old_pos = Some(position);
        self.old_committed_at = now;
    }

    /// Commits the most recent sample position, called on button presses so
    /// the press location anchors the following gesture.
    fn commit_old_pos(&mut self, now: DateTime<Local>) {
        if let Some(sample) = self.last_sample {
            self.commit_position(sample.position, now);
        }
    }

    fn key_click(&mut self, key: Key) {
        self.act(Action::KeyDown(key));
        self.act(Action::KeyUp(key));
    }

    fn act(&mut self, action: Action) {
        self.pending.push(action);
    }

    fn print_pose(&mut self, sample: &ControllerSample, norm: &NormalizedPosition) {
        let avg = self.filter.avg_pos();
        self.status.line(&format!(
            "POSE pos:{:.2} {:.2} {:.2}  avg:{:.2} {:.2} {:.2}  norm:{:.2} {:.2}  trigger:{:.2}",
            sample.position.x,
            sample.position.y,
            sample.position.z,
            avg.x,
            avg.y,
            avg.z,
            norm.x,
            norm.y,
            sample.trigger
        ));
        self.status.line(&format!(
            "CURSOR {} {}  REGION top:{:.2} bottom:{:.2} left:{:.2} right:{:.2}",
            self.cursor_x,
            self.cursor_y,
            self.settings.region.top,
            self.settings.region.bottom,
            self.settings.region.left,
            self.settings.region.right
        ));
    }
}

fn direction_key(direction: GestureDirection) -> Key {
    match direction {
        GestureDirection::Up => Key::Up,
        GestureDirection::Down => Key::Down,
        GestureDirection::Left => Key::Left,
        GestureDirection::Right => Key::Right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::NoWindows;
    use crate::controller::pose_filter::ControlRegion;
    use crate::controller::types::Quat;
    use crate::persistence::{MemorySettingsStore, SCROLL_PERCENT_DEFAULT};
    use crate::status::NullStatus;
    use std::sync::Arc;

    /// Store delegating to a shared in-memory slot so tests keep a handle
    /// after boxing it into the session.
    struct SharedStore(Arc<MemorySettingsStore>);

    impl SettingsStore for SharedStore {
        fn load(&self) -> Result<Option<Settings>, crate::persistence::StoreError> {
            self.0.load()
        }
        fn save(&self, settings: &Settings) -> Result<(), crate::persistence::StoreError> {
            self.0.save(settings)
        }
    }

    /// Status surface that records every emitted line.
    #[derive(Clone, Default)]
    struct RecordingStatus {
        lines: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl RecordingStatus {
        fn line_count(&self) -> usize {
            self.lines.lock().expect("lines poisoned").len()
        }
    }

    impl StatusSurface for RecordingStatus {
        fn show(&self) {}
        fn hide(&self) {}
        fn show_for(&self, _duration: std::time::Duration) {}
        fn line(&self, message: &str) {
            self.lines
                .lock()
                .expect("lines poisoned")
                .push(message.to_string());
        }
    }

    struct FakeProbe {
        window: Option<WindowHandle>,
        frame: Option<Rect>,
    }

    impl WindowProbe for FakeProbe {
        fn window_at(&self, _x: i32, _y: i32) -> Option<WindowHandle> {
            self.window
        }
        fn frame(&self, _window: WindowHandle) -> Option<Rect> {
            self.frame
        }
    }

    fn session_with(probe: Box<dyn WindowProbe>) -> SessionState {
        SessionState::new(
            Settings::default(),
            ScreenExtent::default(),
            Box::new(MemorySettingsStore::default()),
            probe,
            Box::new(NullStatus),
        )
    }

    fn session() -> SessionState {
        session_with(Box::new(NoWindows))
    }

    fn windowed_session() -> SessionState {
        session_with(Box::new(FakeProbe {
            window: Some(WindowHandle(7)),
            frame: Some(Rect {
                x: 100,
                y: 100,
                width: 400,
                height: 300,
            }),
        }))
    }

    fn base() -> DateTime<Local> {
        Local::now()
    }

    fn at(base: DateTime<Local>, ms: i64) -> DateTime<Local> {
        base + Duration::milliseconds(ms)
    }

    fn press(
        session: &mut SessionState,
        button: MoveButton,
        base: DateTime<Local>,
        ms: i64,
    ) -> Vec<Action> {
        session.on_event(&RawControllerEvent::ButtonEvent {
            button,
            state: ButtonState::Pressed,
            timestamp: at(base, ms),
        })
    }

    fn release(
        session: &mut SessionState,
        button: MoveButton,
        base: DateTime<Local>,
        ms: i64,
    ) -> Vec<Action> {
        session.on_event(&RawControllerEvent::ButtonEvent {
            button,
            state: ButtonState::Released,
            timestamp: at(base, ms),
        })
    }

    fn sample(
        session: &mut SessionState,
        x: f32,
        y: f32,
        base: DateTime<Local>,
        ms: i64,
    ) -> Vec<Action> {
        session.on_event(&RawControllerEvent::Sample(ControllerSample::at(
            Vec3::new(x, y, 0.0),
            at(base, ms),
        )))
    }

    #[test]
    fn trigger_enters_and_leaves_scroll_mode() {
        let mut s = session();
        let t0 = base();
        assert_eq!(s.primary(), PrimaryMode::Mouse);

        press(&mut s, MoveButton::Trigger, t0, 0);
        assert_eq!(s.primary(), PrimaryMode::Scroll);

        release(&mut s, MoveButton::Trigger, t0, 400);
        assert_eq!(s.primary(), PrimaryMode::Mouse);
    }

    #[test]
    fn primary_modes_stay_exclusive_through_a_chord() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Trigger, t0, 10);
        assert_eq!(s.primary(), PrimaryMode::Scroll);

        press(&mut s, MoveButton::Move, t0, 50);
        assert_eq!(s.primary(), PrimaryMode::Drag);

        release(&mut s, MoveButton::Move, t0, 500);
        assert_eq!(s.primary(), PrimaryMode::Mouse);

        // Trigger release after the drag ended must not re-trip anything.
        release(&mut s, MoveButton::Trigger, t0, 600);
        assert_eq!(s.primary(), PrimaryMode::Mouse);
        assert_eq!(s.overlay(), None);
    }

    #[test]
    fn master_toggle_suppresses_everything_but_ps_and_select() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Ps, t0, 10);
        release(&mut s, MoveButton::Ps, t0, 60);
        assert!(!s.is_on());

        assert!(press(&mut s, MoveButton::Move, t0, 100).is_empty());
        assert!(release(&mut s, MoveButton::Move, t0, 150).is_empty());
        assert!(press(&mut s, MoveButton::Trigger, t0, 200).is_empty());
        assert_eq!(s.primary(), PrimaryMode::Mouse);
        assert!(sample(&mut s, 5.0, 5.0, t0, 300).is_empty());

        press(&mut s, MoveButton::Ps, t0, 400);
        release(&mut s, MoveButton::Ps, t0, 450);
        assert!(s.is_on());
        assert_eq!(s.primary(), PrimaryMode::Mouse);
    }

    #[test]
    fn switching_off_clears_overlay_and_drag() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Square, t0, 10);
        assert_eq!(s.overlay(), Some(Overlay::Snap));

        press(&mut s, MoveButton::Ps, t0, 100);
        release(&mut s, MoveButton::Ps, t0, 150);
        assert!(!s.is_on());
        assert_eq!(s.overlay(), None);
    }

    #[test]
    fn scroll_excursion_fires_exactly_once() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);
        press(&mut s, MoveButton::Trigger, t0, 10);

        // Inside the scroll hold-off: no processing at all.
        assert!(sample(&mut s, 0.0, 0.4, t0, 100).is_empty());

        // Past the hold-off but below threshold (1.0 * 0.5).
        assert!(sample(&mut s, 0.0, 0.4, t0, 320).is_empty());

        // Crossing fires one wheel tick upward.
        let fired = sample(&mut s, 0.0, 0.7, t0, 340);
        assert_eq!(
            fired,
            vec![Action::Scroll {
                axis: ScrollAxis::Vertical,
                delta: 60,
            }]
        );

        // Holding near the new committed position must not re-fire.
        assert!(sample(&mut s, 0.0, 0.8, t0, 360).is_empty());

        // Moving back down past the threshold fires the opposite direction.
        let back = sample(&mut s, 0.0, 0.1, t0, 400);
        assert_eq!(
            back,
            vec![Action::Scroll {
                axis: ScrollAxis::Vertical,
                delta: -60,
            }]
        );
    }

    #[test]
    fn horizontal_scroll_uses_the_horizontal_axis() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);
        press(&mut s, MoveButton::Trigger, t0, 10);

        let fired = sample(&mut s, 0.7, 0.0, t0, 340);
        assert_eq!(
            fired,
            vec![Action::Scroll {
                axis: ScrollAxis::Horizontal,
                delta: 60,
            }]
        );
    }

    #[test]
    fn cross_quick_is_escape_long_is_minimize() {
        let mut s = windowed_session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Cross, t0, 10);
        let quick = release(&mut s, MoveButton::Cross, t0, 60);
        assert_eq!(
            quick,
            vec![Action::KeyDown(Key::Escape), Action::KeyUp(Key::Escape)]
        );

        press(&mut s, MoveButton::Cross, t0, 200);
        let long = release(&mut s, MoveButton::Cross, t0, 600);
        assert_eq!(
            long,
            vec![Action::Window {
                target: WindowHandle(7),
                command: WindowCommand::Minimize,
            }]
        );
    }

    #[test]
    fn cross_long_in_scroll_closes_and_swallows_the_followup_minimize() {
        let mut s = windowed_session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Trigger, t0, 10);
        press(&mut s, MoveButton::Cross, t0, 20);
        let closed = release(&mut s, MoveButton::Cross, t0, 400);
        assert_eq!(
            closed,
            vec![Action::Window {
                target: WindowHandle(7),
                command: WindowCommand::Close,
            }]
        );
        release(&mut s, MoveButton::Trigger, t0, 500);

        // The long Cross after a close must not minimize whatever moved in
        // under the cursor.
        press(&mut s, MoveButton::Cross, t0, 600);
        assert!(release(&mut s, MoveButton::Cross, t0, 1000).is_empty());
    }

    #[test]
    fn drag_captures_frame_and_moves_the_window() {
        let mut s = windowed_session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        // Trigger focuses the window under the cursor on the way into Scroll.
        let focus = press(&mut s, MoveButton::Trigger, t0, 10);
        assert_eq!(
            focus,
            vec![Action::Window {
                target: WindowHandle(7),
                command: WindowCommand::Focus,
            }]
        );

        let captured = press(&mut s, MoveButton::Move, t0, 50);
        assert_eq!(s.primary(), PrimaryMode::Drag);
        assert_eq!(
            captured,
            vec![
                Action::Window {
                    target: WindowHandle(7),
                    command: WindowCommand::Focus,
                },
                Action::Window {
                    target: WindowHandle(7),
                    command: WindowCommand::Restore,
                },
            ]
        );

        // After the move hold-off each sample repositions the window,
        // preserving the grab offset inside the frame.
        let (cx, cy) = s.cursor();
        let (off_x, off_y) = (cx - 100, cy - 100);
        let actions = sample(&mut s, 0.0, 0.0, t0, 300);
        let (cx, cy) = s.cursor();
        assert_eq!(
            actions,
            vec![
                Action::MoveCursor { x: cx, y: cy },
                Action::Window {
                    target: WindowHandle(7),
                    command: WindowCommand::Move(Rect {
                        x: cx - off_x,
                        y: cy - off_y,
                        width: 400,
                        height: 300,
                    }),
                },
            ]
        );

        release(&mut s, MoveButton::Move, t0, 600);
        assert_eq!(s.primary(), PrimaryMode::Mouse);
    }

    #[test]
    fn drag2_releases_the_left_button_on_exit() {
        let mut s = windowed_session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        // Move first holds the left button, Trigger converts to Drag2.
        let down = press(&mut s, MoveButton::Move, t0, 10);
        assert_eq!(down, vec![Action::MouseDown(MouseButton::Left)]);

        press(&mut s, MoveButton::Trigger, t0, 50);
        assert_eq!(s.primary(), PrimaryMode::Drag2);

        let up = release(&mut s, MoveButton::Move, t0, 500);
        assert_eq!(s.primary(), PrimaryMode::Mouse);
        assert_eq!(up, vec![Action::MouseUp(MouseButton::Left)]);
    }

    #[test]
    fn app_switch_entered_trigger_first() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Trigger, t0, 10);
        let entered = press(&mut s, MoveButton::Square, t0, 50);
        assert_eq!(s.overlay(), Some(Overlay::AppSwitch));
        assert_eq!(
            entered,
            vec![Action::KeyDown(Key::Alt), Action::KeyDown(Key::Tab)]
        );

        // Square release only lifts Tab; Alt stays down for the switcher.
        let tab_up = release(&mut s, MoveButton::Square, t0, 150);
        assert_eq!(tab_up, vec![Action::KeyUp(Key::Tab)]);
        assert_eq!(s.overlay(), Some(Overlay::AppSwitch));

        let done = release(&mut s, MoveButton::Trigger, t0, 400);
        assert_eq!(done, vec![Action::KeyUp(Key::Alt)]);
        assert_eq!(s.overlay(), None);
        assert_eq!(s.primary(), PrimaryMode::Mouse);
    }

    #[test]
    fn app_switch_entered_square_first() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Square, t0, 10);
        assert_eq!(s.overlay(), Some(Overlay::Snap));

        let entered = press(&mut s, MoveButton::Trigger, t0, 50);
        assert_eq!(s.overlay(), Some(Overlay::AppSwitch2));
        assert_eq!(
            entered,
            vec![Action::KeyDown(Key::Alt), Action::KeyDown(Key::Tab)]
        );

        // In this entry order the roles swap: Trigger lifts Tab, Square Alt.
        let tab_up = release(&mut s, MoveButton::Trigger, t0, 150);
        assert_eq!(tab_up, vec![Action::KeyUp(Key::Tab)]);
        assert_eq!(s.overlay(), Some(Overlay::AppSwitch2));

        let done = release(&mut s, MoveButton::Square, t0, 400);
        assert_eq!(done, vec![Action::KeyUp(Key::Alt)]);
        assert_eq!(s.overlay(), None);
    }

    #[test]
    fn snap_gesture_latches_per_direction() {
        let mut s = windowed_session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Square, t0, 10);
        assert_eq!(s.overlay(), Some(Overlay::Snap));

        // Below the raised snap threshold (5.0 * 1.5): nothing.
        assert!(sample(&mut s, 1.2, 0.0, t0, 320).is_empty());

        let snapped = sample(&mut s, 8.0, 0.0, t0, 340);
        assert_eq!(
            snapped,
            vec![
                Action::Window {
                    target: WindowHandle(7),
                    command: WindowCommand::Focus,
                },
                Action::KeyDown(Key::Super),
                Action::KeyDown(Key::Right),
                Action::KeyUp(Key::Right),
                Action::KeyUp(Key::Super),
            ]
        );

        // Further motion in the latched direction stays silent.
        assert!(sample(&mut s, 16.0, 0.0, t0, 400).is_empty());

        // The opposite direction re-arms.
        let back = sample(&mut s, 7.0, 0.0, t0, 500);
        assert!(back.contains(&Action::KeyDown(Key::Left)));
    }

    #[test]
    fn snap_without_a_window_fails_once_and_stays_quiet() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Square, t0, 10);
        assert!(sample(&mut s, 8.0, 0.0, t0, 340).is_empty());
        assert!(sample(&mut s, 16.0, 0.0, t0, 400).is_empty());
    }

    #[test]
    fn square_quick_click_taps_super() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Square, t0, 10);
        let tapped = release(&mut s, MoveButton::Square, t0, 60);
        assert_eq!(
            tapped,
            vec![Action::KeyDown(Key::Super), Action::KeyUp(Key::Super)]
        );
        assert_eq!(s.overlay(), None);
    }

    #[test]
    fn desktop_overlay_switches_desktops() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Trigger, t0, 10);
        press(&mut s, MoveButton::Circle, t0, 20);
        assert_eq!(s.overlay(), Some(Overlay::Desktop));

        let fired = sample(&mut s, -8.0, 0.0, t0, 340);
        assert_eq!(fired, vec![Action::Desktop(DesktopCommand::Next)]);

        // Latched: same direction repeats nothing.
        assert!(sample(&mut s, -16.0, 0.0, t0, 400).is_empty());

        release(&mut s, MoveButton::Circle, t0, 500);
        assert_eq!(s.overlay(), None);
    }

    #[test]
    fn zoom_overlay_is_continuous_vertically() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Trigger, t0, 10);
        press(&mut s, MoveButton::Triangle, t0, 20);
        assert_eq!(s.overlay(), Some(Overlay::Zoom));

        let zoomed = sample(&mut s, 0.0, 8.0, t0, 340);
        assert_eq!(
            zoomed,
            vec![
                Action::KeyDown(Key::Control),
                Action::Scroll {
                    axis: ScrollAxis::Vertical,
                    delta: 60,
                },
                Action::KeyUp(Key::Control),
            ]
        );

        // Vertical zoom is not latched: another excursion fires again.
        let again = sample(&mut s, 0.0, 16.0, t0, 700);
        assert_eq!(again.len(), 3);
    }

    #[test]
    fn app_switch_overlay_wins_over_desktop_request() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Trigger, t0, 10);
        press(&mut s, MoveButton::Square, t0, 20);
        assert_eq!(s.overlay(), Some(Overlay::AppSwitch));

        press(&mut s, MoveButton::Circle, t0, 50);
        assert_eq!(s.overlay(), Some(Overlay::AppSwitch));
    }

    #[test]
    fn start_toggles_keyboard_mode_and_tilts_emit_arrows() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Start, t0, 10);
        release(&mut s, MoveButton::Start, t0, 60);
        assert_eq!(s.primary(), PrimaryMode::Keyboard);

        // First sample in keyboard mode reseeds the orientation reference.
        assert!(sample(&mut s, 0.0, 0.0, t0, 100).is_empty());

        let tilted = s.on_event(&RawControllerEvent::Sample(ControllerSample {
            position: Vec3::default(),
            orientation: Quat {
                w: 1.0,
                x: 0.5,
                y: 0.0,
                z: 0.0,
            },
            trigger: 0.0,
            timestamp: at(t0, 350),
        }));
        assert_eq!(tilted, vec![Action::KeyDown(Key::Up), Action::KeyUp(Key::Up)]);

        press(&mut s, MoveButton::Start, t0, 500);
        release(&mut s, MoveButton::Start, t0, 550);
        assert_eq!(s.primary(), PrimaryMode::Mouse);
    }

    #[test]
    fn keyboard_mode_remaps_the_face_buttons() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);
        press(&mut s, MoveButton::Start, t0, 10);
        release(&mut s, MoveButton::Start, t0, 60);

        let down = press(&mut s, MoveButton::Move, t0, 100);
        assert_eq!(down, vec![Action::KeyDown(Key::Return)]);
        let up = release(&mut s, MoveButton::Move, t0, 150);
        assert_eq!(up, vec![Action::KeyUp(Key::Return)]);

        let tri = press(&mut s, MoveButton::Triangle, t0, 200);
        assert_eq!(tri, vec![Action::KeyDown(Key::Tab)]);
        release(&mut s, MoveButton::Triangle, t0, 250);
    }

    #[test]
    fn mouse_mode_clicks_and_moves_the_cursor() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        let down = press(&mut s, MoveButton::Move, t0, 10);
        assert_eq!(down, vec![Action::MouseDown(MouseButton::Left)]);
        let up = release(&mut s, MoveButton::Move, t0, 60);
        assert_eq!(up, vec![Action::MouseUp(MouseButton::Left)]);

        // Cursor frozen during the post-click hold-off, moving after.
        assert!(sample(&mut s, 5.0, 5.0, t0, 100).is_empty());
        let moved = sample(&mut s, 5.0, 5.0, t0, 300);
        assert_eq!(moved.len(), 1);
        assert!(matches!(moved[0], Action::MoveCursor { .. }));
    }

    #[test]
    fn cursor_moves_toward_the_normalized_target() {
        let mut s = session();
        let t0 = base();
        let (start_x, start_y) = s.cursor();
        sample(&mut s, 0.0, 0.0, t0, 0);

        // A large excursion right and up: cursor x grows, y shrinks
        // (device y up means screen y down).
        sample(&mut s, 20.0, 10.0, t0, 50);
        let (x, y) = s.cursor();
        assert!(x > start_x);
        assert!(y < start_y);
    }

    #[test]
    fn trigger_quick_click_toggles_maximize() {
        let mut s = windowed_session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Trigger, t0, 10);
        let actions = release(&mut s, MoveButton::Trigger, t0, 60);
        assert!(actions.contains(&Action::Window {
            target: WindowHandle(7),
            command: WindowCommand::MaxRestore,
        }));
        assert_eq!(s.primary(), PrimaryMode::Mouse);
    }

    #[test]
    fn calibration_captures_four_edges_and_persists() {
        let store = Arc::new(MemorySettingsStore::default());
        let mut s = SessionState::new(
            Settings::default(),
            ScreenExtent::default(),
            Box::new(SharedStore(Arc::clone(&store))),
            Box::new(NoWindows),
            Box::new(NullStatus),
        );
        let t0 = base();

        press(&mut s, MoveButton::Ps, t0, 0);
        release(&mut s, MoveButton::Ps, t0, 400);
        assert_eq!(s.calibration_step(), CalibrationStep::Step1);

        // Four click-then-point rounds: top, bottom, left, right.
        press(&mut s, MoveButton::Move, t0, 500);
        release(&mut s, MoveButton::Move, t0, 550);
        sample(&mut s, 0.0, 15.0, t0, 600);

        press(&mut s, MoveButton::Move, t0, 700);
        release(&mut s, MoveButton::Move, t0, 750);
        sample(&mut s, 0.0, -14.0, t0, 800);

        press(&mut s, MoveButton::Move, t0, 900);
        release(&mut s, MoveButton::Move, t0, 950);
        sample(&mut s, -25.0, 0.0, t0, 1000);

        press(&mut s, MoveButton::Move, t0, 1100);
        release(&mut s, MoveButton::Move, t0, 1150);
        sample(&mut s, 26.0, 0.0, t0, 1200);

        assert_eq!(s.calibration_step(), CalibrationStep::Step5);

        // Fifth click commits and saves.
        press(&mut s, MoveButton::Move, t0, 1300);
        release(&mut s, MoveButton::Move, t0, 1350);
        assert_eq!(s.calibration_step(), CalibrationStep::Inactive);

        let region = s.settings().region;
        assert_eq!(region.top, 15.0);
        assert_eq!(region.bottom, -14.0);
        assert_eq!(region.left, -25.0);
        assert_eq!(region.right, 26.0);

        let saved = store.saved().expect("settings persisted on commit");
        assert_eq!(saved.region, region);
    }

    #[test]
    fn calibration_cancels_on_cross_quick_click() {
        let mut s = session();
        let t0 = base();

        press(&mut s, MoveButton::Ps, t0, 0);
        release(&mut s, MoveButton::Ps, t0, 400);
        assert_eq!(s.calibration_step(), CalibrationStep::Step1);

        press(&mut s, MoveButton::Cross, t0, 500);
        release(&mut s, MoveButton::Cross, t0, 550);
        assert_eq!(s.calibration_step(), CalibrationStep::Inactive);
        assert_eq!(s.settings().region, ControlRegion::default());
    }

    #[test]
    fn ps_long_during_calibration_restores_defaults() {
        let store = Arc::new(MemorySettingsStore::default());
        let mut s = SessionState::new(
            Settings {
                scroll_percent: 0.9,
                ..Settings::default()
            },
            ScreenExtent::default(),
            Box::new(SharedStore(Arc::clone(&store))),
            Box::new(NoWindows),
            Box::new(NullStatus),
        );
        let t0 = base();

        press(&mut s, MoveButton::Ps, t0, 0);
        release(&mut s, MoveButton::Ps, t0, 400);
        assert_eq!(s.calibration_step(), CalibrationStep::Step1);

        press(&mut s, MoveButton::Ps, t0, 500);
        release(&mut s, MoveButton::Ps, t0, 900);
        assert_eq!(s.calibration_step(), CalibrationStep::Inactive);
        assert_eq!(s.settings().scroll_percent, SCROLL_PERCENT_DEFAULT);
        assert!(store.saved().is_some());
    }

    #[test]
    fn samples_during_calibration_produce_no_actions() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Ps, t0, 10);
        release(&mut s, MoveButton::Ps, t0, 400);

        // Wild motion while calibrating must not scroll or move anything.
        assert!(sample(&mut s, 20.0, 20.0, t0, 800).is_empty());
        assert!(sample(&mut s, -20.0, -20.0, t0, 1200).is_empty());
    }

    #[test]
    fn snap_excursion_spanning_the_region_escalates_to_desktop() {
        let mut s = windowed_session();
        let t0 = base();

        // Committed position below the bottom edge: an upward fire from
        // there spans the whole region.
        sample(&mut s, 0.0, -20.0, t0, 0);
        press(&mut s, MoveButton::Square, t0, 10);
        assert_eq!(s.overlay(), Some(Overlay::Snap));

        let fired = sample(&mut s, 0.0, -10.0, t0, 340);
        assert_eq!(fired, vec![Action::Desktop(DesktopCommand::New)]);

        // Latched like any desktop fire.
        assert!(sample(&mut s, 0.0, 0.0, t0, 400).is_empty());
    }

    #[test]
    fn square_cross_chord_closes_the_current_desktop() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Square, t0, 10);
        let chord = press(&mut s, MoveButton::Cross, t0, 20);
        assert_eq!(chord, vec![Action::Desktop(DesktopCommand::Close)]);
    }

    #[test]
    fn armed_pose_print_emits_while_the_controller_is_off() {
        let status = RecordingStatus::default();
        let mut s = SessionState::new(
            Settings::default(),
            ScreenExtent::default(),
            Box::new(MemorySettingsStore::default()),
            Box::new(NoWindows),
            Box::new(status.clone()),
        );
        let t0 = base();

        press(&mut s, MoveButton::Ps, t0, 10);
        release(&mut s, MoveButton::Ps, t0, 60);
        assert!(!s.is_on());

        // Select stays live when off; quick click arms the one-shot print.
        press(&mut s, MoveButton::Select, t0, 100);
        release(&mut s, MoveButton::Select, t0, 150);

        sample(&mut s, 1.0, 2.0, t0, 200);
        let printed = status.line_count();
        assert!(printed > 0);

        // One-shot: the next sample prints nothing further.
        sample(&mut s, 1.0, 2.0, t0, 300);
        assert_eq!(status.line_count(), printed);
    }

    #[test]
    fn square_release_exits_keyboard_mode() {
        let mut s = session();
        let t0 = base();
        sample(&mut s, 0.0, 0.0, t0, 0);

        press(&mut s, MoveButton::Start, t0, 10);
        release(&mut s, MoveButton::Start, t0, 60);
        assert_eq!(s.primary(), PrimaryMode::Keyboard);

        press(&mut s, MoveButton::Square, t0, 100);
        let tapped = release(&mut s, MoveButton::Square, t0, 150);
        assert_eq!(
            tapped,
            vec![Action::KeyDown(Key::Super), Action::KeyUp(Key::Super)]
        );
        assert_eq!(s.primary(), PrimaryMode::Mouse);
        assert_eq!(s.overlay(), None);
    }
}
