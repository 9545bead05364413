use crate::camera::{Camera, DragMode};
use crate::config::Config;
use crate::device::{Button, StylusInput};
use crate::error::{AppError, AppResult};
use crate::grab::{DeviceSnapshot, TrackedSphere, Transition};
use crate::graphics::Canvas;
use crate::math::add;
use crate::menu::{ContextMenu, MenuCommand, HOW_TO_PLAY};
use crate::physics::Contacts;
use crate::scene::{background_color, SceneRenderer, SceneView};
use crate::session::HapticSession;
use crate::state::SharedScene;
use anyhow::Context;
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use crossterm::style::Color;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

/// What one display step observed
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
    pub snapshot: DeviceSnapshot,
    pub ball: TrackedSphere,
    pub transition: Transition,
    pub contacts: Contacts,
}

/// Text window opened from the context menu
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Popup {
    HowToPlay,
    About,
}

impl Popup {
    pub fn lines(self) -> Vec<String> {
        let mut lines: Vec<String> = match self {
            Popup::HowToPlay => HOW_TO_PLAY.iter().map(|line| line.to_string()).collect(),
            Popup::About => vec![
                format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
                env!("CARGO_PKG_DESCRIPTION").to_string(),
            ],
        };
        lines.push(String::new());
        lines.push("Press any key to close".to_string());
        lines
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

struct FpsCounter {
    frames_since_last_update: usize,
    last_fps_calculation: Instant,
    fps: f64,
}

impl FpsCounter {
    fn new() -> Self {
        FpsCounter {
            frames_since_last_update: 0,
            last_fps_calculation: Instant::now(),
            fps: 0.0,
        }
    }

    fn tick(&mut self) {
        self.frames_since_last_update += 1;
        let now = Instant::now();
        let duration = now.duration_since(self.last_fps_calculation);
        if duration.as_secs_f64() >= 1.0 {
            self.fps = self.frames_since_last_update as f64 / duration.as_secs_f64();
            self.frames_since_last_update = 0;
            self.last_fps_calculation = now;
        }
    }
}

/// Display side of the demo: owns the session, the camera and the UI state
pub struct App {
    config: Config,
    session: HapticSession,
    scene: Arc<SharedScene>,
    stylus: StylusInput,
    camera: Camera,
    renderer: SceneRenderer,
    /// Terminal size in cells
    size: (u16, u16),
    menu: Option<ContextMenu>,
    popup: Option<Popup>,
    debug: bool,
    fps: FpsCounter,
}

impl App {
    pub fn new(
        config: Config,
        session: HapticSession,
        scene: Arc<SharedScene>,
        stylus: StylusInput,
        size: (u16, u16),
    ) -> Self {
        let renderer = SceneRenderer::new(config.physics, &session.info().workspace);
        App {
            camera: Camera::new(config.camera),
            debug: config.debug,
            config,
            session,
            scene,
            stylus,
            renderer,
            size,
            menu: None,
            popup: None,
            fps: FpsCounter::new(),
        }
    }

    /// Idle step: liveness check, state capture and the grab update
    pub fn step(&mut self) -> AppResult<FrameReport> {
        if !self.session.force_task_alive() {
            return Err(AppError::CallbackExited);
        }
        let snapshot = self.session.capture()?;

        let params = self.config.physics;
        let mut state = self.scene.lock();
        let transition = state.ball.update(&snapshot, &params);
        let ball = state.ball;
        drop(state);

        match transition {
            Transition::Grabbed => log::debug!("Ball grabbed at {:?}", ball.position),
            Transition::Released => log::debug!("Ball released at {:?}", ball.position),
            Transition::Held | Transition::Idle => {}
        }

        Ok(FrameReport {
            snapshot,
            ball,
            transition,
            contacts: Contacts::detect(&ball.position, ball.is_attached(), &params),
        })
    }

    /// Paints the scene plus whichever overlays are open
    pub fn render(&self, report: &FrameReport) -> Canvas {
        let (columns, rows) = self.size;
        let mut canvas = Canvas::for_terminal(columns, rows, background_color());
        self.renderer.render(
            &SceneView {
                camera: &self.camera,
                snapshot: &report.snapshot,
                ball: &report.ball,
                contacts: report.contacts,
                show_force: self.debug,
            },
            &mut canvas,
        );

        if self.debug {
            for (row, line) in self.debug_lines(report).into_iter().enumerate() {
                canvas.text(1, row as u16, line, Color::White);
            }
        }

        if let Some(popup) = self.popup {
            let lines = popup.lines();
            let width = lines.iter().map(|line| line.len()).max().unwrap_or(0) as u16;
            let column = columns.saturating_sub(width) / 2;
            let top = rows.saturating_sub(lines.len() as u16) / 2;
            for (offset, line) in lines.into_iter().enumerate() {
                canvas.text(column, top + offset as u16, line, Color::White);
            }
        }

        if let Some(menu) = &self.menu {
            let width = ContextMenu::width() as usize;
            for (index, command) in MenuCommand::ALL.iter().enumerate() {
                let color = if index == menu.selected {
                    Color::Yellow
                } else {
                    Color::White
                };
                let label = format!(" {:<1$}", command.label(), width - 1);
                canvas.text(menu.column, menu.row + index as u16, label, color);
            }
        }

        canvas
    }

    fn debug_lines(&self, report: &FrameReport) -> Vec<String> {
        let [tx, ty, tz] = report.snapshot.position;
        let [bx, by, bz] = report.ball.position;
        let [fx, fy, fz] = report.snapshot.force;
        let grab = if report.ball.is_attached() {
            "attached"
        } else {
            "detached"
        };
        let walls = if report.contacts.any() {
            let faces: Vec<String> = report
                .contacts
                .iter()
                .map(|face| format!("{:?}", face))
                .collect();
            faces.join(" ")
        } else {
            "none".to_string()
        };
        vec![
            format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            format!("FPS: {:.2}", self.fps.fps),
            format!(
                "Yaw: {:.2}, Pitch: {:.2}, Zoom: {:.2}",
                self.camera.yaw, self.camera.pitch, self.camera.zoom
            ),
            format!("Mass: {:.0}", self.scene.snapshot().mass),
            format!("Ball: {} ({:?})", grab, report.transition),
            format!("Tip: ({:.1}, {:.1}, {:.1})", tx, ty, tz),
            format!("Ball position: ({:.1}, {:.1}, {:.1})", bx, by, bz),
            format!("Force: ({:.2}, {:.2}, {:.2})", fx, fy, fz),
            format!("Walls: {}", walls),
        ]
    }

    pub fn handle_event(&mut self, event: Event) -> Flow {
        match event {
            Event::Key(key) => self.handle_key(key),
            Event::Mouse(mouse) => {
                self.handle_mouse(mouse);
                Flow::Continue
            }
            Event::Resize(columns, rows) => {
                self.size = (columns, rows);
                Flow::Continue
            }
            _ => Flow::Continue,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if key.kind == KeyEventKind::Release {
            return Flow::Continue;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return Flow::Quit;
        }
        if self.popup.take().is_some() {
            return Flow::Continue;
        }
        if let Some(menu) = self.menu.as_mut() {
            match key.code {
                KeyCode::Up => menu.select_previous(),
                KeyCode::Down => menu.select_next(),
                KeyCode::Enter => {
                    let command = menu.current();
                    self.menu = None;
                    self.run_command(command);
                }
                KeyCode::Esc => self.menu = None,
                _ => {}
            }
            return Flow::Continue;
        }

        let step = self.config.stylus_step;
        let twist = self.config.stylus_twist;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
            KeyCode::Char('d') => self.debug = !self.debug,
            KeyCode::Char('r') => self.camera.reset(),
            KeyCode::Char('m') => self.open_menu(0, 0),
            KeyCode::Char('+') | KeyCode::Char('=') => self.run_command(MenuCommand::IncreaseMass),
            KeyCode::Char('-') => self.run_command(MenuCommand::DecreaseMass),
            KeyCode::Left => self.move_stylus([-step, 0.0, 0.0]),
            KeyCode::Right => self.move_stylus([step, 0.0, 0.0]),
            KeyCode::Up => self.move_stylus([0.0, step, 0.0]),
            KeyCode::Down => self.move_stylus([0.0, -step, 0.0]),
            KeyCode::PageUp => self.move_stylus([0.0, 0.0, step]),
            KeyCode::PageDown => self.move_stylus([0.0, 0.0, -step]),
            KeyCode::Char('[') => self.stylus.twist(-twist, 0.0),
            KeyCode::Char(']') => self.stylus.twist(twist, 0.0),
            KeyCode::Char(',') | KeyCode::Char('<') => self.stylus.twist(0.0, -twist),
            KeyCode::Char('.') | KeyCode::Char('>') => self.stylus.twist(0.0, twist),
            KeyCode::Char(' ') => self.stylus.toggle_button(Button::Primary),
            KeyCode::Char('b') => self.stylus.toggle_button(Button::Secondary),
            _ => {}
        }
        Flow::Continue
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let (column, row) = (mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(button) => {
                if self.popup.take().is_some() {
                    return;
                }
                if let Some(menu) = self.menu.take() {
                    if button == MouseButton::Left {
                        if let Some(command) = menu.hit(column, row) {
                            self.run_command(command);
                        }
                    }
                    return;
                }
                match button {
                    MouseButton::Left => self.camera.press(DragMode::Rotate, column, row),
                    MouseButton::Middle => self.camera.press(DragMode::Scale, column, row),
                    MouseButton::Right => self.open_menu(column, row),
                }
            }
            MouseEventKind::Drag(_) => self.camera.drag_to(column, row),
            MouseEventKind::Up(_) => self.camera.release(),
            _ => {}
        }
    }

    /// Opens the menu at the click, shifted so it stays on screen
    fn open_menu(&mut self, column: u16, row: u16) {
        let (columns, rows) = self.size;
        let column = column.min(columns.saturating_sub(ContextMenu::width()));
        let row = row.min(rows.saturating_sub(MenuCommand::ALL.len() as u16));
        self.menu = Some(ContextMenu::open(column, row));
    }

    fn run_command(&mut self, command: MenuCommand) {
        log::debug!("Menu command: {}", command.label());
        match command {
            MenuCommand::HowToPlay => self.popup = Some(Popup::HowToPlay),
            MenuCommand::About => self.popup = Some(Popup::About),
            MenuCommand::IncreaseMass | MenuCommand::DecreaseMass => {
                let mass = self.scene.apply(command);
                log::info!("Sphere mass is now {}", mass);
            }
        }
    }

    fn move_stylus(&self, delta: [f64; 3]) {
        let target = add(&self.stylus.pose().position, &delta);
        self.stylus
            .move_to(self.session.info().workspace.clamp(target));
    }

    /// Display loop: one step and redraw per frame period, events in between
    pub fn run<W: Write>(&mut self, out: &mut W) -> AppResult<()> {
        let period = self.config.frame_period();
        loop {
            let deadline = Instant::now() + period;
            let report = self.step()?;
            self.render(&report)
                .present(out)
                .context("failed to draw the frame")?;
            self.fps.tick();

            loop {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                if !event::poll(deadline - now).context("failed to poll terminal events")? {
                    break;
                }
                let event = event::read().context("failed to read a terminal event")?;
                if self.handle_event(event) == Flow::Quit {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceErrorKind, Fault, SimulatedConfig, SimulatedDevice};
    use crate::grab::Grab;
    use std::thread;
    use std::time::Duration;

    fn launch(device: SimulatedConfig) -> App {
        let stylus = device.input.clone();
        let config = Config::default();
        let scene = Arc::new(SharedScene::new(config.initial_mass));
        let mut session = HapticSession::start(
            Box::new(SimulatedDevice::open(device).unwrap()),
            config.servo_rate_hz,
        )
        .unwrap();
        session
            .schedule_force_feedback(Arc::clone(&scene), config.physics)
            .unwrap();
        App::new(config, session, scene, stylus, (80, 24))
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    /// Steps until `condition` holds for a report
    fn step_until(app: &mut App, condition: impl Fn(&FrameReport) -> bool) -> FrameReport {
        for _ in 0..500 {
            let report = app.step().unwrap();
            if condition(&report) {
                return report;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("condition never held");
    }

    #[test]
    fn grabbing_and_carrying_the_ball_with_the_keyboard() {
        let mut app = launch(SimulatedConfig::default());
        app.stylus.move_to([0.0, 0.0, 20.0]);
        app.handle_event(key(KeyCode::Char(' ')));
        let report = step_until(&mut app, |r| r.transition == Transition::Grabbed);
        assert_eq!(report.ball.grab, Grab::Attached { offset: [0.0, 0.0, 20.0] });

        app.handle_event(key(KeyCode::Right));
        let report = step_until(&mut app, |r| r.snapshot.position[0] == 4.0);
        assert_eq!(report.ball.position, [4.0, 0.0, 0.0]);

        app.handle_event(key(KeyCode::Char(' ')));
        let report = step_until(&mut app, |r| !r.ball.is_attached());
        assert_eq!(report.ball.position, [4.0, 0.0, 0.0]);
    }

    #[test]
    fn gravity_reaches_the_device_while_attached() {
        let mut app = launch(SimulatedConfig::default());
        app.stylus.move_to([0.0, 0.0, 20.0]);
        app.stylus.toggle_button(Button::Primary);
        step_until(&mut app, |r| r.ball.is_attached());
        let report = step_until(&mut app, |r| r.snapshot.force == [0.0, -1.0, 0.0]);
        assert!(!report.contacts.any());
    }

    #[test]
    fn dead_force_task_is_reported() {
        let mut app = launch(SimulatedConfig {
            fault: Some(Fault {
                after_frames: 3,
                kind: DeviceErrorKind::Scheduler,
            }),
            ..Default::default()
        });
        let mut outcome = app.step().map(|_| ());
        for _ in 0..500 {
            if outcome.is_err() {
                break;
            }
            thread::sleep(Duration::from_millis(2));
            outcome = app.step().map(|_| ());
        }
        assert!(matches!(outcome, Err(AppError::CallbackExited)));
    }

    #[test]
    fn right_click_menu_changes_mass() {
        let mut app = launch(SimulatedConfig::default());
        app.handle_event(mouse(MouseEventKind::Down(MouseButton::Right), 10, 5));
        let menu = app.menu.clone().unwrap();
        assert_eq!((menu.column, menu.row), (10, 5));

        // Second entry is "Increase Sphere Mass"
        app.handle_event(mouse(MouseEventKind::Down(MouseButton::Left), 12, 6));
        assert!(app.menu.is_none());
        assert_eq!(app.scene.snapshot().mass, 2.0);

        app.handle_event(key(KeyCode::Char('-')));
        app.handle_event(key(KeyCode::Char('-')));
        app.handle_event(key(KeyCode::Char('-')));
        assert_eq!(app.scene.snapshot().mass, 0.0);
    }

    #[test]
    fn menu_opens_on_screen_near_the_corner() {
        let mut app = launch(SimulatedConfig::default());
        app.handle_event(mouse(MouseEventKind::Down(MouseButton::Right), 79, 23));
        let menu = app.menu.as_ref().unwrap();
        assert!(menu.column + ContextMenu::width() <= 80);
        assert!(menu.row + MenuCommand::ALL.len() as u16 <= 24);
    }

    #[test]
    fn keyboard_menu_opens_popups_and_any_key_closes_them() {
        let mut app = launch(SimulatedConfig::default());
        app.handle_event(key(KeyCode::Char('m')));
        app.handle_event(key(KeyCode::Up));
        app.handle_event(key(KeyCode::Enter));
        assert_eq!(app.popup, Some(Popup::About));

        // The closing key is swallowed
        assert_eq!(app.handle_event(key(KeyCode::Char('q'))), Flow::Continue);
        assert_eq!(app.popup, None);
        assert_eq!(app.handle_event(key(KeyCode::Char('q'))), Flow::Quit);
    }

    #[test]
    fn dragging_rotates_and_reset_restores_the_view() {
        let mut app = launch(SimulatedConfig::default());
        app.handle_event(mouse(MouseEventKind::Down(MouseButton::Left), 10, 10));
        app.handle_event(mouse(MouseEventKind::Drag(MouseButton::Left), 15, 12));
        app.handle_event(mouse(MouseEventKind::Up(MouseButton::Left), 15, 12));
        assert!(app.camera.yaw > 0.0);
        assert!(app.camera.pitch > 0.0);

        app.handle_event(key(KeyCode::Char('r')));
        assert_eq!(app.camera.yaw, 0.0);
        assert_eq!(app.camera.pitch, 0.0);
        assert_eq!(app.camera.zoom, 1.0);
    }

    #[test]
    fn stylus_keys_stay_inside_the_workspace() {
        let mut app = launch(SimulatedConfig::default());
        for _ in 0..100 {
            app.handle_event(key(KeyCode::PageUp));
        }
        assert_eq!(app.stylus.pose().position[2], 100.0);
    }

    #[test]
    fn debug_overlay_and_popups_render_as_text() {
        let mut app = launch(SimulatedConfig::default());
        let report = app.step().unwrap();
        assert!(app.render(&report).overlay.is_empty());

        app.handle_event(key(KeyCode::Char('d')));
        assert!(app.debug);
        let canvas = app.render(&report);
        assert_eq!(canvas.width, 80);
        assert_eq!(canvas.height, 48);
        assert!(canvas.overlay[0].text.starts_with(env!("CARGO_PKG_NAME")));
        assert!(canvas.overlay.iter().any(|line| line.text.starts_with("Mass: 1")));

        app.handle_event(key(KeyCode::Char('d')));
        app.run_command(MenuCommand::HowToPlay);
        let canvas = app.render(&report);
        assert_eq!(canvas.overlay.len(), HOW_TO_PLAY.len() + 2);
    }

    #[test]
    fn debug_overlay_lists_touched_walls() {
        let mut app = launch(SimulatedConfig::default());
        app.debug = true;
        let mut report = app.step().unwrap();
        let walls = |canvas: &Canvas| {
            canvas
                .overlay
                .iter()
                .find(|line| line.text.starts_with("Walls: "))
                .map(|line| line.text.clone())
        };
        assert_eq!(walls(&app.render(&report)).as_deref(), Some("Walls: none"));

        report.contacts = Contacts::detect(&[60.0, 0.0, -60.0], true, &app.config.physics);
        assert_eq!(
            walls(&app.render(&report)).as_deref(),
            Some("Walls: PosX NegZ")
        );
    }
}
