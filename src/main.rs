mod app;
mod camera;
mod config;
mod device;
mod error;
mod grab;
mod graphics;
mod math;
mod menu;
mod physics;
mod scene;
mod scheduler;
mod session;
mod state;
mod terminal;
mod vertex;

use app::App;
use clap::Parser;
use config::{Args, Config};
use device::{HapticDevice, SimulatedConfig, SimulatedDevice, StylusInput};
use env_logger::Env;
use error::AppResult;
use session::HapticSession;
use state::SharedScene;
use std::io;
use std::process;
use std::sync::Arc;
use terminal::{terminal_size, wait_for_keypress, TerminalGuard};

/// Opens the device, starts the servo loop and runs the display until quit
fn run(config: &Config) -> AppResult<()> {
    let stylus = StylusInput::default();
    let device = SimulatedDevice::open(SimulatedConfig {
        input: stylus.clone(),
        ..Default::default()
    })?;
    println!("Found device {}", device.model());
    println!("The workspace two corner vertices are:");
    println!("{}", device.workspace());
    println!();

    let mut session = HapticSession::start(Box::new(device), config.servo_rate_hz)?;
    log::info!("Scheduler running at {} Hz", config.servo_rate_hz);

    let scene = Arc::new(SharedScene::new(config.initial_mass));
    println!("Starting haptics callback...");
    session.schedule_force_feedback(Arc::clone(&scene), config.physics)?;

    println!("Starting graphics callback...");
    // Declared first so it is dropped last, after the session has shut down
    let _terminal = TerminalGuard::enter()?;
    let mut app = App::new(config.clone(), session, scene, stylus, terminal_size());
    app.run(&mut io::stdout())
}

pub fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let config = Config::from(&args);

    println!("Haptic Device Sample Program\n");
    println!("Starting application");

    if let Err(err) = run(&config) {
        log::error!("{}", err);
        eprintln!("{}", err);
        if config.prompt_on_error {
            eprintln!("\nPress any key to quit.");
            if let Err(err) = wait_for_keypress() {
                log::warn!("{:#}", err);
            }
        }
        process::exit(-1);
    }

    println!("Done");
}
