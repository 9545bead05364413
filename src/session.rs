//! Device session: scheduler lifetime, force feedback task and state capture.

use crate::device::{Capability, HapticDevice, Workspace};
use crate::error::{AppError, AppResult};
use crate::grab::DeviceSnapshot;
use crate::physics::{boundary_force, PhysicalParams};
use crate::scheduler::{Callback, Scheduler, TaskHandle, WaitMode};
use crate::state::{ForceInput, SharedScene};
use std::sync::Arc;

/// Identity of the opened device, reported once at startup
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceInfo {
    pub model: String,
    pub workspace: Workspace,
}

/// Owns the running scheduler; dropping it tears everything down.
///
/// Teardown order: unschedule the force task, stop the servo thread, then
/// disable the device it hands back.
pub struct HapticSession {
    scheduler: Option<Scheduler>,
    force_task: Option<TaskHandle>,
    info: DeviceInfo,
}

impl HapticSession {
    /// Enables force output and starts the servo thread
    pub fn start(mut device: Box<dyn HapticDevice>, servo_rate_hz: u32) -> AppResult<Self> {
        device.enable(Capability::ForceOutput);
        device.enable(Capability::MaxForceClamping);
        let info = DeviceInfo {
            model: device.model().to_owned(),
            workspace: device.workspace(),
        };
        if let Some(err) = device.take_error() {
            device.disable();
            return Err(AppError::DeviceInit(err));
        }

        let scheduler = Scheduler::start(device, servo_rate_hz).map_err(AppError::SchedulerStart)?;
        Ok(HapticSession {
            scheduler: Some(scheduler),
            force_task: None,
            info,
        })
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn scheduler(&self) -> AppResult<&Scheduler> {
        self.scheduler.as_ref().ok_or(AppError::CallbackExited)
    }

    /// Schedules the force task that renders boundary and gravity forces
    pub fn schedule_force_feedback(
        &mut self,
        scene: Arc<SharedScene>,
        params: PhysicalParams,
    ) -> AppResult<TaskHandle> {
        let mut task = ForceTask::new(scene, params);
        let handle = self
            .scheduler()?
            .schedule_asynchronous(move |device| task.run(device))
            .map_err(AppError::Schedule)?;
        self.force_task = Some(handle);
        Ok(handle)
    }

    /// Whether the force task is still being re-invoked
    pub fn force_task_alive(&self) -> bool {
        match (&self.scheduler, self.force_task) {
            (Some(scheduler), Some(handle)) => {
                scheduler.wait_for_completion(handle, WaitMode::CheckStatus)
            }
            _ => false,
        }
    }

    /// Captures the device state on the servo thread, blocking until serviced
    pub fn capture(&self) -> AppResult<DeviceSnapshot> {
        self.scheduler()?
            .schedule_synchronous(capture_device_state)
            .map_err(|_| AppError::CallbackExited)
    }
}

impl Drop for HapticSession {
    fn drop(&mut self) {
        let Some(scheduler) = self.scheduler.take() else {
            return;
        };
        if let Some(handle) = self.force_task.take() {
            scheduler.unschedule(handle);
        }
        if let Some(mut device) = scheduler.stop() {
            device.disable();
            log::info!("Haptic device disabled");
        }
    }
}

/// State-capture task: copies the tip pose, force and buttons in one go
pub fn capture_device_state(device: &mut dyn HapticDevice) -> DeviceSnapshot {
    DeviceSnapshot {
        position: device.position(),
        transform: device.transform(),
        force: device.force(),
        button: device.buttons(),
    }
}

/// Servo-rate callback writing the boundary force to the device.
///
/// Reads the shared scene without blocking; when the display thread holds the
/// lock it reuses the last input it saw.
pub struct ForceTask {
    scene: Arc<SharedScene>,
    params: PhysicalParams,
    last_input: ForceInput,
}

impl ForceTask {
    pub fn new(scene: Arc<SharedScene>, params: PhysicalParams) -> Self {
        let last_input = scene.lock().force_input();
        ForceTask {
            scene,
            params,
            last_input,
        }
    }

    pub fn run(&mut self, device: &mut dyn HapticDevice) -> Callback {
        if let Some(input) = self.scene.try_force_input() {
            self.last_input = input;
        }
        let input = self.last_input;

        // Forces are only valid between begin_frame and end_frame
        device.begin_frame();
        let force = boundary_force(&input.position, input.attached, input.mass, &self.params);
        device.set_force(force);
        device.end_frame();

        match device.take_error() {
            Some(err) if err.is_scheduler_error() => {
                log::error!("Error during scheduler callback: {}", err);
                Callback::Done
            }
            Some(err) => {
                log::warn!("Error during scheduler callback: {}", err);
                Callback::Continue
            }
            None => Callback::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{
        Button, DeviceErrorKind, Fault, SimulatedConfig, SimulatedDevice, StylusInput,
    };
    use crate::grab::Grab;
    use parking_lot::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    fn simulated(config: SimulatedConfig) -> Box<dyn HapticDevice> {
        Box::new(SimulatedDevice::open(config).unwrap())
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn force_task_renders_nothing_while_detached() {
        let scene = Arc::new(SharedScene::new(4.0));
        let mut task = ForceTask::new(Arc::clone(&scene), PhysicalParams::default());
        let mut device = SimulatedDevice::open(SimulatedConfig::default()).unwrap();
        device.enable(Capability::ForceOutput);

        assert_eq!(task.run(&mut device), Callback::Continue);
        assert_eq!(device.force(), [0.0; 3]);
    }

    #[test]
    fn force_task_renders_wall_and_gravity_while_attached() {
        let scene = Arc::new(SharedScene::new(2.0));
        {
            let mut state = scene.lock();
            state.ball.position = [70.0, 0.0, 0.0];
            state.ball.grab = Grab::Attached { offset: [0.0; 3] };
        }
        let mut task = ForceTask::new(Arc::clone(&scene), PhysicalParams::default());
        let mut device = SimulatedDevice::open(SimulatedConfig::default()).unwrap();
        device.enable(Capability::ForceOutput);

        task.run(&mut device);
        assert_eq!(device.force(), [-10.0, -2.0, 0.0]);
    }

    #[test]
    fn force_task_reuses_last_input_while_scene_is_locked() {
        let scene = Arc::new(SharedScene::new(1.0));
        let mut task = ForceTask::new(Arc::clone(&scene), PhysicalParams::default());
        let mut device = SimulatedDevice::open(SimulatedConfig::default()).unwrap();
        device.enable(Capability::ForceOutput);

        let mut state = scene.lock();
        state.ball.grab = Grab::Attached { offset: [0.0; 3] };
        // Display thread still holds the lock: the task must not block
        assert_eq!(task.run(&mut device), Callback::Continue);
        assert_eq!(device.force(), [0.0; 3]);
        drop(state);

        task.run(&mut device);
        assert_eq!(device.force(), [0.0, -1.0, 0.0]);
    }

    #[test]
    fn transient_errors_keep_the_task_running() {
        let scene = Arc::new(SharedScene::new(1.0));
        let mut task = ForceTask::new(scene, PhysicalParams::default());
        let mut device = SimulatedDevice::open(SimulatedConfig {
            fault: Some(Fault {
                after_frames: 1,
                kind: DeviceErrorKind::Communication,
            }),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(task.run(&mut device), Callback::Continue);
    }

    #[test]
    fn scheduler_errors_end_the_task() {
        let scene = Arc::new(SharedScene::new(1.0));
        let mut session = HapticSession::start(
            simulated(SimulatedConfig {
                fault: Some(Fault {
                    after_frames: 3,
                    kind: DeviceErrorKind::Scheduler,
                }),
                ..Default::default()
            }),
            2000,
        )
        .unwrap();
        session
            .schedule_force_feedback(scene, PhysicalParams::default())
            .unwrap();
        assert!(wait_until(|| !session.force_task_alive()));
    }

    #[test]
    fn capture_reports_commanded_stylus() {
        let input = StylusInput::default();
        input.move_to([5.0, 6.0, 7.0]);
        input.toggle_button(Button::Primary);
        let scene = Arc::new(SharedScene::new(1.0));
        let mut session = HapticSession::start(
            simulated(SimulatedConfig {
                input,
                ..Default::default()
            }),
            1000,
        )
        .unwrap();
        session
            .schedule_force_feedback(scene, PhysicalParams::default())
            .unwrap();

        assert!(wait_until(|| session
            .capture()
            .map(|s| s.position == [5.0, 6.0, 7.0])
            .unwrap_or(false)));
        let snapshot = session.capture().unwrap();
        assert_eq!(snapshot.button, Button::Primary);
        assert!(session.force_task_alive());
    }

    #[test]
    fn startup_reports_model_and_workspace() {
        let session = HapticSession::start(simulated(SimulatedConfig::default()), 1000).unwrap();
        assert_eq!(session.info().model, SimulatedDevice::MODEL);
        assert!(session.info().workspace.half_max_dimension() > 75.0);
    }

    #[test]
    fn invalid_servo_rate_is_a_scheduler_start_failure() {
        let err = HapticSession::start(simulated(SimulatedConfig::default()), 0).err();
        assert!(matches!(err, Some(AppError::SchedulerStart(_))));
    }

    /// Device wrapper that records teardown calls
    struct Recording {
        inner: SimulatedDevice,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl HapticDevice for Recording {
        fn model(&self) -> &str {
            self.inner.model()
        }
        fn enable(&mut self, capability: Capability) {
            self.inner.enable(capability)
        }
        fn workspace(&self) -> Workspace {
            self.inner.workspace()
        }
        fn begin_frame(&mut self) {
            self.inner.begin_frame()
        }
        fn end_frame(&mut self) {
            self.inner.end_frame()
        }
        fn position(&self) -> [f64; 3] {
            self.inner.position()
        }
        fn transform(&self) -> [f64; 16] {
            self.inner.transform()
        }
        fn force(&self) -> [f64; 3] {
            self.inner.force()
        }
        fn buttons(&self) -> Button {
            self.inner.buttons()
        }
        fn set_force(&mut self, force: [f64; 3]) {
            self.inner.set_force(force)
        }
        fn take_error(&mut self) -> Option<crate::device::DeviceError> {
            self.inner.take_error()
        }
        fn disable(&mut self) {
            self.log.lock().push("disable");
            self.inner.disable()
        }
    }

    #[test]
    fn dropping_the_session_disables_the_device_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let device = Recording {
            inner: SimulatedDevice::open(SimulatedConfig::default()).unwrap(),
            log: Arc::clone(&log),
        };
        let scene = Arc::new(SharedScene::new(1.0));
        {
            let mut session = HapticSession::start(Box::new(device), 1000).unwrap();
            session
                .schedule_force_feedback(scene, PhysicalParams::default())
                .unwrap();
            assert!(session.force_task_alive());
        }
        assert_eq!(*log.lock(), vec!["disable"]);
    }
}
