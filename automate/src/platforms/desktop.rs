use super::keys::{char_key, key_from_name};
use super::AutomationDriver;
use crate::errors::AutomationError;
use crate::types::{MouseButton, Point};
use crate::vision;
use rdev::{Button, EventType, Key};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Gap between synthetic events, so the OS registers each one.
const EVENT_GAP: Duration = Duration::from_millis(20);
/// Interval between intermediate pointer positions on a timed move.
const MOVE_STEP: Duration = Duration::from_millis(10);

type SharedPointer = Arc<Mutex<Option<(f64, f64)>>>;

/// Where synthetic input goes, and the screen it lands on.
trait InputBackend: Send + Sync {
    fn simulate(&self, event: &EventType) -> Result<(), AutomationError>;
    fn display_size(&self) -> Result<(f64, f64), AutomationError>;
}

struct RdevInput;

impl InputBackend for RdevInput {
    fn simulate(&self, event: &EventType) -> Result<(), AutomationError> {
        rdev::simulate(event).map_err(|_| {
            AutomationError::PlatformError(format!("Failed to simulate {:?}", event))
        })
    }

    fn display_size(&self) -> Result<(f64, f64), AutomationError> {
        let (width, height) = rdev::display_size().map_err(|e| {
            AutomationError::PlatformError(format!("Failed to get display size: {:?}", e))
        })?;
        Ok((width as f64, height as f64))
    }
}

/// Drives the real pointer and keyboard through `rdev` and reads the screen
/// through `xcap`.
pub struct DesktopDriver {
    fail_safe: bool,
    pointer: SharedPointer,
    input: Box<dyn InputBackend>,
}

impl DesktopDriver {
    /// Start the pointer tracker. With `fail_safe` set, every action first
    /// checks whether the pointer sits in a screen corner.
    pub fn new(fail_safe: bool) -> Result<Self, AutomationError> {
        let pointer = Arc::new(Mutex::new(None));
        let tracked = Arc::clone(&pointer);

        thread::spawn(move || {
            if let Err(error) = rdev::listen(move |event| {
                if let EventType::MouseMove { x, y } = event.event_type {
                    *tracked.lock().unwrap_or_else(PoisonError::into_inner) = Some((x, y));
                }
            }) {
                error!("Pointer tracking stopped: {:?}", error);
            }
        });

        info!(fail_safe, "Desktop driver ready");
        Ok(Self::with_input(fail_safe, pointer, Box::new(RdevInput)))
    }

    fn with_input(fail_safe: bool, pointer: SharedPointer, input: Box<dyn InputBackend>) -> Self {
        Self {
            fail_safe,
            pointer,
            input,
        }
    }

    fn last_pointer(&self) -> Option<(f64, f64)> {
        *self.pointer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remember(&self, to: Point) {
        *self.pointer.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((f64::from(to.x), f64::from(to.y)));
    }

    fn check_fail_safe(&self) -> Result<(), AutomationError> {
        if !self.fail_safe {
            return Ok(());
        }
        let Some((x, y)) = self.last_pointer() else {
            return Ok(());
        };
        let (width, height) = self.input.display_size()?;
        if in_corner(x, y, width, height) {
            warn!(x, y, "Pointer in screen corner, aborting");
            return Err(AutomationError::FailSafe);
        }
        Ok(())
    }

    async fn send(&self, event: EventType) -> Result<(), AutomationError> {
        self.input.simulate(&event)?;
        tokio::time::sleep(EVENT_GAP).await;
        Ok(())
    }

    async fn glide(&self, to: Point, duration: Duration) -> Result<(), AutomationError> {
        let steps = (duration.as_millis() / MOVE_STEP.as_millis()).max(1) as u32;
        let (from_x, from_y) = self
            .last_pointer()
            .unwrap_or((f64::from(to.x), f64::from(to.y)));
        let pause = duration / steps;

        for step in 1..=steps {
            self.check_fail_safe()?;
            let t = f64::from(step) / f64::from(steps);
            let x = from_x + (f64::from(to.x) - from_x) * t;
            let y = from_y + (f64::from(to.y) - from_y) * t;
            self.input.simulate(&EventType::MouseMove { x, y })?;
            if !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }
        self.remember(to);
        tokio::time::sleep(EVENT_GAP).await;
        Ok(())
    }

    async fn tap(&self, key: Key) -> Result<(), AutomationError> {
        self.send(EventType::KeyPress(key)).await?;
        self.send(EventType::KeyRelease(key)).await
    }

    /// Release `held` in reverse order, trying every key. Returns the first failure.
    async fn release_keys(&self, held: &[Key]) -> Result<(), AutomationError> {
        let mut result = Ok(());
        for key in held.iter().rev() {
            if let Err(err) = self.send(EventType::KeyRelease(*key)).await {
                result = result.and(Err(err));
            }
        }
        result
    }
}

fn in_corner(x: f64, y: f64, width: f64, height: f64) -> bool {
    let left = x <= 0.0;
    let right = x >= width - 1.0;
    let top = y <= 0.0;
    let bottom = y >= height - 1.0;
    (left || right) && (top || bottom)
}

fn button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

fn resolve_key(name: &str) -> Result<Key, AutomationError> {
    key_from_name(name)
        .ok_or_else(|| AutomationError::InvalidArgument(format!("Unknown key name: '{name}'")))
}

fn capture_primary_monitor() -> Result<image::RgbaImage, AutomationError> {
    let monitors = xcap::Monitor::all().map_err(|e| {
        AutomationError::PlatformError(format!("Failed to get monitors: {}", e))
    })?;
    let mut primary_monitor: Option<xcap::Monitor> = None;
    for monitor in monitors {
        match monitor.is_primary() {
            Ok(true) => {
                primary_monitor = Some(monitor);
                break;
            }
            Ok(false) => continue,
            Err(e) => {
                return Err(AutomationError::PlatformError(format!(
                    "Error checking monitor primary status: {}",
                    e
                )));
            }
        }
    }
    let primary_monitor = primary_monitor.ok_or_else(|| {
        AutomationError::PlatformError("Could not find primary monitor".to_string())
    })?;

    primary_monitor
        .capture_image()
        .map_err(|e| AutomationError::PlatformError(format!("Failed to capture screen: {}", e)))
}

async fn blocking<T, F>(work: F) -> Result<T, AutomationError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AutomationError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AutomationError::Internal(format!("Screen task failed: {e}")))?
}

#[async_trait::async_trait]
impl AutomationDriver for DesktopDriver {
    fn name(&self) -> &'static str {
        "desktop"
    }

    #[instrument(level = "debug", skip(self))]
    async fn move_to(&self, to: Point, duration: Duration) -> Result<(), AutomationError> {
        self.check_fail_safe()?;
        self.glide(to, duration).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn click(
        &self,
        at: Point,
        clicks: u32,
        mouse_button: MouseButton,
    ) -> Result<(), AutomationError> {
        self.check_fail_safe()?;
        self.glide(at, Duration::ZERO).await?;
        let which = button(mouse_button);
        for _ in 0..clicks {
            self.send(EventType::ButtonPress(which)).await?;
            self.send(EventType::ButtonRelease(which)).await?;
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn drag_to(
        &self,
        to: Point,
        duration: Duration,
        mouse_button: MouseButton,
    ) -> Result<(), AutomationError> {
        self.check_fail_safe()?;
        let which = button(mouse_button);
        self.send(EventType::ButtonPress(which)).await?;
        let moved = self.glide(to, duration).await;
        // release even when the glide was aborted
        self.send(EventType::ButtonRelease(which)).await?;
        moved
    }

    async fn scroll(&self, amount: i32) -> Result<(), AutomationError> {
        self.check_fail_safe()?;
        self.send(EventType::Wheel {
            delta_x: 0,
            delta_y: i64::from(amount),
        })
        .await
    }

    #[instrument(level = "debug", skip(self, text), fields(chars = text.chars().count()))]
    async fn write(&self, text: &str, interval: Duration) -> Result<(), AutomationError> {
        for ch in text.chars() {
            self.check_fail_safe()?;
            let Some((key, shifted)) = char_key(ch) else {
                warn!("Cannot type character {:?}, skipping", ch);
                continue;
            };
            if shifted {
                self.send(EventType::KeyPress(Key::ShiftLeft)).await?;
                let typed = self.tap(key).await;
                self.release_keys(&[Key::ShiftLeft]).await?;
                typed?;
            } else {
                self.tap(key).await?;
            }
            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }
        Ok(())
    }

    async fn press(&self, key: &str) -> Result<(), AutomationError> {
        self.check_fail_safe()?;
        let key = resolve_key(key)?;
        self.tap(key).await
    }

    async fn hotkey(&self, keys: &[String]) -> Result<(), AutomationError> {
        self.check_fail_safe()?;
        let resolved = keys
            .iter()
            .map(|name| resolve_key(name))
            .collect::<Result<Vec<_>, _>>()?;
        let mut held = Vec::with_capacity(resolved.len());
        let mut pressed = Ok(());
        for key in resolved {
            if let Err(err) = self.send(EventType::KeyPress(key)).await {
                pressed = Err(err);
                break;
            }
            held.push(key);
        }
        let released = self.release_keys(&held).await;
        pressed.and(released)
    }

    async fn sleep(&self, duration: Duration) -> Result<(), AutomationError> {
        self.check_fail_safe()?;
        tokio::time::sleep(duration).await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn locate_center_on_screen(
        &self,
        image_path: &str,
        confidence: f64,
    ) -> Result<Option<Point>, AutomationError> {
        self.check_fail_safe()?;
        let path = image_path.to_string();
        let found = blocking(move || {
            let template = image::open(&path)?.to_luma8();
            let screen = image::DynamicImage::ImageRgba8(capture_primary_monitor()?).to_luma8();
            Ok(vision::locate_center(&screen, &template, confidence))
        })
        .await?;
        debug!(?found, "Image search done");
        Ok(found)
    }

    #[instrument(skip(self))]
    async fn screenshot(&self, filename: &str) -> Result<(), AutomationError> {
        self.check_fail_safe()?;
        let target = Path::new(filename).to_path_buf();
        blocking(move || {
            let image = capture_primary_monitor()?;
            image.save(&target)?;
            Ok(())
        })
        .await?;
        info!("Screenshot saved to {}", filename);
        Ok(())
    }

    fn position(&self) -> Result<Point, AutomationError> {
        self.last_pointer()
            .map(|(x, y)| Point::new(x.round() as i32, y.round() as i32))
            .ok_or_else(|| {
                AutomationError::UnsupportedOperation(
                    "Pointer position unknown until the mouse moves".to_string(),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corners() {
        assert!(in_corner(0.0, 0.0, 1920.0, 1080.0));
        assert!(in_corner(1919.0, 1079.0, 1920.0, 1080.0));
        assert!(in_corner(0.0, 1080.0, 1920.0, 1080.0));
        assert!(!in_corner(0.0, 500.0, 1920.0, 1080.0));
        assert!(!in_corner(960.0, 0.0, 1920.0, 1080.0));
    }

    #[test]
    fn test_unknown_key_is_invalid_argument() {
        assert!(matches!(
            resolve_key("not-a-key"),
            Err(AutomationError::InvalidArgument(_))
        ));
        assert_eq!(resolve_key("tab").unwrap(), Key::Tab);
    }

    /// Records every simulated event. Can fail one call, and can push the
    /// pointer into the top-left corner once enough events went through.
    #[derive(Default)]
    struct FakeInput {
        events: Arc<Mutex<Vec<EventType>>>,
        calls: Mutex<usize>,
        fail_call: Option<usize>,
        corner_after: Option<(usize, SharedPointer)>,
    }

    impl InputBackend for FakeInput {
        fn simulate(&self, event: &EventType) -> Result<(), AutomationError> {
            let mut calls = self.calls.lock().unwrap();
            let call = *calls;
            *calls += 1;
            if self.fail_call == Some(call) {
                return Err(AutomationError::PlatformError("injected".to_string()));
            }
            self.events.lock().unwrap().push(*event);
            if let Some((after, pointer)) = &self.corner_after {
                if *calls >= *after {
                    *pointer.lock().unwrap() = Some((0.0, 0.0));
                }
            }
            Ok(())
        }

        fn display_size(&self) -> Result<(f64, f64), AutomationError> {
            Ok((1920.0, 1080.0))
        }
    }

    fn driver(input: FakeInput, pointer: SharedPointer) -> DesktopDriver {
        DesktopDriver::with_input(true, pointer, Box::new(input))
    }

    fn centre() -> SharedPointer {
        Arc::new(Mutex::new(Some((960.0, 540.0))))
    }

    #[tokio::test]
    async fn test_write_aborts_when_pointer_reaches_corner_mid_text() {
        let pointer = centre();
        let events = Arc::new(Mutex::new(Vec::new()));
        let input = FakeInput {
            events: Arc::clone(&events),
            corner_after: Some((2, Arc::clone(&pointer))),
            ..FakeInput::default()
        };
        let driver = driver(input, pointer);

        let err = driver.write("abc", Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, AutomationError::FailSafe));
        assert_eq!(
            *events.lock().unwrap(),
            vec![EventType::KeyPress(Key::KeyA), EventType::KeyRelease(Key::KeyA)]
        );
    }

    #[tokio::test]
    async fn test_write_releases_shift_when_keystroke_fails() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let input = FakeInput {
            events: Arc::clone(&events),
            fail_call: Some(1),
            ..FakeInput::default()
        };
        let driver = driver(input, centre());

        let err = driver.write("A", Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, AutomationError::PlatformError(_)));
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                EventType::KeyPress(Key::ShiftLeft),
                EventType::KeyRelease(Key::ShiftLeft)
            ]
        );
    }

    #[tokio::test]
    async fn test_hotkey_releases_held_keys_when_a_press_fails() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let input = FakeInput {
            events: Arc::clone(&events),
            fail_call: Some(2),
            ..FakeInput::default()
        };
        let driver = driver(input, centre());
        let keys: Vec<String> = ["ctrl", "alt", "t"].iter().map(|k| k.to_string()).collect();

        let err = driver.hotkey(&keys).await.unwrap_err();
        assert!(matches!(err, AutomationError::PlatformError(_)));
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                EventType::KeyPress(Key::ControlLeft),
                EventType::KeyPress(Key::Alt),
                EventType::KeyRelease(Key::Alt),
                EventType::KeyRelease(Key::ControlLeft),
            ]
        );
    }

    #[tokio::test]
    async fn test_hotkey_presses_then_releases_in_reverse() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let input = FakeInput {
            events: Arc::clone(&events),
            ..FakeInput::default()
        };
        let driver = driver(input, centre());
        let keys = vec!["ctrl".to_string(), "v".to_string()];

        driver.hotkey(&keys).await.unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                EventType::KeyPress(Key::ControlLeft),
                EventType::KeyPress(Key::KeyV),
                EventType::KeyRelease(Key::KeyV),
                EventType::KeyRelease(Key::ControlLeft),
            ]
        );
    }
}
