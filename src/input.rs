use crate::error::{Error, Result};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, InputEvent, Key, RelativeAxisType};
use std::thread;
use std::time::Duration;

/// Candidate page-turn keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKey {
    Forward,
    Backward,
}

impl PageKey {
    /// Convert to evdev Key code (right/left arrow)
    pub fn to_key(self) -> Key {
        match self {
            PageKey::Forward => Key::KEY_RIGHT,
            PageKey::Backward => Key::KEY_LEFT,
        }
    }

    pub fn opposite(self) -> PageKey {
        match self {
            PageKey::Forward => PageKey::Backward,
            PageKey::Backward => PageKey::Forward,
        }
    }
}

/// Simulated input sent to the foreground reader application
pub trait Injector {
    fn press(&mut self, key: PageKey) -> Result<()>;
    fn move_and_click(&mut self, x: i32, y: i32) -> Result<()>;
}

/// Input injector backed by a uinput virtual device
///
/// Requires access to /dev/uinput (typically root or input group membership).
pub struct UinputInjector {
    device: VirtualDevice,
}

impl UinputInjector {
    /// Create a new virtual input device
    ///
    /// Note: This takes ~1 second as the kernel needs time to recognize the
    /// device.
    pub fn new() -> Result<Self> {
        let device = create_device()?;
        Ok(Self { device })
    }

    /// Press and release a key
    pub fn key_click(&mut self, key: Key) -> Result<()> {
        self.emit_key(key, 1)?;
        self.emit_key(key, 0)
    }

    /// Press a key while holding a modifier (e.g. ctrl+i for book info)
    pub fn key_chord(&mut self, modifier: Key, key: Key) -> Result<()> {
        self.emit_key(modifier, 1)?;
        self.emit_key(key, 1)?;
        self.emit_key(key, 0)?;
        self.emit_key(modifier, 0)
    }

    /// Move the mouse by relative amount
    pub fn move_mouse(&mut self, dx: i32, dy: i32) -> Result<()> {
        let events = [
            InputEvent::new_now(evdev::EventType::RELATIVE, RelativeAxisType::REL_X.0, dx),
            InputEvent::new_now(evdev::EventType::RELATIVE, RelativeAxisType::REL_Y.0, dy),
        ];
        self.device
            .emit(&events)
            .map_err(|e| Error::InputFailed(format!("mouse move failed: {}", e)))
    }

    /// Click the left mouse button at the current cursor position
    pub fn click(&mut self) -> Result<()> {
        self.emit_key(Key::BTN_LEFT, 1)?;
        self.emit_key(Key::BTN_LEFT, 0)
    }

    fn emit_key(&mut self, key: Key, value: i32) -> Result<()> {
        let event = InputEvent::new_now(evdev::EventType::KEY, key.code(), value);
        self.device
            .emit(&[event])
            .map_err(|e| Error::InputFailed(format!("key event failed: {}", e)))
    }
}

impl Injector for UinputInjector {
    fn press(&mut self, key: PageKey) -> Result<()> {
        self.key_click(key.to_key())
    }

    /// Move to absolute screen coordinates and left-click
    ///
    /// The device only emits relative motion, so the cursor is first homed
    /// to the top-left corner (the compositor clamps at 0,0) and then moved
    /// by the target offset.
    fn move_and_click(&mut self, x: i32, y: i32) -> Result<()> {
        self.move_mouse(-16384, -16384)?;
        thread::sleep(Duration::from_millis(50));
        self.move_mouse(x, y)?;
        thread::sleep(Duration::from_millis(50));
        self.click()
    }
}

/// Creates and configures the virtual input device
fn create_device() -> Result<VirtualDevice> {
    let mut keys = AttributeSet::<Key>::new();

    // Navigation keys for page turns, plus the handful the setup steps use
    for key in [
        Key::KEY_LEFT,
        Key::KEY_RIGHT,
        Key::KEY_UP,
        Key::KEY_DOWN,
        Key::KEY_PAGEUP,
        Key::KEY_PAGEDOWN,
        Key::KEY_ESC,
        Key::KEY_ENTER,
        Key::KEY_I,
        Key::KEY_LEFTCTRL,
        Key::KEY_LEFTMETA,
        Key::BTN_LEFT,
        Key::BTN_RIGHT,
    ] {
        keys.insert(key);
    }

    // Relative axes for mouse movement
    let mut rel_axes = AttributeSet::<RelativeAxisType>::new();
    rel_axes.insert(RelativeAxisType::REL_X);
    rel_axes.insert(RelativeAxisType::REL_Y);

    let device = VirtualDeviceBuilder::new()
        .map_err(|e| Error::InputFailed(format!("failed to open /dev/uinput: {}", e)))?
        .name("readerctl virtual device")
        .with_keys(&keys)
        .map_err(|e| Error::InputFailed(format!("failed to register keys: {}", e)))?
        .with_relative_axes(&rel_axes)
        .map_err(|e| Error::InputFailed(format!("failed to register axes: {}", e)))?
        .build()
        .map_err(|e| Error::InputFailed(format!("failed to create device: {}", e)))?;

    // Wait for the kernel to fully recognize the device
    // Without this delay, initial events may be lost
    thread::sleep(Duration::from_secs(1));

    Ok(device)
}
