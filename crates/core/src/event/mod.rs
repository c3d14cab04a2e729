//! Decoding of native event records.
//!
//! The event loop collaborator hands over fixed-size [`RawEvent`] records
//! exactly as the native library fills them in. [`Event::decode`] turns one
//! record into a typed [`Event`]; [`Event::to_raw`] goes the other way for
//! events pushed back onto the native queue.
//!
//! A record carrying a tag outside the decoded set is treated as an
//! integration bug: decoding it aborts the process.

pub mod keysym;

use std::fmt;

use serde::Serialize;

use crate::{
    flags::{AppState, AppStateContext, FlagContext, FlagSet, KeyMod, KeyModContext},
    MediaBindError, Result,
};

/// Size in bytes of one native event record.
pub const RAW_EVENT_SIZE: usize = 24;

/// Native event tags.
pub mod tag {
    pub const ACTIVE: u32 = 1;
    pub const KEY_DOWN: u32 = 2;
    pub const KEY_UP: u32 = 3;
    pub const MOUSE_MOTION: u32 = 4;
    pub const MOUSE_BUTTON_DOWN: u32 = 5;
    pub const MOUSE_BUTTON_UP: u32 = 6;
    pub const JOY_AXIS_MOTION: u32 = 7;
    pub const JOY_BALL_MOTION: u32 = 8;
    pub const JOY_HAT_MOTION: u32 = 9;
    pub const JOY_BUTTON_DOWN: u32 = 10;
    pub const JOY_BUTTON_UP: u32 = 11;
    pub const QUIT: u32 = 12;
    pub const SYS_WM: u32 = 13;
    pub const VIDEO_RESIZE: u32 = 16;
    pub const VIDEO_EXPOSE: u32 = 17;
    /// First of the tags reserved for application-defined events.
    pub const USER_FIRST: u32 = 24;
    pub const USER_LAST: u32 = 31;
}

const BUTTON_LEFT_MASK: u8 = 0x01;
const BUTTON_MIDDLE_MASK: u8 = 0x02;
const STATE_PRESSED: u8 = 1;

/// One native event record: a 32-bit tag followed by the payload of the
/// tagged kind. Multi-byte fields are in host byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(C, align(8))]
pub struct RawEvent {
    bytes: [u8; RAW_EVENT_SIZE],
}

impl RawEvent {
    pub fn from_bytes(bytes: [u8; RAW_EVENT_SIZE]) -> Self {
        Self { bytes }
    }

    /// Zeroed record carrying only `tag`.
    pub fn with_tag(tag: u32) -> Self {
        let mut raw = Self::from_bytes([0; RAW_EVENT_SIZE]);
        raw.put_u32(0, tag);
        raw
    }

    pub fn as_bytes(&self) -> &[u8; RAW_EVENT_SIZE] {
        &self.bytes
    }

    pub fn tag(&self) -> u32 {
        self.u32_at(0)
    }

    fn u8_at(&self, offset: usize) -> u8 {
        self.bytes[offset]
    }

    fn u16_at(&self, offset: usize) -> u16 {
        u16::from_ne_bytes([self.bytes[offset], self.bytes[offset + 1]])
    }

    fn i16_at(&self, offset: usize) -> i16 {
        self.u16_at(offset) as i16
    }

    fn u32_at(&self, offset: usize) -> u32 {
        let mut word = [0; 4];
        word.copy_from_slice(&self.bytes[offset..offset + 4]);
        u32::from_ne_bytes(word)
    }

    fn i32_at(&self, offset: usize) -> i32 {
        self.u32_at(offset) as i32
    }

    fn u64_at(&self, offset: usize) -> u64 {
        let mut word = [0; 8];
        word.copy_from_slice(&self.bytes[offset..offset + 8]);
        u64::from_ne_bytes(word)
    }

    fn put_u8(&mut self, offset: usize, value: u8) {
        self.bytes[offset] = value;
    }

    fn put_u16(&mut self, offset: usize, value: u16) {
        self.bytes[offset..offset + 2].copy_from_slice(&value.to_ne_bytes());
    }

    fn put_u32(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
    }

    fn put_u64(&mut self, offset: usize, value: u64) {
        self.bytes[offset..offset + 8].copy_from_slice(&value.to_ne_bytes());
    }
}

impl TryFrom<&[u8]> for RawEvent {
    type Error = MediaBindError;

    fn try_from(value: &[u8]) -> Result<Self> {
        let bytes: [u8; RAW_EVENT_SIZE] =
            value
                .try_into()
                .map_err(|_| MediaBindError::BufferTooShort {
                    needed: RAW_EVENT_SIZE,
                    available: value.len(),
                })?;
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Debug for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawEvent")
            .field("tag", &self.tag())
            .field("payload", &&self.bytes[4..])
            .finish()
    }
}

/// A native reference carried through an event unchanged.
///
/// The value is owned by whoever posted the event. This crate never
/// dereferences, frees or otherwise interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct OpaqueHandle(pub u64);

impl OpaqueHandle {
    pub const NULL: OpaqueHandle = OpaqueHandle(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// What changed in an activation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivationKind {
    /// Window was iconified or restored.
    Minimized,
    /// Keyboard focus.
    InputFocus,
    /// Any other application state change, such as mouse focus.
    Application,
}

impl ActivationKind {
    fn from_state(state: &FlagSet<AppState>) -> Self {
        if state.contains(AppState::Active) {
            ActivationKind::Minimized
        } else if state.contains(AppState::InputFocus) {
            ActivationKind::InputFocus
        } else {
            ActivationKind::Application
        }
    }

    fn state(self) -> AppState {
        match self {
            ActivationKind::Minimized => AppState::Active,
            ActivationKind::InputFocus => AppState::InputFocus,
            ActivationKind::Application => AppState::MouseFocus,
        }
    }
}

/// Buttons held during a mouse motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MotionButtons {
    None,
    Left,
    Other,
}

impl MotionButtons {
    fn from_mask(mask: u8) -> Self {
        if mask & BUTTON_LEFT_MASK != 0 {
            MotionButtons::Left
        } else if mask != 0 {
            MotionButtons::Other
        } else {
            MotionButtons::None
        }
    }

    fn mask(self) -> u8 {
        match self {
            MotionButtons::None => 0,
            MotionButtons::Left => BUTTON_LEFT_MASK,
            MotionButtons::Other => BUTTON_MIDDLE_MASK,
        }
    }
}

/// Decoded input or window-system event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    Activation {
        gained: bool,
        kind: ActivationKind,
    },
    Key {
        pressed: bool,
        scancode: u8,
        /// Symbolic index, see [`keysym`].
        key: u16,
        modifiers: FlagSet<KeyMod>,
        unicode: u32,
    },
    MouseMotion {
        buttons: MotionButtons,
        x: u16,
        y: u16,
        dx: i16,
        dy: i16,
    },
    MouseButton {
        pressed: bool,
        /// Zero-based; the native record numbers buttons from 1.
        button: u8,
        x: u16,
        y: u16,
    },
    JoystickAxis {
        device: u8,
        axis: u8,
        value: i16,
    },
    JoystickBall {
        device: u8,
        ball: u8,
        dx: i16,
        dy: i16,
    },
    JoystickHat {
        device: u8,
        hat: u8,
        value: u8,
    },
    JoystickButton {
        device: u8,
        button: u8,
        pressed: bool,
    },
    WindowResized {
        width: i32,
        height: i32,
    },
    WindowExposed,
    Quit,
    User {
        code: i32,
        payload1: OpaqueHandle,
        payload2: OpaqueHandle,
    },
    System {
        message: OpaqueHandle,
    },
}

impl Event {
    /// Decodes one native record.
    ///
    /// A tag outside the known kinds is logged and the process is aborted.
    /// Unhandled native events mean the binding and the native library have
    /// drifted apart, which no caller can recover from.
    pub fn decode(raw: &RawEvent) -> Self {
        match Self::decode_known(raw) {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(tag = raw.tag(), ?raw, "{err}, aborting");
                std::process::abort()
            }
        }
    }

    fn decode_known(raw: &RawEvent) -> Result<Self> {
        let event = match raw.tag() {
            tag::ACTIVE => Event::Activation {
                gained: raw.u8_at(4) != 0,
                kind: ActivationKind::from_state(&AppStateContext::decode(u32::from(raw.u8_at(5)))),
            },
            kind @ (tag::KEY_DOWN | tag::KEY_UP) => Event::Key {
                pressed: kind == tag::KEY_DOWN,
                scancode: raw.u8_at(8),
                key: keysym::symbolic_from_native(raw.u32_at(12)),
                modifiers: KeyModContext::decode(raw.u32_at(16)),
                unicode: u32::from(raw.u16_at(20)),
            },
            tag::MOUSE_MOTION => Event::MouseMotion {
                buttons: MotionButtons::from_mask(raw.u8_at(5)),
                x: raw.u16_at(6),
                y: raw.u16_at(8),
                dx: raw.i16_at(10),
                dy: raw.i16_at(12),
            },
            kind @ (tag::MOUSE_BUTTON_DOWN | tag::MOUSE_BUTTON_UP) => Event::MouseButton {
                pressed: kind == tag::MOUSE_BUTTON_DOWN,
                button: raw.u8_at(5).saturating_sub(1),
                x: raw.u16_at(8),
                y: raw.u16_at(10),
            },
            tag::JOY_AXIS_MOTION => Event::JoystickAxis {
                device: raw.u8_at(4),
                axis: raw.u8_at(5),
                value: raw.i16_at(6),
            },
            tag::JOY_BALL_MOTION => Event::JoystickBall {
                device: raw.u8_at(4),
                ball: raw.u8_at(5),
                dx: raw.i16_at(6),
                dy: raw.i16_at(8),
            },
            tag::JOY_HAT_MOTION => Event::JoystickHat {
                device: raw.u8_at(4),
                hat: raw.u8_at(5),
                value: raw.u8_at(6),
            },
            kind @ (tag::JOY_BUTTON_DOWN | tag::JOY_BUTTON_UP) => Event::JoystickButton {
                device: raw.u8_at(4),
                button: raw.u8_at(5),
                pressed: kind == tag::JOY_BUTTON_DOWN,
            },
            tag::QUIT => Event::Quit,
            tag::SYS_WM => Event::System {
                message: OpaqueHandle(raw.u64_at(8)),
            },
            tag::VIDEO_RESIZE => Event::WindowResized {
                width: raw.i32_at(4),
                height: raw.i32_at(8),
            },
            tag::VIDEO_EXPOSE => Event::WindowExposed,
            tag::USER_FIRST..=tag::USER_LAST => Event::User {
                code: raw.i32_at(4),
                payload1: OpaqueHandle(raw.u64_at(8)),
                payload2: OpaqueHandle(raw.u64_at(16)),
            },
            unknown => return Err(MediaBindError::UnknownEventKind(unknown)),
        };
        Ok(event)
    }

    /// Encodes the event as a native record.
    ///
    /// Fields the record cannot hold are narrowed: activation kinds write
    /// their single representative state bit, `MotionButtons::Other` writes
    /// the middle button, unicode values are truncated to 16 bits and user
    /// events always use the first user tag.
    pub fn to_raw(&self) -> RawEvent {
        match self {
            Event::Activation { gained, kind } => {
                let mut raw = RawEvent::with_tag(tag::ACTIVE);
                raw.put_u8(4, u8::from(*gained));
                raw.put_u8(5, AppStateContext::encode([kind.state()]) as u8);
                raw
            }
            Event::Key {
                pressed,
                scancode,
                key,
                modifiers,
                unicode,
            } => {
                let mut raw = RawEvent::with_tag(if *pressed { tag::KEY_DOWN } else { tag::KEY_UP });
                raw.put_u8(5, if *pressed { STATE_PRESSED } else { 0 });
                raw.put_u8(8, *scancode);
                raw.put_u32(12, keysym::native_from_symbolic(*key));
                raw.put_u32(16, KeyModContext::encode(modifiers));
                raw.put_u16(20, *unicode as u16);
                raw
            }
            Event::MouseMotion {
                buttons,
                x,
                y,
                dx,
                dy,
            } => {
                let mut raw = RawEvent::with_tag(tag::MOUSE_MOTION);
                raw.put_u8(5, buttons.mask());
                raw.put_u16(6, *x);
                raw.put_u16(8, *y);
                raw.put_u16(10, *dx as u16);
                raw.put_u16(12, *dy as u16);
                raw
            }
            Event::MouseButton {
                pressed,
                button,
                x,
                y,
            } => {
                let kind = if *pressed {
                    tag::MOUSE_BUTTON_DOWN
                } else {
                    tag::MOUSE_BUTTON_UP
                };
                let mut raw = RawEvent::with_tag(kind);
                raw.put_u8(5, button.saturating_add(1));
                raw.put_u8(6, if *pressed { STATE_PRESSED } else { 0 });
                raw.put_u16(8, *x);
                raw.put_u16(10, *y);
                raw
            }
            Event::JoystickAxis {
                device,
                axis,
                value,
            } => {
                let mut raw = RawEvent::with_tag(tag::JOY_AXIS_MOTION);
                raw.put_u8(4, *device);
                raw.put_u8(5, *axis);
                raw.put_u16(6, *value as u16);
                raw
            }
            Event::JoystickBall {
                device,
                ball,
                dx,
                dy,
            } => {
                let mut raw = RawEvent::with_tag(tag::JOY_BALL_MOTION);
                raw.put_u8(4, *device);
                raw.put_u8(5, *ball);
                raw.put_u16(6, *dx as u16);
                raw.put_u16(8, *dy as u16);
                raw
            }
            Event::JoystickHat { device, hat, value } => {
                let mut raw = RawEvent::with_tag(tag::JOY_HAT_MOTION);
                raw.put_u8(4, *device);
                raw.put_u8(5, *hat);
                raw.put_u8(6, *value);
                raw
            }
            Event::JoystickButton {
                device,
                button,
                pressed,
            } => {
                let kind = if *pressed {
                    tag::JOY_BUTTON_DOWN
                } else {
                    tag::JOY_BUTTON_UP
                };
                let mut raw = RawEvent::with_tag(kind);
                raw.put_u8(4, *device);
                raw.put_u8(5, *button);
                raw.put_u8(6, if *pressed { STATE_PRESSED } else { 0 });
                raw
            }
            Event::WindowResized { width, height } => {
                let mut raw = RawEvent::with_tag(tag::VIDEO_RESIZE);
                raw.put_u32(4, *width as u32);
                raw.put_u32(8, *height as u32);
                raw
            }
            Event::WindowExposed => RawEvent::with_tag(tag::VIDEO_EXPOSE),
            Event::Quit => RawEvent::with_tag(tag::QUIT),
            Event::User {
                code,
                payload1,
                payload2,
            } => {
                let mut raw = RawEvent::with_tag(tag::USER_FIRST);
                raw.put_u32(4, *code as u32);
                raw.put_u64(8, payload1.0);
                raw.put_u64(16, payload2.0);
                raw
            }
            Event::System { message } => {
                let mut raw = RawEvent::with_tag(tag::SYS_WM);
                raw.put_u64(8, message.0);
                raw
            }
        }
    }
}
