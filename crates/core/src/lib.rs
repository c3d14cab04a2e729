//! Marshaling and signal-processing core of the mediabind multimedia
//! bindings.
//!
//! The crate converts between the native library's raw representations and
//! typed values: capability flag masks ([`flags`]), packed pixel layouts
//! ([`pixel`]) and fixed-size event records ([`event`]). It also carries the
//! two transforms that run directly on raw 16-bit stereo sample buffers
//! ([`dsp`]) and the per-device audio callback context ([`audio`]).
//!
//! Window management, file loading and device I/O stay with the native
//! library; this crate only sees the buffers and records they produce.

pub mod audio;
pub mod config;
pub mod dsp;
pub mod error;
pub mod event;
pub mod flags;
pub mod pixel;

pub use audio::{AudioCallback, AudioLock, AudioSession, AudioSpec, SampleFormat};
pub use config::{AppConfig, AudioConfig, MixerConfig, VideoConfig};
pub use dsp::{convert_rate, pan, pan_gains, pan_in_place, pitch_shift, FRAME_SIZE};
pub use error::{MediaBindError, Result};
pub use event::{ActivationKind, Event, MotionButtons, OpaqueHandle, RawEvent, RAW_EVENT_SIZE};
pub use flags::{
    AppState, AppStateContext, Context, FlagContext, FlagSet, InitContext, InitFlag, KeyMod,
    KeyModContext, VideoContext, VideoFlag,
};
pub use pixel::{read_pixel, write_pixel, ByteOrder, Channel, PixelBuffer, PixelFormat};
