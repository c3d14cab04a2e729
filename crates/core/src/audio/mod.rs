use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use serde::{Deserialize, Serialize};

use crate::{dsp, MediaBindError, Result};

/// Sample encodings understood by the audio device layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleFormat {
    U8,
    S8,
    U16Lsb,
    S16Lsb,
    U16Msb,
    S16Msb,
}

impl SampleFormat {
    /// Signed 16-bit samples in host byte order.
    pub const S16_NATIVE: SampleFormat = if cfg!(target_endian = "big") {
        SampleFormat::S16Msb
    } else {
        SampleFormat::S16Lsb
    };

    /// Native format code as used by the device layer.
    pub fn code(self) -> u16 {
        match self {
            SampleFormat::U8 => 0x0008,
            SampleFormat::S8 => 0x8008,
            SampleFormat::U16Lsb => 0x0010,
            SampleFormat::S16Lsb => 0x8010,
            SampleFormat::U16Msb => 0x1010,
            SampleFormat::S16Msb => 0x9010,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        [
            SampleFormat::U8,
            SampleFormat::S8,
            SampleFormat::U16Lsb,
            SampleFormat::S16Lsb,
            SampleFormat::U16Msb,
            SampleFormat::S16Msb,
        ]
        .into_iter()
        .find(|format| format.code() == code)
    }

    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 | SampleFormat::S8 => 1,
            _ => 2,
        }
    }

    /// Byte value that encodes silence.
    pub fn silence(self) -> u8 {
        match self {
            SampleFormat::U8 => 0x80,
            _ => 0x00,
        }
    }
}

/// Stream parameters negotiated with the audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSpec {
    pub freq: u32,
    pub format: SampleFormat,
    pub channels: u8,
    /// Device buffer size in frames.
    pub samples: u16,
}

impl AudioSpec {
    /// The only layout the DSP transforms process.
    pub fn stereo_s16(freq: u32, samples: u16) -> Self {
        Self {
            freq,
            format: SampleFormat::S16_NATIVE,
            channels: dsp::CHANNELS as u8,
            samples,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.format.bytes_per_sample() * usize::from(self.channels)
    }

    /// Size in bytes of one device buffer.
    pub fn buffer_size(&self) -> usize {
        self.frame_size() * usize::from(self.samples)
    }

    /// Checks that buffers in this layout can go through the DSP transforms.
    pub fn ensure_dsp_compatible(&self) -> Result<()> {
        if self.format != SampleFormat::S16_NATIVE {
            return Err(MediaBindError::conversion(format!(
                "{:?} samples are not signed 16-bit host order",
                self.format
            )));
        }
        if usize::from(self.channels) != dsp::CHANNELS {
            return Err(MediaBindError::conversion(format!(
                "{} channels requested, only stereo is supported",
                self.channels
            )));
        }
        if self.freq == 0 {
            return Err(MediaBindError::conversion("sample rate is zero"));
        }
        Ok(())
    }

    /// Resampling ratio that converts a stream in this layout to `target`.
    pub fn conversion_ratio(&self, target: &AudioSpec) -> Result<f64> {
        self.ensure_dsp_compatible()?;
        target.ensure_dsp_compatible()?;
        Ok(f64::from(self.freq) / f64::from(target.freq))
    }
}

/// Callback that fills one device buffer.
pub type AudioCallback = Box<dyn FnMut(&mut [u8]) + Send>;

/// Per-device audio context owning the fill callback.
///
/// Cloning yields another handle onto the same session, which is how the
/// device thread gets hold of it. Sessions open paused.
#[derive(Clone)]
pub struct AudioSession {
    spec: AudioSpec,
    callback: Arc<Mutex<AudioCallback>>,
    paused: Arc<AtomicBool>,
}

impl AudioSession {
    pub fn open<F>(spec: AudioSpec, callback: F) -> Result<Self>
    where
        F: FnMut(&mut [u8]) + Send + 'static,
    {
        if spec.freq == 0 || spec.channels == 0 || spec.samples == 0 {
            return Err(MediaBindError::InvalidParameter(
                "audio spec needs a non-zero rate, channel count and buffer size",
            ));
        }

        tracing::debug!(?spec, "opened audio session");
        let callback: AudioCallback = Box::new(callback);
        Ok(Self {
            spec,
            callback: Arc::new(Mutex::new(callback)),
            paused: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Like [`AudioSession::open`], additionally requiring a layout the DSP
    /// transforms can process.
    pub fn open_for_dsp<F>(spec: AudioSpec, callback: F) -> Result<Self>
    where
        F: FnMut(&mut [u8]) + Send + 'static,
    {
        spec.ensure_dsp_compatible()?;
        Self::open(spec, callback)
    }

    pub fn spec(&self) -> &AudioSpec {
        &self.spec
    }

    pub fn pause(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Fills one device buffer. Called from the device thread; writes
    /// silence while paused.
    pub fn fill(&self, stream: &mut [u8]) -> Result<()> {
        if self.is_paused() {
            stream.fill(self.spec.format.silence());
            return Ok(());
        }

        let mut guard = self.lock_callback()?;
        let callback: &mut AudioCallback = &mut guard;
        callback(stream);
        Ok(())
    }

    /// Keeps the callback from running until the returned guard drops. Hold
    /// it around any state shared with the callback.
    pub fn lock(&self) -> Result<AudioLock<'_>> {
        Ok(AudioLock {
            _guard: self.lock_callback()?,
        })
    }

    fn lock_callback(&self) -> Result<MutexGuard<'_, AudioCallback>> {
        self.callback
            .lock()
            .map_err(|_| MediaBindError::Poisoned("audio callback"))
    }
}

impl fmt::Debug for AudioSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSession")
            .field("spec", &self.spec)
            .field("paused", &self.is_paused())
            .finish()
    }
}

/// Guard returned by [`AudioSession::lock`].
pub struct AudioLock<'a> {
    _guard: MutexGuard<'a, AudioCallback>,
}

impl fmt::Debug for AudioLock<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioLock").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn paused_session_writes_silence() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let spec = AudioSpec {
            format: SampleFormat::U8,
            channels: 1,
            ..AudioSpec::stereo_s16(8_000, 16)
        };
        let session = AudioSession::open(spec, move |stream: &mut [u8]| {
            counter.fetch_add(1, Ordering::SeqCst);
            stream.fill(1);
        })
        .unwrap();

        let mut buffer = vec![0u8; spec.buffer_size()];
        session.fill(&mut buffer).unwrap();
        assert!(buffer.iter().all(|byte| *byte == 0x80));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        session.pause(false);
        session.fill(&mut buffer).unwrap();
        assert!(buffer.iter().all(|byte| *byte == 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn lock_holds_off_the_device_thread() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let callback_log = log.clone();
        let session = AudioSession::open_for_dsp(AudioSpec::stereo_s16(48_000, 64), move |_: &mut [u8]| {
            callback_log.lock().unwrap().push("callback");
        })
        .unwrap();
        session.pause(false);

        let device = session.clone();
        let guard = session.lock().unwrap();
        let worker = std::thread::spawn(move || {
            let mut buffer = vec![0u8; device.spec().buffer_size()];
            device.fill(&mut buffer).unwrap();
        });
        log.lock().unwrap().push("main");
        drop(guard);
        worker.join().unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["main", "callback"]);
    }

    #[test]
    fn dsp_sessions_require_stereo_s16() {
        let mono = AudioSpec {
            channels: 1,
            ..AudioSpec::stereo_s16(44_100, 512)
        };
        let err = AudioSession::open_for_dsp(mono, |_: &mut [u8]| {}).unwrap_err();
        assert!(matches!(err, MediaBindError::ConversionUnavailable { .. }));

        let unsigned = AudioSpec {
            format: SampleFormat::U16Lsb,
            ..AudioSpec::stereo_s16(44_100, 512)
        };
        assert!(unsigned.ensure_dsp_compatible().is_err());

        let empty = AudioSpec::stereo_s16(44_100, 0);
        assert!(matches!(
            AudioSession::open(empty, |_: &mut [u8]| {}),
            Err(MediaBindError::InvalidParameter(_))
        ));
    }

    #[test]
    fn conversion_ratio_between_rates() {
        let source = AudioSpec::stereo_s16(44_100, 1024);
        let target = AudioSpec::stereo_s16(22_050, 1024);
        assert_eq!(source.conversion_ratio(&target).unwrap(), 2.0);
        assert_eq!(source.buffer_size(), 4096);

        let silent = AudioSpec::stereo_s16(0, 1024);
        assert!(matches!(
            source.conversion_ratio(&silent),
            Err(MediaBindError::ConversionUnavailable { .. })
        ));
    }

    #[test]
    fn format_codes_round_trip() {
        assert_eq!(SampleFormat::from_code(0x8010), Some(SampleFormat::S16Lsb));
        assert_eq!(SampleFormat::from_code(0x1234), None);
        assert_eq!(SampleFormat::S16_NATIVE.bytes_per_sample(), 2);
    }
}
