//! Transforms over raw interleaved 16-bit stereo sample buffers.
//!
//! Buffers are plain bytes holding `[left, right]` frames of host-order
//! `i16` samples, as handed over by the audio device callback. A trailing
//! partial frame is never read or written.

use crate::{MediaBindError, Result};

/// Interleaved channels per frame, left then right.
pub const CHANNELS: usize = 2;
/// Width of one `i16` sample.
pub const BYTES_PER_SAMPLE: usize = 2;
/// Bytes in one interleaved stereo frame.
pub const FRAME_SIZE: usize = CHANNELS * BYTES_PER_SAMPLE;

fn sample(buffer: &[u8], frame: usize, channel: usize) -> i16 {
    let offset = frame * FRAME_SIZE + channel * BYTES_PER_SAMPLE;
    i16::from_ne_bytes([buffer[offset], buffer[offset + 1]])
}

fn put_sample(buffer: &mut [u8], frame: usize, channel: usize, value: i16) {
    let offset = frame * FRAME_SIZE + channel * BYTES_PER_SAMPLE;
    buffer[offset..offset + BYTES_PER_SAMPLE].copy_from_slice(&value.to_ne_bytes());
}

/// Resamples `src` into `dst` by reading the source `ratio` frames per
/// output frame, interpolating linearly between neighbouring frames.
///
/// Every whole frame of `dst` is written. Output frame `i` is taken from
/// source position `i * ratio`. Returns the number of source bytes consumed,
/// `round(frames * ratio)` whole frames, saturating at `usize::MAX`. This is
/// where the next block starts and may lie slightly past the last frame read.
///
/// Fails without touching `dst` if `src` does not hold every frame the
/// interpolation reads.
pub fn pitch_shift(ratio: f64, src: &[u8], dst: &mut [u8]) -> Result<usize> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(MediaBindError::InvalidParameter(
            "pitch ratio must be finite and greater than zero",
        ));
    }

    let out_frames = dst.len() / FRAME_SIZE;
    if out_frames == 0 {
        return Ok(0);
    }

    // Checked in f64 so huge ratios fail here instead of overflowing a usize.
    let last = (out_frames - 1) as f64 * ratio;
    let needed_frames = last.floor() + if last.fract() > 0.0 { 2.0 } else { 1.0 };
    if needed_frames > (src.len() / FRAME_SIZE) as f64 {
        return Err(MediaBindError::BufferTooShort {
            needed: (needed_frames * FRAME_SIZE as f64) as usize,
            available: src.len(),
        });
    }

    for i in 0..out_frames {
        let position = i as f64 * ratio;
        let index = position.floor() as usize;
        let frac = position - index as f64;

        for channel in 0..CHANNELS {
            let current = f64::from(sample(src, index, channel));
            let value = if frac > 0.0 {
                let next = f64::from(sample(src, index + 1, channel));
                current * (1.0 - frac) + next * frac
            } else {
                current
            };
            put_sample(dst, i, channel, value as i16);
        }
    }

    let consumed_frames = (out_frames as f64 * ratio + 0.5).floor() as usize;
    tracing::trace!(ratio, out_frames, consumed_frames, "pitch shifted block");
    Ok(consumed_frames.saturating_mul(FRAME_SIZE))
}

/// Converts a block recorded at `src_rate` to `dst_rate` by resampling with
/// the ratio of the two rates.
pub fn convert_rate(src: &[u8], src_rate: u32, dst_rate: u32, dst: &mut [u8]) -> Result<usize> {
    if src_rate == 0 || dst_rate == 0 {
        return Err(MediaBindError::conversion(format!(
            "cannot convert between {src_rate} Hz and {dst_rate} Hz"
        )));
    }
    pitch_shift(f64::from(src_rate) / f64::from(dst_rate), src, dst)
}

/// Per-channel linear gains for a stereo `pan` position in `[-1, 1]` and a
/// master `volume` in `[0, 1]`. Inputs outside those ranges are accepted;
/// the resulting gains are clamped to `[0, 1]`.
pub fn pan_gains(pan: f32, volume: f32) -> (f32, f32) {
    let left = (-volume * (pan - 1.0) / 2.0).clamp(0.0, 1.0);
    let right = (volume * (pan + 1.0) / 2.0).clamp(0.0, 1.0);
    (left, right)
}

/// Writes a panned copy of `src` into `dst`. Returns the number of frames
/// processed.
pub fn pan(src: &[u8], dst: &mut [u8], pan: f32, volume: f32) -> Result<usize> {
    let frames = src.len() / FRAME_SIZE;
    if dst.len() < frames * FRAME_SIZE {
        return Err(MediaBindError::BufferTooShort {
            needed: frames * FRAME_SIZE,
            available: dst.len(),
        });
    }

    let gains = pan_gains(pan, volume);
    for frame in 0..frames {
        let (left, right) = apply_gains(sample(src, frame, 0), sample(src, frame, 1), gains);
        put_sample(dst, frame, 0, left);
        put_sample(dst, frame, 1, right);
    }
    Ok(frames)
}

/// Pans `buffer` in place. Returns the number of frames processed.
pub fn pan_in_place(buffer: &mut [u8], pan: f32, volume: f32) -> usize {
    let gains = pan_gains(pan, volume);
    let mut frames = 0;
    for chunk in buffer.chunks_exact_mut(FRAME_SIZE) {
        let (left, right) = apply_gains(sample(chunk, 0, 0), sample(chunk, 0, 1), gains);
        put_sample(chunk, 0, 0, left);
        put_sample(chunk, 0, 1, right);
        frames += 1;
    }
    frames
}

fn apply_gains(left: i16, right: i16, (left_gain, right_gain): (f32, f32)) -> (i16, i16) {
    (
        (f32::from(left) * left_gain) as i16,
        (f32::from(right) * right_gain) as i16,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use realfft::RealFftPlanner;

    fn to_bytes(frames: &[(i16, i16)]) -> Vec<u8> {
        frames
            .iter()
            .flat_map(|(left, right)| {
                let mut frame = [0u8; FRAME_SIZE];
                frame[..2].copy_from_slice(&left.to_ne_bytes());
                frame[2..].copy_from_slice(&right.to_ne_bytes());
                frame
            })
            .collect()
    }

    fn to_frames(bytes: &[u8]) -> Vec<(i16, i16)> {
        (0..bytes.len() / FRAME_SIZE)
            .map(|frame| (sample(bytes, frame, 0), sample(bytes, frame, 1)))
            .collect()
    }

    fn ramp(len: usize) -> Vec<(i16, i16)> {
        (0..len as i16).map(|i| (i * 100, -i * 100)).collect()
    }

    #[test]
    fn unit_ratio_is_identity() {
        let src = to_bytes(&ramp(16));
        let mut dst = vec![0u8; src.len()];

        let consumed = pitch_shift(1.0, &src, &mut dst).unwrap();

        assert_eq!(dst, src);
        assert_eq!(consumed, 16 * FRAME_SIZE);
    }

    #[test]
    fn double_ratio_follows_interpolation_formula() {
        let source = ramp(4);
        let src = to_bytes(&source);
        let mut dst = vec![0u8; 2 * FRAME_SIZE];

        let consumed = pitch_shift(2.0, &src, &mut dst).unwrap();

        let out = to_frames(&dst);
        for (i, frame) in out.iter().enumerate() {
            let p = i as f64 * 2.0;
            let index = p.floor() as usize;
            let frac = p - index as f64;
            let next = source.get(index + 1).copied().unwrap_or(source[index]);
            let left = f64::from(source[index].0) * (1.0 - frac) + f64::from(next.0) * frac;
            assert_eq!(frame.0, left as i16);
        }
        assert_eq!(out, vec![(0, 0), (200, -200)]);
        assert_eq!(consumed, 4 * FRAME_SIZE);
    }

    #[test]
    fn fractional_positions_interpolate_midpoints() {
        let src = to_bytes(&ramp(4));
        let mut dst = vec![0u8; 6 * FRAME_SIZE];

        let consumed = pitch_shift(0.5, &src, &mut dst).unwrap();

        assert_eq!(
            to_frames(&dst),
            vec![(0, 0), (50, -50), (100, -100), (150, -150), (200, -200), (250, -250)]
        );
        assert_eq!(consumed, 3 * FRAME_SIZE);

        let mut dst = vec![0u8; 3 * FRAME_SIZE];
        let consumed = pitch_shift(1.5, &src, &mut dst).unwrap();
        assert_eq!(to_frames(&dst), vec![(0, 0), (150, -150), (300, -300)]);
        // 4.5 frames rounds up to 5
        assert_eq!(consumed, 5 * FRAME_SIZE);
    }

    #[test]
    fn interpolation_truncates_towards_zero() {
        let src = to_bytes(&[(0, 0), (1, -1)]);
        let mut dst = vec![0u8; 2 * FRAME_SIZE];
        pitch_shift(0.5, &src, &mut dst).unwrap();
        assert_eq!(to_frames(&dst), vec![(0, 0), (0, 0)]);
    }

    #[test]
    fn short_source_is_rejected_before_writing() {
        let src = to_bytes(&ramp(4));
        let mut dst = vec![0xaa; 4 * FRAME_SIZE];

        let err = pitch_shift(1.25, &src, &mut dst).unwrap_err();

        // last position 3.75 reads frames 3 and 4
        assert!(matches!(
            err,
            MediaBindError::BufferTooShort {
                needed: 20,
                available: 16
            }
        ));
        assert!(dst.iter().all(|byte| *byte == 0xaa));
    }

    #[test]
    fn huge_ratios_are_rejected_without_overflow() {
        let src = [0u8; 64];
        for ratio in [1e300, f64::MAX] {
            let mut dst = [0x55u8; 2 * FRAME_SIZE];
            assert!(matches!(
                pitch_shift(ratio, &src, &mut dst),
                Err(MediaBindError::BufferTooShort { available: 64, .. })
            ));
            assert_eq!(dst, [0x55u8; 2 * FRAME_SIZE]);
        }

        // a single output frame only ever reads frame 0
        let mut dst = [0u8; FRAME_SIZE];
        assert_eq!(pitch_shift(1e300, &src, &mut dst).unwrap(), usize::MAX);
    }

    #[test]
    fn rejects_degenerate_ratios() {
        let src = to_bytes(&ramp(4));
        let mut dst = vec![0u8; FRAME_SIZE];
        for ratio in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                pitch_shift(ratio, &src, &mut dst),
                Err(MediaBindError::InvalidParameter(_))
            ));
        }
        assert_eq!(pitch_shift(2.0, &src, &mut []).unwrap(), 0);
    }

    #[test]
    fn rate_conversion_uses_rate_ratio() {
        let src = to_bytes(&ramp(8));
        let mut dst = vec![0u8; 4 * FRAME_SIZE];
        let consumed = convert_rate(&src, 44_100, 22_050, &mut dst).unwrap();
        assert_eq!(to_frames(&dst)[1], (200, -200));
        assert_eq!(consumed, 8 * FRAME_SIZE);

        assert!(matches!(
            convert_rate(&src, 0, 48_000, &mut dst),
            Err(MediaBindError::ConversionUnavailable { .. })
        ));
    }

    #[test]
    fn doubling_the_ratio_doubles_the_dominant_frequency() {
        const LEN: usize = 1024;
        const CYCLES: usize = 16;

        let source: Vec<(i16, i16)> = (0..LEN * 2)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * (CYCLES * i) as f32 / LEN as f32;
                let value = (phase.sin() * 10_000.0) as i16;
                (value, value)
            })
            .collect();
        let src = to_bytes(&source);
        let mut dst = vec![0u8; LEN * FRAME_SIZE];
        pitch_shift(2.0, &src, &mut dst).unwrap();

        let peak_bin = |frames: &[(i16, i16)]| {
            let mut planner = RealFftPlanner::<f32>::new();
            let fft = planner.plan_fft_forward(LEN);
            let mut input: Vec<f32> = frames[..LEN].iter().map(|(left, _)| f32::from(*left)).collect();
            let mut spectrum = fft.make_output_vec();
            fft.process(&mut input, &mut spectrum).unwrap();
            spectrum
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
                .map(|(bin, _)| bin)
                .unwrap()
        };

        assert_eq!(peak_bin(&source), CYCLES);
        assert_eq!(peak_bin(&to_frames(&dst)), CYCLES * 2);
    }

    #[test]
    fn pan_gains_cover_centre_and_extremes() {
        assert_eq!(pan_gains(0.0, 1.0), (0.5, 0.5));
        assert_eq!(pan_gains(-1.0, 1.0), (1.0, 0.0));
        assert_eq!(pan_gains(1.0, 1.0), (0.0, 1.0));
        assert_eq!(pan_gains(0.0, 0.0), (0.0, 0.0));
        // out-of-range inputs clamp instead of amplifying
        assert_eq!(pan_gains(-3.0, 2.0), (1.0, 0.0));
    }

    #[test]
    fn pan_scales_each_channel() {
        let src = to_bytes(&[(i16::MIN, i16::MAX), (1000, -1000), (-7, 7)]);
        let mut dst = vec![0u8; src.len()];

        let frames = pan(&src, &mut dst, 0.0, 1.0).unwrap();

        assert_eq!(frames, 3);
        assert_eq!(
            to_frames(&dst),
            vec![(-16384, 16383), (500, -500), (-3, 3)]
        );
    }

    #[test]
    fn pan_in_place_skips_partial_frame() {
        let mut buffer = to_bytes(&[(100, 100), (200, 200)]);
        buffer.extend_from_slice(&[0x11, 0x22]);

        let frames = pan_in_place(&mut buffer, -1.0, 1.0);

        assert_eq!(frames, 2);
        assert_eq!(to_frames(&buffer), vec![(100, 0), (200, 0)]);
        assert_eq!(&buffer[8..], &[0x11, 0x22]);
    }

    #[test]
    fn pan_requires_room_for_output() {
        let src = to_bytes(&ramp(4));
        let mut dst = vec![0u8; 8];
        assert!(matches!(
            pan(&src, &mut dst, 0.0, 1.0),
            Err(MediaBindError::BufferTooShort {
                needed: 16,
                available: 8
            })
        ));
    }
}
