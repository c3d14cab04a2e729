use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use mediabind_core::{
    dsp, AppConfig, AudioSession, AudioSpec, ByteOrder, Context, Event, MediaBindError, PixelFormat, RawEvent,
};
use tracing_subscriber::EnvFilter;

fn main() -> mediabind_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Flags { action } => run_flags(action),
        Commands::Format { depth, order } => run_format(depth.unwrap_or(config.video.depth), order),
        Commands::Event { record } => run_event(&record),
        Commands::Process {
            input,
            output,
            pitch,
            pan,
            volume,
        } => {
            let mixer = &config.mixer;
            run_process(
                &config,
                &input,
                &output,
                pitch.unwrap_or(mixer.pitch),
                pan.unwrap_or(mixer.pan),
                volume.unwrap_or(mixer.volume),
            )
        }
    }
}

fn load_config(path: Option<&Path>) -> mediabind_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::from_json_file(path)
        }
        None => Ok(AppConfig::default()),
    }
}

fn run_flags(action: FlagsAction) -> mediabind_core::Result<()> {
    match action {
        FlagsAction::Decode { context, mask } => {
            let context = Context::from(context);
            let unknown = mask & !context.known_bits();
            if unknown != 0 {
                tracing::warn!(%context, unknown = %format!("{unknown:#x}"), "dropping unknown bits");
            }
            println!("{}", serde_json::to_string(&context.decode_names(mask))?);
        }
        FlagsAction::Encode { context, names } => {
            let mask = Context::from(context).encode_names(&names);
            println!("{mask:#010x}");
        }
    }
    Ok(())
}

fn run_format(depth: u32, order: Option<OrderArg>) -> mediabind_core::Result<()> {
    let order = order.map(ByteOrder::from).unwrap_or(ByteOrder::NATIVE);
    let format = PixelFormat::derive_for(depth, order)?;
    println!("{}", serde_json::to_string_pretty(&format)?);
    Ok(())
}

fn run_event(record: &str) -> mediabind_core::Result<()> {
    let raw = parse_record(record)?;
    tracing::debug!(?raw, "decoding event record");
    let event = Event::decode(&raw);
    println!("{}", serde_json::to_string_pretty(&event)?);
    Ok(())
}

fn run_process(
    config: &AppConfig,
    input: &Path,
    output: &Path,
    pitch: f64,
    pan: f32,
    volume: f32,
) -> mediabind_core::Result<()> {
    tracing::info!(?input, ?output, pitch, pan, volume, "processing sample file");

    let source = std::fs::read(input)?;
    let rendered = render_processed(config.audio.spec(), source, pitch, pan, volume)?;

    std::fs::write(output, &rendered)?;
    tracing::info!(frames = rendered.len() / dsp::FRAME_SIZE, "wrote processed samples");
    Ok(())
}

/// Plays raw stereo s16 samples through an audio session, pitch shifting and
/// panning inside the device callback, and returns what the device would
/// have received.
fn render_processed(
    spec: AudioSpec,
    source: Vec<u8>,
    pitch: f64,
    pan: f32,
    volume: f32,
) -> mediabind_core::Result<Vec<u8>> {
    if !pitch.is_finite() || pitch <= 0.0 {
        return Err(MediaBindError::InvalidParameter("pitch must be finite and greater than zero"));
    }

    let total_frames = producible_frames(source.len() / dsp::FRAME_SIZE, pitch);

    let mut position = 0usize;
    let session = AudioSession::open_for_dsp(spec, move |stream: &mut [u8]| {
        let remaining = &source[position.min(source.len())..];
        let frames = producible_frames(remaining.len() / dsp::FRAME_SIZE, pitch)
            .min(stream.len() / dsp::FRAME_SIZE);
        let (active, tail) = stream.split_at_mut(frames * dsp::FRAME_SIZE);
        tail.fill(0);

        match dsp::pitch_shift(pitch, remaining, active) {
            Ok(consumed) => position = position.saturating_add(consumed),
            Err(err) => {
                tracing::warn!(%err, "source exhausted mid-block");
                active.fill(0);
                position = source.len();
            }
        }
        dsp::pan_in_place(active, pan, volume);
    })?;
    session.pause(false);

    let wanted = total_frames
        .checked_mul(dsp::FRAME_SIZE)
        .ok_or(MediaBindError::InvalidParameter("pitch too small for the input length"))?;
    let mut rendered = Vec::with_capacity(wanted);
    let mut block = vec![0u8; spec.buffer_size()];
    while rendered.len() < wanted {
        session.fill(&mut block)?;
        rendered.extend_from_slice(&block);
    }
    rendered.truncate(wanted);
    session.pause(true);
    Ok(rendered)
}

/// Output frames a resample at `ratio` can produce from `frames` source
/// frames without reading past the end.
fn producible_frames(frames: usize, ratio: f64) -> usize {
    if frames == 0 {
        return 0;
    }
    (((frames - 1) as f64 / ratio).floor() as usize).saturating_add(1)
}

fn parse_record(text: &str) -> mediabind_core::Result<RawEvent> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if !digits.is_ascii() || digits.len() % 2 != 0 {
        return Err(MediaBindError::msg("event record must be an even number of hex digits"));
    }

    let bytes = (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|err| MediaBindError::msg(format!("invalid hex in event record: {err}")))?;
    RawEvent::try_from(bytes.as_slice())
}

fn parse_mask(text: &str) -> Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|err| format!("invalid mask `{text}`: {err}"))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and exercise the mediabind marshaling core", long_about = None)]
struct Cli {
    /// JSON configuration file supplying defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert between native flag masks and flag names.
    Flags {
        #[command(subcommand)]
        action: FlagsAction,
    },
    /// Print the pixel layout derived for a colour depth.
    Format {
        /// Bits per pixel (15, 16, 24 or 32). Defaults to the configured depth.
        depth: Option<u32>,
        /// Byte order to derive for instead of the host's.
        #[arg(long, value_enum)]
        order: Option<OrderArg>,
    },
    /// Decode a native event record given as hex.
    Event {
        record: String,
    },
    /// Pitch shift and pan a raw interleaved stereo s16 sample file.
    Process {
        input: PathBuf,
        output: PathBuf,
        #[arg(long)]
        pitch: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        pan: Option<f32>,
        #[arg(long)]
        volume: Option<f32>,
    },
}

#[derive(Subcommand, Debug)]
enum FlagsAction {
    Decode {
        #[arg(value_enum)]
        context: ContextArg,
        #[arg(value_parser = parse_mask)]
        mask: u32,
    },
    Encode {
        #[arg(value_enum)]
        context: ContextArg,
        names: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ContextArg {
    Init,
    Video,
    KeyMod,
    AppState,
}

impl From<ContextArg> for Context {
    fn from(value: ContextArg) -> Self {
        match value {
            ContextArg::Init => Context::Init,
            ContextArg::Video => Context::Video,
            ContextArg::KeyMod => Context::KeyMod,
            ContextArg::AppState => Context::AppState,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OrderArg {
    Little,
    Big,
}

impl From<OrderArg> for ByteOrder {
    fn from(value: OrderArg) -> Self {
        match value {
            OrderArg::Little => ByteOrder::Little,
            OrderArg::Big => ByteOrder::Big,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_decimal_masks() {
        assert_eq!(parse_mask("0x8000").unwrap(), 0x8000);
        assert_eq!(parse_mask("12").unwrap(), 12);
        assert!(parse_mask("0xzz").is_err());
    }

    #[test]
    fn parses_event_records() {
        let hex = format!("{}{}", hex_word(12), "00".repeat(20));
        assert_eq!(Event::decode(&parse_record(&hex).unwrap()), Event::Quit);
        assert!(parse_record("0c00").is_err());
        assert!(parse_record("abc").is_err());
    }

    #[test]
    fn producible_frames_never_overrun_the_source() {
        assert_eq!(producible_frames(0, 1.0), 0);
        assert_eq!(producible_frames(16, 1.0), 16);
        assert_eq!(producible_frames(4, 2.0), 2);
        assert_eq!(producible_frames(4, 0.5), 7);
        assert_eq!(producible_frames(4, 1e-300), usize::MAX);
    }

    fn stereo_ramp(frames: i16) -> Vec<u8> {
        (0..frames)
            .flat_map(|i| {
                let value = i * 100;
                [value.to_ne_bytes(), (-value).to_ne_bytes()].concat()
            })
            .collect()
    }

    fn left_channel(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(dsp::FRAME_SIZE)
            .map(|frame| i16::from_ne_bytes([frame[0], frame[1]]))
            .collect()
    }

    fn right_channel(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(dsp::FRAME_SIZE)
            .map(|frame| i16::from_ne_bytes([frame[2], frame[3]]))
            .collect()
    }

    #[test]
    fn processing_spans_blocks_and_stops_at_the_source_end() {
        // 10 frames through 4-frame device blocks: 4 + 4 + 2, then silence
        let spec = AudioSpec::stereo_s16(48_000, 4);
        let rendered = render_processed(spec, stereo_ramp(10), 1.0, -1.0, 1.0).unwrap();

        assert_eq!(rendered.len(), 10 * dsp::FRAME_SIZE);
        assert_eq!(left_channel(&rendered), (0..10).map(|i| i * 100).collect::<Vec<i16>>());
        assert!(right_channel(&rendered).iter().all(|sample| *sample == 0));
    }

    #[test]
    fn processing_advances_by_consumed_frames() {
        // ratio 2 reads source frames 0, 2, 4, 6 in the first block and 8 in
        // the second, then centre pan halves each sample
        let spec = AudioSpec::stereo_s16(48_000, 4);
        let rendered = render_processed(spec, stereo_ramp(10), 2.0, 0.0, 1.0).unwrap();

        assert_eq!(rendered.len(), 5 * dsp::FRAME_SIZE);
        assert_eq!(left_channel(&rendered), vec![0, 100, 200, 300, 400]);
        assert_eq!(right_channel(&rendered), vec![0, -100, -200, -300, -400]);
    }

    #[test]
    fn processing_rejects_bad_pitch_and_empty_input() {
        let spec = AudioSpec::stereo_s16(48_000, 4);
        assert!(matches!(
            render_processed(spec, stereo_ramp(4), 0.0, 0.0, 1.0),
            Err(MediaBindError::InvalidParameter(_))
        ));
        assert!(matches!(
            render_processed(spec, stereo_ramp(4), 1e-300, 0.0, 1.0),
            Err(MediaBindError::InvalidParameter(_))
        ));
        assert!(render_processed(spec, Vec::new(), 1.0, 0.0, 1.0).unwrap().is_empty());
    }

    #[test]
    fn process_command_writes_the_rendered_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.raw");
        let output = dir.path().join("out.raw");
        std::fs::write(&input, stereo_ramp(6)).unwrap();

        let mut config = AppConfig::default();
        config.audio.block_frames = 4;
        run_process(&config, &input, &output, 1.0, 1.0, 1.0).unwrap();

        let written = std::fs::read(&output).unwrap();
        assert_eq!(written.len(), 6 * dsp::FRAME_SIZE);
        assert!(left_channel(&written).iter().all(|sample| *sample == 0));
        assert_eq!(right_channel(&written), vec![0, -100, -200, -300, -400, -500]);
    }

    fn hex_word(value: u32) -> String {
        value.to_ne_bytes().iter().map(|byte| format!("{byte:02x}")).collect()
    }
}
