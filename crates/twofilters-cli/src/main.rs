use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use twofilters_engine::{EngineConfig, NullHost, OutputEvent, PatchState, TransportInfo, TwoFiltersPlugin};

#[derive(Parser)]
#[command(author, version, about = "Offline tools for the Two Filters effect")]
struct Cli {
    /// Engine configuration (JSON). Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a WAV file through the effect.
    Render(RenderArgs),
    /// List the parameter schema in presentation order.
    Params,
    /// Write the default patch state.
    InitPatch {
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Args)]
struct RenderArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    output: PathBuf,
    /// Patch state (JSON) loaded before rendering.
    #[arg(long)]
    patch: Option<PathBuf>,
    /// Host tempo reported to the engine.
    #[arg(long, default_value_t = 120.0)]
    tempo: f64,
    /// Report a playing transport, enabling bar retriggers.
    #[arg(long)]
    playing: bool,
    /// Frames per host processing call.
    #[arg(long, default_value_t = 512)]
    host_frames: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter)))
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    match cli.command {
        Commands::Render(args) => execute_render(config, args),
        Commands::Params => list_params(config),
        Commands::InitPatch { output } => write_default_patch(&output),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("failed to read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a valid engine config", path.display()))
}

/// Planar stereo audio. Mono input is duplicated to both channels.
struct StereoAudio {
    sample_rate: u32,
    channels: [Vec<f32>; 2],
}

fn read_wav(path: &Path) -> Result<StereoAudio> {
    let mut reader = hound::WavReader::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, hound::Error>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 * scale))
                .collect::<Result<Vec<_>, hound::Error>>()?
        }
    };
    let stride = usize::from(spec.channels);
    if stride == 0 {
        bail!("{} has no channels", path.display());
    }
    let left: Vec<f32> = interleaved.iter().step_by(stride).copied().collect();
    let right: Vec<f32> = if stride > 1 {
        interleaved.iter().skip(1).step_by(stride).copied().collect()
    } else {
        left.clone()
    };
    debug!(channels = stride, frames = left.len(), "input decoded");
    Ok(StereoAudio {
        sample_rate: spec.sample_rate,
        channels: [left, right],
    })
}

fn write_wav(path: &Path, audio: &StereoAudio) -> Result<()> {
    let mut writer = hound::WavWriter::create(
        path,
        hound::WavSpec {
            channels: 2,
            sample_rate: audio.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        },
    )
    .with_context(|| format!("failed to create {}", path.display()))?;
    let [left, right] = &audio.channels;
    for (l, r) in left.iter().zip(right) {
        writer.write_sample(*l)?;
        writer.write_sample(*r)?;
    }
    writer.finalize()?;
    Ok(())
}

fn execute_render(config: EngineConfig, args: RenderArgs) -> Result<()> {
    if args.host_frames == 0 {
        bail!("--host-frames must be positive");
    }
    let input = read_wav(&args.input)?;
    let plugin = TwoFiltersPlugin::new(config, Arc::new(NullHost));
    plugin.activate(f64::from(input.sample_rate));
    if let Some(path) = &args.patch {
        let text = fs::read_to_string(path).with_context(|| format!("failed to read patch {}", path.display()))?;
        plugin.state_load_json(&text)?;
    }

    // The engine delays by one control block; the tail is flushed with
    // silence and the head is dropped.
    let latency = plugin.latency_samples() as usize;
    let frames = input.channels[0].len();
    let padded: [Vec<f32>; 2] = input.channels.map(|mut channel| {
        channel.resize(frames + latency, 0.0);
        channel
    });
    let mut rendered = [vec![0.0; frames + latency], vec![0.0; frames + latency]];
    let mut events: Vec<OutputEvent> = Vec::new();
    let sample_rate = f64::from(input.sample_rate);

    let mut start = 0;
    while start < frames + latency {
        let end = (start + args.host_frames).min(frames + latency);
        let transport = TransportInfo {
            playing: args.playing,
            tempo_bpm: args.tempo,
            song_pos_beats: Some(start as f64 / sample_rate * args.tempo / 60.0),
            ..TransportInfo::default()
        };
        let [out_left, out_right] = &mut rendered;
        plugin.process(
            [&padded[0][start..end], &padded[1][start..end]],
            [&mut out_left[start..end], &mut out_right[start..end]],
            &[],
            Some(transport),
            &mut events,
        );
        start = end;
    }
    if !events.is_empty() {
        debug!(count = events.len(), "host events emitted during render");
    }

    let output = StereoAudio {
        sample_rate: input.sample_rate,
        channels: rendered.map(|channel| channel[latency..].to_vec()),
    };
    write_wav(&args.output, &output)?;
    info!(frames, output = %args.output.display(), "render finished");
    Ok(())
}

fn list_params(config: EngineConfig) -> Result<()> {
    let plugin = TwoFiltersPlugin::new(config, Arc::new(NullHost));
    let mut group = String::new();
    for meta in plugin.param_infos() {
        if meta.group != group {
            println!("{}", meta.group);
            group.clone_from(&meta.group);
        }
        println!(
            "  {:>5}  {:<24} {:>12} .. {:<12} default {}",
            meta.id,
            meta.name,
            meta.format_value(meta.min),
            meta.format_value(meta.max),
            meta.format_value(meta.default),
        );
    }
    Ok(())
}

fn write_default_patch(path: &Path) -> Result<()> {
    let json = PatchState::default().to_json()?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote default patch to {}", path.display());
    Ok(())
}
