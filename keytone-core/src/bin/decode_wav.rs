//! Offline WAV → text decoder built on the public engine API.
//!
//! Computes a windowed RMS envelope from a WAV file, scales it to the 0–100
//! level range, runs the offline decode pass and prints the text (or a JSON
//! event report).

fn main() {
    if let Err(e) = run() {
        eprintln!("decode_wav failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    use std::path::{Path, PathBuf};
    use std::time::{Duration, Instant};

    use serde::Serialize;

    use keytone_core::config::{GapConfig, SettingsUpdate, ThresholdConfig};
    use keytone_core::events::DecodeEventKind;
    use keytone_core::offline::{decode_samples, samples_from_envelope};
    use keytone_core::SymbolTables;

    #[derive(Debug)]
    struct Args {
        input: PathBuf,
        window_ms: u64,
        json: bool,
        output: Option<PathBuf>,
        settings: SettingsUpdate,
    }

    #[derive(Debug, Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Report {
        input: String,
        sample_rate: u32,
        window_ms: u64,
        text: String,
        symbols: usize,
        letters: usize,
        events: Vec<DecodeEventKind>,
    }

    fn parse_args() -> Result<Args, String> {
        let mut input: Option<PathBuf> = None;
        let mut window_ms: u64 = 20;
        let mut json = false;
        let mut output: Option<PathBuf> = None;
        let mut settings = SettingsUpdate::default();

        fn next_value(it: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
            it.next().ok_or_else(|| format!("missing value for {flag}"))
        }

        fn parse<T: std::str::FromStr>(value: String, flag: &str) -> Result<T, String> {
            value
                .parse::<T>()
                .map_err(|_| format!("invalid value for {flag}"))
        }

        let mut it = std::env::args().skip(1);
        while let Some(arg) = it.next() {
            match arg.as_str() {
                "--input" => input = Some(PathBuf::from(next_value(&mut it, "--input")?)),
                "--window-ms" => {
                    window_ms =
                        parse::<u64>(next_value(&mut it, "--window-ms")?, "--window-ms")?
                            .clamp(1, 200);
                }
                "--threshold" => {
                    settings.threshold =
                        Some(parse(next_value(&mut it, "--threshold")?, "--threshold")?);
                }
                "--dot-ms" => {
                    settings.dot_length_ms =
                        Some(parse(next_value(&mut it, "--dot-ms")?, "--dot-ms")?);
                }
                "--dash-multiplier" => {
                    settings.dash_multiplier = Some(parse(
                        next_value(&mut it, "--dash-multiplier")?,
                        "--dash-multiplier",
                    )?);
                }
                "--letter-gap-ms" => {
                    settings.letter_gap_ms = Some(parse(
                        next_value(&mut it, "--letter-gap-ms")?,
                        "--letter-gap-ms",
                    )?);
                }
                "--word-gap-ms" => {
                    settings.word_gap_ms =
                        Some(parse(next_value(&mut it, "--word-gap-ms")?, "--word-gap-ms")?);
                }
                "--auto-commit-ms" => {
                    settings.auto_commit_ms = Some(parse(
                        next_value(&mut it, "--auto-commit-ms")?,
                        "--auto-commit-ms",
                    )?);
                }
                "--json" => json = true,
                "--output" => output = Some(PathBuf::from(next_value(&mut it, "--output")?)),
                "--help" | "-h" => {
                    println!(
                        "Usage: cargo run -p keytone-core --bin decode_wav -- \\
  --input <file.wav> [--window-ms <n>] [--threshold <0-100>] [--dot-ms <n>] \\
  [--dash-multiplier <x>] [--letter-gap-ms <n>] [--word-gap-ms <n>] \\
  [--auto-commit-ms <n>] [--json] [--output <file.json>]"
                    );
                    std::process::exit(0);
                }
                other => return Err(format!("unknown argument: {other}")),
            }
        }

        let input = input.ok_or("missing required --input <file.wav>")?;
        Ok(Args {
            input,
            window_ms,
            json,
            output,
            settings,
        })
    }

    fn read_wav_mono_f32(path: &Path) -> Result<(Vec<f32>, u32), String> {
        let mut reader = hound::WavReader::open(path).map_err(|e| e.to_string())?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map_err(|e| e.to_string()))
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                if spec.bits_per_sample <= 16 {
                    reader
                        .samples::<i16>()
                        .map(|s| {
                            s.map(|v| (v as f32) / (i16::MAX as f32))
                                .map_err(|e| e.to_string())
                        })
                        .collect::<Result<Vec<_>, _>>()?
                } else {
                    let max = ((1_i64 << (spec.bits_per_sample - 1)) - 1) as f32;
                    reader
                        .samples::<i32>()
                        .map(|s| s.map(|v| (v as f32) / max).map_err(|e| e.to_string()))
                        .collect::<Result<Vec<_>, _>>()?
                }
            }
        };

        if channels == 1 {
            return Ok((interleaved, spec.sample_rate));
        }

        let mut mono = Vec::with_capacity(interleaved.len() / channels);
        for frame in interleaved.chunks(channels) {
            let sum = frame.iter().copied().sum::<f32>();
            mono.push(sum / channels as f32);
        }
        Ok((mono, spec.sample_rate))
    }

    /// Per-window RMS of [-1, 1] PCM, scaled onto the 0–100 level range.
    fn rms_envelope(samples: &[f32], window_samples: usize) -> Vec<f32> {
        samples
            .chunks(window_samples.max(1))
            .map(|window| {
                let sum_sq = window.iter().map(|s| s * s).sum::<f32>();
                (sum_sq / window.len() as f32).sqrt() * 100.0
            })
            .collect()
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = parse_args()?;

    let mut thresholds = ThresholdConfig::default();
    let mut gaps = GapConfig::default();
    args.settings
        .apply_to(&mut thresholds, &mut gaps)
        .map_err(|e| e.to_string())?;

    let (pcm, sample_rate) = read_wav_mono_f32(&args.input)?;
    if pcm.is_empty() {
        return Err(format!("no samples in {}", args.input.display()));
    }

    let window_samples = (sample_rate as u64 * args.window_ms / 1000).max(1) as usize;
    let envelope = rms_envelope(&pcm, window_samples);
    let samples = samples_from_envelope(
        &envelope,
        Duration::from_millis(args.window_ms),
        Instant::now(),
    );

    let decoded = decode_samples(&samples, &thresholds, &gaps, &SymbolTables::default());

    let symbols = decoded
        .events
        .iter()
        .filter(|e| matches!(e, DecodeEventKind::Symbol { .. }))
        .count();
    let letters = decoded
        .events
        .iter()
        .filter(|e| matches!(e, DecodeEventKind::Letter { .. }))
        .count();

    if args.json {
        let report = Report {
            input: args.input.display().to_string(),
            sample_rate,
            window_ms: args.window_ms,
            text: decoded.text.clone(),
            symbols,
            letters,
            events: decoded.events,
        };
        let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        if let Some(out) = args.output {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
            std::fs::write(&out, json).map_err(|e| e.to_string())?;
            println!("Wrote decode report: {}", out.display());
        } else {
            println!("{json}");
        }
    } else {
        println!("{}", decoded.text);
        eprintln!(
            "{} windows, {} symbols, {} letters",
            envelope.len(),
            symbols,
            letters
        );
    }

    Ok(())
}
