//! henka: ear training for chord progressions

mod config;
mod settings;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use henka_core::{
    build_chord, format_absolute_label, format_roman_label, instrument_options, ChordProgression, ChordType,
    DifficultyId, GameMode, GenerationOptions, InstrumentId, PitchClass, ProgressionGenerator, QuestionGenerator,
};
use henka_services::{AudioEngine, OfflineContextFactory, RealtimeContextFactory};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::Settings;

#[derive(Parser)]
#[command(name = "henka")]
#[command(author, version, about = "Chord progression ear training", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct ProgressionArgs {
    /// easy, beginner, intermediate, advanced or custom
    #[arg(short, long, default_value = "beginner")]
    difficulty: String,

    /// Key such as G or F#; random within the level's keys when omitted
    #[arg(short, long)]
    key: Option<String>,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Override the level's voice-leading flag
    #[arg(long)]
    voice_leading: Option<bool>,

    /// Roman numerals to voice instead of a random template
    #[arg(value_name = "ROMAN")]
    roman: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a progression
    Generate {
        #[command(flatten)]
        progression: ProgressionArgs,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Generate a progression and play it
    Play {
        #[command(flatten)]
        progression: ProgressionArgs,

        #[arg(short, long)]
        instrument: Option<String>,
    },

    /// Build a single chord
    Chord {
        root: String,

        #[arg(default_value = "major")]
        chord_type: String,

        #[arg(short, long, default_value_t = 4)]
        octave: i32,

        #[arg(long, default_value_t = 0)]
        inversion: usize,

        /// Show the Roman numeral relative to this key
        #[arg(short, long)]
        key: Option<String>,

        /// Play the chord for this many seconds
        #[arg(long, value_name = "SECONDS")]
        play: Option<f64>,

        #[arg(short, long)]
        instrument: Option<String>,
    },

    /// Play questions and check typed answers
    Quiz {
        /// absolute (chord names) or transpose (Roman numerals)
        #[arg(short, long, default_value = "absolute")]
        mode: String,

        #[arg(short, long, default_value = "beginner")]
        difficulty: String,

        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,

        #[arg(long)]
        seed: Option<u64>,

        /// Do not play audio
        #[arg(long)]
        silent: bool,
    },

    /// Render a progression to a WAV file
    Render {
        #[command(flatten)]
        progression: ProgressionArgs,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        #[arg(short, long)]
        instrument: Option<String>,

        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
    },

    /// List instrument presets
    Instruments,

    /// Show or change stored settings
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file
    Show,
    /// Default instrument
    Instrument { id: String },
    /// Force voice leading on or off, or `auto` to follow each level
    VoiceLeading { value: String },
    /// Settings behind the `custom` difficulty
    Custom {
        /// Comma-separated chord types, e.g. major,minor7,dominant7
        #[arg(long, value_delimiter = ',')]
        chord_types: Option<Vec<String>>,
        #[arg(long)]
        length: Option<usize>,
        #[arg(long)]
        inversions: Option<bool>,
        #[arg(long)]
        inversion_probability: Option<f64>,
        #[arg(long)]
        max_inversion: Option<usize>,
        #[arg(long)]
        voice_leading: Option<bool>,
        /// Comma-separated keys; empty allows every key
        #[arg(long, value_delimiter = ',')]
        keys: Option<Vec<String>>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("henka=debug".parse()?)
            .add_directive("cpal=warn".parse()?)
            .add_directive("symphonia=warn".parse()?))
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load();

    match cli.command {
        Commands::Generate { progression, json } => {
            let progression = generate(&settings, &progression)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&progression)?);
            } else {
                print_progression(&progression);
            }
        }
        Commands::Play { progression, instrument } => {
            let progression = generate(&settings, &progression)?;
            print_progression(&progression);

            let mut engine = settings.engine(RealtimeContextFactory, parse_instrument(instrument.as_deref())?);
            engine.play_progression(&progression).wait();
        }
        Commands::Chord {
            root,
            chord_type,
            octave,
            inversion,
            key,
            play,
            instrument,
        } => {
            let chord = build_chord(&root, &chord_type, octave, inversion)?;
            let root: PitchClass = root.parse()?;
            let chord_type: ChordType = chord_type.parse()?;

            println!("{}  {:?}", format_absolute_label(root, chord_type), chord.notes);
            if let Some(key) = key {
                println!("in {}: {}", key, format_roman_label(root, chord_type, key.parse()?));
            }

            if let Some(seconds) = play {
                let mut engine = settings.engine(RealtimeContextFactory, parse_instrument(instrument.as_deref())?);
                engine.play_chord(&chord, seconds).wait();
            }
        }
        Commands::Quiz {
            mode,
            difficulty,
            count,
            seed,
            silent,
        } => {
            let mode: GameMode = mode.parse().map_err(|e: String| anyhow!(e))?;
            quiz(&settings, mode, &difficulty, count, seed, silent)?;
        }
        Commands::Render {
            progression,
            output,
            instrument,
            sample_rate,
        } => {
            let progression = generate(&settings, &progression)?;
            let engine = settings.engine(OfflineContextFactory { sample_rate }, parse_instrument(instrument.as_deref())?);
            render(engine, &progression, &output, sample_rate)?;
        }
        Commands::Instruments => {
            for config in instrument_options() {
                let marker = if config.id == settings.instrument() { "*" } else { " " };
                println!("{} {:<16} {:<16} {}", marker, config.id, config.label, config.description);
            }
        }
        Commands::Config { action } => configure(&mut settings, action)?,
    }

    Ok(())
}

fn parse_instrument(id: Option<&str>) -> Result<Option<InstrumentId>> {
    Ok(id.map(str::parse).transpose()?)
}

fn generator(seed: Option<u64>) -> ProgressionGenerator {
    seed.map(ProgressionGenerator::with_seed).unwrap_or_default()
}

fn generate(settings: &Settings, args: &ProgressionArgs) -> Result<ChordProgression> {
    let level = settings.difficulty(args.difficulty.parse()?);
    let options = args
        .voice_leading
        .map(GenerationOptions::with_voice_leading)
        .unwrap_or_else(|| settings.generation_options());
    let key: Option<PitchClass> = args.key.as_deref().map(str::parse).transpose()?;
    let mut generator = generator(args.seed);

    let progression = if args.roman.is_empty() {
        generator.random(&level, key, options)?
    } else {
        generator.from_roman(&args.roman, key.unwrap_or(PitchClass::C), Some(&level), options)?
    };

    info!(
        difficulty = %level.id,
        key = %progression.key,
        chords = progression.chords.len(),
        "Generated progression"
    );
    Ok(progression)
}

fn print_progression(progression: &ChordProgression) {
    println!("Key: {}  Tempo: {}", progression.key, progression.tempo);
    for chord in &progression.chords {
        println!(
            "  {:<10} {:<22} {:?}",
            chord.roman_numeral.as_deref().unwrap_or("-"),
            chord.name,
            chord.notes
        );
    }
}

fn quiz(settings: &Settings, mode: GameMode, difficulty: &str, count: usize, seed: Option<u64>, silent: bool) -> Result<()> {
    let id: DifficultyId = difficulty.parse()?;
    let level = settings.difficulty(id);
    let mut questions = QuestionGenerator::new(generator(seed));
    let questions = questions.question_set(mode, &level, count, settings.generation_options())?;

    let mut engine = (!silent).then(|| settings.engine(RealtimeContextFactory, None));
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut score = 0;

    for (i, question) in questions.iter().enumerate() {
        println!("\nQuestion {}/{} ({} chords)", i + 1, questions.len(), question.correct_answer.len());
        println!("{}", question.hint());
        if let Some(engine) = engine.as_mut() {
            engine.play_progression(&question.progression).wait();
        }

        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next().transpose()? else { break };
        let answer: Vec<&str> = line.split_whitespace().collect();

        if question.check(&answer) {
            score += 1;
            println!("Correct");
        } else {
            println!("Expected: {}", question.correct_answer.join(" "));
        }
    }

    println!("\nScore: {}/{}", score, questions.len());
    Ok(())
}

fn render(mut engine: AudioEngine, progression: &ChordProgression, output: &Path, sample_rate: u32) -> Result<()> {
    let started = Instant::now();
    let playback = engine.play_progression(progression);
    let seconds = playback.deadline().saturating_duration_since(started).as_secs_f64();
    let context = engine
        .context()
        .ok_or_else(|| anyhow!("offline audio context unavailable"))?;

    let frames = (seconds * sample_rate as f64).ceil() as usize;
    let samples = context.render(frames)?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(output, spec)
        .with_context(|| format!("creating {}", output.display()))?;
    for sample in &samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;

    info!(path = %output.display(), frames, "Rendered progression");
    println!("Wrote {} ({:.2}s)", output.display(), seconds);
    Ok(())
}

fn configure(settings: &mut Settings, action: Option<ConfigAction>) -> Result<()> {
    let Some(action) = action else {
        println!("{}", config::config_path().display());
        return Ok(());
    };

    match action {
        ConfigAction::Show => {
            println!("# {}", config::config_path().display());
            print!("{}", toml::to_string_pretty(settings.config())?);
            return Ok(());
        }
        ConfigAction::Instrument { id } => settings.set_instrument(id.parse()?),
        ConfigAction::VoiceLeading { value } => {
            let enabled = match value.as_str() {
                "auto" => None,
                other => Some(other.parse::<bool>().context("expected true, false or auto")?),
            };
            settings.set_voice_leading(enabled);
        }
        ConfigAction::Custom {
            chord_types,
            length,
            inversions,
            inversion_probability,
            max_inversion,
            voice_leading,
            keys,
        } => {
            let mut custom = settings.custom_difficulty().clone();
            if let Some(types) = chord_types {
                custom.chord_types = types.iter().map(|t| t.parse()).collect::<Result<Vec<ChordType>, _>>()?;
            }
            if let Some(length) = length {
                custom.progression_length = length;
            }
            if let Some(enabled) = inversions {
                custom.use_inversions = enabled;
            }
            if let Some(p) = inversion_probability {
                custom.inversion_probability = p;
            }
            if let Some(max) = max_inversion {
                custom.max_inversion = max;
            }
            if let Some(enabled) = voice_leading {
                custom.use_voice_leading = enabled;
            }
            if let Some(keys) = keys {
                let keys = keys
                    .iter()
                    .filter(|k| !k.is_empty())
                    .map(|k| k.parse())
                    .collect::<Result<Vec<PitchClass>, _>>()?;
                custom.allowed_keys = (!keys.is_empty()).then_some(keys);
            }
            settings.set_custom_difficulty(custom);
        }
    }

    settings.save()?;
    println!("Saved {}", config::config_path().display());
    Ok(())
}
