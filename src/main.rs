use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use monos::config::EditorConfig;
use monos::export::{self, ExportFormat};
use monos::processing::BlurMode;
use monos::session::EditSession;
use monos::state::{ContrastScale, ParamField};
use monos::{FilmError, presets};

const USAGE: &str = "\
usage:
  monos presets [--json]
  monos fields
  monos config [--write-defaults]
  monos render <input> [output] [--preset NAME] [--set field=value]...
               [--seed N] [--blur-mode box|radial] [--format jpeg|png|webp]
               [--max-bytes N] [--contrast-scale signed|percent]";

#[derive(Debug, PartialEq)]
enum Command {
    Presets { json: bool },
    Fields,
    Config { write_defaults: bool },
    Render(RenderArgs),
    Help,
}

#[derive(Debug, PartialEq)]
struct RenderArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    preset: Option<String>,
    sets: Vec<(ParamField, f32)>,
    seed: Option<u64>,
    blur_mode: Option<BlurMode>,
    format: Option<ExportFormat>,
    max_bytes: Option<u64>,
    contrast_scale: ContrastScale,
}

impl RenderArgs {
    fn new(input: PathBuf) -> Self {
        Self {
            input,
            output: None,
            preset: None,
            sets: Vec::new(),
            seed: None,
            blur_mode: None,
            format: None,
            max_bytes: None,
            contrast_scale: ContrastScale::Signed,
        }
    }
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Command> {
    let mut args = args.into_iter();
    let Some(cmd) = args.next() else {
        return Ok(Command::Help);
    };
    match cmd.as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "fields" => Ok(Command::Fields),
        "config" => {
            let mut write_defaults = false;
            for arg in args {
                match arg.as_str() {
                    "--write-defaults" => write_defaults = true,
                    other => bail!("unexpected argument `{other}` for config"),
                }
            }
            Ok(Command::Config { write_defaults })
        }
        "presets" => {
            let mut json = false;
            for arg in args {
                match arg.as_str() {
                    "--json" => json = true,
                    other => bail!("unexpected argument `{other}` for presets"),
                }
            }
            Ok(Command::Presets { json })
        }
        "render" => parse_render(args).map(Command::Render),
        other => bail!("unknown command `{other}`\n{USAGE}"),
    }
}

fn parse_render<I: Iterator<Item = String>>(mut args: I) -> Result<RenderArgs> {
    let mut positional = Vec::new();
    let mut sets = Vec::new();
    let mut render = RenderArgs::new(PathBuf::new());
    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .with_context(|| format!("{flag} expects a value"))
        };
        match arg.as_str() {
            "--preset" => render.preset = Some(value("--preset")?),
            "--set" => sets.push(value("--set")?),
            "--seed" => {
                let raw = value("--seed")?;
                render.seed = Some(raw.parse().with_context(|| format!("bad seed `{raw}`"))?);
            }
            "--blur-mode" => {
                let raw = value("--blur-mode")?;
                render.blur_mode =
                    Some(BlurMode::parse(&raw).with_context(|| format!("bad blur mode `{raw}`"))?);
            }
            "--format" => {
                let raw = value("--format")?;
                render.format = Some(parse_format(&raw)?);
            }
            "--max-bytes" => {
                let raw = value("--max-bytes")?;
                render.max_bytes =
                    Some(raw.parse().with_context(|| format!("bad byte limit `{raw}`"))?);
            }
            "--contrast-scale" => {
                let raw = value("--contrast-scale")?;
                render.contrast_scale = ContrastScale::parse(&raw)
                    .with_context(|| format!("bad contrast scale `{raw}`"))?;
            }
            flag if flag.starts_with("--") => bail!("unknown flag `{flag}`\n{USAGE}"),
            _ => positional.push(PathBuf::from(&arg)),
        }
    }

    let mut positional = positional.into_iter();
    render.input = positional.next().context("render needs an input image")?;
    render.output = positional.next();
    if let Some(extra) = positional.next() {
        bail!("unexpected argument `{}`", extra.display());
    }
    // Applied after all flags so --contrast-scale may come last.
    for raw in sets {
        render.sets.push(parse_set(&raw, render.contrast_scale)?);
    }
    Ok(render)
}

fn parse_set(raw: &str, scale: ContrastScale) -> Result<(ParamField, f32)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("--set expects field=value, got `{raw}`"))?;
    let field: ParamField = name.parse()?;
    let value: f32 = value
        .trim()
        .parse()
        .with_context(|| format!("bad number for {field}: `{value}`"))?;
    let value = if field == ParamField::Contrast {
        scale.to_signed(value)
    } else {
        value
    };
    Ok((field, value))
}

fn parse_format(raw: &str) -> Result<ExportFormat> {
    let raw = raw.trim().to_ascii_lowercase();
    let ext = if raw == "jpeg" { "jpg" } else { raw.as_str() };
    ExportFormat::ALL
        .into_iter()
        .find(|f| f.extension() == ext)
        .with_context(|| format!("bad format `{raw}`"))
}

fn print_presets(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(presets::all())?);
        return Ok(());
    }
    for p in presets::all() {
        let speed = p.speed.map(|s| format!("ISO {s}")).unwrap_or_default();
        println!("{:<14} {:<24} {:>8}  {}", p.id, p.name, speed, p.description);
    }
    Ok(())
}

fn print_fields() {
    for field in ParamField::ALL {
        let range = field.range();
        println!("{:<18} {:>6} .. {:<6}", field.name(), range.start(), range.end());
        if field == ParamField::Contrast {
            let percent = ContrastScale::Percent;
            println!(
                "{:<18} {:>6} .. {:<6} (--contrast-scale percent)",
                "",
                percent.from_signed(*range.start()),
                percent.from_signed(*range.end())
            );
        }
    }
}

fn show_config(write_defaults: bool) -> Result<()> {
    if write_defaults {
        let path = EditorConfig::default()
            .save()
            .context("failed to write default config")?;
        eprintln!("monos: wrote defaults to {}", path.display());
        return Ok(());
    }
    match EditorConfig::config_path() {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no user config directory"),
    }
    print!("{}", EditorConfig::load().to_toml()?);
    Ok(())
}

/// Explicit `--format` wins, then the output extension, then the config.
/// A `--format` that contradicts the output extension is an error.
fn pick_format(args: &RenderArgs, config: &EditorConfig) -> Result<ExportFormat> {
    let from_ext = args
        .output
        .as_deref()
        .filter(|p| !p.is_dir())
        .and_then(ExportFormat::from_path);
    match (args.format, from_ext) {
        (Some(asked), Some(ext)) if asked != ext => bail!(
            "--format {} conflicts with output extension .{}",
            asked.extension(),
            ext.extension()
        ),
        (Some(asked), _) => Ok(asked),
        (None, Some(ext)) => Ok(ext),
        (None, None) => Ok(config.export_format),
    }
}

/// Resolves where the export goes: an explicit file, a directory, or next to
/// the source (or in the configured output dir) without overwriting anything.
fn resolve_output(args: &RenderArgs, config: &EditorConfig, format: ExportFormat) -> PathBuf {
    match args.output.as_ref() {
        Some(path) if !path.is_dir() => path.clone(),
        Some(dir) => export::build_output_path(&args.input, dir, format),
        None => {
            let dir = config
                .output_dir
                .clone()
                .or_else(|| args.input.parent().map(Path::to_path_buf))
                .unwrap_or_default();
            export::build_output_path(&args.input, &dir, format)
        }
    }
}

fn render(args: RenderArgs, mut config: EditorConfig) -> Result<()> {
    if let Some(seed) = args.seed {
        config.grain_seed = Some(seed);
    }
    if let Some(mode) = args.blur_mode {
        config.blur_mode = mode;
    }
    let max_bytes = args.max_bytes.unwrap_or(config.export_max_bytes);
    let format = pick_format(&args, &config)?;
    let output = resolve_output(&args, &config, format);

    let mut session = EditSession::open(&args.input, &config)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    if let Some(name) = args.preset.as_deref() {
        session.apply_preset(presets::lookup(name)?);
    }
    let now = Instant::now();
    for (field, value) in &args.sets {
        let stored = session.set_field(*field, *value, now)?;
        tracing::debug!(field = field.name(), stored, "parameter set");
    }
    if session.params().is_identity() {
        eprintln!("monos: no preset or parameters given, writing plain grayscale");
    }

    let started = Instant::now();
    match session.export_to_path(&output, format, max_bytes) {
        Ok(encoded) => {
            eprintln!(
                "monos: wrote {} ({} bytes, {} q{:.2}) in {:.2}s",
                output.display(),
                encoded.bytes.len(),
                encoded.format.label(),
                encoded.quality,
                started.elapsed().as_secs_f64()
            );
            Ok(())
        }
        Err(FilmError::EncodeOverLimit { limit, best }) => {
            eprintln!(
                "monos: wrote {} but it is {} bytes, over the {} byte limit even at quality {:.2}",
                output.display(),
                best.bytes.len(),
                limit,
                best.quality
            );
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("failed to export {}", output.display())),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match parse_args(std::env::args().skip(1))? {
        Command::Help => println!("{USAGE}"),
        Command::Fields => print_fields(),
        Command::Presets { json } => print_presets(json)?,
        Command::Config { write_defaults } => show_config(write_defaults)?,
        Command::Render(args) => render(args, EditorConfig::load())?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use monos::config::EditorConfig;
    use monos::export::ExportFormat;
    use monos::processing::BlurMode;
    use monos::state::{ContrastScale, ParamField};

    use super::{Command, RenderArgs, parse_args, parse_format, parse_set, pick_format};

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn empty_args_print_help() {
        assert_eq!(parse_args(Vec::<String>::new()).unwrap(), Command::Help);
    }

    #[test]
    fn presets_accepts_json_flag() {
        assert_eq!(
            parse_args(args("presets --json")).unwrap(),
            Command::Presets { json: true }
        );
        assert!(parse_args(args("presets --yaml")).is_err());
    }

    #[test]
    fn render_parses_all_flags() {
        let cmd = parse_args(args(
            "render in.jpg out.png --preset tri-x-400 --set grain=20 --set tint.hue=30 \
             --seed 9 --blur-mode radial --max-bytes 1000",
        ))
        .unwrap();
        let mut expected = RenderArgs::new(PathBuf::from("in.jpg"));
        expected.output = Some(PathBuf::from("out.png"));
        expected.preset = Some("tri-x-400".into());
        expected.sets = vec![(ParamField::Grain, 20.0), (ParamField::TintHue, 30.0)];
        expected.seed = Some(9);
        expected.blur_mode = Some(BlurMode::Radial);
        expected.max_bytes = Some(1000);
        assert_eq!(cmd, Command::Render(expected));
    }

    #[test]
    fn render_requires_input() {
        assert!(parse_args(args("render --seed 1")).is_err());
        assert!(parse_args(args("render a.jpg b.jpg c.jpg")).is_err());
    }

    #[test]
    fn percent_contrast_scale_applies_to_later_sets() {
        let Command::Render(render) =
            parse_args(args("render a.jpg --set contrast=140 --contrast-scale percent")).unwrap()
        else {
            panic!("expected render");
        };
        assert_eq!(render.contrast_scale, ContrastScale::Percent);
        assert_eq!(render.sets, vec![(ParamField::Contrast, 40.0)]);
    }

    #[test]
    fn set_rejects_unknown_fields_and_bad_numbers() {
        assert!(parse_set("sharpness=3", ContrastScale::Signed).is_err());
        assert!(parse_set("grain=lots", ContrastScale::Signed).is_err());
        assert!(parse_set("grain", ContrastScale::Signed).is_err());
    }

    #[test]
    fn config_accepts_write_defaults_flag() {
        assert_eq!(
            parse_args(args("config")).unwrap(),
            Command::Config {
                write_defaults: false
            }
        );
        assert_eq!(
            parse_args(args("config --write-defaults")).unwrap(),
            Command::Config {
                write_defaults: true
            }
        );
        assert!(parse_args(args("config --force")).is_err());
    }

    #[test]
    fn explicit_format_conflicting_with_extension_is_rejected() {
        let config = EditorConfig::default();
        let mut render = RenderArgs::new(PathBuf::from("in.jpg"));
        render.output = Some(PathBuf::from("out.jpg"));
        render.format = Some(ExportFormat::Png);
        assert!(pick_format(&render, &config).is_err());

        render.output = Some(PathBuf::from("out.bin"));
        assert_eq!(pick_format(&render, &config).unwrap(), ExportFormat::Png);

        render.format = None;
        render.output = Some(PathBuf::from("out.webp"));
        assert_eq!(pick_format(&render, &config).unwrap(), ExportFormat::Webp);

        render.output = None;
        assert_eq!(pick_format(&render, &config).unwrap(), config.export_format);
    }

    #[test]
    fn format_names() {
        assert_eq!(parse_format("jpeg").unwrap(), ExportFormat::Jpeg);
        assert_eq!(parse_format("jpg").unwrap(), ExportFormat::Jpeg);
        assert_eq!(parse_format("webp").unwrap(), ExportFormat::Webp);
        assert!(parse_format("gif").is_err());
    }
}
