use qualweave::agent::{
    EnforcementMode, LoadContext, RuntimeAgent, RuntimeTransformer, Settings, SettingsError,
};
use qualweave::jvm::codec::{ClassCodec, UnitImageCodec};
use qualweave::resolution::{ChainResolver, ClassResolver, DirectoryResolver};
use qualweave::runtime::HandlerKind;

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fmt, fs, io};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use walkdir::WalkDir;

#[derive(Debug)]
enum CliError {
    Io(io::Error),
    Settings(SettingsError),
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> CliError {
        CliError::Io(err)
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> CliError {
        CliError::Settings(err)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(err) => write!(f, "IO error: {}", err),
            CliError::Settings(err) => write!(f, "invalid settings: {}", err),
        }
    }
}

impl std::error::Error for CliError {}

fn main() -> Result<(), CliError> {
    env_logger::init();

    let matches = Command::new("Qualifier weaver")
        .version("0.1.0")
        .about("Weave runtime checks for type qualifiers into compiled units")
        .arg(
            Arg::new("output")
                .long("output-directory")
                .value_name("DIRECTORY")
                .default_value("out")
                .help("Sets the output directory"),
        )
        .arg(
            Arg::new("classpath")
                .long("classpath")
                .value_name("DIRECTORY")
                .action(ArgAction::Append)
                .help("Extra directories of units consulted for metadata (not woven)"),
        )
        .arg(
            Arg::new("checked")
                .long("checked")
                .value_name("CLASSES")
                .action(ArgAction::Append)
                .help("Checked classes, comma separated (default: every class)"),
        )
        .arg(
            Arg::new("global")
                .long("global")
                .action(ArgAction::SetTrue)
                .help("Also weave unchecked classes to guard writes into checked classes"),
        )
        .arg(
            Arg::new("trust")
                .long("trust-annotated-for")
                .action(ArgAction::SetTrue)
                .help("Treat classes carrying an `@AnnotatedFor` marker as checked"),
        )
        .arg(
            Arg::new("checker")
                .long("checker")
                .value_name("CHECKER")
                .default_value("nullness")
                .help("Qualifier system to enforce"),
        )
        .arg(
            Arg::new("handler")
                .long("handler")
                .value_name("HANDLER")
                .help("Violation handler (`throwing`, `logging`, or `reporting`)"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Sets the input unit file or folder")
                .required(true)
                .index(1),
        )
        .get_matches();

    let settings = settings(&matches)?;
    let input_path = matches
        .get_one::<String>("INPUT")
        .map(PathBuf::from)
        .unwrap_or_default();
    let output_path = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("out"));

    // Metadata comes from the input itself, then from the classpath
    let mut resolver = ChainResolver::default();
    if input_path.is_dir() {
        resolver.push(Arc::new(DirectoryResolver::new(&input_path)));
    }
    for directory in matches.get_many::<String>("classpath").into_iter().flatten() {
        resolver.push(Arc::new(DirectoryResolver::new(directory)));
    }
    let resolver: Arc<dyn ClassResolver> = Arc::new(resolver);
    let transformer = RuntimeAgent::install(&settings, resolver)?;

    let units = find_units(&input_path);
    log::info!("Found {} units under {}", units.len(), input_path.display());

    let stdout = StandardStream::stdout(ColorChoice::Auto);
    let mut summary = Summary::default();
    for unit in units {
        let outcome = weave_unit(&transformer, &unit, &output_path);
        summary.record(&outcome);

        let (color, label, message) = match &outcome {
            UnitOutcome::Woven(name) => {
                log::info!("Wove {}", name);
                (Color::Green, "WOVEN", None)
            }
            UnitOutcome::Unchanged(name) => {
                log::info!("Copied {} unchanged", name);
                (Color::Blue, "UNCHANGED", None)
            }
            UnitOutcome::Error(message) => (Color::Red, "ERROR", Some(message)),
        };
        if let Some(message) = message {
            log::error!("{}", message);
        }

        let mut s = stdout.lock();
        s.write_all(b" - ")?;
        s.set_color(ColorSpec::new().set_bold(true))?;
        s.write_all(unit.to_string_lossy().as_bytes())?;
        s.set_color(ColorSpec::new().set_dimmed(true))?;
        s.write_all(b" [")?;
        s.set_color(ColorSpec::new().set_fg(Some(color)))?;
        s.write_all(label.as_bytes())?;
        s.set_color(ColorSpec::new().set_dimmed(true))?;
        s.write_all(b"]\n")?;
        s.reset()?;
    }

    log::info!(
        "{} woven, {} unchanged, {} failed",
        summary.woven,
        summary.unchanged,
        summary.failed
    );
    let mut s = stdout.lock();
    writeln!(
        s,
        "\n{} woven, {} unchanged, {} failed",
        summary.woven, summary.unchanged, summary.failed
    )?;
    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn settings(matches: &ArgMatches) -> Result<Settings, SettingsError> {
    let checker = matches
        .get_one::<String>("checker")
        .map_or("nullness", String::as_str);
    let mut settings = Settings::new(checker);
    settings.checked_classes = matches
        .get_many::<String>("checked")
        .into_iter()
        .flatten()
        .flat_map(|classes| classes.split(','))
        .map(str::trim)
        .filter(|class| !class.is_empty())
        .map(String::from)
        .collect();
    if matches.get_flag("global") {
        settings.mode = EnforcementMode::Global;
    }
    settings.trust_annotated_for = matches.get_flag("trust");
    if let Some(handler) = matches.get_one::<String>("handler") {
        let kind = HandlerKind::from_name(handler)
            .ok_or_else(|| SettingsError::UnknownHandler(handler.clone()))?;
        settings.handler = Some(kind);
    }
    Ok(settings)
}

/// Unit files at a path (the path itself if it is a file)
fn find_units(input_path: &Path) -> Vec<PathBuf> {
    if input_path.is_file() {
        vec![input_path.to_path_buf()]
    } else {
        let mut units: Vec<PathBuf> = WalkDir::new(input_path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|e| {
                e.is_file()
                    && e.extension()
                        .map_or(false, |ex| ex == DirectoryResolver::EXTENSION)
            })
            .collect();
        units.sort();
        units
    }
}

#[derive(Debug, PartialEq, Eq)]
enum UnitOutcome {
    Woven(String),
    Unchanged(String),
    Error(String),
}

#[derive(Debug, Default)]
struct Summary {
    woven: usize,
    unchanged: usize,
    failed: usize,
}

impl Summary {
    fn record(&mut self, outcome: &UnitOutcome) {
        match outcome {
            UnitOutcome::Woven(_) => self.woven += 1,
            UnitOutcome::Unchanged(_) => self.unchanged += 1,
            UnitOutcome::Error(_) => self.failed += 1,
        }
    }
}

/// Weave one unit file into the output directory
///
/// Units which don't need weaving are copied as they are, so the output directory always ends up
/// with a complete set of units.
fn weave_unit(transformer: &RuntimeTransformer, unit: &Path, output_path: &Path) -> UnitOutcome {
    let bytes = match fs::read(unit) {
        Ok(bytes) => bytes,
        Err(err) => return UnitOutcome::Error(format!("Failed to read {:?}: {}", unit, err)),
    };
    let name = match UnitImageCodec.parse(&bytes) {
        Ok(class) => class.name,
        Err(err) => return UnitOutcome::Error(format!("Failed to parse {:?}: {}", unit, err)),
    };

    let woven = if transformer.scans(&name) {
        match transformer.try_transform(&name, &LoadContext::new(), &bytes) {
            Ok(woven) => woven,
            Err(err) => return UnitOutcome::Error(format!("Failed to weave {}: {}", name, err)),
        }
    } else {
        None
    };

    let output_file = DirectoryResolver::new(output_path).path_of(&name);
    log::debug!("Writing {:?}", output_file);
    let written = output_file
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|_| fs::write(&output_file, woven.as_deref().unwrap_or(&bytes)));
    if let Err(err) = written {
        return UnitOutcome::Error(format!("Failed to write {:?}: {}", output_file, err));
    }

    match woven {
        Some(_) => UnitOutcome::Woven(name.to_string()),
        None => UnitOutcome::Unchanged(name.to_string()),
    }
}
