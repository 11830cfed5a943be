//! Edit the expression fields of a panel document in the terminal and write the saved values.

use std::fmt::Write as FmtWrite;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use clap::{ArgAction, Parser};
use color_eyre::eyre::{Report, Result, WrapErr, eyre};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lspfield::{
    DocumentFormat, OfflineConnector, OutputDestination, OutputOptions, PanelDocument,
    PanelOptions, PropertiesPanel, emit, io::panel_document_from_value, io::parse_document_str,
};

#[derive(Debug, Parser)]
#[command(
    name = "lspfield",
    version,
    about = "lspfield: edit plain and expression properties with language-server help"
)]
struct Cli {
    /// Document spec: file path, inline payload, or "-" for stdin
    #[arg(short = 'd', long = "document", value_name = "SPEC")]
    document: Option<String>,

    /// Title shown at the top of the panel
    #[arg(long = "title", value_name = "TEXT")]
    title: Option<String>,

    /// Output destinations ("-" writes to stdout). Accepts multiple values per flag use.
    #[arg(short = 'o', long = "output", value_name = "DEST", num_args = 1.., action = ArgAction::Append)]
    outputs: Vec<String>,

    /// Emit compact JSON/TOML rather than pretty formatting
    #[arg(long = "no-pretty")]
    no_pretty: bool,

    /// Overwrite output files even if they already exist
    #[arg(short = 'f', long = "force", short_alias = 'y', alias = "yes")]
    force: bool,

    /// Never contact language servers; expressions are edited without completions or diagnostics
    #[arg(long = "offline")]
    offline: bool,

    /// Quiet period in milliseconds before an edit is committed
    #[arg(long = "debounce", value_name = "MS", default_value_t = 300)]
    debounce_ms: u64,

    /// Milliseconds between redraws while idle
    #[arg(long = "tick-rate", value_name = "MS", default_value_t = 50)]
    tick_rate_ms: u64,

    /// JSON keymap replacing the built-in key bindings
    #[arg(long = "keymap", value_name = "PATH")]
    keymap: Option<PathBuf>,

    /// Hide the key help in the footer
    #[arg(long = "no-help")]
    no_help: bool,

    /// Quit on the first Ctrl+Q even with unsaved changes
    #[arg(long = "no-confirm-exit")]
    no_confirm_exit: bool,

    /// Write logs to this file (filtered by RUST_LOG)
    #[arg(long = "log", value_name = "PATH")]
    log: Option<PathBuf>,

    /// Print the JSON Schema of panel documents and exit
    #[arg(long = "print-schema")]
    print_schema: bool,
}

#[derive(Debug)]
enum InputSource {
    File(PathBuf),
    Stdin,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    if cli.print_schema {
        let schema = serde_json::to_string_pretty(&PanelDocument::json_schema())?;
        println!("{schema}");
        return Ok(());
    }

    if let Some(path) = cli.log.as_deref() {
        init_logging(path)?;
    }

    let mut diagnostics = DiagnosticCollector::default();
    let spec = cli.document.as_deref();
    let hint = resolve_format_hint(spec, "document", &mut diagnostics);
    let document = match spec {
        Some(raw) if !hint.blocked => load_document(raw, hint.hint.format, &mut diagnostics),
        Some(_) => None,
        None => {
            diagnostics.push_input("document", "provide a panel document with --document");
            None
        }
    };

    let (output_settings, output_paths) =
        build_output_options(&cli, hint.hint.extension_value(), &mut diagnostics);
    ensure_output_paths_available(&output_paths, cli.force, &mut diagnostics);

    diagnostics.into_result()?;
    let document = document.ok_or_else(|| eyre!("no panel document loaded"))?;
    info!(
        fields = document.fields.len(),
        elements = document.elements.len(),
        "starting panel"
    );

    let options = panel_options(&cli)?;
    let mut panel = PropertiesPanel::new(document).with_options(options);
    if let Some(title) = cli.title.as_ref() {
        panel = panel.with_title(title.clone());
    }
    if cli.offline {
        panel = panel.with_connector(OfflineConnector);
    }

    let outcome = panel.run().map_err(|err| Report::msg(format!("{err:#}")))?;
    if let Some(options) = output_settings {
        emit(&outcome.values, &options).map_err(|err| Report::msg(format!("{err:#}")))?;
    }
    Ok(())
}

fn panel_options(cli: &Cli) -> Result<PanelOptions> {
    let mut options = PanelOptions::default()
        .with_debounce(Duration::from_millis(cli.debounce_ms))
        .with_tick_rate(Duration::from_millis(cli.tick_rate_ms.max(1)))
        .with_help(!cli.no_help)
        .with_confirm_exit(!cli.no_confirm_exit);
    if let Some(path) = cli.keymap.as_ref() {
        let source = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read keymap {}", path.display()))?;
        options = options
            .with_keymap_json(&source)
            .map_err(|err| eyre!("invalid keymap {}: {err:#}", path.display()))?;
    }
    Ok(options)
}

fn init_logging(path: &Path) -> Result<()> {
    let file = File::create(path)
        .wrap_err_with(|| format!("failed to create log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lspfield=debug")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|err| eyre!("failed to install the log subscriber: {err}"))
}

#[derive(Debug, Clone, Copy)]
struct FormatHint {
    format: DocumentFormat,
    from_extension: bool,
}

impl Default for FormatHint {
    fn default() -> Self {
        Self {
            format: DocumentFormat::default(),
            from_extension: false,
        }
    }
}

impl FormatHint {
    fn extension_value(&self) -> Option<DocumentFormat> {
        self.from_extension.then_some(self.format)
    }
}

#[derive(Debug, Clone, Copy)]
struct FormatResolution {
    hint: FormatHint,
    blocked: bool,
}

fn resolve_format_hint(
    path_hint: Option<&str>,
    label: &str,
    diagnostics: &mut DiagnosticCollector,
) -> FormatResolution {
    if let Some(path) = path_hint {
        if path != "-" {
            match probe_format_from_extension(Path::new(path)) {
                ExtensionFormat::Known(format) => {
                    return FormatResolution {
                        hint: FormatHint {
                            format,
                            from_extension: true,
                        },
                        blocked: false,
                    };
                }
                ExtensionFormat::UnsupportedFeature {
                    format_name,
                    feature_flag,
                } => {
                    diagnostics.push_input(
                        label,
                        format!(
                            "{label} '{path}' requires {format_name} support, but this build lacks the '{feature_flag}' feature"
                        ),
                    );
                    return FormatResolution {
                        hint: FormatHint::default(),
                        blocked: true,
                    };
                }
                ExtensionFormat::Unknown => {}
            }
        }
    }

    FormatResolution {
        hint: FormatHint::default(),
        blocked: false,
    }
}

fn load_document(
    spec: &str,
    format: DocumentFormat,
    diagnostics: &mut DiagnosticCollector,
) -> Option<PanelDocument> {
    let loaded = load_value(spec, format, "document").and_then(|value| {
        panel_document_from_value(value).map_err(|err| Report::msg(format!("{err:#}")))
    });
    match loaded {
        Ok(document) => Some(document),
        Err(err) => {
            diagnostics.push_input("document", err.to_string());
            None
        }
    }
}

fn load_value(spec: &str, format: DocumentFormat, label: &str) -> Result<Value> {
    if spec == "-" {
        let contents = read_from_source(&InputSource::Stdin)?;
        return parse_contents(&contents, format, label);
    }

    let path = PathBuf::from(spec);
    match read_from_source(&InputSource::File(path.clone())) {
        Ok(contents) => parse_contents(&contents, format, label),
        Err(err) => {
            if is_not_found(&err) {
                let inline_label = format!("inline {label}");
                return parse_contents(spec, format, &inline_label);
            }
            Err(err.wrap_err(format!("failed to load {label} from {}", path.display())))
        }
    }
}

fn read_from_source(source: &InputSource) -> Result<String> {
    match source {
        InputSource::Stdin => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .wrap_err("failed to read from stdin")?;
            Ok(buffer)
        }
        InputSource::File(path) => fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read file {}", path.display())),
    }
}

fn is_not_found(err: &Report) -> bool {
    err.downcast_ref::<io::Error>()
        .is_some_and(|io_err| io_err.kind() == io::ErrorKind::NotFound)
}

fn parse_contents(contents: &str, format: DocumentFormat, label: &str) -> Result<Value> {
    match parse_document_str(contents, format) {
        Ok(value) => Ok(value),
        Err(primary) => {
            for candidate in DocumentFormat::available_formats() {
                if candidate == format {
                    continue;
                }
                if let Ok(value) = parse_document_str(contents, candidate) {
                    return Ok(value);
                }
            }
            Err(Report::msg(format!(
                "failed to parse {label}: tried {} (first error: {primary})",
                format_list()
            )))
        }
    }
}

fn format_list() -> String {
    let items: Vec<String> = DocumentFormat::available_formats()
        .into_iter()
        .map(|fmt| fmt.to_string())
        .collect();
    items.join(", ")
}

#[derive(Debug, Default)]
struct DiagnosticCollector {
    messages: Vec<String>,
}

impl DiagnosticCollector {
    fn push_input(&mut self, label: &str, message: impl Into<String>) {
        self.messages
            .push(format!("input ({label}): {}", message.into()));
    }

    fn push_output(&mut self, message: impl Into<String>) {
        self.messages.push(format!("output: {}", message.into()));
    }

    fn len(&self) -> usize {
        self.messages.len()
    }

    fn into_result(self) -> Result<()> {
        if self.messages.is_empty() {
            return Ok(());
        }
        let mut body = String::from("encountered input/output issues:\n");
        for (idx, msg) in self.messages.iter().enumerate() {
            let _ = writeln!(body, "  {}. {}", idx + 1, msg);
        }
        Err(eyre!(body))
    }
}

/// Saved values go to stdout unless `-o` names destinations.
fn build_output_options(
    cli: &Cli,
    document_hint: Option<DocumentFormat>,
    diagnostics: &mut DiagnosticCollector,
) -> (Option<OutputOptions>, Vec<PathBuf>) {
    let mut destinations = Vec::new();
    for raw in &cli.outputs {
        if raw.trim().is_empty() {
            diagnostics.push_output("output destination cannot be empty");
            continue;
        }
        if raw == "-" {
            destinations.push(OutputDestination::Stdout);
        } else {
            destinations.push(OutputDestination::file(raw));
        }
    }
    if cli.outputs.is_empty() {
        destinations.push(OutputDestination::Stdout);
    }
    if destinations.is_empty() {
        return (None, Vec::new());
    }

    let file_paths: Vec<PathBuf> = destinations
        .iter()
        .filter_map(|dest| match dest {
            OutputDestination::File(path) => Some(path.clone()),
            OutputDestination::Stdout => None,
        })
        .collect();

    let start = diagnostics.len();
    let format = if file_paths.is_empty() {
        document_hint.unwrap_or_default()
    } else {
        infer_format_from_files(&file_paths, diagnostics).unwrap_or_default()
    };

    if diagnostics.len() > start {
        return (None, file_paths);
    }

    (
        Some(
            OutputOptions::new(format)
                .with_pretty(!cli.no_pretty)
                .with_destinations(destinations),
        ),
        file_paths,
    )
}

fn infer_format_from_files(
    file_paths: &[PathBuf],
    diagnostics: &mut DiagnosticCollector,
) -> Option<DocumentFormat> {
    let mut detected: Option<DocumentFormat> = None;
    for path in file_paths {
        match probe_format_from_extension(path) {
            ExtensionFormat::Known(format) => {
                if let Some(existing) = detected {
                    if existing != format {
                        diagnostics.push_output(format!(
                            "output file {} uses {format} but other destinations use {existing}; align extensions",
                            path.display()
                        ));
                    }
                } else {
                    detected = Some(format);
                }
            }
            ExtensionFormat::UnsupportedFeature {
                format_name,
                feature_flag,
            } => diagnostics.push_output(format!(
                "output file {} requires {format_name} support, but this build was compiled without the '{feature_flag}' feature",
                path.display()
            )),
            ExtensionFormat::Unknown => diagnostics.push_output(format!(
                "cannot infer format from output file {}; use .json/.yaml/.toml",
                path.display()
            )),
        }
    }
    detected
}

fn probe_format_from_extension(path: &Path) -> ExtensionFormat {
    let Some(ext) = path.extension() else {
        return ExtensionFormat::Unknown;
    };
    let normalized = ext.to_string_lossy().to_ascii_lowercase();
    match DocumentFormat::from_extension(&normalized) {
        Some(format) => ExtensionFormat::Known(format),
        None => match normalized.as_str() {
            "yaml" | "yml" => ExtensionFormat::UnsupportedFeature {
                format_name: "yaml",
                feature_flag: "yaml",
            },
            "toml" => ExtensionFormat::UnsupportedFeature {
                format_name: "toml",
                feature_flag: "toml",
            },
            _ => ExtensionFormat::Unknown,
        },
    }
}

#[derive(Debug)]
enum ExtensionFormat {
    Known(DocumentFormat),
    UnsupportedFeature {
        format_name: &'static str,
        feature_flag: &'static str,
    },
    Unknown,
}

fn ensure_output_paths_available(
    paths: &[PathBuf],
    force: bool,
    diagnostics: &mut DiagnosticCollector,
) {
    if force {
        return;
    }
    for path in paths {
        if path.exists() {
            diagnostics.push_output(format!(
                "file {} already exists (pass --force to overwrite)",
                path.display()
            ));
        }
    }
}
