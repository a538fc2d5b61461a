mod app;
mod llms;
mod state;
mod ui;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use clap::Parser;
use crossterm::{
    ExecutableCommand,
    event::{DisableBracketedPaste, EnableBracketedPaste},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ms_base::config::{THEME_ORDER, set_active_theme};
use ms_base::constants::{DEFAULT_RELAY_ENDPOINT, LOG_FILE, STATE_DIR};
use ms_base::document::Document;
use ms_base::models::GeminiModel;
use ratatui::prelude::*;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use llms::{Backend, StreamEvent};
use state::State;

/// Solve the questions in a document and render the answer with its mathematics intact.
#[derive(Debug, Parser)]
#[command(name = "mathscribe", version, about)]
struct Args {
    /// Image (jpg, png, gif, webp) or PDF with the questions
    document: PathBuf,

    /// Handwriting sample image used for the handwritten answer
    #[arg(long)]
    sample: Option<PathBuf>,

    /// Where requests go
    #[arg(long, value_enum, default_value_t = Backend::Relay)]
    backend: Backend,

    /// Relay base URL
    #[arg(long, env = "MATHSCRIBE_ENDPOINT", default_value = DEFAULT_RELAY_ENDPOINT)]
    endpoint: String,

    /// Model for the analysis
    #[arg(long, default_value_t = GeminiModel::default())]
    model: GeminiModel,

    /// Colour theme
    #[arg(long, default_value = "slate", value_parser = clap::builder::PossibleValuesParser::new(THEME_ORDER))]
    theme: String,

    /// Directory for generated images and exports
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Also write the answer as HTML here once the analysis succeeds
    #[arg(long, value_name = "PATH")]
    export_html: Option<PathBuf>,
}

fn init_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(STATE_DIR);
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("warning: cannot create {}: {}", log_dir.display(), e);
        return None;
    }
    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_env("MATHSCRIBE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    match tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).try_init() {
        Ok(()) => Some(guard),
        // A subscriber is already installed; dropping the guard shuts the writer down
        Err(_) => None,
    }
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging();

    // Validate inputs before touching the terminal
    let document = match Document::load(&args.document) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    let sample = match args.sample.as_deref().map(Document::load).transpose() {
        Ok(sample) => sample,
        Err(e) => {
            eprintln!("handwriting sample: {}", e);
            std::process::exit(1);
        }
    };
    set_active_theme(&args.theme);
    tracing::info!(
        document = %document.name,
        media_type = %document.media_type,
        bytes = document.size(),
        backend = args.backend.label(),
        model = args.model.api_name(),
        "starting"
    );

    // Panic hook: restore terminal state and log the panic
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = io::stdout().execute(DisableBracketedPaste);
        let _ = io::stdout().execute(LeaveAlternateScreen);
        tracing::error!(%info, "panic");
        default_hook(info);
    }));

    let client = llms::get_client(args.backend, &args.endpoint);
    let state = State::new(document, sample, args.backend, args.model, args.out_dir);

    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    io::stdout().execute(EnableBracketedPaste)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let (tx, rx) = mpsc::channel::<StreamEvent>();
    let mut app = App::new(state, client, args.export_html);
    let result = app.run(&mut terminal, tx, rx);

    // Cleanup
    disable_raw_mode()?;
    io::stdout().execute(DisableBracketedPaste)?;
    io::stdout().execute(LeaveAlternateScreen)?;

    if let Some(path) = &app.state.image_path {
        println!("Handwritten answer: {}", path.display());
    }
    tracing::info!("exiting");
    result
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn cli_defaults() {
        let args = Args::try_parse_from(["mathscribe", "q.png"]).unwrap();
        assert_eq!(args.backend, Backend::Relay);
        assert_eq!(args.model, GeminiModel::default());
        assert_eq!(args.theme, "slate");
        assert!(args.sample.is_none());
    }

    #[test]
    fn cli_rejects_unknown_model() {
        assert!(Args::try_parse_from(["mathscribe", "q.png", "--model", "gpt-4"]).is_err());
        let args = Args::try_parse_from(["mathscribe", "q.png", "--model", "gemini-2.5-pro", "--backend", "gemini"]).unwrap();
        assert_eq!(args.model, GeminiModel::Pro25);
        assert_eq!(args.backend, Backend::Gemini);
    }
}
