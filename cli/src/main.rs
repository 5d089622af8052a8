mod session;
mod test_runner;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing::{Level, warn};

use rendering::{
    DirectoryStore, DocumentReference, DocumentStore, MacroDiagnostic, MemoryStore,
    PipelineError, RenderingConfig, Visibility, WikiMacroState,
};
use session::Session;
use xdom::{ParseError, Syntax, parser_for};

const SUBCOMMANDS: &[&str] = &["render", "macros", "test", "help"];

#[derive(Parser)]
#[command(name = "xrender", version, about = "Wiki markup renderer with macro expansion")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a document
    Render(RenderArgs),

    /// List the macros visible to a user
    Macros(MacrosArgs),

    /// Run .test.txt fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct EnvironmentArgs {
    /// Rendering configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of wiki macro definitions, laid out as <Space>/<Page>.xwiki
    #[arg(long)]
    macros: Option<PathBuf>,

    /// Directory of documents available to the include macro
    #[arg(long)]
    documents: Option<PathBuf>,

    /// User the document is rendered for (guest when omitted)
    #[arg(short, long)]
    user: Option<String>,
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Source file to render
    file: PathBuf,

    #[command(flatten)]
    environment: EnvironmentArgs,

    /// Input syntax; guessed from the file extension by default
    #[arg(short, long)]
    input: Option<Syntax>,

    /// Output syntax; the configured target syntax by default
    #[arg(short, long)]
    output: Option<Syntax>,

    /// Render in a restricted frame: no scripts, no raw HTML
    #[arg(long)]
    restricted: bool,

    /// Parse only, don't transform (exit 0 if valid)
    #[arg(long)]
    check: bool,

    /// Dump the transformed block tree instead of rendering it
    #[arg(long)]
    tree: bool,
}

#[derive(clap::Args)]
struct MacrosArgs {
    #[command(flatten)]
    environment: EnvironmentArgs,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.txt file or directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `xrender file.xwiki` works like `xrender render file.xwiki`.
    let mut args: Vec<String> = std::env::args().collect();
    if let Some(position) = args
        .iter()
        .skip(1)
        .position(|a| !a.starts_with('-'))
        .map(|p| p + 1)
        && !SUBCOMMANDS.contains(&args[position].as_str())
    {
        args.insert(position, "render".to_string());
    }

    let cli = Cli::parse_from(&args);
    init_logging(cli.verbose);

    match cli.command {
        Command::Render(render_args) => do_render(render_args, cli.no_color),
        Command::Macros(macros_args) => do_macros(macros_args),
        Command::Test(test_args) => {
            if test_args.list_categories {
                test_runner::list_categories(&test_args.path);
                return;
            }
            let exit_code = test_runner::run_tests(&test_args.path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

/// Configuration and session shared by `render` and `macros`.
fn open_session(environment: &EnvironmentArgs) -> Session {
    let mut config = match &environment.config {
        Some(path) => RenderingConfig::load_from_path(path).unwrap_or_else(|error| {
            eprintln!("error: {}", error);
            process::exit(1);
        }),
        None => RenderingConfig::default(),
    };
    if config.default_author.is_none() {
        config.default_author = environment.user.clone();
    }

    let store: Arc<dyn DocumentStore> = match &environment.documents {
        Some(dir) => Arc::new(
            DirectoryStore::new(dir, config.wiki.clone()).with_author(config.default_author.clone()),
        ),
        None => Arc::new(MemoryStore::new()),
    };
    let session = Session::new(config, store);

    if let Some(dir) = &environment.macros {
        for (reference, state) in session.load_macros(dir) {
            if let WikiMacroState::Failed(reason) = state {
                warn!(%reference, "wiki macro not registered: {}", reason);
            }
        }
    }
    session
}

fn do_render(args: RenderArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let source = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file.display(), e);
            process::exit(1);
        }
    };

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.display().to_string(), source.clone());
    let writer = StandardStream::stderr(color_choice);
    let config = term::Config::default();

    let session = open_session(&args.environment);
    let input = args
        .input
        .or_else(|| guess_syntax(&args.file))
        .unwrap_or(session.config.default_syntax);
    let output = args.output.unwrap_or(session.config.target_syntax);

    // --check: parse only
    if args.check {
        let Some(parser) = parser_for(input) else {
            eprintln!("error: no parser available for syntax {}", input);
            process::exit(1);
        };
        match parser.parse(&source, file_id) {
            Ok(_) => eprintln!("ok: {} parsed successfully", args.file.display()),
            Err(errors) => {
                emit_parse_errors(&writer, &config, &files, &errors);
                process::exit(1);
            }
        }
        return;
    }

    let user = args.environment.user.clone();
    let mut context = session.context(user.clone());
    let frame = session.frame(input, document_reference(&session, &args.file), user, args.restricted);

    let result = if args.tree {
        session
            .pipeline
            .transform(&source, file_id, input, &mut context, frame)
            .map(|(xdom, diagnostics)| {
                println!("{:#?}", xdom);
                diagnostics
            })
    } else {
        let mut buffer = Vec::new();
        let result = session.pipeline.render(
            &source,
            file_id,
            input,
            output,
            &mut context,
            frame,
            &mut buffer,
        );
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(&buffer);
        let _ = stdout.write_all(b"\n");
        result
    };

    match result {
        Ok(diagnostics) => emit_macro_diagnostics(&writer, &config, &files, &diagnostics),
        Err(PipelineError::Parse(errors)) => {
            emit_parse_errors(&writer, &config, &files, &errors);
            process::exit(1);
        }
        Err(error) => {
            eprintln!("error: {}", error);
            process::exit(1);
        }
    }
}

fn do_macros(args: MacrosArgs) {
    let session = open_session(&args.environment);
    let context = session.context(args.environment.user.clone());

    for (id, visibility, implementation) in session.registry.macros(&context) {
        let descriptor = implementation.descriptor();
        let scope = match visibility {
            Visibility::Global => "global".to_string(),
            Visibility::Wiki(wiki) => format!("wiki:{}", wiki),
            Visibility::User(user) => format!("user:{}", user),
        };
        let inline = if descriptor.supports_inline { ", inline" } else { "" };
        println!("{} ({}, priority {}{})", id, scope, descriptor.priority, inline);
        if !descriptor.description.is_empty() {
            println!("    {}", descriptor.description);
        }
        for parameter in &descriptor.parameters {
            let mandatory = if parameter.mandatory { " (mandatory)" } else { "" };
            println!("    {}{}", parameter.name, mandatory);
        }
    }
}

fn guess_syntax(path: &Path) -> Option<Syntax> {
    path.extension()
        .and_then(|extension| extension.to_str())
        .and_then(Syntax::from_extension)
}

/// The rendered file as a page of the `Main` space, so that including it
/// from itself is detected.
fn document_reference(session: &Session, path: &Path) -> Option<DocumentReference> {
    let page = path.file_stem()?.to_str()?;
    Some(DocumentReference::new(
        session.config.wiki.clone(),
        rendering::model::DEFAULT_SPACE,
        page,
    ))
}

fn emit_parse_errors(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    errors: &[ParseError],
) {
    for error in errors {
        let diagnostic = error.to_diagnostic();
        let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &diagnostic);
    }
}

fn emit_macro_diagnostics(
    writer: &StandardStream,
    config: &term::Config,
    files: &SimpleFiles<String, String>,
    diagnostics: &[MacroDiagnostic],
) {
    for diag in diagnostics {
        let mut diagnostic = Diagnostic::warning()
            .with_message(diag.to_string())
            .with_code(diag.kind.name());
        if diag.depth > 0 {
            diagnostic = diagnostic.with_notes(vec![format!("at macro nesting depth {}", diag.depth)]);
        }
        let _ = term::emit_to_write_style(&mut writer.lock(), config, files, &diagnostic);
    }
}
