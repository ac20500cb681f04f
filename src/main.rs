// ── Command-line front end ────────────────────────────────────────────────────
//
// Runs the engine over a file held in a `MemoryBuffer`:
//
//   multireplace apply  --list rules.csv input.txt --output out.txt
//   multireplace count  --find "\d+" --regex input.txt
//   multireplace mark   --list rules.csv input.txt
//   multireplace export-bash --list rules.csv --output rules.sh
//
// Logging goes to stderr and is controlled by RUST_LOG (default `warn`).

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use multireplace::{
    editor::memory::MemoryBuffer,
    engine::Engine,
    pattern::{csv, export, PatternEntry},
    search::scope::ScopeMode,
};

/// Multi-pattern find, replace and mark.
#[derive(Parser)]
#[command(name = "multireplace")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace every match and write the result
    Apply {
        #[command(flatten)]
        run: RunArgs,

        /// Write here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Rewrite the input file
        #[arg(long, conflicts_with = "output")]
        in_place: bool,

        /// Stop after the first list entry that replaced something
        #[arg(long)]
        once: bool,
    },
    /// Print the number of matches
    Count {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Print the marked text, blocks concatenated
    Mark {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Convert a list into a bash/sed script
    ExportBash {
        /// List file (CSV)
        #[arg(short, long, value_name = "CSV")]
        list: PathBuf,

        /// Script to write
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,
    },
}

/// What to search for and where.
#[derive(Args)]
struct RunArgs {
    /// Document to process
    input: PathBuf,

    /// Use the enabled entries of this list (CSV)
    #[arg(short, long, value_name = "CSV", conflicts_with = "find", required_unless_present = "find")]
    list: Option<PathBuf>,

    /// Single find pattern
    #[arg(short, long, value_name = "TEXT")]
    find: Option<String>,

    /// Replacement for --find
    #[arg(short, long, value_name = "TEXT", default_value = "")]
    replace: String,

    #[arg(long, requires = "find")]
    whole_word: bool,

    #[arg(long, requires = "find")]
    match_case: bool,

    /// Decode \n, \t, \xNN ... in --find and --replace
    #[arg(long, requires = "find")]
    extended: bool,

    #[arg(long, requires = "find", conflicts_with = "extended")]
    regex: bool,

    /// Treat --replace as a script template
    #[arg(long, requires = "find")]
    variables: bool,

    /// Restrict to these columns, e.g. "1,3-5"
    #[arg(long, value_name = "SPEC", requires = "delimiter")]
    columns: Option<String>,

    /// Column delimiter
    #[arg(long, value_name = "TEXT", requires = "columns")]
    delimiter: Option<String>,

    /// Quote character for delimited fields
    #[arg(long, value_name = "CHAR", default_value = "", requires = "columns")]
    quote: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Apply { run, output, in_place, once } => {
            let mut engine = build_engine(&run)?;
            engine.options_mut().replace_once_in_list = once;
            let outcome = engine.replace_all().context("replace failed")?;
            info!(replaced = outcome.replaced, failed = outcome.failed, "apply finished");
            if let Some(e) = outcome.script_error {
                bail!("{e}");
            }
            let text = engine.into_buffer().into_text();
            let target = if in_place { Some(run.input.as_path()) } else { output.as_deref() };
            write_output(target, &text)
        }
        Commands::Count { run } => {
            let mut engine = build_engine(&run)?;
            let count = engine.mark().context("count failed")?;
            println!("{count}");
            Ok(())
        }
        Commands::Mark { run } => {
            let mut engine = build_engine(&run)?;
            engine.mark().context("mark failed")?;
            let marked = engine.copy_marked_text();
            write_output(None, &marked.text)
        }
        Commands::ExportBash { list, output } => {
            let list = csv::load(&list).with_context(|| format!("loading list {}", list.display()))?;
            let date = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            export::save_bash_script(&output, &list, &date)
                .with_context(|| format!("writing {}", output.display()))?;
            Ok(())
        }
    }
}

fn build_engine(run: &RunArgs) -> Result<Engine<MemoryBuffer>> {
    let text = fs::read(&run.input).with_context(|| format!("reading {}", run.input.display()))?;
    let mut engine = Engine::new(MemoryBuffer::new(text));

    match (&run.list, &run.find) {
        (Some(path), _) => {
            let list = csv::load(path).with_context(|| format!("loading list {}", path.display()))?;
            *engine.list_mut() = list;
            engine.options_mut().use_list = true;
        }
        (None, Some(find)) => {
            *engine.input_mut() = PatternEntry::new(find.as_str(), run.replace.as_str())
                .whole_word(run.whole_word)
                .match_case(run.match_case)
                .extended(run.extended)
                .regex(run.regex)
                .use_variables(run.variables);
        }
        (None, None) => bail!("either --list or --find is required"),
    }

    if let (Some(columns), Some(delimiter)) = (&run.columns, &run.delimiter) {
        engine
            .set_column_scope(columns, delimiter, &run.quote)
            .context("invalid column scope")?;
        engine.options_mut().scope = ScopeMode::Columns;
    }
    Ok(engine)
}

fn write_output(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => fs::write(path, bytes).with_context(|| format!("writing {}", path.display())),
        None => {
            let mut out = io::stdout().lock();
            out.write_all(bytes)?;
            out.flush()?;
            Ok(())
        }
    }
}
