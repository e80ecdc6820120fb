//! File System Linker Driver
//!
//! Command-line front end: loads the program and its runtimes, runs the
//! link pipeline and writes the prepared module.

use clap::{Parser, ValueEnum};
use fsl_common::{LinkerError, Reporter};
use fsl_ir::Module;
use fsl_linker::{
    externals_and_globals_check, link_modules, link_with_libc, load_file, prepare_posix, JsonLoader, Linker,
    LinkerConfig, ModuleOptions, OptNoneScope, StartupContract, SwitchType,
};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use target_lexicon::Triple;

/// Architectures the engine cannot run
const UNSUPPORTED_ARCHS: [&str; 4] = ["i686", "i586", "i486", "i386"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Textual IR
    Text,
    /// Serialized module
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SwitchArg {
    Internal,
    Simple,
    General,
}

impl From<SwitchArg> for SwitchType {
    fn from(arg: SwitchArg) -> Self {
        match arg {
            SwitchArg::Internal => SwitchType::Internal,
            SwitchArg::Simple => SwitchType::Simple,
            SwitchArg::General => SwitchType::General,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ScopeArg {
    Module,
    EngineCallers,
}

impl From<ScopeArg> for OptNoneScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Module => OptNoneScope::Module,
            ScopeArg::EngineCallers => OptNoneScope::EngineCallers,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "fslink")]
#[command(about = "Link program modules with their runtimes for symbolic execution")]
#[command(version = "0.1.0")]
struct Cli {
    /// Program module (.json) or archive (.jsonar)
    input: PathBuf,

    /// Function where execution starts
    #[arg(long, default_value = "main")]
    entry_point: String,

    /// Optimize the linked module
    #[arg(long)]
    optimize: bool,

    /// Link the POSIX runtime model from this file
    #[arg(long)]
    posix_path: Option<PathBuf>,

    /// Link the libc runtime from this file
    #[arg(long)]
    libc_path: Option<PathBuf>,

    /// Additional library to link (may be repeated)
    #[arg(long = "link-lib")]
    link_libs: Vec<PathBuf>,

    /// Directory the output file is written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Output file name
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// How switch terminators are lowered
    #[arg(long, value_enum, default_value = "internal")]
    switch_type: SwitchArg,

    /// Do not verify the linked module
    #[arg(long)]
    disable_verify: bool,

    /// Keep the optimizer away from functions
    #[arg(long)]
    disable_engine_call_optimisation: bool,

    /// Functions marked when engine-call optimisation is disabled
    #[arg(long, value_enum, default_value = "module")]
    opt_none_scope: ScopeArg,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn linker_config(&self) -> LinkerConfig {
        LinkerConfig {
            engine_call_optimisation: !self.disable_engine_call_optimisation,
            opt_none_scope: self.opt_none_scope.into(),
            switch_type: self.switch_type.into(),
            skip_verification: self.disable_verify,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut reporter = Reporter::new();
    if let Err(e) = run(&cli, &mut reporter) {
        reporter.error(&e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli, reporter: &mut Reporter) -> Result<(), LinkerError> {
    let module = load_program(&cli.input)?;
    check_target(&module.target_triple, reporter)?;

    let entry = cli.entry_point.as_str();
    let mut loaded = vec![module];

    if let Some(posix_path) = &cli.posix_path {
        reporter.message(format!("NOTE: Using POSIX model: {}", posix_path.display()));
        load_file(&JsonLoader, posix_path, &mut loaded)?;
        let libc_prefix = if cli.libc_path.is_some() { "__user_" } else { "" };
        prepare_posix(&mut loaded, entry, libc_prefix)?;
    }

    if let Some(libc_path) = &cli.libc_path {
        link_with_libc(&JsonLoader, libc_path, &mut loaded, entry, &StartupContract::default(), reporter)?;
    }

    for lib in &cli.link_libs {
        let count = load_file(&JsonLoader, lib, &mut loaded)?;
        debug!("library {} provided {count} module(s)", lib.display());
    }

    let mut linker = Linker::new(cli.linker_config());
    let opts = ModuleOptions::new(entry, cli.optimize);
    let linked = linker.set_module(&mut loaded, &opts)?;
    info!("{} module(s) left unlinked", loaded.len());

    if linked.get_function(entry).is_none() {
        return Err(LinkerError::EntryNotFound { name: entry.to_string() });
    }
    externals_and_globals_check(linked, reporter);

    let path = output_path(cli.output_dir.as_deref(), cli.output.as_deref(), cli.format)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    reporter.message(format!("output directory is \"{}\"", dir.display()));
    write_module(linked, &path, cli.format)
}

/// Load the program and link everything it contains into one module
fn load_program(path: &Path) -> Result<Module, LinkerError> {
    let mut modules = Vec::new();
    load_file(&JsonLoader, path, &mut modules)?;
    link_modules(&mut modules, "")
        .map_err(|e| LinkerError::load(path.display().to_string(), format!("error loading program: {e}")))
}

fn check_target(triple: &str, reporter: &mut Reporter) -> Result<(), LinkerError> {
    let host = Triple::host().to_string();
    if triple != host {
        reporter.message(format!(
            "Module and host target triples do not match: '{triple}' != '{host}'\n\
             This may cause unexpected crashes or assertion violations."
        ));
    }
    if UNSUPPORTED_ARCHS.iter().any(|arch| triple.contains(arch)) {
        return Err(LinkerError::UnsupportedTarget { triple: triple.to_string() });
    }
    Ok(())
}

/// Where the prepared module is written. Only the file name of `output` is
/// used; the directory comes from `output_dir` or the working directory.
fn output_path(output_dir: Option<&Path>, output: Option<&Path>, format: OutputFormat) -> Result<PathBuf, LinkerError> {
    let dir = match output_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            dir.to_path_buf()
        }
        None => std::env::current_dir()?,
    };
    let default_name = match format {
        OutputFormat::Text => "assembly.ir",
        OutputFormat::Json => "assembly.json",
    };
    let file_name = output
        .and_then(Path::file_name)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default_name));
    Ok(dir.join(file_name))
}

fn write_module(module: &Module, path: &Path, format: OutputFormat) -> Result<(), LinkerError> {
    let contents = match format {
        OutputFormat::Text => module.to_string(),
        OutputFormat::Json => {
            serde_json::to_string_pretty(module).map_err(|e| LinkerError::Io { message: e.to_string() })?
        }
    };
    fs::write(path, contents)?;
    debug!("wrote {}", path.display());
    Ok(())
}
