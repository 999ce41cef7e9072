use std::{
    collections::BTreeMap,
    fs,
    io::{self, BufWriter, Read, Write},
    path::PathBuf,
    rc::Rc,
};

use clap::{Parser, Subcommand};
use filter_vars::{
    ComputationKind, ComputeSelection, Config, LazyDescriptor, LazyVariableComputer, Value,
    VariableHolder, VariablesManager, keywords, memory::MemoryWiki,
};
use miette::{IntoDiagnostic, miette};

#[derive(Parser, Debug)]
#[command(name = "fvars")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "# Examples:\n\n\
    ## To dump the builtin variables of a stored snapshot:\n\
    fvars dump vars.json\n\n\
    ## To dump every variable, renaming deprecated ones:\n\
    fvars dump --translate --all-user-vars vars.json\n\n\
    ## To list the builtin variable names:\n\
    fvars list")]
#[command(
    about = "fvars inspects and normalizes filter variable snapshots.",
    long_about = None
)]
pub struct Cli {
    #[clap(subcommand)]
    commands: Commands,
}

#[derive(Clone, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Dump the variables of a JSON snapshot (a name to value object)
    Dump {
        /// Snapshot file; reads stdin when omitted or `-`
        file: Option<PathBuf>,
        /// Rename deprecated variables to their current names
        #[arg(long, default_value_t = false)]
        translate: bool,
        /// Include variables that are not builtin
        #[arg(long, default_value_t = false)]
        all_user_vars: bool,
        /// Add the wiki name and language variables
        #[arg(long, default_value_t = false)]
        with_wiki_vars: bool,
        /// Compute the named deferred variables
        #[arg(long, value_name = "NAME")]
        compute: Vec<String>,
        /// Compute every deferred variable
        #[arg(long, default_value_t = false, conflicts_with = "compute")]
        compute_all: bool,
        /// Output format
        #[arg(short = 'F', long, value_enum, default_value_t)]
        output_format: OutputFormat,
    },
    /// List the builtin variable names
    List {
        /// Show deprecated names with their replacements instead
        #[arg(long, default_value_t = false)]
        deprecated: bool,
    },
}

impl Cli {
    pub fn run(&self, config: Config) -> miette::Result<()> {
        let stdout = io::stdout();
        let mut handle = BufWriter::new(stdout.lock());

        match &self.commands {
            Commands::Dump {
                file,
                translate,
                all_user_vars,
                with_wiki_vars,
                compute,
                compute_all,
                output_format,
            } => {
                let mut holder = read_snapshot(file.as_ref())?;
                if *with_wiki_vars {
                    holder.set_lazy_descriptor(
                        "wiki_name",
                        LazyDescriptor::bare(ComputationKind::GetWikiName),
                    );
                    holder.set_lazy_descriptor(
                        "wiki_language",
                        LazyDescriptor::bare(ComputationKind::GetWikiLanguage),
                    );
                }

                let wiki = Rc::new(MemoryWiki::new());
                let manager = VariablesManager::new(LazyVariableComputer::new(
                    MemoryWiki::services(&wiki),
                    config,
                ));
                if *translate {
                    manager.translate_deprecated_names(&mut holder);
                }

                let selection = if *compute_all {
                    ComputeSelection::All
                } else if compute.is_empty() {
                    ComputeSelection::Nothing
                } else {
                    ComputeSelection::Names(compute.clone())
                };
                let dump = manager
                    .dump_all_vars(&mut holder, &selection, *all_user_vars)
                    .map_err(|e| miette!("{}", e))?;
                tracing::debug!("Dumped {} of {} variables", dump.len(), holder.len());

                write_dump(&mut handle, &dump, output_format)?;
            }
            Commands::List { deprecated } => {
                if *deprecated {
                    for (old, new) in keywords::DEPRECATED_VARS {
                        writeln!(handle, "{} -> {}", old, new).into_diagnostic()?;
                    }
                } else {
                    for name in keywords::known_vars() {
                        writeln!(handle, "{}", name).into_diagnostic()?;
                    }
                }
            }
        }

        handle.flush().into_diagnostic()
    }
}

fn read_snapshot(file: Option<&PathBuf>) -> miette::Result<VariableHolder> {
    let content = match file {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
            .map_err(|e| miette!("Failed to read {}: {}", path.display(), e))?,
        _ => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input).into_diagnostic()?;
            input
        }
    };

    let snapshot: serde_json::Value = serde_json::from_str(&content).into_diagnostic()?;
    let serde_json::Value::Object(vars) = snapshot else {
        return Err(miette!("Snapshot must be a JSON object of variable names to values"));
    };

    let mut holder = VariableHolder::new();
    for (name, value) in vars {
        holder.set_value(&name, Value::from(value));
    }
    Ok(holder)
}

fn write_dump<W: Write>(
    handle: &mut W,
    dump: &BTreeMap<String, serde_json::Value>,
    format: &OutputFormat,
) -> miette::Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(dump).into_diagnostic()?;
            writeln!(handle, "{}", json).into_diagnostic()
        }
        OutputFormat::Text => {
            for (name, value) in dump {
                writeln!(handle, "{}: {}", name, Value::from(value.clone())).into_diagnostic()?;
            }
            Ok(())
        }
    }
}
