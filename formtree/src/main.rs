use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::{LevelFilter, debug};

use formtree::{
    Binding, Format, Options, PopulateOptions, Session, gather, populate_with,
    run::{default_schema_by_init, load_schema, options_or_grow_all, read_tree},
};

/// Schema-driven configuration transcoder.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML file with populate options. Without it every list and map in
    /// the input is loaded.
    #[arg(long, global = true)]
    options: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a configuration between JSON, TOML and INI.
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Coerce values to the types declared by this JSON Schema.
        #[arg(long)]
        schema: Option<PathBuf>,
        /// Input format, by default taken from the extension.
        #[arg(long, value_enum)]
        from: Option<Format>,
        /// Output format, by default taken from the extension.
        #[arg(long, value_enum)]
        to: Option<Format>,
    },
    /// List every bound field with its current value.
    Fields {
        /// JSON Schema file. Defaults to `<name>-schema.json` next to the data file.
        schema: Option<PathBuf>,
        /// Configuration to load into the fields.
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// Print the outline of a JSON Schema.
    Schema { schema: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let options = options_or_grow_all(cli.options.as_deref())?;
    debug!("options: {options:?}");

    match cli.command {
        Command::Convert {
            input,
            output,
            schema,
            from,
            to,
        } => convert(&input, &output, schema, from, to, &options.populate),
        Command::Fields { schema, data } => fields(schema, data, options),
        Command::Schema { schema } => {
            let schema = load_schema(&schema)?;
            if let Some(title) = &schema.title {
                println!("{}", title.bold());
            }
            print!("{}", schema.outline());
            Ok(())
        }
    }
}

fn convert(
    input: &Path,
    output: &Path,
    schema: Option<PathBuf>,
    from: Option<Format>,
    to: Option<Format>,
    populate: &PopulateOptions,
) -> Result<()> {
    let to = match to {
        Some(f) => f,
        None => Format::from_path(output)?,
    };
    let mut tree = read_tree(input, from)?;

    if let Some(schema_path) = schema {
        let schema = load_schema(&schema_path)?;
        let mut bindings = Binding::build(&schema);
        let report = populate_with(&mut bindings, &schema, &tree, populate);
        if report.ignored > 0 {
            println!(
                "{}",
                format!("{} value(s) do not fit the schema and were dropped", report.ignored)
                    .yellow()
            );
        }
        let gathered = gather(&schema, &bindings);
        for issue in &gathered.issues {
            println!("{} {issue}", "warning:".yellow().bold());
        }
        tree = gathered.tree;
    }

    let mut content = to.encode(&tree)?;
    if to == Format::Ini && !content.is_empty() {
        content.push('\n');
    }
    fs::write(output, content).with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "{} {} -> {}",
        "converted".green(),
        input.display(),
        output.display()
    );
    Ok(())
}

fn fields(schema: Option<PathBuf>, data: Option<PathBuf>, options: Options) -> Result<()> {
    let schema_path = match (schema, &data) {
        (Some(path), _) => path,
        (None, Some(data)) => default_schema_by_init(data),
        (None, None) => anyhow::bail!("either a schema or --data is required"),
    };
    let mut session = Session::new(load_schema(&schema_path)?)?.with_options(options);
    if let Some(data) = &data {
        session.load(&read_tree(data, None)?);
    }

    for (path, handle) in session.bindings().fields() {
        let raw = handle.raw();
        let value = if handle.is_blank() {
            "<unset>".dimmed().to_string()
        } else {
            raw.cyan().to_string()
        };
        println!("{} = {value}", path.to_string().bold());
    }

    let gathered = session.collect();
    for issue in &gathered.issues {
        println!("{} {issue}", "warning:".yellow().bold());
    }
    Ok(())
}
