use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use rollup_core::{init_logging, ComputedFieldEngine, EngineConfig, LogFormat, ResolveMode, ResolveRequest};
use rollup_graph::{GraphDocument, LoadedGraph};
use rollup_model::{RecordId, Timestamp, UserId};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn cli() -> Command {
    Command::new("rollup")
        .version(rollup_core::VERSION)
        .about("Resolve computed fields over a versioned link graph")
        .subcommand_required(true)
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(value_parser!(LogFormat))
                .help("Log output format (text or json)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("info")
                .help("Default log directive when RUST_LOG is unset"),
        )
        .subcommand(
            target_args(Command::new("resolve").about("Resolve a computed field"))
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .value_parser(value_parser!(ResolveMode))
                        .help("precise or fast (default: from the field and configuration)"),
                )
                .arg(
                    Arg::new("no-stop")
                        .long("no-stop")
                        .action(ArgAction::SetTrue)
                        .help("Look through manual values (fast mode)"),
                )
                .arg(
                    Arg::new("user")
                        .long("user")
                        .default_value("0")
                        .value_parser(value_parser!(u64))
                        .help("User whose visibility applies (precise mode)"),
                ),
        )
        .subcommand(target_args(
            Command::new("snapshot").about("Show manual and aggregated values of a computed field"),
        ))
}

fn target_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("graph")
                .long("graph")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Graph document (.yaml, .yml or .json)"),
        )
        .arg(
            Arg::new("record")
                .long("record")
                .required(true)
                .value_parser(value_parser!(u64))
                .help("Record id"),
        )
        .arg(
            Arg::new("field")
                .long("field")
                .required(true)
                .help("Computed field name"),
        )
        .arg(
            Arg::new("at")
                .long("at")
                .value_parser(value_parser!(i64))
                .help("Resolve as of this timestamp (seconds); latest when omitted"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration (TOML)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Output as JSON"),
        )
}

fn run() -> Result<()> {
    let matches = cli().get_matches();

    let format = matches.get_one::<LogFormat>("log-format").copied().unwrap_or_default();
    let level = matches
        .get_one::<String>("log-level")
        .map_or("info", String::as_str);
    init_logging(level, format).map_err(|err| anyhow::anyhow!("cannot install logger: {err}"))?;

    match matches.subcommand() {
        Some(("resolve", args)) => resolve(args),
        Some(("snapshot", args)) => snapshot(args),
        _ => Ok(()),
    }
}

struct Target {
    engine: ComputedFieldEngine,
    record: RecordId,
    field: String,
    at: Option<Timestamp>,
    json: bool,
}

fn required<'a, T: Clone + Send + Sync + 'static>(args: &'a ArgMatches, name: &str) -> Result<&'a T> {
    args.get_one::<T>(name)
        .with_context(|| format!("missing --{name}"))
}

fn target(args: &ArgMatches) -> Result<Target> {
    let config = match args.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let loaded = load_graph(required::<PathBuf>(args, "graph")?)?;
    let engine = ComputedFieldEngine::new(Arc::new(loaded.graph), Arc::new(loaded.visibility), config);

    Ok(Target {
        engine,
        record: RecordId(*required::<u64>(args, "record")?),
        field: required::<String>(args, "field")?.clone(),
        at: args.get_one::<i64>("at").copied().map(Timestamp),
        json: args.get_flag("json"),
    })
}

fn load_graph(path: &Path) -> Result<LoadedGraph> {
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read graph document {}", path.display()))?;
    let document = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => GraphDocument::from_json_str(&input)?,
        _ => GraphDocument::from_yaml_str(&input)?,
    };
    let loaded = document
        .load()
        .with_context(|| format!("invalid graph document {}", path.display()))?;
    tracing::info!(path = %path.display(), records = loaded.graph.record_count(), "graph loaded");
    Ok(loaded)
}

fn resolve(args: &ArgMatches) -> Result<()> {
    let target = target(args)?;
    let engine = &target.engine;
    let field = engine.computed_field(target.record, &target.field)?;
    let mode = args
        .get_one::<ResolveMode>("mode")
        .copied()
        .unwrap_or_else(|| engine.mode_for(&field));
    let user = UserId(*required::<u64>(args, "user")?);
    let stop = !args.get_flag("no-stop");

    let request = ResolveRequest::new(target.record, field)
        .at(target.at)
        .as_user(user)
        .stop_on_manual_value(stop);
    let value = engine.resolve_with_mode(&request, mode)?;

    if target.json {
        let output = serde_json::json!({
            "record": target.record,
            "field": target.field,
            "at": target.at,
            "mode": mode,
            "user": user,
            "value": value,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        match value {
            Some(v) => println!("{v}"),
            None => println!("no value"),
        }
    }
    Ok(())
}

fn snapshot(args: &ArgMatches) -> Result<()> {
    let target = target(args)?;
    let snapshot = target.engine.snapshot(target.record, &target.field, target.at)?;

    if target.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        let show = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        println!("Record:          {}", snapshot.record);
        println!("Field:           {} ({})", snapshot.label, snapshot.field_id);
        println!("Auto-computed:   {}", snapshot.is_autocomputed);
        println!("Computed value:  {}", show(snapshot.computed_value));
        println!("Manual value:    {}", show(snapshot.manual_value));
        println!("Displayed value: {}", show(snapshot.displayed_value()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn resolve_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "rollup", "resolve", "--graph", "graph.yaml", "--record", "1", "--field", "effort", "--mode",
                "fast", "--no-stop", "--at", "150",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "resolve");
        assert_eq!(args.get_one::<ResolveMode>("mode"), Some(&ResolveMode::Fast));
        assert!(args.get_flag("no-stop"));
        assert_eq!(args.get_one::<i64>("at"), Some(&150));
        assert_eq!(args.get_one::<u64>("user"), Some(&0));
    }

    #[test]
    fn rejects_unknown_mode() {
        let result = cli().try_get_matches_from([
            "rollup", "resolve", "--graph", "g.yaml", "--record", "1", "--field", "effort", "--mode", "bfs",
        ]);
        assert!(result.is_err());
    }
}
