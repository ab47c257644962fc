use sdui_engine::document::{parse_document, parse_document_yaml};
use sdui_engine::spec::collect_action_names;
use sdui_engine::{
    render_page, validate_specification, ComponentRegistry, HandlerMap, Resolver, ResolverConfig,
    SduiError, SduiResult, StateSnapshot,
};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

struct Options {
    check_only: bool,
    state: Option<String>,
    config: Option<String>,
    files: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let options = match parse_args(env::args().skip(1).collect()) {
        Some(options) => options,
        None => {
            print_usage();
            process::exit(1);
        }
    };

    let resolver = match load_config(options.config.as_deref()) {
        Ok(config) => Resolver::with_config(ComponentRegistry::with_builtins(), config),
        Err(e) => {
            eprintln!("✗ config: {}", e);
            process::exit(1);
        }
    };
    let state_overrides = match options.state.as_deref().map(read_structured).transpose() {
        Ok(state) => state,
        Err(e) => {
            eprintln!("✗ state: {}", e);
            process::exit(1);
        }
    };

    let mut exit_code = 0;
    for file_path in &options.files {
        match render_file(&resolver, file_path, state_overrides.as_ref()) {
            Ok(html) => {
                if options.check_only {
                    println!("✓ {} is valid", file_path);
                } else {
                    eprintln!("✓ {} rendered", file_path);
                    println!("{}", html);
                }
            }
            Err(e) => {
                eprintln!("✗ {} has errors:", file_path);
                eprintln!("    {}", e);
                exit_code = 1;
            }
        }
    }

    process::exit(exit_code);
}

fn parse_args(args: Vec<String>) -> Option<Options> {
    let mut options = Options {
        check_only: false,
        state: None,
        config: None,
        files: Vec::new(),
    };
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--check" => options.check_only = true,
            "--state" => options.state = Some(args.next()?),
            "--config" => options.config = Some(args.next()?),
            "-h" | "--help" => return None,
            _ => options.files.push(arg),
        }
    }
    if options.files.is_empty() {
        None
    } else {
        Some(options)
    }
}

fn print_usage() {
    eprintln!("Usage: sdui-render [--check] [--state <file>] [--config <file>] <spec.json|spec.yaml>...");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  sdui-render fixtures/dialog.json > dialog.html");
    eprintln!("  sdui-render --check fixtures/*.json");
    eprintln!("  RUST_LOG=debug sdui-render --state state.json page.yaml");
}

fn is_yaml(path: &str) -> bool {
    matches!(
        Path::new(path).extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn read_structured(path: &str) -> SduiResult<Value> {
    let content = fs::read_to_string(path)?;
    if is_yaml(path) {
        Ok(serde_yaml::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(&content)?)
    }
}

fn load_config(path: Option<&str>) -> SduiResult<ResolverConfig> {
    match path {
        None => Ok(ResolverConfig::default()),
        Some(path) => {
            let content = fs::read_to_string(path)?;
            if is_yaml(path) {
                ResolverConfig::from_yaml(&content)
            } else {
                ResolverConfig::from_json(&content)
            }
        }
    }
}

fn render_file(resolver: &Resolver, path: &str, state_overrides: Option<&Value>) -> SduiResult<String> {
    let content = fs::read_to_string(path)?;
    let doc = if is_yaml(path) {
        parse_document_yaml(&content)?
    } else {
        parse_document(&content)?
    }
    .into_specification();

    // Unknown types surface below as diagnostics, not as a failed file.
    validate_specification(&doc, None)?;

    let mut state: StateSnapshot = doc.initial_state();
    match state_overrides {
        Some(Value::Object(map)) => state.merge(map.clone()),
        Some(_) => {
            return Err(SduiError::MalformedSpec {
                path: "--state".to_string(),
                reason: "state file must contain an object".to_string(),
            })
        }
        None => {}
    }

    let handlers = HandlerMap::new().with_placeholders(collect_action_names(&doc.root));
    let resolution = resolver.resolve_document(&doc, &state, &handlers)?;
    for diagnostic in &resolution.diagnostics {
        eprintln!("  warning: {}", diagnostic);
    }
    Ok(render_page(&doc, &resolution))
}
