//! chargepark-sim entry point: CLI wiring and config-driven engine construction.

use std::path::Path;
use std::process;

use tracing::{error, info};

use chargepark_sim::config::ScenarioConfig;
use chargepark_sim::io::export::export_csv;
use chargepark_sim::sim::engine::Engine;
use chargepark_sim::sim::kpi::KpiReport;
use chargepark_sim::telemetry::init_tracing;

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    policy_override: Option<String>,
    seed_override: Option<u64>,
    export_path: Option<String>,
    verbose: bool,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: u16,
}

fn print_help() {
    eprintln!("chargepark-sim: EV charging park simulator");
    eprintln!();
    eprintln!("Usage: chargepark-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>          Use a built-in preset ({})",
        ScenarioConfig::PRESETS.join(", ")
    );
    eprintln!("  --policy <name>          Override the scheduling policy");
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --export <path>          Export per-step results to CSV");
    eprintln!("  --verbose                Log at debug level unless RUST_LOG is set");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start REST API server after simulation");
        eprintln!("  --port <u16>             API server port (default: 3000)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
}

/// Returns the value following flag `args[*i]`, or exits.
fn flag_value(args: &[String], i: &mut usize, what: &str) -> String {
    *i += 1;
    match args.get(*i) {
        Some(v) => v.clone(),
        None => {
            eprintln!("error: {} requires {what}", args[*i - 1]);
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        policy_override: None,
        seed_override: None,
        export_path: None,
        verbose: false,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: 3000,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => cli.scenario_path = Some(flag_value(&args, &mut i, "a path argument")),
            "--preset" => cli.preset = Some(flag_value(&args, &mut i, "a name argument")),
            "--policy" => cli.policy_override = Some(flag_value(&args, &mut i, "a policy name")),
            "--seed" => {
                let v = flag_value(&args, &mut i, "a u64 argument");
                if let Ok(s) = v.parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{v}\" is not a valid u64");
                    process::exit(1);
                }
            }
            "--export" => cli.export_path = Some(flag_value(&args, &mut i, "a path argument")),
            "--verbose" | "-v" => cli.verbose = true,
            #[cfg(feature = "api")]
            "--serve" => {
                cli.serve = true;
            }
            #[cfg(feature = "api")]
            "--port" => {
                let v = flag_value(&args, &mut i, "a u16 argument");
                if let Ok(p) = v.parse::<u16>() {
                    cli.port = p;
                } else {
                    eprintln!("error: --port value \"{v}\" is not a valid u16");
                    process::exit(1);
                }
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn main() {
    let cli = parse_args();
    init_tracing(cli.verbose);

    // Load config: --scenario takes priority, then --preset, then baseline default
    let loaded = if let Some(ref path) = cli.scenario_path {
        ScenarioConfig::from_toml_file(Path::new(path))
    } else if let Some(ref name) = cli.preset {
        ScenarioConfig::from_preset(name)
    } else {
        Ok(ScenarioConfig::baseline())
    };
    let mut scenario = loaded.unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    if let Some(policy) = cli.policy_override {
        scenario.scheduling.policy = policy;
    }
    if let Some(seed) = cli.seed_override {
        scenario.simulation.seed = seed;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let realisation = scenario.build_realisation().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });
    let policy = realisation.scheduling_policy.kind();
    info!(
        %policy,
        events = realisation.charging_events.len(),
        seed = scenario.simulation.seed,
        "scenario ready"
    );

    let engine = Engine::new(realisation).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });
    let result = engine
        .run_with_progress(|fraction| info!("progress {:.0}%", 100.0 * fraction))
        .unwrap_or_else(|e| {
            error!(error = %e, "simulation aborted");
            process::exit(1);
        });

    let kpi = KpiReport::from_result(&result);
    println!("{kpi}");

    if let Some(ref path) = cli.export_path {
        if let Err(e) = export_csv(&result, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        info!(path = %path, "results written");
    }

    // Start API server if requested
    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(chargepark_sim::api::AppState::new(policy.name(), result));
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        });
        rt.block_on(chargepark_sim::api::serve(state, addr));
    }
}
