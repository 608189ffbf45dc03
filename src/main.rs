mod debug_report;

use codegraft::{
    Agent, Applied, BuiltinRules, CodeUnit, CodeUnitDescriptor, EnhanceContext, EnhanceError,
    Enhancer, Instruction, RuleCatalog, ShutdownCoordinator, TracingObserver,
};
use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const SHUTDOWN_BUDGET: Duration = Duration::from_secs(2);

fn main() {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let catalog = match RuleCatalog::load(&BuiltinRules) {
        Ok(catalog) => catalog,
        Err(err) => {
            // Catalog load failure is the one startup error the agent does
            // not swallow.
            eprintln!("error: failed to load rule catalog: {err}");
            std::process::exit(1);
        }
    };

    let shutdown = Arc::new(ShutdownCoordinator::new());
    shutdown.register("demo-reporter", || tracing::info!("demo reporter flushed"));
    let on_exit = shutdown.termination_hook(SHUTDOWN_BUDGET);

    let agent = Agent::new(catalog, Box::new(DemoEnhancer))
        .with_observer(Box::new(TracingObserver::default()));

    debug_report::print_header(config.color);
    for name in &config.units {
        let descriptor = describe(name);
        let original = CodeUnit::new(name.clone(), format!("unit:{name}").into_bytes());
        let report = agent.process_verbose(&descriptor, &original);
        debug_report::print_run(original.bytes.len(), &report, config.color);
    }

    on_exit();
}

/// Derive a plausible descriptor from a qualified name alone, so the demo can
/// be driven from the command line without a host to report supertypes.
fn describe(name: &str) -> CodeUnitDescriptor {
    let simple = name.rsplit('.').next().unwrap_or(name);
    let mut descriptor = CodeUnitDescriptor::named(name);
    if simple.ends_with("Store") || simple.ends_with("Repository") {
        descriptor = descriptor.extending("core.data.Repository");
    }
    if simple.contains("Timed") {
        descriptor = descriptor.annotated("Timed");
    }
    descriptor
}

/// Toy rewriter: appends one textual marker per instruction to the unit's
/// binary form. Refuses units whose simple name starts with `Broken`, to
/// exercise the per-rule failure path.
struct DemoEnhancer;

impl Enhancer for DemoEnhancer {
    fn apply(
        &self,
        unit: &CodeUnit,
        instructions: &[Instruction],
        ctx: &mut EnhanceContext,
    ) -> Result<Applied, EnhanceError> {
        let simple = unit.name.rsplit('.').next().unwrap_or(&unit.name);
        if simple.starts_with("Broken") {
            return Err(EnhanceError::Apply {
                unit: unit.name.clone(),
                instruction: instructions.first().map(|i| format!("{i:?}")).unwrap_or_default(),
                reason: "unit refuses rewriting".into(),
            });
        }

        let mut bytes = unit.bytes.clone();
        let mut applied = false;
        for instruction in instructions {
            let marker = match instruction {
                Instruction::WrapMethod { method, interceptor } => {
                    format!(";wrap:{method}->{interceptor}")
                }
                Instruction::WrapStaticMethod { method, interceptor } => {
                    format!(";wrap-static:{method}->{interceptor}")
                }
                Instruction::WrapConstructor { interceptor } => {
                    format!(";wrap-ctor:{interceptor}")
                }
                Instruction::InjectField { field } => {
                    // One structural extension per unit, whichever rule wins.
                    if !ctx.extend_once() {
                        continue;
                    }
                    format!(";field:{field}")
                }
            };
            bytes.extend_from_slice(marker.as_bytes());
            applied = true;
        }

        if applied {
            Ok(Applied::Rewritten(CodeUnit::new(unit.name.clone(), bytes)))
        } else {
            Ok(Applied::Declined)
        }
    }
}

struct CliConfig {
    units: Vec<String>,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut units: Vec<String> = Vec::new();
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("codegraft {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--" => {
                units.extend(args);
                break;
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => units.push(arg),
        }
    }

    if units.is_empty() {
        units = sample_units();
    }

    Ok(CliConfig { units, color })
}

fn sample_units() -> Vec<String> {
    [
        "shop.core.UserService",
        "shop.api.CheckoutController",
        "shop.data.UserStore",
        "shop.jobs.TimedReportJob",
        "shop.util.Strings",
        "shop.legacy.BrokenPaymentService",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn print_help() {
    println!(
        "codegraft {version}

Load-time code enhancement engine demo.

Feeds qualified unit names through the built-in observability catalog and
prints a per-unit transformation report. Descriptors are synthesized from
the name: `*Store`/`*Repository` gain a `core.data.Repository` supertype,
names containing `Timed` gain a `Timed` annotation.

Usage:
  codegraft [OPTIONS] [--] [unit...]

Options:
  --color       Force ANSI color output.
  --no-color    Disable ANSI color output.
  -h, --help    Show this help message.
  -V, --version Print version information.

With no units given, a built-in sample set is processed. Set RUST_LOG for
engine logs (e.g. RUST_LOG=codegraft=debug).

Exit codes:
  0  Success.
  1  Catalog failed to load.
  2  Invalid arguments.
",
        version = env!("CARGO_PKG_VERSION")
    )
}
