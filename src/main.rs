use kestrel_modeler::cli::CliOverrides;
use kestrel_modeler::config::ModelerConfig;
use kestrel_modeler::{logging, run_headless, SessionPlan};

fn main() {
    let cli = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    logging::init(cli.log_format());

    let mut config = cli.config_path().map(ModelerConfig::load_or_default).unwrap_or_default();
    let overrides = cli.config_overrides();
    if !overrides.is_empty() {
        tracing::info!(fields = ?overrides.applied_fields(), "applying command-line overrides");
        config.apply_overrides(&overrides);
    }
    let plan = SessionPlan { imports: cli.imports().to_vec(), export: cli.export().cloned(), frames: cli.frames() };
    if let Err(err) = run_headless(config, &plan) {
        eprintln!("Application error: {err:?}");
        std::process::exit(1);
    }
}
