use {
    anyhow::Result,
    motifini_config::{MotifiniConfig, Severity, validate},
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Validate `config` and print diagnostics. Exits non-zero on errors.
pub fn check(mut config: MotifiniConfig, verbose: bool) -> Result<()> {
    let result = validate(&mut config);

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
            Severity::Info => CYAN,
        };
        eprintln!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message);
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if verbose {
        eprintln!("\n{}", summary(&config));
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn summary(config: &MotifiniConfig) -> String {
    format!(
        "state_file = {}\ntemp_dir = {}\nenabled_apis = {:?}\ncameras = {:?}\ndefault_delay_secs = \
         {}\nconsole.contact = {}",
        config.state_file.display(),
        config.temp_dir.display(),
        config.enabled_apis,
        config.cameras,
        config.default_delay_secs,
        config.console.contact
    )
}
