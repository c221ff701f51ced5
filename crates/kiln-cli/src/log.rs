//! Colored step logging for package and build operations.

use colored::Colorize;

/// Log a build step with a colored prefix.
pub fn step(prefix: &str, message: &str) {
    eprintln!("{} {message}", format!("[{prefix}]").cyan().bold());
}

/// Log the exact command line a step is about to run.
pub fn command(prefix: &str, program: &str, args: &[String]) {
    let line = std::iter::once(program.to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ");

    eprintln!("{} {}", format!("[{prefix}]").cyan().bold(), line.dimmed());
}

/// Log a failure with a red prefix.
pub fn failure(prefix: &str, message: &str) {
    eprintln!("{} {message}", format!("[{prefix}]").red().bold());
}

/// Log a warning with a yellow prefix.
pub fn warning(prefix: &str, message: &str) {
    eprintln!("{} {message}", format!("[{prefix}]").yellow().bold());
}
