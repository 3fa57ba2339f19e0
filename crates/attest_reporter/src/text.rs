use std::io;
use std::path::Path;

use owo_colors::OwoColorize;

use crate::RunSummary;

/// Prints the per-status counts of a replayed run and where the results
/// went.
///
/// # Errors
///
/// Fails when `writer` does.
pub fn render_summary(
    writer: &mut impl io::Write,
    summary: &RunSummary,
    output_directory: &Path,
) -> io::Result<()> {
    writeln!(writer)?;
    writeln!(writer, " {} {}", summary.passed.green(), "passed".green())?;

    if summary.failed > 0 {
        writeln!(writer, " {} {}", summary.failed.red(), "failed".red())?;
    }

    if summary.broken > 0 {
        writeln!(writer, " {} {}", summary.broken.magenta(), "broken".magenta())?;
    }

    if summary.skipped > 0 {
        writeln!(
            writer,
            " {} {}",
            summary.skipped.yellow(),
            "skipped".yellow()
        )?;
    }

    writeln!(
        writer,
        "Wrote {} results to {}",
        summary.total(),
        output_directory.display().dimmed()
    )
}
