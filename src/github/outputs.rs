use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use super::errors::GitHubError;

/// Append `name=value` lines to the Actions step-output file, when running
/// under Actions. Without a path this is a no-op.
pub fn write_step_outputs(path: Option<&Path>, outputs: &[(&str, &str)]) -> Result<(), GitHubError> {
    let Some(path) = path else {
        return Ok(());
    };
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for (name, value) in outputs {
        writeln!(file, "{name}={value}")?;
    }
    tracing::debug!(path = %path.display(), count = outputs.len(), "Wrote step outputs");
    Ok(())
}
