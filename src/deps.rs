//! Availability checks for the external tools the pipeline shells out to.

use crate::error::Result;
use crate::exec::{CommandExecutor, CommandRequest};

/// Tools that must be on `PATH` before any workflow starts.
pub const REQUIRED_TOOLS: [&str; 4] = ["gpg", "xorriso", "cpio", "sha512sum"];

/// Returns the required tools that cannot be invoked on this system.
///
/// Each tool is probed with `--version`; a spawn failure or non-zero exit
/// counts as missing. Timeouts and other executor errors still propagate.
///
/// # Errors
///
/// Returns executor errors other than a failure to locate the program.
pub fn missing_tools(executor: &dyn CommandExecutor) -> Result<Vec<&'static str>> {
    let mut missing = Vec::new();
    for tool in REQUIRED_TOOLS {
        if !tool_responds(executor, tool)? {
            missing.push(tool);
        }
    }
    Ok(missing)
}

fn tool_responds(executor: &dyn CommandExecutor, tool: &'static str) -> Result<bool> {
    match executor.run(&CommandRequest::new(tool, ["--version"])) {
        Ok(output) => Ok(output.status.success()),
        Err(crate::error::DebseedError::Io(e))
            if e.kind() == std::io::ErrorKind::NotFound =>
        {
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, success_output};

    fn version_call(tool: &'static str, succeed: bool) -> ExpectedCall {
        let result = if succeed {
            success_output()
        } else {
            failure_output("")
        };
        ExpectedCall::returning(tool, ["--version"], result)
    }

    #[test]
    fn all_tools_present_yields_empty_list() {
        let executor = StubExecutor::new(
            REQUIRED_TOOLS
                .iter()
                .map(|tool| version_call(tool, true))
                .collect(),
        );

        let missing = missing_tools(&executor).expect("probe should succeed");
        assert!(missing.is_empty());
        executor.assert_finished();
    }

    #[test]
    fn failing_probes_are_reported_as_missing() {
        let executor = StubExecutor::new(vec![
            version_call("gpg", true),
            version_call("xorriso", false),
            version_call("cpio", true),
            version_call("sha512sum", false),
        ]);

        let missing = missing_tools(&executor).expect("probe should succeed");
        assert_eq!(missing, vec!["xorriso", "sha512sum"]);
    }
}
