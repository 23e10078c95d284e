//! LTL front end: delegation to an external formula-to-DFA translator.
//!
//! The engine does not translate LTL itself. [`from_ltl`] spawns an
//! external command expected to print a DFA in the engine's textual spec
//! format on stdout, invoked as `<translator> --ap <k> <formula>`, and
//! parses the result. The alphabet has `2^k` symbols, each consumed as
//! `k` consecutive bits, least-significant bit first; the translator must
//! follow the same convention.

use std::process::Command;

use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::Graph;

/// Default translator command, resolved through `PATH`.
pub const DEFAULT_TRANSLATOR: &str = "ltl2dfa";

/// Builds the DFA of an LTL formula over `num_ap` atomic propositions
/// using the default external translator.
pub fn from_ltl(formula: &str, num_ap: usize) -> Result<Graph> {
    from_ltl_with(formula, num_ap, DEFAULT_TRANSLATOR)
}

/// Same as [`from_ltl`], with an explicit translator command.
pub fn from_ltl_with(formula: &str, num_ap: usize, translator: &str) -> Result<Graph> {
    if num_ap == 0 {
        return Err(Error::BadConfig(
            "LTL translation requires at least one atomic proposition".into(),
        ));
    }
    debug!(translator, num_ap, "invoking external LTL translator");
    let output = Command::new(translator)
        .arg("--ap")
        .arg(num_ap.to_string())
        .arg(formula)
        .output()
        .map_err(|e| Error::BadLtl(format!("failed to run translator {translator:?}: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::BadLtl(format!(
            "translator {translator:?} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    let text = String::from_utf8(output.stdout)
        .map_err(|_| Error::BadLtl("translator produced non-UTF-8 output".into()))?;
    Graph::from_spec_text(&text).map_err(|e| Error::BadLtl(format!("unparsable translator output: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_atomic_propositions_are_rejected() {
        assert!(matches!(
            from_ltl("G a", 0),
            Err(Error::BadConfig(_))
        ));
    }

    #[test]
    fn missing_translator_is_a_translation_error() {
        assert!(matches!(
            from_ltl_with("G a", 1, "definitely-not-a-real-translator"),
            Err(Error::BadLtl(_))
        ));
    }

    #[test]
    fn unparsable_output_is_a_translation_error() {
        // `echo` succeeds but its output is not a DFA spec.
        assert!(matches!(
            from_ltl_with("G a", 1, "echo"),
            Err(Error::BadLtl(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn translator_output_is_parsed_as_a_spec() {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake-translator");
        let mut file = std::fs::File::create(&path).unwrap();
        // Always answers with the even-number-of-1s automaton.
        writeln!(file, "#!/bin/sh\nprintf '2 0 1\\n0\\n0 0 1\\n1 1 0\\n'").unwrap();
        file.set_permissions(std::fs::Permissions::from_mode(0o755)).unwrap();
        drop(file);

        let graph = from_ltl_with("G a", 1, path.to_str().unwrap()).unwrap();
        assert_eq!(graph.state_count(), 2);
        assert!(graph.accept([true, true]));
        assert!(!graph.accept([true]));
    }
}
