use crate::error::{Error, Result};
use regex::{Captures, Regex};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::env as stdenv;
use std::sync::LazyLock;
use tracing::trace;

/// Matches either an escape (`$$`) or a reference (`$NAME`, `${NAME}`).
///
/// Escapes are matched as a unit so that the `$` they consume can never start a
/// reference. The first group captures the braced name, the second the bare one.
static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(?:\$|\{(\w+)\}|(\w+))").unwrap());

/// Substitution passes after which `resolve` gives up on text that keeps
/// changing without ever repeating.
const MAX_PASSES: usize = 4096;

/// The variables of a shell session.
///
/// Values are plain strings. Text handed to the shell is run through
/// [`Environment::resolve`] before it is parsed, which substitutes `$NAME` and
/// `${NAME}` references with the current values.
///
/// ```
/// use liteshell::env::Environment;
///
/// let mut env = Environment::default();
/// env.set("GREETING", "hello").set("TARGET", "${GREETING} world");
/// assert_eq!(env.resolve("$TARGET, costs $$5").unwrap(), "hello world, costs $5");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the variables of the current process into a new `Environment`.
    pub fn from_process() -> Self {
        Self {
            vars: stdenv::vars().collect(),
        }
    }

    /// Set or override a variable. Returns `self` for chaining.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Get the value of a variable, or an empty string if it is not set.
    pub fn get(&self, name: &str) -> &str {
        self.vars.get(name).map_or("", String::as_str)
    }

    /// All variables currently set.
    pub fn values(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Substitute every variable reference in `text` until none is left.
    ///
    /// References are `$NAME` and `${NAME}` where `NAME` is a run of word
    /// characters. `$$` is an escape: it is never part of a reference and
    /// becomes a single `$` once substitution is complete. Values may contain
    /// references themselves; those are resolved in the following pass.
    /// Unknown variables resolve to an empty string. A malformed reference such
    /// as an unclosed `${` is left as it is.
    ///
    /// Fails with [`Error::CyclicReference`] if a referenced variable
    /// (directly or through other variables) refers to itself.
    pub fn resolve(&self, text: &str) -> Result<String> {
        let mut result = text.to_owned();
        let mut seen = HashSet::new();
        let mut passes = 0;

        loop {
            let next = {
                let names = references(&result);
                if names.is_empty() {
                    break;
                }

                let mut verified = HashSet::new();
                for name in &names {
                    self.check_acyclic(name, &mut Vec::new(), &mut verified)?;
                }

                // A value may end in `$` and join with the text after it into a
                // reference that no definition contains. Such joins either come
                // back to an earlier state or keep growing the text.
                passes += 1;
                if !seen.insert(result.clone()) || passes > MAX_PASSES {
                    let name = names.into_iter().next().unwrap_or_default();
                    return Err(Error::CyclicReference(name.to_owned()));
                }

                trace!(pass = passes, names = ?names, "substituting variables");
                self.substitute(&result)
            };
            result = next;
        }

        Ok(result.replace("$$", "$"))
    }

    /// Replace all references in one go, leaving escapes untouched.
    fn substitute(&self, text: &str) -> String {
        REFERENCE
            .replace_all(text, |caps: &Captures<'_>| match caps.get(1).or(caps.get(2)) {
                Some(name) => self.get(name.as_str()).to_owned(),
                None => caps[0].to_owned(),
            })
            .into_owned()
    }

    /// Depth-first walk over the variables `name` refers to.
    fn check_acyclic<'a>(
        &'a self,
        name: &'a str,
        path: &mut Vec<&'a str>,
        verified: &mut HashSet<&'a str>,
    ) -> Result<()> {
        if verified.contains(name) {
            return Ok(());
        }
        if path.contains(&name) {
            return Err(Error::CyclicReference(name.to_owned()));
        }

        path.push(name);
        for next in references(self.get(name)) {
            self.check_acyclic(next, path, verified)?;
        }
        path.pop();

        verified.insert(name);
        Ok(())
    }
}

/// Distinct variable names referenced (not escaped) in `text`.
fn references(text: &str) -> BTreeSet<&str> {
    REFERENCE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or(caps.get(2)))
        .map(|name| name.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_set_and_get() {
        let mut env = Environment::default();

        // initially absent
        assert_eq!(env.get("SOME_RANDOM_VAR_12345"), "");

        env.set("KEY", "VALUE");
        assert_eq!(env.get("KEY"), "VALUE");

        env.set("KEY", "OTHER");
        assert_eq!(env.get("KEY"), "OTHER");
        assert_eq!(env.values().len(), 1);
    }

    #[test]
    fn test_reads_from_process_env() {
        let env = Environment::from_process();
        assert!(!env.get("PATH").is_empty());
    }

    #[test]
    fn test_resolve_constants() {
        let mut env = Environment::default();
        env.set("X", "plain value");

        assert_eq!(env.resolve("$X").unwrap(), "plain value");
        assert_eq!(env.resolve("${X}!").unwrap(), "plain value!");
        assert_eq!(env.resolve("plain value").unwrap(), "plain value");
        assert_eq!(env.resolve("").unwrap(), "");
    }

    #[test]
    fn test_resolve_bare_name_is_greedy() {
        let mut env = Environment::default();
        env.set("A", "1").set("AB", "2");

        assert_eq!(env.resolve("$AB").unwrap(), "2");
        assert_eq!(env.resolve("${A}B").unwrap(), "1B");
    }

    #[test]
    fn test_resolve_escape() {
        let mut env = Environment::default();
        env.set("X", "value");

        assert_eq!(env.resolve("$$X").unwrap(), "$X");
        assert_eq!(env.resolve("$$UNDEFINED").unwrap(), "$UNDEFINED");
        assert_eq!(env.resolve("$$Hello World$$").unwrap(), "$Hello World$");
        assert_eq!(env.resolve("$$$X").unwrap(), "$value");
    }

    #[test]
    fn test_resolve_transitive() {
        let mut env = Environment::default();
        env.set("A", "$B").set("B", "3");

        assert_eq!(env.resolve("$A").unwrap(), "3");
        assert_eq!(env.resolve("$A $B").unwrap(), "3 3");
    }

    #[test]
    fn test_resolve_value_escape_survives() {
        let mut env = Environment::default();
        env.set("PRICE", "$$5");

        assert_eq!(env.resolve("costs $PRICE").unwrap(), "costs $5");
    }

    #[test]
    fn test_resolve_unknown_is_empty() {
        let env = Environment::default();
        assert_eq!(env.resolve("$UNDEFINED").unwrap(), "");
        assert_eq!(env.resolve("a${UNDEFINED}b").unwrap(), "ab");
    }

    #[test]
    fn test_resolve_malformed_left_untouched() {
        let mut env = Environment::default();
        env.set("A", "1");

        assert_eq!(env.resolve("${A").unwrap(), "${A");
        assert_eq!(env.resolve("${A B}").unwrap(), "${A B}");
        assert_eq!(env.resolve("cost: $").unwrap(), "cost: $");
    }

    #[test]
    fn test_resolve_self_reference_fails() {
        let mut env = Environment::default();
        env.set("A", "$A");

        assert_matches!(env.resolve("$A"), Err(Error::CyclicReference(name)) if name == "A");
    }

    #[test]
    fn test_resolve_indirect_cycle_fails() {
        let mut env = Environment::default();
        env.set("A", "x $B").set("B", "${C}").set("C", "$A");

        assert_matches!(env.resolve("start $A"), Err(Error::CyclicReference(_)));
        // unrelated text is unaffected by the broken definitions
        assert_eq!(env.resolve("$$A").unwrap(), "$A");
    }

    #[test]
    fn test_resolve_diamond_is_not_a_cycle() {
        let mut env = Environment::default();
        env.set("TOP", "$LEFT/$RIGHT")
            .set("LEFT", "$BASE")
            .set("RIGHT", "$BASE")
            .set("BASE", "b");

        assert_eq!(env.resolve("$TOP").unwrap(), "b/b");
    }

    #[test]
    fn test_resolve_joined_reference_loop_fails() {
        let mut env = Environment::default();
        // `${D}B` expands to `$B`, which expands to `${D}B` again
        env.set("D", "$$").set("B", "${D}B");
        assert_eq!(env.resolve("${D}").unwrap(), "$");

        env.set("D", "$");
        assert_matches!(env.resolve("$B"), Err(Error::CyclicReference(_)));
    }

    #[test]
    fn test_resolve_joined_references_may_take_many_passes() {
        let mut env = Environment::default();
        env.set("D", "$");

        // each pass joins the `$` with the next `{D}`; one variable, three passes
        assert_eq!(env.resolve("${D}{D}{D}").unwrap(), "$");
    }

    #[test]
    fn test_resolve_ever_growing_text_fails() {
        let mut env = Environment::default();
        env.set("D", "$").set("E", "${D}E}x");

        assert_matches!(env.resolve("$E"), Err(Error::CyclicReference(_)));
    }
}
