use std::collections::HashMap;

use tracing::{info_span, warn};

use crate::error::{Error, Failure};

/// Hierarchical identity of a running test plus the failures recorded against it.
///
/// Assertion failures are collected and do not stop the test; a subtest whose
/// body returns `Err` is marked failed and the parent carries on. Call
/// [`TestCase::finish`] at the end of the test to turn collected failures into an
/// error. Dropping a case with unreported failures panics.
#[derive(Debug)]
pub struct TestCase {
    name: String,
    failures: Vec<Failure>,
    children: HashMap<String, usize>,
    reported: bool,
}

impl TestCase {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: rewrite_name(name.as_ref()),
            failures: Vec::new(),
            children: HashMap::new(),
            reported: false,
        }
    }

    /// Name the case after the libtest thread running it (`module::test` becomes
    /// `module/test`).
    pub fn current() -> Self {
        let thread = std::thread::current();
        let name = thread
            .name()
            .filter(|name| *name != "main")
            .unwrap_or("unnamed")
            .replace("::", "/");
        Self::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failed(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    /// Record a non-fatal assertion failure.
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(case = %self.name, "{message}");
        self.failures.push(Failure {
            case: self.name.clone(),
            message,
            fatal: false,
        });
    }

    /// Record the error that aborted this case.
    pub(crate) fn fatal(&mut self, err: &Error) {
        warn!(case = %self.name, error = %err, "test case aborted");
        self.failures.push(Failure {
            case: self.name.clone(),
            message: err.to_string(),
            fatal: true,
        });
    }

    /// Run `body` as the subtest `<self>/<name>`. Returns whether it passed.
    pub fn run<F>(&mut self, name: impl AsRef<str>, body: F) -> bool
    where
        F: FnOnce(&mut TestCase) -> Result<(), Error>,
    {
        let name = self.child_name(name.as_ref());
        let mut child = TestCase::new(name);
        let span = info_span!("case", name = %child.name);
        let _entered = span.enter();

        if let Err(err) = body(&mut child) {
            if !child.aborted_with(&err) {
                child.fatal(&err);
            }
        }
        let passed = !child.failed();
        self.failures.append(&mut child.failures);
        passed
    }

    /// Consume the case, failing with every collected failure.
    pub fn finish(mut self) -> Result<(), Error> {
        self.reported = true;
        if self.failures.is_empty() {
            return Ok(());
        }
        Err(Error::TestFailed {
            name: self.name.clone(),
            failures: std::mem::take(&mut self.failures),
        })
    }

    fn aborted_with(&self, err: &Error) -> bool {
        self.failures
            .last()
            .is_some_and(|last| last.fatal && last.message == err.to_string())
    }

    fn child_name(&mut self, name: &str) -> String {
        let base = format!("{}/{}", self.name, rewrite_name(name));
        let seen = self.children.entry(base.clone()).or_insert(0);
        let unique = if *seen == 0 {
            base
        } else {
            format!("{base}#{:02}", *seen)
        };
        *seen += 1;
        unique
    }
}

impl Drop for TestCase {
    fn drop(&mut self) {
        if !self.reported && !self.failures.is_empty() && !std::thread::panicking() {
            let failures = std::mem::take(&mut self.failures);
            panic!(
                "{}",
                Error::TestFailed {
                    name: self.name.clone(),
                    failures,
                }
            );
        }
    }
}

/// Subtest names never contain spaces, so they map cleanly onto file paths.
fn rewrite_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Golden-friendly name for an endpoint test, e.g. `v1_user_201_success`.
pub fn api_test_name(endpoint: &str, code: u16, description: &[&str]) -> String {
    let mut parts = vec![
        endpoint.trim_start_matches('/').replace('/', "_"),
        code.to_string(),
    ];
    parts.extend(description.iter().map(|part| part.to_string()));
    parts.join("_")
}
