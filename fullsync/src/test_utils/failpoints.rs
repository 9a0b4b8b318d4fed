use fail::FailScenario;

/// Enables failpoints for the lifetime of the value and turns them off when dropped.
///
/// Actions use the `fail` crate syntax, e.g. `"1*return(timed_retry)"` or `"return"`.
pub struct CustomFailScenario<'a> {
    _scenario: FailScenario<'a>,
    names: Vec<String>,
}

impl<'a> CustomFailScenario<'a> {
    pub fn setup(failpoints: &[(&str, &str)]) -> CustomFailScenario<'a> {
        let scenario = FailScenario::setup();

        let mut names = Vec::with_capacity(failpoints.len());
        for (name, action) in failpoints {
            fail::cfg(*name, *action).unwrap();
            names.push(name.to_string());
        }

        Self {
            _scenario: scenario,
            names,
        }
    }
}

impl Drop for CustomFailScenario<'_> {
    fn drop(&mut self) {
        for name in &self.names {
            fail::remove(name);
        }
    }
}
