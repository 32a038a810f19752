use rand::Rng;
use std::sync::atomic::{AtomicU32, Ordering};

/// Generates unique class-name prefixes for test isolation.
///
/// Each test gets a prefix in the format `t{run}_{counter}_`, where `run`
/// is random per process. Tests running in parallel, within or across
/// processes, never touch each other's classes.
#[derive(Clone)]
pub struct TestIsolation {
    run: u32,
    counter: u32,
}

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

impl TestIsolation {
    pub fn new() -> Self {
        Self {
            run: rand::thread_rng().gen_range(0..1_000_000),
            counter: TEST_COUNTER.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn prefix(&self) -> String {
        format!("t{}_{}_", self.run, self.counter)
    }

    pub fn owns_class(&self, class_name: &str) -> bool {
        class_name.starts_with(&self.prefix())
    }
}

impl Default for TestIsolation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_are_unique() {
        let first = TestIsolation::new();
        let second = TestIsolation::new();

        assert_ne!(first.prefix(), second.prefix());
        assert!(first.prefix().starts_with('t'));
    }

    #[test]
    fn owns_prefixed_classes() {
        let isolation = TestIsolation::new();
        let class_name = format!("{}Post", isolation.prefix());

        assert!(isolation.owns_class(&class_name));
        assert!(!isolation.owns_class("Post"));
    }
}
