use std::collections::HashSet;

/// Collision-free symbol names: `base`, then `base.1`, `base.2`, ...
#[derive(Debug, Default)]
pub struct NameAllocator {
    used: HashSet<String>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, base: &str) -> String {
        if self.used.insert(base.to_string()) {
            return base.to_string();
        }
        let mut suffix = 1usize;
        loop {
            let candidate = format!("{}.{}", base, suffix);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Make a name available again after the definition owning it was rolled back.
    pub fn release(&mut self, name: &str) {
        self.used.remove(name);
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffixes() {
        let mut names = NameAllocator::new();
        assert_eq!(names.allocate("py.f"), "py.f");
        assert_eq!(names.allocate("py.f"), "py.f.1");
        assert_eq!(names.allocate("py.f"), "py.f.2");
        assert_eq!(names.allocate("py.g"), "py.g");
        // a literal base that looks like a suffixed name does not collide
        assert_eq!(names.allocate("py.f.1"), "py.f.1.1");
        names.release("py.f.1");
        assert!(!names.is_used("py.f.1"));
        assert_eq!(names.allocate("py.f"), "py.f.1");
    }
}
