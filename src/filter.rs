use globset::{Glob, GlobSet, GlobSetBuilder};

/// Package names (or globs over them, e.g. `@babel/*`) to leave alone.
#[derive(Debug, Clone)]
pub struct PackageFilter {
    set: GlobSet,
}

impl PackageFilter {
    pub fn new<I, S>(patterns: I) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            set: builder.build()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn is_match(&self, package: &str) -> bool {
        self.set.is_match(package)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_names() {
        let f = PackageFilter::new(["lodash", "@nodelib/fs.stat"]).unwrap();
        assert!(f.is_match("lodash"));
        assert!(f.is_match("@nodelib/fs.stat"));
        assert!(!f.is_match("lodash.merge"));
        assert!(!f.is_match("@nodelib/fs.walk"));
    }

    #[test]
    fn scope_globs() {
        let f = PackageFilter::new(["@babel/*"]).unwrap();
        assert!(f.is_match("@babel/core"));
        assert!(!f.is_match("babel-loader"));
    }

    #[test]
    fn blank_patterns_are_skipped() {
        let f = PackageFilter::new(["", "  "]).unwrap();
        assert!(f.is_empty());
        assert!(!f.is_match("anything"));
    }

    #[test]
    fn invalid_glob_is_an_error() {
        assert!(PackageFilter::new(["[unclosed"]).is_err());
    }
}
