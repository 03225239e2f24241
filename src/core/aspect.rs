use std::fmt;

/// A named logging category. Aspects are owned by the host application and
/// shared with the snapshot machinery via `Arc`; the registry keys instances
/// by aspect name and never invents aspects of its own.
///
/// The name doubles as the `log` target for success messages, so hosts can
/// filter snapshot chatter per category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Aspect {
    name: String,
}

impl Aspect {
    pub fn new<S: Into<String>>(name: S) -> Aspect {
        Aspect { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
