use async_trait::async_trait;
use eyre::Result;
use std::collections::BTreeSet;
use std::fmt;

/// Capability module managed by the lifecycle: initialized once, started
/// once, stopped once.
#[async_trait]
pub trait Module: Send {
    async fn init(&mut self) -> Result<()>;
    async fn start(&mut self) -> Result<()>;
    async fn stop(&mut self) -> Result<()>;
}

/// A module plus its place in the dependency graph
pub struct ModuleDescriptor {
    pub name: String,
    pub depends_on: BTreeSet<String>,
    /// A critical module's failure aborts the whole system
    pub critical: bool,
    pub module: Box<dyn Module>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>, module: impl Module + 'static) -> Self {
        Self {
            name: name.into(),
            depends_on: BTreeSet::new(),
            critical: false,
            module: Box::new(module),
        }
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.insert(name.into());
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("depends_on", &self.depends_on)
            .field("critical", &self.critical)
            .finish_non_exhaustive()
    }
}
