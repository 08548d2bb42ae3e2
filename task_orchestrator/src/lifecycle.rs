//! Module lifecycle: dependency ordering, init/start with critical vs.
//! degraded failure handling, and reverse-order shutdown.

use crate::error::{InitError, StartError};
use crate::module::ModuleDescriptor;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleStatus {
    Initialized,
    Running,
    /// Failed but non-critical; excluded from dispatch
    Degraded(String),
    Stopped,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleStatus::Initialized => f.write_str("initialized"),
            ModuleStatus::Running => f.write_str("running"),
            ModuleStatus::Degraded(reason) => write!(f, "degraded ({})", reason),
            ModuleStatus::Stopped => f.write_str("stopped"),
        }
    }
}

/// Order `descriptors` so every module comes after all of its dependencies.
/// Independent modules are ordered by name. Returns indices into
/// `descriptors`.
pub fn initialization_order(descriptors: &[ModuleDescriptor]) -> Result<Vec<usize>, InitError> {
    let mut index = BTreeMap::new();
    for (i, descriptor) in descriptors.iter().enumerate() {
        if index.insert(descriptor.name.as_str(), i).is_some() {
            return Err(InitError::DuplicateModule(descriptor.name.clone()));
        }
    }

    // Missing names are reported before any ordering is attempted
    for (name, &i) in &index {
        if let Some(missing) = descriptors[i]
            .depends_on
            .iter()
            .find(|dep| !index.contains_key(dep.as_str()))
        {
            return Err(InitError::MissingDependency {
                module: name.to_string(),
                dependency: missing.clone(),
            });
        }
    }

    let mut remaining_deps: Vec<usize> = descriptors.iter().map(|d| d.depends_on.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); descriptors.len()];
    for (i, descriptor) in descriptors.iter().enumerate() {
        for dep in &descriptor.depends_on {
            dependents[index[dep.as_str()]].push(i);
        }
    }

    let mut ready: BTreeSet<(&str, usize)> = descriptors
        .iter()
        .enumerate()
        .filter(|(i, _)| remaining_deps[*i] == 0)
        .map(|(i, d)| (d.name.as_str(), i))
        .collect();

    let mut order = Vec::with_capacity(descriptors.len());
    while let Some((_, i)) = ready.pop_first() {
        order.push(i);
        for &dependent in &dependents[i] {
            remaining_deps[dependent] -= 1;
            if remaining_deps[dependent] == 0 {
                ready.insert((descriptors[dependent].name.as_str(), dependent));
            }
        }
    }

    if order.len() < descriptors.len() {
        let cycle: Vec<String> = descriptors
            .iter()
            .enumerate()
            .filter(|(i, _)| remaining_deps[*i] > 0)
            .map(|(_, d)| d.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        return Err(InitError::CyclicDependency(cycle));
    }

    Ok(order)
}

struct Entry {
    descriptor: ModuleDescriptor,
    status: ModuleStatus,
    /// Init succeeded and `stop` has not been called yet
    live: bool,
}

/// Initialized set of modules, held in dependency order
pub struct ModuleLifecycle {
    entries: Vec<Entry>,
}

impl ModuleLifecycle {
    /// Order and initialize `descriptors`. A critical init failure stops the
    /// modules initialized so far, in reverse order, and fails. Ordering
    /// errors are reported before any module is touched.
    pub async fn initialize(descriptors: Vec<ModuleDescriptor>) -> Result<Self, InitError> {
        let order = initialization_order(&descriptors)?;

        let mut slots: Vec<Option<ModuleDescriptor>> = descriptors.into_iter().map(Some).collect();
        let ordered: Vec<ModuleDescriptor> = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();

        tracing::info!(
            "Initializing modules: {}",
            ordered
                .iter()
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        let mut lifecycle = Self {
            entries: Vec::with_capacity(ordered.len()),
        };

        for mut descriptor in ordered {
            let name = descriptor.name.clone();
            let result = descriptor.module.init().await;
            match result {
                Ok(()) => {
                    tracing::info!(module = %name, "Module initialized");
                    lifecycle.entries.push(Entry {
                        descriptor,
                        status: ModuleStatus::Initialized,
                        live: true,
                    });
                }
                Err(e) if descriptor.critical => {
                    let reason = format!("{:#}", e);
                    tracing::error!(module = %name, "Critical module failed to initialize: {}", reason);
                    lifecycle.teardown().await;
                    return Err(InitError::ModuleInitFailed { module: name, reason });
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    tracing::warn!(module = %name, "Module degraded during init: {}", reason);
                    lifecycle.entries.push(Entry {
                        descriptor,
                        status: ModuleStatus::Degraded(reason),
                        live: false,
                    });
                }
            }
        }

        Ok(lifecycle)
    }

    /// Start every initialized module in dependency order
    pub async fn start(&mut self) -> Result<(), StartError> {
        for i in 0..self.entries.len() {
            let entry = &mut self.entries[i];
            if entry.status != ModuleStatus::Initialized {
                continue;
            }

            let name = entry.descriptor.name.clone();
            let result = entry.descriptor.module.start().await;
            match result {
                Ok(()) => {
                    tracing::info!(module = %name, "Module started");
                    entry.status = ModuleStatus::Running;
                }
                Err(e) if entry.descriptor.critical => {
                    let reason = format!("{:#}", e);
                    tracing::error!(module = %name, "Critical module failed to start: {}", reason);
                    entry.status = ModuleStatus::Degraded(reason.clone());
                    self.teardown().await;
                    return Err(StartError::CriticalModuleFailed { module: name, reason });
                }
                Err(e) => {
                    let reason = format!("{:#}", e);
                    tracing::warn!(module = %name, "Module degraded during start: {}", reason);
                    entry.status = ModuleStatus::Degraded(reason);
                }
            }
        }
        Ok(())
    }

    /// Stop all modules in reverse dependency order. Each module is stopped
    /// at most once no matter how often this is called.
    pub async fn shutdown(&mut self) {
        tracing::info!("Shutting down modules");
        self.teardown().await;
    }

    async fn teardown(&mut self) {
        for entry in self.entries.iter_mut().rev() {
            if !entry.live {
                continue;
            }
            entry.live = false;

            let name = &entry.descriptor.name;
            match entry.descriptor.module.stop().await {
                Ok(()) => tracing::info!(module = %name, "Module stopped"),
                Err(e) => tracing::warn!(module = %name, "Module failed to stop cleanly: {:#}", e),
            }
            if !matches!(entry.status, ModuleStatus::Degraded(_)) {
                entry.status = ModuleStatus::Stopped;
            }
        }
    }

    /// True when the module exists and is running
    pub fn is_available(&self, name: &str) -> bool {
        matches!(self.status(name), Some(ModuleStatus::Running))
    }

    pub fn status(&self, name: &str) -> Option<&ModuleStatus> {
        self.entries
            .iter()
            .find(|e| e.descriptor.name == name)
            .map(|e| &e.status)
    }

    /// Module names in initialization order
    pub fn order(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.descriptor.name.as_str()).collect()
    }
}
