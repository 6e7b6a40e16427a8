use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::container::owner::{BindingOrigin, ServiceOwner};
use crate::container::store::ServiceContainer;
use crate::errors::RegistryError;

/// Point-in-time view of one binding
#[derive(Debug, Clone, Serialize)]
pub struct BindingSnapshot {
    pub key: String,
    pub service: String,
    pub implementation: String,
    pub origin: BindingOrigin,
    pub resolved: bool,
}

/// Point-in-time view of an owner's override bookkeeping
#[derive(Debug, Clone, Serialize)]
pub struct OwnerSnapshot {
    pub taken_at: DateTime<Utc>,
    pub environment: String,
    pub bindings: Vec<BindingSnapshot>,
    pub used: Vec<String>,
}

impl OwnerSnapshot {
    pub fn capture<C: ServiceContainer>(owner: &ServiceOwner<C>) -> Result<Self, RegistryError> {
        let bindings = owner
            .bindings()?
            .into_iter()
            .map(|(key, binding)| BindingSnapshot {
                key: key.to_string(),
                service: binding.service.display_name(),
                implementation: binding.implementation.display_name(),
                origin: binding.origin,
                resolved: binding.resolved,
            })
            .collect();

        let mut used: Vec<String> = owner
            .used_classes()?
            .into_iter()
            .map(|class| class.display_name())
            .collect();
        used.sort();

        Ok(Self {
            taken_at: Utc::now(),
            environment: owner.config().environment.to_string(),
            bindings,
            used,
        })
    }

    /// Bindings whose implementation differs from the service
    pub fn overridden(&self) -> impl Iterator<Item = &BindingSnapshot> {
        self.bindings
            .iter()
            .filter(|binding| binding.service != binding.implementation)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Plain-text report
    pub fn render(&self) -> String {
        let mut report = String::new();

        let _ = writeln!(report, "Service Owner Report");
        let _ = writeln!(report, "====================");
        let _ = writeln!(report, "Taken at: {}", self.taken_at.to_rfc3339());
        let _ = writeln!(report, "Environment: {}", self.environment);
        let _ = writeln!(report);

        let _ = writeln!(report, "Bindings ({}):", self.bindings.len());
        for binding in &self.bindings {
            let origin = match binding.origin {
                BindingOrigin::Default => "default".to_string(),
                BindingOrigin::Override(mode) => format!("override/{:?}", mode),
                BindingOrigin::Mock => "mock".to_string(),
            };
            let _ = writeln!(
                report,
                "  {} -> {} [{}{}]",
                binding.service,
                binding.implementation,
                origin,
                if binding.resolved { ", resolved" } else { "" }
            );
        }
        let _ = writeln!(report);

        let _ = writeln!(report, "Used classes ({}):", self.used.len());
        for class in &self.used {
            let _ = writeln!(report, "  {}", class);
        }

        report
    }
}

impl<C: ServiceContainer> ServiceOwner<C> {
    /// Capture the owner's bindings and used set
    pub fn snapshot(&self) -> Result<OwnerSnapshot, RegistryError> {
        OwnerSnapshot::capture(self)
    }
}
