//! Built-in capability implementations for deskhand.
//!
//! Business modules register their own capabilities (payments, report
//! export, navigation, knowledge writes) at startup; the implementations
//! here are the engine's own general-purpose ones, plus stubs that let the
//! loop be exercised end-to-end without external services.

pub mod expression;
pub mod knowledge_base;
pub mod weather;

use std::sync::Arc;

use deskhand_core::capability::CapabilityRegistry;

pub use expression::ExpressionCapability;
pub use knowledge_base::KnowledgeBaseCapability;
pub use weather::WeatherCapability;

/// Create a registry with all built-in capabilities.
pub fn default_registry() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(WeatherCapability));
    registry.register(Arc::new(ExpressionCapability::default()));
    registry.register(Arc::new(KnowledgeBaseCapability));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_builtins() {
        let registry = default_registry();
        assert!(registry.get("get_current_weather").is_some());
        assert!(registry.get("evaluate_expression").is_some());
        assert!(registry.get("knowledge_base_query").is_some());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn manifest_is_deterministic() {
        let a = default_registry().descriptors();
        let b = default_registry().descriptors();
        let names_a: Vec<_> = a.iter().map(|d| d.name.clone()).collect();
        let names_b: Vec<_> = b.iter().map(|d| d.name.clone()).collect();
        assert_eq!(names_a, names_b);
    }
}
