use crate::types::ServiceId;

/// Static metadata for one relocation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub id: ServiceId,
    pub label: &'static str,
    pub description: &'static str,
    /// Hex color used when rendering the service's tasks.
    pub accent_color: &'static str,
}

/// The service catalog, in display order.
pub static SERVICES: [ServiceDefinition; 5] = [
    ServiceDefinition {
        id: ServiceId::Housing,
        label: "Housing",
        description: "Find and secure your new home or temporary stay.",
        accent_color: "#0ea5e9",
    },
    ServiceDefinition {
        id: ServiceId::Immigration,
        label: "Immigration",
        description: "Handle visas, work permits, and compliance documents.",
        accent_color: "#8b5cf6",
    },
    ServiceDefinition {
        id: ServiceId::Moving,
        label: "Moving Logistics",
        description: "Coordinate movers, inventory, and travel plans.",
        accent_color: "#f97316",
    },
    ServiceDefinition {
        id: ServiceId::Finances,
        label: "Finances",
        description: "Set up banking, payroll, and relocation budgets.",
        accent_color: "#10b981",
    },
    ServiceDefinition {
        id: ServiceId::Settling,
        label: "Settling In",
        description: "Help the family acclimate and handle final details.",
        accent_color: "#f59e0b",
    },
];

impl ServiceId {
    pub fn definition(&self) -> &'static ServiceDefinition {
        // Catalog order mirrors `ServiceId::ALL`.
        let index = ServiceId::ALL
            .iter()
            .position(|id| id == self)
            .unwrap_or_default();
        &SERVICES[index]
    }

    pub fn label(&self) -> &'static str {
        self.definition().label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_matches_service_ids() {
        for (def, id) in SERVICES.iter().zip(ServiceId::ALL) {
            assert_eq!(def.id, id);
            assert_eq!(id.definition().id, id);
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(ServiceId::Moving.label(), "Moving Logistics");
        assert_eq!(ServiceId::Settling.label(), "Settling In");
        assert!(SERVICES.iter().all(|s| s.accent_color.starts_with('#')));
    }
}
