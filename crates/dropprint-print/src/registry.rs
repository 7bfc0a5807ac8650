// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Configured printers, looked up by name at dispatch time.

use std::collections::HashMap;

use tracing::info;

use dropprint_core::error::{DropprintError, Result};
use dropprint_core::types::PrinterDescriptor;

/// Ordered set of printers with unique names.
#[derive(Debug, Clone, Default)]
pub struct PrinterRegistry {
    printers: Vec<PrinterDescriptor>,
    by_name: HashMap<String, usize>,
}

impl PrinterRegistry {
    /// Build a registry, rejecting duplicate names.
    pub fn new(printers: Vec<PrinterDescriptor>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(printers.len());
        for (idx, printer) in printers.iter().enumerate() {
            if by_name.insert(printer.name.clone(), idx).is_some() {
                return Err(DropprintError::Config(format!(
                    "duplicate printer name: {}",
                    printer.name
                )));
            }
        }
        info!(count = printers.len(), "printer registry loaded");
        Ok(Self { printers, by_name })
    }

    /// Resolve a printer by name.
    pub fn lookup(&self, name: &str) -> Result<&PrinterDescriptor> {
        self.by_name
            .get(name)
            .map(|&idx| &self.printers[idx])
            .ok_or_else(|| DropprintError::UnknownPrinter(name.to_owned()))
    }

    /// Printers in configuration order.
    pub fn printers(&self) -> &[PrinterDescriptor] {
        &self.printers
    }

    pub fn len(&self) -> usize {
        self.printers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.printers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PrinterRegistry {
        PrinterRegistry::new(vec![
            PrinterDescriptor::new("front-desk", "10.0.0.5", 9100),
            PrinterDescriptor::new("warehouse", "10.0.0.6", 9101),
        ])
        .expect("registry")
    }

    #[test]
    fn lookup_by_name() {
        let reg = registry();
        let printer = reg.lookup("warehouse").expect("found");
        assert_eq!(printer.host, "10.0.0.6");
        assert_eq!(printer.port, 9101);
    }

    #[test]
    fn unknown_name_is_an_error_not_a_panic() {
        let reg = registry();
        match reg.lookup("attic") {
            Err(DropprintError::UnknownPrinter(name)) => assert_eq!(name, "attic"),
            other => panic!("expected UnknownPrinter, got {other:?}"),
        }
    }

    #[test]
    fn keeps_configuration_order() {
        let reg = registry();
        let names: Vec<_> = reg.printers().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["front-desk", "warehouse"]);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = PrinterRegistry::new(vec![
            PrinterDescriptor::new("lobby", "10.0.0.1", 9100),
            PrinterDescriptor::new("lobby", "10.0.0.2", 9100),
        ]);
        assert!(matches!(result, Err(DropprintError::Config(_))));
    }
}
