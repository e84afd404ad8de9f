// Copyright 2024 Kore Ledger
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Model registry.
//!

use std::{collections::HashMap, sync::Arc};

use crate::{error::EazyError, utils::is_identifier};

use super::ModelDef;

/// The models of one application.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    app: String,
    models: HashMap<String, Arc<ModelDef>>,
    order: Vec<String>,
}

impl ModelRegistry {
    /// Build a registry for `app`, validating every model.
    ///
    /// # Errors
    ///
    /// * `EazyError::Validation` - A model is invalid or declared twice.
    ///
    pub fn new(app: &str, models: Vec<ModelDef>) -> Result<Self, EazyError> {
        let mut registry = Self {
            app: app.to_owned(),
            ..Default::default()
        };
        for model in models {
            registry.register(model)?;
        }
        Ok(registry)
    }

    /// Add a model.
    pub fn register(&mut self, model: ModelDef) -> Result<(), EazyError> {
        model.validate()?;
        if self.models.contains_key(&model.name) {
            return Err(EazyError::validation(format!(
                "Model {} is already registered in app {}",
                model.name, self.app
            )));
        }
        let table = model.table_name();
        if self.iter().any(|other| other.table_name() == table) {
            return Err(EazyError::validation(format!(
                "Table {table} is already used in app {}",
                self.app
            )));
        }
        self.order.push(model.name.clone());
        self.models.insert(model.name.clone(), Arc::new(model));
        Ok(())
    }

    /// Get a model by name.
    ///
    /// # Errors
    ///
    /// * `EazyError::InvalidQuery` - The name is not an identifier, or no such model exists.
    ///
    pub fn get(&self, name: &str) -> Result<Arc<ModelDef>, EazyError> {
        if !is_identifier(name) {
            return Err(EazyError::invalid_query(format!("Invalid model name: {name}")));
        }
        self.models.get(name).cloned().ok_or_else(|| {
            EazyError::invalid_query(format!(
                "Error getting model {name}: no such model in app {}",
                self.app
            ))
        })
    }

    /// Application name.
    pub fn app(&self) -> &str {
        &self.app
    }

    /// Models in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelDef> {
        self.order
            .iter()
            .filter_map(|name| self.models.get(name))
            .map(|model| model.as_ref())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
