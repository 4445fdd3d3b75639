//! IN-list expansion: one SQL-level list parameter spread over N slots.

use std::sync::Arc;

use crate::error::{StrataError, StrataResult};
use crate::types::{SqlValue, StrataType, StrataValue, TypeDescriptor, TypeRegistry};

/// A single `IN (?, ?, ..., ?)` parameter.
///
/// All slots share one element type, fixed by whichever slot is bound
/// first. Mixed null/non-null input degrades the whole list to a list of
/// optionals at assembly, so the final parameter always has a single
/// concrete type.
#[derive(Debug)]
pub struct InListParam {
    name: String,
    registry: Arc<TypeRegistry>,
    items: Vec<Option<StrataValue>>,
    element: Option<Arc<TypeDescriptor>>,
}

impl InListParam {
    pub fn new(name: impl Into<String>, len: usize, registry: Arc<TypeRegistry>) -> Self {
        Self {
            name: name.into(),
            registry,
            items: vec![None; len],
            element: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Display name of one slot, used in diagnostics.
    pub fn slot_name(&self, index: usize) -> String {
        format!("{}[{}]", self.name, index)
    }

    /// Element descriptor once fixed by the first bound slot.
    pub fn element(&self) -> Option<&Arc<TypeDescriptor>> {
        self.element.as_ref()
    }

    /// Bind one slot of the list.
    pub fn set(
        &mut self,
        index: usize,
        raw: &SqlValue,
        hint: Option<&StrataType>,
    ) -> StrataResult<()> {
        if raw.is_null() {
            // A null never conflicts with the element type; it may still
            // fix it through an explicit hint.
            if self.element.is_none() {
                if let Some(descriptor) = self.registry.infer(raw, hint) {
                    self.element = Some(descriptor);
                }
            }
            self.items[index] = Some(StrataValue::Null);
            return Ok(());
        }

        let descriptor = match &self.element {
            Some(descriptor) => descriptor.clone(),
            None => {
                let descriptor = self.registry.infer(raw, hint).ok_or_else(|| {
                    StrataError::TypeInference {
                        name: self.slot_name(index),
                        value: raw.to_string(),
                    }
                })?;
                self.element = Some(descriptor.clone());
                descriptor
            }
        };
        self.items[index] = Some(descriptor.to_value(&self.slot_name(index), raw)?);
        Ok(())
    }

    /// Clear one slot. Resetting the last slot also releases the fixed
    /// element type, so the next batch row may choose a different one.
    pub fn reset(&mut self, index: usize) {
        self.items[index] = None;
        if index == self.items.len() - 1 {
            self.element = None;
        }
    }

    /// Clear every slot and the fixed element type.
    pub fn reset_all(&mut self) {
        for index in 0..self.items.len() {
            self.reset(index);
        }
    }

    /// Assemble the final list value.
    pub fn build(&self) -> StrataResult<StrataValue> {
        let element = self.element.as_ref().ok_or_else(|| StrataError::TypeInference {
            name: self.name.clone(),
            value: SqlValue::Null.to_string(),
        })?;
        let element_type = element.strata_type().clone();

        let mut has_null = false;
        for (index, item) in self.items.iter().enumerate() {
            match item {
                None => return Err(StrataError::MissingValue(self.slot_name(index))),
                Some(value) => has_null = has_null || value.is_null(),
            }
        }

        if !has_null {
            let items = self.items.iter().flatten().cloned().collect();
            return Ok(StrataValue::List {
                item: element_type,
                items,
            });
        }

        // Mixed null/non-null input: rebuild as a list of optionals.
        let optional_item = element_type.optional();
        let items = self
            .items
            .iter()
            .flatten()
            .map(|value| {
                if value.is_null() {
                    StrataValue::empty_optional(element_type.clone())
                } else {
                    value.clone().wrap_optional()
                }
            })
            .collect();
        Ok(StrataValue::List {
            item: optional_item,
            items,
        })
    }
}
