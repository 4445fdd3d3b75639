//! Server-prepared binding: authoritative types, deterministic slot order.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{StrataError, StrataResult};
use crate::query::{ParsedQuery, ResolvedTypes};
use crate::types::{ParamSet, SqlValue, StrataType, StrataValue, TypeDescriptor, TypeRegistry};

use super::{BoundQueryParams, ParamDescription};

const VARIABLE_PREFIX: char = '$';
const INDEXED_PREFIX: &str = "$p";

/// Binding strategy backed by a server prepare round trip.
///
/// The resolved type map is authoritative: every bound value is
/// converted through the declared descriptor, and positional indexes
/// resolve through a fixed name ordering built once per query.
#[derive(Debug)]
pub struct PreparedParams {
    yql: String,
    params: HashMap<String, ParamDescription>,
    names: Vec<String>,
    values: HashMap<String, StrataValue>,
    batch: Vec<ParamSet>,
}

impl PreparedParams {
    pub fn new(query: &ParsedQuery, types: &ResolvedTypes, registry: &TypeRegistry) -> Self {
        let len = types.len();
        let mut params = HashMap::with_capacity(len);
        let mut names: Vec<Option<String>> = vec![None; len];

        // Indexed names ($p1..$pN) claim their fixed positions first.
        for (idx, slot) in names.iter_mut().enumerate() {
            let indexed = format!("{}{}", INDEXED_PREFIX, idx + 1);
            if let Some(ty) = types.get(&indexed) {
                params.insert(
                    indexed.clone(),
                    ParamDescription::new(&indexed, registry.find(ty)),
                );
                *slot = Some(indexed);
            }
        }

        // Remaining names fill the gaps in lexical order.
        let rest: Vec<_> = types
            .iter()
            .filter(|(name, _)| !params.contains_key(*name))
            .collect();
        let mut rest = rest.into_iter();
        for slot in names.iter_mut() {
            if slot.is_some() {
                continue;
            }
            let (name, ty) = rest
                .next()
                .expect("slot ordering covers every declared name");
            params.insert(name.clone(), ParamDescription::new(name, registry.find(ty)));
            *slot = Some(name.clone());
        }

        Self {
            yql: query.prepared_sql().to_string(),
            params,
            names: names.into_iter().flatten().collect(),
            values: HashMap::with_capacity(len),
            batch: Vec::new(),
        }
    }

    fn declared_name(&self, index: usize) -> StrataResult<&str> {
        if index == 0 || index > self.names.len() {
            return Err(StrataError::ParameterIndex(index));
        }
        Ok(&self.names[index - 1])
    }

    /// Normalize a caller-facing name to the declared one.
    fn normalize(&self, name: &str) -> StrataResult<String> {
        if self.params.contains_key(name) {
            return Ok(name.to_string());
        }
        let prefixed = format!("{}{}", VARIABLE_PREFIX, name);
        if self.params.contains_key(&prefixed) {
            return Ok(prefixed);
        }
        Err(StrataError::ParameterNotFound(name.to_string()))
    }

    fn bind(&mut self, declared: &str, value: &SqlValue) -> StrataResult<()> {
        let description = self
            .params
            .get(declared)
            .ok_or_else(|| StrataError::ParameterNotFound(declared.to_string()))?;
        let bound = description.descriptor().to_value(declared, value)?;
        self.values.insert(declared.to_string(), bound);
        Ok(())
    }
}

impl BoundQueryParams for PreparedParams {
    fn query_text(&self) -> &str {
        &self.yql
    }

    fn set_by_index(
        &mut self,
        index: usize,
        value: &SqlValue,
        _hint: Option<&StrataType>,
    ) -> StrataResult<()> {
        let declared = self.declared_name(index)?.to_string();
        self.bind(&declared, value)
    }

    fn set_by_name(
        &mut self,
        name: &str,
        value: &SqlValue,
        _hint: Option<&StrataType>,
    ) -> StrataResult<()> {
        let declared = self.normalize(name)?;
        self.bind(&declared, value)
    }

    fn clear(&mut self) {
        self.values.clear();
    }

    fn add_batch(&mut self) -> StrataResult<()> {
        let params = self.current_params()?;
        self.batch.push(params);
        self.values.clear();
        Ok(())
    }

    fn clear_batch(&mut self) {
        self.batch.clear();
    }

    fn param_count(&self) -> usize {
        self.names.len()
    }

    fn batch_size(&self) -> usize {
        self.batch.len()
    }

    fn current_params(&self) -> StrataResult<ParamSet> {
        for name in &self.names {
            if !self.values.contains_key(name) {
                return Err(StrataError::MissingValue(name.clone()));
            }
        }
        Ok(self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect())
    }

    fn batch_params(&self) -> Vec<ParamSet> {
        self.batch.clone()
    }

    fn name_by_index(&self, index: usize) -> StrataResult<String> {
        Ok(self
            .declared_name(index)?
            .trim_start_matches(VARIABLE_PREFIX)
            .to_string())
    }

    fn describe_index(&self, index: usize) -> StrataResult<Option<Arc<TypeDescriptor>>> {
        let declared = self.declared_name(index)?;
        Ok(self.params.get(declared).map(|d| d.descriptor().clone()))
    }
}
