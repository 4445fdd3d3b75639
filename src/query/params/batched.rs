//! Row-accumulating binding for the single list-of-struct shape.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{StrataError, StrataResult};
use crate::query::{BatchHint, ResolvedTypes};
use crate::types::{
    Column, ParamSet, SqlValue, StrataType, StrataValue, StructShape, TypeDescriptor,
    TypeRegistry,
};

use super::BoundQueryParams;

/// Derived once from a resolved type map whose only parameter is a
/// list of structs. Immutable; reused for every accumulated row.
#[derive(Debug, Clone)]
pub struct BatchConfiguration {
    param_name: String,
    shape: Arc<StructShape>,
    descriptors: Vec<Arc<TypeDescriptor>>,
    indexes: HashMap<String, usize>,
}

impl BatchConfiguration {
    /// Detect the batch shape in a resolved type map: exactly one
    /// parameter, of type `List<Struct<...>>`. Anything else declines.
    pub fn detect(types: &ResolvedTypes, registry: &TypeRegistry) -> Option<Self> {
        if types.len() != 1 {
            return None;
        }
        let (name, ty) = types.iter().next()?;
        let item = ty.list_item()?;
        let shape = item.struct_shape()?;
        Self::from_shape(name, shape.clone(), registry)
    }

    /// Build the shape from a syntactic batch hint plus described table
    /// columns. Declines when a hinted column is missing or duplicated.
    pub fn from_described_columns(
        hint: &BatchHint,
        columns: &[Column],
        registry: &TypeRegistry,
    ) -> Option<Self> {
        let by_name: HashMap<&str, &StrataType> =
            columns.iter().map(|c| (c.name.as_str(), &c.ty)).collect();

        let mut members = Vec::with_capacity(hint.columns.len());
        for column in &hint.columns {
            let ty = by_name.get(column.as_str())?;
            members.push((column.clone(), (*ty).clone()));
        }
        Self::from_shape(&hint.param_name, Arc::new(StructShape::new(members)), registry)
    }

    fn from_shape(
        param_name: &str,
        shape: Arc<StructShape>,
        registry: &TypeRegistry,
    ) -> Option<Self> {
        let mut indexes = HashMap::with_capacity(shape.len());
        let mut descriptors = Vec::with_capacity(shape.len());
        for (index, (name, ty)) in shape.members().enumerate() {
            if indexes.insert(name.to_string(), index).is_some() {
                return None;
            }
            descriptors.push(registry.find(ty));
        }
        Some(Self {
            param_name: param_name.to_string(),
            shape,
            descriptors,
            indexes,
        })
    }

    pub fn param_name(&self) -> &str {
        &self.param_name
    }

    pub fn member_count(&self) -> usize {
        self.shape.len()
    }

    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.indexes.get(name).copied()
    }

    /// The resolved type map this configuration stands for, suitable
    /// for the parameter-type cache.
    pub fn resolved_types(&self) -> ResolvedTypes {
        let mut types = ResolvedTypes::new();
        types.insert(
            self.param_name.clone(),
            StrataType::list_of(StrataType::Struct(self.shape.clone())),
        );
        types
    }

    fn index_of(&self, name: &str) -> StrataResult<usize> {
        self.member_index(name)
            .ok_or_else(|| StrataError::ParameterNotFound(name.to_string()))
    }
}

/// Binding strategy that accumulates logical rows into one physical
/// list-valued parameter.
#[derive(Debug)]
pub struct BatchedParams {
    yql: String,
    cfg: BatchConfiguration,
    members: Vec<Option<StrataValue>>,
    modified: bool,
    rows: Vec<StrataValue>,
}

impl BatchedParams {
    pub fn new(query_text: impl Into<String>, cfg: BatchConfiguration) -> Self {
        let members = vec![None; cfg.member_count()];
        Self {
            yql: query_text.into(),
            cfg,
            members,
            modified: false,
            rows: Vec::new(),
        }
    }

    pub fn configuration(&self) -> &BatchConfiguration {
        &self.cfg
    }

    fn bind_member(&mut self, index: usize, value: &SqlValue) -> StrataResult<()> {
        let name = self.cfg.shape.member_name(index).to_string();
        let bound = self.cfg.descriptors[index].to_value(&name, value)?;
        self.members[index] = Some(bound);
        self.modified = true;
        Ok(())
    }

    /// Verify the current row is complete, append it, reset members.
    fn flush(&mut self) -> StrataResult<()> {
        if !self.modified {
            return Ok(());
        }
        // Verify completeness before consuming anything, so a failed
        // flush leaves the row intact for the caller to fix and retry.
        for (index, member) in self.members.iter().enumerate() {
            if member.is_none() {
                return Err(StrataError::MissingValue(
                    self.cfg.shape.member_name(index).to_string(),
                ));
            }
        }
        let row: Vec<StrataValue> = self.members.iter_mut().filter_map(Option::take).collect();
        self.rows.push(StrataValue::Struct {
            shape: self.cfg.shape.clone(),
            members: row,
        });
        self.modified = false;
        Ok(())
    }
}

impl BoundQueryParams for BatchedParams {
    fn query_text(&self) -> &str {
        &self.yql
    }

    fn set_by_index(
        &mut self,
        index: usize,
        value: &SqlValue,
        _hint: Option<&StrataType>,
    ) -> StrataResult<()> {
        if index == 0 || index > self.members.len() {
            return Err(StrataError::ParameterIndex(index));
        }
        self.bind_member(index - 1, value)
    }

    fn set_by_name(
        &mut self,
        name: &str,
        value: &SqlValue,
        _hint: Option<&StrataType>,
    ) -> StrataResult<()> {
        let index = self.cfg.index_of(name)?;
        self.bind_member(index, value)
    }

    fn clear(&mut self) {
        for member in &mut self.members {
            *member = None;
        }
        self.modified = false;
    }

    fn add_batch(&mut self) -> StrataResult<()> {
        self.flush()
    }

    fn clear_batch(&mut self) {
        self.rows.clear();
        self.clear();
    }

    fn param_count(&self) -> usize {
        self.members.len()
    }

    fn batch_size(&self) -> usize {
        self.rows.len()
    }

    fn current_params(&self) -> StrataResult<ParamSet> {
        let mut params = ParamSet::new();
        params.put(
            self.cfg.param_name.clone(),
            StrataValue::List {
                item: StrataType::Struct(self.cfg.shape.clone()),
                items: self.rows.clone(),
            },
        );
        Ok(params)
    }

    fn batch_params(&self) -> Vec<ParamSet> {
        // The whole batch travels as one list parameter; see
        // `flattens_batch`.
        Vec::new()
    }

    fn flattens_batch(&self) -> bool {
        true
    }

    fn name_by_index(&self, index: usize) -> StrataResult<String> {
        if index == 0 || index > self.members.len() {
            return Err(StrataError::ParameterIndex(index));
        }
        Ok(self.cfg.shape.member_name(index - 1).to_string())
    }

    fn describe_index(&self, index: usize) -> StrataResult<Option<Arc<TypeDescriptor>>> {
        if index == 0 || index > self.members.len() {
            return Err(StrataError::ParameterIndex(index));
        }
        Ok(Some(self.cfg.descriptors[index - 1].clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn items_types() -> ResolvedTypes {
        let mut types = ResolvedTypes::new();
        types.insert(
            "$items".to_string(),
            StrataType::list_of(StrataType::struct_of(vec![
                ("a".to_string(), StrataType::Int32),
                ("b".to_string(), StrataType::Text),
            ])),
        );
        types
    }

    #[test]
    fn test_detect_single_list_of_struct() {
        let registry = TypeRegistry::new();
        let cfg = BatchConfiguration::detect(&items_types(), &registry).unwrap();
        assert_eq!(cfg.param_name(), "$items");
        assert_eq!(cfg.member_count(), 2);
        assert_eq!(cfg.member_index("a"), Some(0));
        assert_eq!(cfg.member_index("b"), Some(1));
    }

    #[test]
    fn test_detect_declines_other_shapes() {
        let registry = TypeRegistry::new();

        let mut two = items_types();
        two.insert("$extra".to_string(), StrataType::Int32);
        assert!(BatchConfiguration::detect(&two, &registry).is_none());

        let mut scalar_list = ResolvedTypes::new();
        scalar_list.insert("$ids".to_string(), StrataType::list_of(StrataType::Int64));
        assert!(BatchConfiguration::detect(&scalar_list, &registry).is_none());

        let mut plain = ResolvedTypes::new();
        plain.insert("$id".to_string(), StrataType::Int64);
        assert!(BatchConfiguration::detect(&plain, &registry).is_none());
    }

    #[test]
    fn test_described_columns_follow_hint_order() {
        let registry = TypeRegistry::new();
        let hint = BatchHint {
            param_name: "$rows".to_string(),
            table: "series".to_string(),
            columns: vec!["id".to_string(), "title".to_string()],
        };
        let columns = vec![
            Column::new("title", StrataType::Text),
            Column::new("id", StrataType::Int64),
            Column::new("released", StrataType::Timestamp),
        ];
        let cfg = BatchConfiguration::from_described_columns(&hint, &columns, &registry).unwrap();
        assert_eq!(cfg.member_index("id"), Some(0));
        assert_eq!(cfg.member_index("title"), Some(1));
        assert_eq!(cfg.member_count(), 2);

        let missing = BatchHint {
            columns: vec!["id".to_string(), "nope".to_string()],
            ..hint
        };
        assert!(BatchConfiguration::from_described_columns(&missing, &columns, &registry).is_none());
    }

    #[test]
    fn test_incomplete_row_fails_flush() {
        let registry = TypeRegistry::new();
        let cfg = BatchConfiguration::detect(&items_types(), &registry).unwrap();
        let mut params = BatchedParams::new("UPSERT", cfg);

        params.set_by_name("a", &SqlValue::Int32(1), None).unwrap();
        let err = params.add_batch().unwrap_err();
        assert_eq!(err.to_string(), "missing-value-for-parameter: b");
    }

    #[test]
    fn test_rows_accumulate_into_one_list() {
        let registry = TypeRegistry::new();
        let cfg = BatchConfiguration::detect(&items_types(), &registry).unwrap();
        let mut params = BatchedParams::new("UPSERT", cfg);

        for (a, b) in [(1, "x"), (2, "y")] {
            params.set_by_name("a", &SqlValue::Int32(a), None).unwrap();
            params.set_by_name("b", &SqlValue::Text(b.into()), None).unwrap();
            params.add_batch().unwrap();
        }
        assert_eq!(params.batch_size(), 2);

        let set = params.current_params().unwrap();
        match set.get("$items").unwrap() {
            StrataValue::List { items, .. } => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_flush_without_rows_is_noop() {
        let registry = TypeRegistry::new();
        let cfg = BatchConfiguration::detect(&items_types(), &registry).unwrap();
        let mut params = BatchedParams::new("UPSERT", cfg);
        params.add_batch().unwrap();
        assert_eq!(params.batch_size(), 0);
    }
}
