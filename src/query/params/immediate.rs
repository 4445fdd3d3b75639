//! Client-side binding with no server round trip.

use std::sync::Arc;

use crate::error::{StrataError, StrataResult};
use crate::query::{ParsedQuery, PlaceholderSpec};
use crate::types::{ParamSet, SqlValue, StrataType, StrataValue, TypeDescriptor, TypeRegistry};

use super::in_list::InListParam;
use super::{bind_value, BoundQueryParams};

#[derive(Debug, Clone, Copy)]
enum SlotRef {
    Simple(usize),
    ListItem { list: usize, item: usize },
}

#[derive(Debug)]
struct SimpleSlot {
    name: String,
    value: Option<StrataValue>,
}

/// Binding strategy with locally inferred types only.
///
/// Every execution re-sends the full parameter set; nothing is
/// memoized across calls and the server is never asked for types.
#[derive(Debug)]
pub struct ImmediateParams {
    yql: String,
    slots: Vec<SlotRef>,
    simples: Vec<SimpleSlot>,
    lists: Vec<InListParam>,
    batch: Vec<ParamSet>,
    registry: Arc<TypeRegistry>,
}

impl ImmediateParams {
    pub fn new(query: &ParsedQuery, registry: Arc<TypeRegistry>) -> Self {
        let mut slots = Vec::with_capacity(query.slot_count());
        let mut simples = Vec::new();
        let mut lists = Vec::new();

        for spec in query.placeholders() {
            match spec {
                PlaceholderSpec::Simple { name } => {
                    slots.push(SlotRef::Simple(simples.len()));
                    simples.push(SimpleSlot {
                        name: name.clone(),
                        value: None,
                    });
                }
                PlaceholderSpec::InList { name, len } => {
                    let list = lists.len();
                    lists.push(InListParam::new(name.clone(), *len, registry.clone()));
                    for item in 0..*len {
                        slots.push(SlotRef::ListItem { list, item });
                    }
                }
            }
        }

        Self {
            yql: query.prepared_sql().to_string(),
            slots,
            simples,
            lists,
            batch: Vec::new(),
            registry,
        }
    }

    fn slot(&self, index: usize) -> StrataResult<SlotRef> {
        if index == 0 || index > self.slots.len() {
            return Err(StrataError::ParameterIndex(index));
        }
        Ok(self.slots[index - 1])
    }
}

impl BoundQueryParams for ImmediateParams {
    fn query_text(&self) -> &str {
        &self.yql
    }

    fn set_by_index(
        &mut self,
        index: usize,
        value: &SqlValue,
        hint: Option<&StrataType>,
    ) -> StrataResult<()> {
        match self.slot(index)? {
            SlotRef::Simple(i) => {
                let bound = bind_value(&self.registry, &self.simples[i].name, value, hint)?;
                self.simples[i].value = Some(bound);
                Ok(())
            }
            SlotRef::ListItem { list, item } => self.lists[list].set(item, value, hint),
        }
    }

    fn set_by_name(
        &mut self,
        name: &str,
        value: &SqlValue,
        hint: Option<&StrataType>,
    ) -> StrataResult<()> {
        if let Some(i) = self.simples.iter().position(|s| s.name == name) {
            let bound = bind_value(&self.registry, name, value, hint)?;
            self.simples[i].value = Some(bound);
            return Ok(());
        }
        for list in &mut self.lists {
            for item in 0..list.len() {
                if list.slot_name(item) == name {
                    return list.set(item, value, hint);
                }
            }
        }
        Err(StrataError::ParameterNotFound(name.to_string()))
    }

    fn clear(&mut self) {
        for slot in &mut self.simples {
            slot.value = None;
        }
        for list in &mut self.lists {
            list.reset_all();
        }
    }

    fn add_batch(&mut self) -> StrataResult<()> {
        let params = self.current_params()?;
        self.batch.push(params);
        self.clear();
        Ok(())
    }

    fn clear_batch(&mut self) {
        self.batch.clear();
        self.clear();
    }

    fn param_count(&self) -> usize {
        self.slots.len()
    }

    fn batch_size(&self) -> usize {
        self.batch.len()
    }

    fn current_params(&self) -> StrataResult<ParamSet> {
        let mut params = ParamSet::new();
        for slot in &self.simples {
            match &slot.value {
                Some(value) => params.put(&slot.name, value.clone()),
                None => return Err(StrataError::MissingValue(slot.name.clone())),
            }
        }
        for list in &self.lists {
            params.put(list.name(), list.build()?);
        }
        Ok(params)
    }

    fn batch_params(&self) -> Vec<ParamSet> {
        self.batch.clone()
    }

    fn name_by_index(&self, index: usize) -> StrataResult<String> {
        let name = match self.slot(index)? {
            SlotRef::Simple(i) => self.simples[i].name.clone(),
            SlotRef::ListItem { list, item } => self.lists[list].slot_name(item),
        };
        Ok(name.trim_start_matches('$').to_string())
    }

    fn describe_index(&self, index: usize) -> StrataResult<Option<Arc<TypeDescriptor>>> {
        match self.slot(index)? {
            // No declared type; the value itself carries the inference.
            SlotRef::Simple(_) => Ok(None),
            SlotRef::ListItem { list, .. } => Ok(self.lists[list].element().cloned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryKind;
    use pretty_assertions::assert_eq;

    fn query() -> ParsedQuery {
        ParsedQuery::new(
            "SELECT * FROM t WHERE id = ? AND tag IN (?, ?)",
            "SELECT * FROM t WHERE id = $jp1 AND tag IN $jp2",
            QueryKind::Data,
        )
        .with_placeholders(vec![
            PlaceholderSpec::Simple {
                name: "$jp1".into(),
            },
            PlaceholderSpec::InList {
                name: "$jp2".into(),
                len: 2,
            },
        ])
    }

    fn params() -> ImmediateParams {
        ImmediateParams::new(&query(), Arc::new(TypeRegistry::new()))
    }

    #[test]
    fn test_index_binding_spans_list_slots() {
        let mut p = params();
        p.set_by_index(1, &SqlValue::Int64(7), None).unwrap();
        p.set_by_index(2, &SqlValue::Text("a".into()), None).unwrap();
        p.set_by_index(3, &SqlValue::Text("b".into()), None).unwrap();

        let set = p.current_params().unwrap();
        assert_eq!(set.get("$jp1"), Some(&StrataValue::Int64(7)));
        assert_eq!(
            set.get("$jp2"),
            Some(&StrataValue::List {
                item: StrataType::Text,
                items: vec![
                    StrataValue::Text("a".into()),
                    StrataValue::Text("b".into())
                ],
            })
        );
    }

    #[test]
    fn test_missing_slot_blocks_assembly() {
        let mut p = params();
        p.set_by_index(1, &SqlValue::Int64(7), None).unwrap();
        p.set_by_index(2, &SqlValue::Text("a".into()), None).unwrap();
        let err = p.current_params().unwrap_err();
        assert_eq!(err.to_string(), "missing-value-for-parameter: $jp2[1]");
    }

    #[test]
    fn test_index_out_of_range() {
        let mut p = params();
        let err = p.set_by_index(4, &SqlValue::Int32(0), None).unwrap_err();
        assert!(err.to_string().starts_with("parameter-number-not-found"));
    }

    #[test]
    fn test_batch_snapshots_and_clears() {
        let mut p = params();
        for i in 1..=3 {
            p.set_by_index(i, &SqlValue::Int32(i as i32), None).unwrap();
        }
        p.add_batch().unwrap();
        assert_eq!(p.batch_size(), 1);
        assert!(p.current_params().is_err());
    }

    #[test]
    fn test_set_by_name() {
        let mut p = params();
        p.set_by_name("$jp1", &SqlValue::Int32(1), None).unwrap();
        p.set_by_name("$jp2[0]", &SqlValue::Int32(2), None).unwrap();
        p.set_by_name("$jp2[1]", &SqlValue::Int32(3), None).unwrap();
        assert!(p.current_params().is_ok());

        let err = p
            .set_by_name("$nope", &SqlValue::Int32(1), None)
            .unwrap_err();
        assert!(err.to_string().starts_with("parameter-not-found"));
    }
}
