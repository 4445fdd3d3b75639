//! Parameter binding strategies.
//!
//! Three interchangeable strategies share one capability set: bind by
//! index or name, snapshot into a batch, assemble the final typed
//! parameter set. A strategy instance belongs to exactly one logical
//! caller; it is not safe (and not intended) for concurrent use.

mod batched;
mod immediate;
mod in_list;
mod prepared;

pub use batched::{BatchConfiguration, BatchedParams};
pub use immediate::ImmediateParams;
pub use in_list::InListParam;
pub use prepared::PreparedParams;

use std::sync::Arc;

use crate::error::{StrataError, StrataResult};
use crate::types::{ParamSet, SqlValue, StrataType, StrataValue, TypeDescriptor, TypeRegistry};

/// How the context should pick a binding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareMode {
    /// Batch detection first, then server preparation, then immediate.
    Auto,
    /// Skip every round trip; bind with locally inferred types.
    ForceImmediate,
    /// Require a server prepare round trip.
    ForcePrepared,
    /// Require the list-of-struct batch shape; fail otherwise.
    ForceBatch,
}

/// Declared parameter of a server-prepared query.
#[derive(Debug, Clone)]
pub struct ParamDescription {
    name: String,
    descriptor: Arc<TypeDescriptor>,
}

impl ParamDescription {
    pub fn new(name: impl Into<String>, descriptor: Arc<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            descriptor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }
}

/// Capability set shared by the three binding strategies.
pub trait BoundQueryParams: Send + std::fmt::Debug {
    /// Text to send for a single execution.
    fn query_text(&self) -> &str;

    /// Bind one positional slot. Indexes are 1-based.
    fn set_by_index(
        &mut self,
        index: usize,
        value: &SqlValue,
        hint: Option<&StrataType>,
    ) -> StrataResult<()>;

    /// Bind one named slot.
    fn set_by_name(
        &mut self,
        name: &str,
        value: &SqlValue,
        hint: Option<&StrataType>,
    ) -> StrataResult<()>;

    /// Drop all currently bound values; the batch is untouched.
    fn clear(&mut self);

    /// Snapshot the current fully-bound values into the batch and clear
    /// them for the next logical row.
    fn add_batch(&mut self) -> StrataResult<()>;

    /// Drop the accumulated batch and any partially bound values.
    fn clear_batch(&mut self);

    fn param_count(&self) -> usize;

    fn batch_size(&self) -> usize;

    /// Assemble the typed parameter set for a single execution.
    fn current_params(&self) -> StrataResult<ParamSet>;

    /// The accumulated batch as independent parameter sets. A
    /// row-accumulating strategy instead exposes the whole batch through
    /// [`BoundQueryParams::current_params`]; see
    /// [`BoundQueryParams::flattens_batch`].
    fn batch_params(&self) -> Vec<ParamSet>;

    /// True when the whole batch travels as one request with a single
    /// list-valued parameter.
    fn flattens_batch(&self) -> bool {
        false
    }

    /// Declared name of a positional slot, without the variable prefix.
    fn name_by_index(&self, index: usize) -> StrataResult<String>;

    /// Declared descriptor of a positional slot, when one is fixed.
    fn describe_index(&self, index: usize) -> StrataResult<Option<Arc<TypeDescriptor>>>;
}

/// Convert one caller value into a protocol value, inferring the type
/// when no descriptor is fixed for the slot.
///
/// A null with no inferable type becomes the untyped-null placeholder,
/// deferring the type decision to assembly time.
pub(crate) fn bind_value(
    registry: &TypeRegistry,
    name: &str,
    raw: &SqlValue,
    hint: Option<&StrataType>,
) -> StrataResult<StrataValue> {
    match registry.infer(raw, hint) {
        Some(descriptor) => {
            if raw.is_null() {
                Ok(typed_null(descriptor.strata_type()))
            } else {
                descriptor.to_value(name, raw)
            }
        }
        None if raw.is_null() => Ok(StrataValue::Null),
        None => Err(StrataError::TypeInference {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// The empty optional of a type's nullable form.
pub(crate) fn typed_null(ty: &StrataType) -> StrataValue {
    match ty.optional() {
        StrataType::Optional(item) => StrataValue::empty_optional(*item),
        other => StrataValue::empty_optional(other),
    }
}
