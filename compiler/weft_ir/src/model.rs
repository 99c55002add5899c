//! Object model capability.
//!
//! The core never looks at type metadata itself. Typed sequences are
//! validated and built exclusively through [`ObjectModel`]:
//!
//! - at compile time: [`slots`](ObjectModel::slots),
//!   [`is_concrete`](ObjectModel::is_concrete),
//!   [`implements`](ObjectModel::implements)
//! - at parse time: [`construct`](ObjectModel::construct),
//!   [`write_slot`](ObjectModel::write_slot)
//!
//! [`RecordModel`] is the provided implementation: plain record types with
//! ordered slots, abstract base types, and a declared implements relation.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::{Name, Node, SlotError, Value};

/// Construction and slot-write capability for typed output objects.
///
/// Implementations must be immutable after setup; one model is shared by
/// every concurrent parse.
pub trait ObjectModel: Send + Sync {
    /// Ordered slot names of a type, or `None` if the type is unknown.
    fn slots(&self, ty: &str) -> Option<&[Name]>;

    /// Whether the type can be constructed (known and not abstract).
    fn is_concrete(&self, ty: &str) -> bool;

    /// Whether `ty` is `base` or declares it as a base.
    fn implements(&self, ty: &str, base: &str) -> bool;

    /// Create an empty instance, or `None` if the type is not constructible.
    fn construct(&self, ty: &str) -> Option<Value>;

    /// Write one slot of an instance produced by [`construct`](Self::construct).
    fn write_slot(&self, instance: &mut Value, slot: &str, value: Value) -> Result<(), SlotError>;
}

#[derive(Clone, Debug)]
struct TypeDecl {
    slots: Vec<Name>,
    concrete: bool,
    bases: Vec<Name>,
}

/// Record-based [`ObjectModel`] producing [`Value::Node`] objects.
///
/// ```text
/// let model = RecordModel::new()
///     .abstract_type("Json")
///     .record("Member", ["key", "value"])
///     .record("Object", ["members"])
///     .with_base("Object", "Json");
/// ```
#[derive(Clone, Debug, Default)]
pub struct RecordModel {
    types: FxHashMap<Name, TypeDecl>,
}

impl RecordModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a constructible record type with ordered slots.
    #[must_use]
    pub fn record<I, S>(mut self, ty: &str, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Name>,
    {
        let slots = slots.into_iter().map(Into::into).collect();
        let bases = self.take_bases(ty);
        self.types.insert(
            Name::from(ty),
            TypeDecl {
                slots,
                concrete: true,
                bases,
            },
        );
        self
    }

    /// Declare an abstract type with no slots. It can be an alternative's
    /// base but never the type of a sequence.
    #[must_use]
    pub fn abstract_type(mut self, ty: &str) -> Self {
        let bases = self.take_bases(ty);
        self.types.insert(
            Name::from(ty),
            TypeDecl {
                slots: Vec::new(),
                concrete: false,
                bases,
            },
        );
        self
    }

    /// Declare that `ty` implements `base`. Either may be declared later.
    #[must_use]
    pub fn with_base(mut self, ty: &str, base: &str) -> Self {
        let decl = self.types.entry(Name::from(ty)).or_insert_with(|| TypeDecl {
            slots: Vec::new(),
            concrete: false,
            bases: Vec::new(),
        });
        decl.bases.push(Name::from(base));
        self
    }

    /// Keep bases declared before the type itself.
    fn take_bases(&mut self, ty: &str) -> Vec<Name> {
        self.types
            .remove(ty)
            .map(|decl| decl.bases)
            .unwrap_or_default()
    }
}

impl ObjectModel for RecordModel {
    fn slots(&self, ty: &str) -> Option<&[Name]> {
        self.types.get(ty).map(|decl| decl.slots.as_slice())
    }

    fn is_concrete(&self, ty: &str) -> bool {
        self.types.get(ty).is_some_and(|decl| decl.concrete)
    }

    fn implements(&self, ty: &str, base: &str) -> bool {
        // Walk declared bases transitively; the visited list keeps
        // accidental base cycles finite.
        let mut pending: Vec<&str> = vec![ty];
        let mut visited: Vec<&str> = Vec::new();
        while let Some(current) = pending.pop() {
            if current == base {
                return true;
            }
            if visited.contains(&current) {
                continue;
            }
            visited.push(current);
            if let Some(decl) = self.types.get(current) {
                pending.extend(decl.bases.iter().map(|b| &**b));
            }
        }
        false
    }

    fn construct(&self, ty: &str) -> Option<Value> {
        let (name, decl) = self.types.get_key_value(ty)?;
        decl.concrete
            .then(|| Value::Node(Arc::new(Node::new(Name::clone(name)))))
    }

    fn write_slot(&self, instance: &mut Value, slot: &str, value: Value) -> Result<(), SlotError> {
        let reject = |ty: &str| SlotError {
            ty: ty.to_string(),
            slot: slot.to_string(),
        };
        let Value::Node(node) = instance else {
            return Err(reject(instance.type_name()));
        };
        let decl = self.types.get(node.ty()).ok_or_else(|| reject(node.ty()))?;
        let Some(name) = decl.slots.iter().find(|s| &***s == slot) else {
            return Err(reject(node.ty()));
        };
        Arc::make_mut(node).set(Name::clone(name), value);
        Ok(())
    }
}
