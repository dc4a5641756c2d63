use crate::{
    gc::{HeapId, Tracer},
    Object,
};
use rustc_hash::FxHashMap;
use std::{borrow::Cow, fmt};

/// The signature of a visit callback: reports every managed object referenced by `obj` to the
/// tracer.
pub type VisitFn = dyn Fn(Object<'_>, &mut Tracer<'_>);

/// The signature of a finalize callback: releases resources owned by `obj` right before its
/// memory is reclaimed.
pub type FinalizeFn = dyn Fn(Object<'_>);

/// Identifies a [`Type`] registered in a [`TypeTable`]. A `TypeId` is only valid for the table
/// that returned it.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TypeId {
    table: HeapId,
    index: u32,
}

impl TypeId {
    pub(crate) fn new(table: HeapId, index: u32) -> Self {
        Self { table, index }
    }

    /// Returns the index of the type in its table.
    pub fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.index)
    }
}

/// Describes a kind of managed object: its name and the callbacks the collector invokes for it.
///
/// A `Type` is immutable once registered.
pub struct Type {
    name: Box<[u8]>,
    visit: Option<Box<VisitFn>>,
    finalize: Option<Box<FinalizeFn>>,
}

impl Type {
    /// Returns the name of this type.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Returns the name of this type, replacing invalid UTF-8 sequences.
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Returns true if objects of this type can reference other managed objects.
    pub fn has_visit(&self) -> bool {
        self.visit.is_some()
    }

    /// Returns true if objects of this type need to be finalized before they are reclaimed.
    pub fn has_finalize(&self) -> bool {
        self.finalize.is_some()
    }

    pub(crate) fn visit_fn(&self) -> Option<&VisitFn> {
        self.visit.as_deref()
    }

    pub(crate) fn finalize_fn(&self) -> Option<&FinalizeFn> {
        self.finalize.as_deref()
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Type")
            .field("name", &self.name_lossy())
            .field("has_visit", &self.has_visit())
            .field("has_finalize", &self.has_finalize())
            .finish()
    }
}

/// Builds a [`Type`] to register with [`TypeTable::insert`].
pub struct TypeBuilder {
    name: Vec<u8>,
    visit: Option<Box<VisitFn>>,
    finalize: Option<Box<FinalizeFn>>,
}

impl TypeBuilder {
    /// Constructs a builder for a type called `name` without any callbacks.
    pub fn new<N: Into<Vec<u8>>>(name: N) -> Self {
        Self {
            name: name.into(),
            visit: None,
            finalize: None,
        }
    }

    /// Sets the callback that reports the references held by an object of this type.
    pub fn visit<F>(mut self, visit: F) -> Self
    where
        F: Fn(Object<'_>, &mut Tracer<'_>) + 'static,
    {
        self.visit = Some(Box::new(visit));
        self
    }

    /// Sets the callback that is invoked exactly once when an object of this type is reclaimed.
    pub fn finalize<F>(mut self, finalize: F) -> Self
    where
        F: Fn(Object<'_>) + 'static,
    {
        self.finalize = Some(Box::new(finalize));
        self
    }

    fn finish(self) -> Type {
        Type {
            name: self.name.into_boxed_slice(),
            visit: self.visit,
            finalize: self.finalize,
        }
    }
}

/// An error that can occur when registering or looking up types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeTableError {
    #[error("a type named '{0}' is already registered")]
    DuplicateType(String),
    #[error("no type named '{0}' is registered")]
    NotFound(String),
    #[error("type name must not be empty")]
    InvalidName,
    #[error("type table is full")]
    TableFull,
}

/// Maps type names to the [`Type`]s registered under them.
#[derive(Default)]
pub struct TypeTable {
    id: HeapId,
    types: Vec<Type>,
    type_name_to_type_id: FxHashMap<Box<[u8]>, TypeId>,
}

impl TypeTable {
    pub(crate) fn with_id(id: HeapId) -> Self {
        Self {
            id,
            types: Vec::new(),
            type_name_to_type_id: FxHashMap::default(),
        }
    }

    /// Registers the type described by `builder`.
    ///
    /// Fails if the name is empty or a type with the same name was registered before, in which
    /// case the table is left untouched.
    pub fn insert(&mut self, builder: TypeBuilder) -> Result<TypeId, TypeTableError> {
        if builder.name.is_empty() {
            return Err(TypeTableError::InvalidName);
        }

        if self
            .type_name_to_type_id
            .contains_key(builder.name.as_slice())
        {
            return Err(TypeTableError::DuplicateType(
                String::from_utf8_lossy(&builder.name).into_owned(),
            ));
        }

        let Ok(index) = u32::try_from(self.types.len()) else {
            return Err(TypeTableError::TableFull);
        };
        let id = TypeId::new(self.id, index);
        let ty = builder.finish();
        self.type_name_to_type_id.insert(ty.name.clone(), id);
        self.types.push(ty);
        Ok(id)
    }

    /// Returns the id of the type registered as `name`.
    pub fn find_type_by_name<N: AsRef<[u8]>>(&self, name: N) -> Result<TypeId, TypeTableError> {
        let name = name.as_ref();
        self.type_name_to_type_id
            .get(name)
            .copied()
            .ok_or_else(|| TypeTableError::NotFound(String::from_utf8_lossy(name).into_owned()))
    }

    /// Returns the [`Type`] with the given id, if it belongs to this table.
    pub fn get(&self, id: TypeId) -> Option<&Type> {
        if id.table != self.id {
            return None;
        }
        self.types.get(id.index as usize)
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no types have been registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Returns an iterator over all registered types in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &Type)> + '_ {
        self.types
            .iter()
            .enumerate()
            .map(|(index, ty)| (TypeId::new(self.id, index as u32), ty))
    }
}

impl fmt::Debug for TypeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.types.iter()).finish()
    }
}
