//! Arena storage for typed components.
//!
//! Every component lives in exactly one slot of a per-kind [`Arena`] and is
//! addressed by a copyable [`Handle`]. A `$ref` in the source becomes a
//! placeholder slot; all holders of the same reference share that slot's
//! handle, and resolution links the placeholder to its target in place.

use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use url::Url;

use super::{
    Callback, Example, Header, Link, Parameter, PathItem, RequestBody, Response, Schema,
    SecurityScheme, Tag,
};
use crate::reference::{ReferenceDescriptor, ReferenceType};

/// Specification extensions (`x-*` fields)
pub type Extensions = IndexMap<String, Value>;

/// Components that carry specification extensions
pub trait Extensible {
    fn extensions(&self) -> &Extensions;
    fn extensions_mut(&mut self) -> &mut Extensions;
}

/// A referenceable component kind stored in a [`ComponentStore`]
pub trait Component: Default + Clone + fmt::Debug + Extensible + Sized {
    const KIND: ReferenceType;

    fn arena(store: &ComponentStore) -> &Arena<Self>;
    fn arena_mut(store: &mut ComponentStore) -> &mut Arena<Self>;

    fn into_any(handle: Handle<Self>) -> AnyHandle;
    fn from_any(handle: AnyHandle) -> Option<Handle<Self>>;

    /// Handles of every component this one links to directly
    fn children(&self, out: &mut Vec<AnyHandle>);
}

/// Typed index of a component slot
pub struct Handle<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// # Panics
    ///
    /// When `index` does not fit in a `u32`; an arena never grows that large.
    fn new(index: usize) -> Self {
        let index = match u32::try_from(index) {
            Ok(index) => index,
            Err(_) => panic!("arena slot {} exceeds the u32 handle range", index),
        };
        Self {
            index,
            _marker: PhantomData,
        }
    }

    pub fn index(self) -> usize {
        self.index as usize
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.index)
    }
}

/// One arena slot: a component value plus its reference state.
///
/// While `unresolved` is true the value is a default placeholder and must not
/// be read as content. Once linked, `target` points at the real component.
#[derive(Debug, Clone)]
pub struct Entry<T> {
    value: T,
    reference: Option<ReferenceDescriptor>,
    origin: Option<Url>,
    site: Option<String>,
    depth: usize,
    unresolved: bool,
    target: Option<Handle<T>>,
}

impl<T: Default> Entry<T> {
    fn concrete(value: T) -> Self {
        Self {
            value,
            reference: None,
            origin: None,
            site: None,
            depth: 0,
            unresolved: false,
            target: None,
        }
    }

    fn placeholder(descriptor: ReferenceDescriptor, origin: Url, site: String, depth: usize) -> Self {
        Self {
            value: T::default(),
            reference: Some(descriptor),
            origin: Some(origin),
            site: Some(site),
            depth,
            unresolved: true,
            target: None,
        }
    }
}

impl<T> Entry<T> {
    pub fn reference(&self) -> Option<&ReferenceDescriptor> {
        self.reference.as_ref()
    }

    /// Location of the document the reference was written in
    pub fn origin(&self) -> Option<&Url> {
        self.origin.as_ref()
    }

    /// Pointer of the first place the reference was written
    pub fn site(&self) -> Option<&str> {
        self.site.as_deref()
    }

    /// External document hops between the root document and this slot
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    pub fn is_unresolved(&self) -> bool {
        self.unresolved
    }

    pub fn target(&self) -> Option<Handle<T>> {
        self.target
    }

    /// The slot's own value. For a placeholder this is empty.
    pub fn value(&self) -> &T {
        &self.value
    }
}

/// Vector of entries for one component kind
#[derive(Debug, Clone)]
pub struct Arena<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> Arena<T> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn handles(&self) -> impl Iterator<Item = Handle<T>> + '_ {
        (0..self.entries.len()).map(Handle::new)
    }
}

/// Type-erased handle, used where the kind is only known at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnyHandle {
    Schema(Handle<Schema>),
    Response(Handle<Response>),
    Parameter(Handle<Parameter>),
    Example(Handle<Example>),
    RequestBody(Handle<RequestBody>),
    Header(Handle<Header>),
    SecurityScheme(Handle<SecurityScheme>),
    Link(Handle<Link>),
    Callback(Handle<Callback>),
    PathItem(Handle<PathItem>),
    Tag(Handle<Tag>),
}

impl AnyHandle {
    pub fn kind(self) -> ReferenceType {
        match self {
            AnyHandle::Schema(_) => ReferenceType::Schema,
            AnyHandle::Response(_) => ReferenceType::Response,
            AnyHandle::Parameter(_) => ReferenceType::Parameter,
            AnyHandle::Example(_) => ReferenceType::Example,
            AnyHandle::RequestBody(_) => ReferenceType::RequestBody,
            AnyHandle::Header(_) => ReferenceType::Header,
            AnyHandle::SecurityScheme(_) => ReferenceType::SecurityScheme,
            AnyHandle::Link(_) => ReferenceType::Link,
            AnyHandle::Callback(_) => ReferenceType::Callback,
            AnyHandle::PathItem(_) => ReferenceType::PathItem,
            AnyHandle::Tag(_) => ReferenceType::Tag,
        }
    }
}

/// Dispatch a generic call on the concrete handle inside an [`AnyHandle`]
macro_rules! with_handle {
    ($any:expr, |$h:ident| $body:expr) => {
        match $any {
            $crate::model::AnyHandle::Schema($h) => $body,
            $crate::model::AnyHandle::Response($h) => $body,
            $crate::model::AnyHandle::Parameter($h) => $body,
            $crate::model::AnyHandle::Example($h) => $body,
            $crate::model::AnyHandle::RequestBody($h) => $body,
            $crate::model::AnyHandle::Header($h) => $body,
            $crate::model::AnyHandle::SecurityScheme($h) => $body,
            $crate::model::AnyHandle::Link($h) => $body,
            $crate::model::AnyHandle::Callback($h) => $body,
            $crate::model::AnyHandle::PathItem($h) => $body,
            $crate::model::AnyHandle::Tag($h) => $body,
        }
    };
}

pub(crate) use with_handle;

/// Per-document arenas plus the placeholder table
#[derive(Debug, Clone, Default)]
pub struct ComponentStore {
    pub(crate) schemas: Arena<Schema>,
    pub(crate) responses: Arena<Response>,
    pub(crate) parameters: Arena<Parameter>,
    pub(crate) examples: Arena<Example>,
    pub(crate) request_bodies: Arena<RequestBody>,
    pub(crate) headers: Arena<Header>,
    pub(crate) security_schemes: Arena<SecurityScheme>,
    pub(crate) links: Arena<Link>,
    pub(crate) callbacks: Arena<Callback>,
    pub(crate) path_items: Arena<PathItem>,
    pub(crate) tags: Arena<Tag>,

    /// Placeholder slot per distinct reference target (and override pair)
    placeholders: HashMap<String, AnyHandle>,

    /// Slot built for a target outside the registry, by absolute
    /// `{location}#{pointer}` key
    imports: HashMap<String, AnyHandle>,
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a concrete component and return its handle
    pub fn insert<T: Component>(&mut self, value: T) -> Handle<T> {
        let arena = T::arena_mut(self);
        arena.entries.push(Entry::concrete(value));
        Handle::new(arena.entries.len() - 1)
    }

    /// Return the placeholder for `descriptor` written in `origin`, creating
    /// it on first use. Every call with the same target yields the same handle.
    pub fn get_or_create_placeholder<T: Component>(
        &mut self,
        descriptor: ReferenceDescriptor,
        origin: &Url,
        site: &str,
        depth: usize,
    ) -> Result<Handle<T>, crate::error::OpenApiError> {
        let mut key = format!("{:?}|{}", T::KIND, descriptor.target_key(origin)?);
        if descriptor.has_overrides() {
            key.push_str(&format!(
                "|{}|{}",
                descriptor.summary().unwrap_or_default(),
                descriptor.description().unwrap_or_default()
            ));
        }

        if let Some(existing) = self.placeholders.get(&key).copied().and_then(T::from_any) {
            return Ok(existing);
        }

        let arena = T::arena_mut(self);
        arena.entries.push(Entry::placeholder(
            descriptor,
            origin.clone(),
            site.to_string(),
            depth,
        ));
        let handle = Handle::new(arena.entries.len() - 1);
        self.placeholders.insert(key, T::into_any(handle));
        Ok(handle)
    }

    /// Slot previously built for the target at `key`, if it has the right kind
    pub fn imported<T: Component>(&self, key: &str) -> Option<Handle<T>> {
        self.imports.get(key).copied().and_then(T::from_any)
    }

    /// Remember the slot built for the target at `key`. The first one wins.
    pub fn record_import<T: Component>(&mut self, key: String, handle: Handle<T>) {
        self.imports.entry(key).or_insert(T::into_any(handle));
    }

    pub fn entry<T: Component>(&self, handle: Handle<T>) -> &Entry<T> {
        &T::arena(self).entries[handle.index()]
    }

    /// Follow resolved links from `handle` to the slot holding real content.
    /// Unresolved placeholders resolve to themselves.
    pub fn resolve<T: Component>(&self, handle: Handle<T>) -> Handle<T> {
        let arena = T::arena(self);
        let mut current = handle;
        // A chain can never be longer than the arena without looping.
        for _ in 0..=arena.entries.len() {
            match arena.entries[current.index()].target {
                Some(next) if next != handle => current = next,
                _ => return current,
            }
        }
        current
    }

    /// Borrow the component behind `handle`, following resolved links
    pub fn get<T: Component>(&self, handle: Handle<T>) -> &T {
        let resolved = self.resolve(handle);
        &T::arena(self).entries[resolved.index()].value
    }

    /// Mutably borrow the component behind `handle`, following resolved links.
    /// The change is visible through every holder of the same target.
    pub fn get_mut<T: Component>(&mut self, handle: Handle<T>) -> &mut T {
        let resolved = self.resolve(handle);
        &mut T::arena_mut(self).entries[resolved.index()].value
    }

    /// Whether the component behind `handle` is still an unresolved placeholder
    pub fn is_unresolved<T: Component>(&self, handle: Handle<T>) -> bool {
        let resolved = self.resolve(handle);
        T::arena(self).entries[resolved.index()].unresolved
    }

    /// True if following `target` from `handle` would come back to `handle`
    pub(crate) fn would_cycle<T: Component>(&self, handle: Handle<T>, target: Handle<T>) -> bool {
        let arena = T::arena(self);
        let mut current = target;
        for _ in 0..=arena.entries.len() {
            if current == handle {
                return true;
            }
            match arena.entries[current.index()].target {
                Some(next) => current = next,
                None => return false,
            }
        }
        true
    }

    /// Link an unresolved placeholder to its target. Only the resolver calls
    /// this, and only once per placeholder.
    pub(crate) fn link<T: Component>(&mut self, placeholder: Handle<T>, target: Handle<T>) {
        let entry = &mut T::arena_mut(self).entries[placeholder.index()];
        debug_assert!(entry.unresolved, "placeholder linked twice");
        entry.target = Some(target);
        entry.unresolved = false;
    }

    /// Direct children of the slot behind `handle`: the link target for a
    /// resolved reference, otherwise the handles inside the component value
    pub fn children(&self, handle: AnyHandle, out: &mut Vec<AnyHandle>) {
        with_handle!(handle, |h| self.typed_children(h, out))
    }

    fn typed_children<T: Component>(&self, handle: Handle<T>, out: &mut Vec<AnyHandle>) {
        let entry = self.entry(handle);
        match entry.target {
            Some(target) => out.push(T::into_any(target)),
            None if entry.is_reference() => {}
            None => entry.value.children(out),
        }
    }

    pub fn is_entry_unresolved(&self, handle: AnyHandle) -> bool {
        with_handle!(handle, |h| self.entry(h).is_unresolved())
    }

    pub fn entry_reference(&self, handle: AnyHandle) -> Option<&ReferenceDescriptor> {
        with_handle!(handle, |h| self.entry(h).reference())
    }

    pub fn entry_origin(&self, handle: AnyHandle) -> Option<&Url> {
        with_handle!(handle, |h| self.entry(h).origin())
    }

    /// Link target of a resolved reference slot
    pub fn entry_target(&self, handle: AnyHandle) -> Option<AnyHandle> {
        with_handle!(handle, |h| self.typed_target(h))
    }

    fn typed_target<T: Component>(&self, handle: Handle<T>) -> Option<AnyHandle> {
        self.entry(handle).target.map(T::into_any)
    }

    /// Total number of slots across all arenas
    pub fn len(&self) -> usize {
        self.schemas.len()
            + self.responses.len()
            + self.parameters.len()
            + self.examples.len()
            + self.request_bodies.len()
            + self.headers.len()
            + self.security_schemes.len()
            + self.links.len()
            + self.callbacks.len()
            + self.path_items.len()
            + self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! impl_component {
    ($ty:ident, $variant:ident, $field:ident) => {
        impl Component for $ty {
            const KIND: ReferenceType = ReferenceType::$variant;

            fn arena(store: &ComponentStore) -> &Arena<Self> {
                &store.$field
            }

            fn arena_mut(store: &mut ComponentStore) -> &mut Arena<Self> {
                &mut store.$field
            }

            fn into_any(handle: Handle<Self>) -> AnyHandle {
                AnyHandle::$variant(handle)
            }

            fn from_any(handle: AnyHandle) -> Option<Handle<Self>> {
                match handle {
                    AnyHandle::$variant(h) => Some(h),
                    _ => None,
                }
            }

            fn children(&self, out: &mut Vec<AnyHandle>) {
                self.collect_children(out)
            }
        }

        impl Extensible for $ty {
            fn extensions(&self) -> &Extensions {
                &self.extensions
            }

            fn extensions_mut(&mut self) -> &mut Extensions {
                &mut self.extensions
            }
        }
    };
}

impl_component!(Schema, Schema, schemas);
impl_component!(Response, Response, responses);
impl_component!(Parameter, Parameter, parameters);
impl_component!(Example, Example, examples);
impl_component!(RequestBody, RequestBody, request_bodies);
impl_component!(Header, Header, headers);
impl_component!(SecurityScheme, SecurityScheme, security_schemes);
impl_component!(Link, Link, links);
impl_component!(Callback, Callback, callbacks);
impl_component!(PathItem, PathItem, path_items);
impl_component!(Tag, Tag, tags);

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("file:///api.yaml").unwrap()
    }

    #[test]
    fn test_placeholders_are_shared_per_target() {
        let mut store = ComponentStore::new();
        let pet = ReferenceDescriptor::parse("#/components/schemas/Pet", ReferenceType::Schema).unwrap();

        let a: Handle<Schema> = store
            .get_or_create_placeholder(pet.clone(), &origin(), "#/a", 0)
            .unwrap();
        let b: Handle<Schema> = store
            .get_or_create_placeholder(pet, &origin(), "#/b", 0)
            .unwrap();

        assert_eq!(a, b);
        assert!(store.entry(a).is_unresolved());
        assert_eq!(store.entry(a).site(), Some("#/a"));
    }

    #[test]
    fn test_overrides_get_their_own_placeholder() {
        let mut store = ComponentStore::new();
        let plain = ReferenceDescriptor::parse("#/components/schemas/Pet", ReferenceType::Schema).unwrap();
        let described = plain.clone().with_overrides(None, Some("A pet".to_string()));

        let a: Handle<Schema> = store.get_or_create_placeholder(plain, &origin(), "#/a", 0).unwrap();
        let b: Handle<Schema> = store.get_or_create_placeholder(described, &origin(), "#/b", 0).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_link_follows_to_target() {
        let mut store = ComponentStore::new();
        let target = store.insert(Schema {
            title: Some("Pet".to_string()),
            ..Default::default()
        });
        let pet = ReferenceDescriptor::parse("#/components/schemas/Pet", ReferenceType::Schema).unwrap();
        let placeholder: Handle<Schema> = store.get_or_create_placeholder(pet, &origin(), "#/a", 0).unwrap();

        assert!(store.get(placeholder).title.is_none());
        store.link(placeholder, target);

        assert_eq!(store.resolve(placeholder), target);
        assert_eq!(store.get(placeholder).title.as_deref(), Some("Pet"));
        assert!(!store.is_unresolved(placeholder));

        store.get_mut(placeholder).title = Some("Renamed".to_string());
        assert_eq!(store.get(target).title.as_deref(), Some("Renamed"));
    }

    #[test]
    fn test_would_cycle_detects_self_alias() {
        let mut store = ComponentStore::new();
        let a_ref = ReferenceDescriptor::parse("#/components/schemas/A", ReferenceType::Schema).unwrap();
        let a: Handle<Schema> = store.get_or_create_placeholder(a_ref, &origin(), "#/a", 0).unwrap();
        assert!(store.would_cycle(a, a));
    }

    #[test]
    fn test_imports_keep_the_first_slot_per_kind() {
        let mut store = ComponentStore::new();
        let first = store.insert(Schema::default());
        let second = store.insert(Schema::default());
        let key = "file:///b.yaml#/Widget".to_string();

        store.record_import(key.clone(), first);
        store.record_import(key.clone(), second);

        assert_eq!(store.imported::<Schema>(&key), Some(first));
        assert_eq!(store.imported::<Parameter>(&key), None);
        assert_eq!(store.imported::<Schema>("file:///b.yaml#/Other"), None);
    }

    #[test]
    #[should_panic(expected = "exceeds the u32 handle range")]
    fn test_handle_past_u32_range_panics() {
        let _ = Handle::<Schema>::new(u32::MAX as usize + 1);
    }
}
