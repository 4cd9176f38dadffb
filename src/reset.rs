use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use thiserror::Error;

/// The policy a [`Pool`](crate::Pool) runs over a slot's payload on every
/// allocation, before any caller-supplied initializer, so a reused slot does
/// not leak state from its previous occupant.
///
/// A strategy is free to be a no-op ([`NoReset`]), a hand-written field wipe,
/// or a rule-table lookup ([`RegistryReset`]). The pool only promises to call
/// `reset` exactly once per allocation.
pub trait ResetStrategy<T> {
    fn reset(&self, item: &mut T);
}

/// Leaves payloads exactly as their previous occupant left them.
pub struct NoReset;

impl <T> ResetStrategy<T> for NoReset {
    fn reset(&self, _item: &mut T) {}
}

/// Configuration error raised while populating a [`ResetRegistry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResetError {
    #[error("a reset rule is already registered for type: {type_name}")]
    DuplicateRule { type_name: &'static str },
}

type DefaultProvider = Box<dyn Fn() -> Box<dyn Any>>;
type TypeResetter = Box<dyn Fn(&mut dyn Any)>;

/// A table of reset rules keyed by `TypeId`.
///
/// Two kinds of rule exist, mirroring the two ways a field can be brought
/// back to a fresh state:
///
/// - a *default provider* produces a canonical fresh value for a scalar kind
///   which is then assigned over the field;
/// - a *type resetter* mutates a composite value in place.
///
/// Rules are registered once, at startup. Registering a second rule of the
/// same kind for the same type is a configuration error. Lookup is by exact
/// `TypeId`; there is no notion of matching a value through a supertype rule.
pub struct ResetRegistry {
    defaults: HashMap<TypeId, DefaultProvider>,
    resetters: HashMap<TypeId, TypeResetter>,
}

impl ResetRegistry {
    pub fn new() -> Self {
        return Self {
            defaults: HashMap::default(),
            resetters: HashMap::default(),
        }
    }

    /// A registry preloaded with the canonical defaults for the primitive
    /// kinds: numeric types reset to zero, `bool` to `false`, `String` to
    /// empty.
    pub fn with_builtin_defaults() -> Self {
        let mut registry: Self = Self::new();
        registry.insert_default(|| false);
        registry.insert_default(|| 0i16);
        registry.insert_default(|| 0i32);
        registry.insert_default(|| 0i64);
        registry.insert_default(|| 0u16);
        registry.insert_default(|| 0u32);
        registry.insert_default(|| 0u64);
        registry.insert_default(|| 0usize);
        registry.insert_default(|| 0f32);
        registry.insert_default(|| 0f64);
        registry.insert_default(String::new);
        return registry
    }

    /// Registers the canonical fresh value for a scalar kind.
    pub fn add_default<T: Any>(&mut self, provider: impl Fn() -> T + 'static) -> Result<(), ResetError> {
        if self.defaults.contains_key(&TypeId::of::<T>()) {
            return Err(ResetError::DuplicateRule { type_name: type_name::<T>() })
        }
        self.insert_default(provider);
        return Ok(())
    }

    /// Registers an in-place reset procedure for a composite kind. When the
    /// kind is a payload type itself, the rule doubles as its whole-object
    /// rule and runs after field defaults, so it can override them.
    pub fn add_resetter<T: Any>(&mut self, resetter: impl Fn(&mut T) + 'static) -> Result<(), ResetError> {
        if self.resetters.contains_key(&TypeId::of::<T>()) {
            return Err(ResetError::DuplicateRule { type_name: type_name::<T>() })
        }
        self.resetters.insert(
            TypeId::of::<T>(),
            Box::new(move |value: &mut dyn Any| {
                if let Some(value) = value.downcast_mut::<T>() {
                    resetter(value);
                }
            }),
        );
        return Ok(())
    }

    /// Overwrites `field` with its registered default. Returns false when no
    /// rule covers the field's type.
    pub fn apply_default<T: Any>(&self, field: &mut T) -> bool {
        match self.defaults.get(&TypeId::of::<T>()) {
            Some(provider) => {
                if let Ok(fresh) = provider().downcast::<T>() {
                    *field = *fresh;
                    return true
                }
                return false
            },

            None => return false,
        }
    }

    /// Runs the registered resetter for `value`'s type, if any.
    pub fn reset_value<T: Any>(&self, value: &mut T) -> bool {
        match self.resetters.get(&TypeId::of::<T>()) {
            Some(resetter) => {
                resetter(value);
                return true
            },

            None => return false,
        }
    }

    fn insert_default<T: Any>(&mut self, provider: impl Fn() -> T + 'static) {
        self.defaults.insert(
            TypeId::of::<T>(),
            Box::new(move || Box::new(provider())),
        );
    }
}

impl Default for ResetRegistry {
    fn default() -> Self {
        return Self::new()
    }
}

/// A payload type that declares, statically, which of its fields participate
/// in reset. This is the explicit replacement for runtime field inspection:
/// a field is covered because the type names it here, and a field is excluded
/// simply by being left out (or called out via [`ResetPass::exclude`]).
///
/// Scalars and composites are declared in separate passes so the strategy can
/// guarantee ordering: defaults land on scalars first, then owned composites
/// are reset, then the whole-object rule for the type itself (if registered)
/// runs last and may override anything the earlier steps did.
pub trait Resettable: Any {
    fn reset_scalars(&mut self, pass: &mut ResetPass<'_>);

    fn reset_nested(&mut self, _pass: &mut ResetPass<'_>) {}
}

/// One walk over a [`Resettable`] value's declared fields, carrying the rule
/// table and collecting the names of fields no rule handled.
pub struct ResetPass<'a> {
    registry: &'a ResetRegistry,
    unhandled: Vec<&'static str>,
}

impl ResetPass<'_> {
    /// Assigns the registered default to a scalar field, or records it as
    /// unhandled.
    pub fn scalar<T: Any>(&mut self, name: &'static str, field: &mut T) {
        if !self.registry.apply_default(field) {
            self.unhandled.push(name);
        }
    }

    /// Runs the registered composite resetter on a field, or records it as
    /// unhandled.
    pub fn nested<T: Any>(&mut self, name: &'static str, field: &mut T) {
        if !self.registry.reset_value(field) {
            self.unhandled.push(name);
        }
    }

    /// Delegates to an owned value's own `Resettable` declaration, then runs
    /// that value's whole-object rule if one is registered.
    pub fn resettable<T: Resettable>(&mut self, field: &mut T) {
        field.reset_scalars(self);
        field.reset_nested(self);
        self.registry.reset_value(field);
    }

    /// Marks a field as deliberately untouched. Excluded fields show up in
    /// the diagnostic report just like fields with no registered rule.
    pub fn exclude(&mut self, name: &'static str) {
        self.unhandled.push(name);
    }
}

/// The default [`ResetStrategy`] for [`Resettable`] payloads: walks the
/// declared scalar fields, then the declared composites, then applies the
/// payload type's own whole-object rule last.
pub struct RegistryReset {
    registry: ResetRegistry,
}

impl RegistryReset {
    pub fn new(registry: ResetRegistry) -> Self {
        return Self { registry }
    }

    /// A strategy backed by the builtin primitive defaults.
    pub fn builtin() -> Self {
        return Self::new(ResetRegistry::with_builtin_defaults())
    }

    pub fn registry(&self) -> &ResetRegistry {
        return &self.registry
    }

    /// Resets what the rules cover and returns the names of every declared
    /// field that was skipped, so callers can sanity-check their coverage.
    pub fn reset_and_report<T: Resettable>(&self, item: &mut T) -> Vec<&'static str> {
        let mut pass: ResetPass<'_> = ResetPass {
            registry: &self.registry,
            unhandled: Vec::new(),
        };
        item.reset_scalars(&mut pass);
        item.reset_nested(&mut pass);
        self.registry.reset_value(item);
        return pass.unhandled
    }
}

impl <T: Resettable> ResetStrategy<T> for RegistryReset {
    fn reset(&self, item: &mut T) {
        let _: Vec<&'static str> = self.reset_and_report(item);
    }
}
