//! Validation Nodes
//!
//! [`ValidationNode`] extends a [`ViewModelNode`] with per-property
//! validators and an aggregated error store.
//!
//! Validators run synchronously inside the mutation that changed the value:
//! the node listens to its view-model's `notified` batches and re-validates
//! the property each batch originated from. Dependents notified through the
//! closure are not re-validated. While a
//! [`ValidationSuspension`] is held nothing is validated; releasing the
//! outermost suspension re-validates every property with validators.
//!
//! Failures are data. They are stored per property in validator order and
//! surface through [`errors`](ValidationNode::errors),
//! [`has_errors`](ValidationNode::has_errors), the `HasErrors`/`IsValid`
//! change notifications and [`errors_changed`](ValidationNode::errors_changed).

mod validator;

use std::fmt;
use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::error::{check_name, Error, Result};
use crate::graph::{PropertyDecl, TypeDescriptor};
use crate::notify::{EventHandlers, Property, Subscription};
use crate::viewmodel::ViewModelNode;

pub use validator::{MaxLength, Predicate, Range, Required, Validator, ValidatorId};

type Check = Arc<dyn Fn() -> std::result::Result<(), String> + Send + Sync>;

struct ValidationInner {
    node: ViewModelNode,
    validators: RwLock<IndexMap<&'static str, Vec<(ValidatorId, Check)>>>,
    errors: RwLock<IndexMap<&'static str, Vec<(ValidatorId, String)>>>,
    suspended: Mutex<usize>,
    errors_changed: EventHandlers<str>,
}

/// A view-model node with per-property validation.
pub struct ValidationNode {
    inner: Arc<ValidationInner>,
    _batches: Subscription,
}

impl ValidationNode {
    /// Name of the aggregated error flag.
    pub const HAS_ERRORS: &'static str = "HasErrors";
    /// Name of the inverse of `HasErrors`.
    pub const IS_VALID: &'static str = "IsValid";
    /// Name of the suspension flag.
    pub const IS_VALIDATION_SUSPENDED: &'static str = "IsValidationSuspended";

    /// Declarations shared by every validating view-model. Extends
    /// [`ViewModelNode::descriptor`].
    pub fn descriptor() -> &'static TypeDescriptor {
        static VALIDATING: OnceLock<TypeDescriptor> = OnceLock::new();
        VALIDATING.get_or_init(|| {
            TypeDescriptor::builder("ValidatingViewModel")
                .extends(ViewModelNode::descriptor())
                .property(Self::HAS_ERRORS, PropertyDecl::new().dirty_exempt_inherited())
                .property(
                    Self::IS_VALID,
                    PropertyDecl::new()
                        .depends_on([Self::HAS_ERRORS])
                        .dirty_exempt_inherited(),
                )
                .property(
                    Self::IS_VALIDATION_SUSPENDED,
                    PropertyDecl::new()
                        .dirty_exempt_inherited()
                        .read_only_exempt_inherited(),
                )
                .build()
        })
    }

    /// Create the node for an instance of the type `descriptor` describes.
    pub fn new(descriptor: &'static TypeDescriptor) -> Self {
        if !descriptor.declares(Self::HAS_ERRORS) {
            tracing::debug!(
                type_name = descriptor.type_name(),
                "descriptor lacks validation declarations, IsValid will not follow HasErrors"
            );
        }

        let inner = Arc::new(ValidationInner {
            node: ViewModelNode::new(descriptor),
            validators: RwLock::new(IndexMap::new()),
            errors: RwLock::new(IndexMap::new()),
            suspended: Mutex::new(0),
            errors_changed: EventHandlers::new(),
        });

        let weak = Arc::downgrade(&inner);
        let batches = inner
            .node
            .notified()
            .subscribe_scoped(move |names: &[&'static str]| {
                if let Some(inner) = weak.upgrade() {
                    inner.validate_notified(names);
                }
            });

        Self {
            inner,
            _batches: batches,
        }
    }

    /// The view-model node this validation layer extends.
    pub fn node(&self) -> &ViewModelNode {
        &self.inner.node
    }

    /// Raised with a property name whenever that property's errors change.
    pub fn errors_changed(&self) -> &EventHandlers<str> {
        &self.inner.errors_changed
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register `validator` for `property`.
    ///
    /// Unless validation is suspended, the current value is validated
    /// immediately.
    pub fn add_validation<T, V>(&self, property: &Property<T>, validator: V) -> Result<ValidatorId>
    where
        T: Send + Sync + 'static,
        V: Validator<T>,
    {
        let name = self.resolve(property.name())?;
        let id = ValidatorId::new();
        let value = property.clone();
        let check: Check = Arc::new(move || value.with(|current| validator.validate(current)));

        self.inner
            .validators
            .write()
            .entry(name)
            .or_default()
            .push((id, check));
        tracing::trace!(property = name, ?id, "validator added");

        if !self.is_validation_suspended() {
            self.inner.validate(name);
        }
        Ok(id)
    }

    /// Remove one validator. Its recorded errors are dropped; the remaining
    /// validators are not re-run.
    pub fn remove_validation<T>(&self, property: &Property<T>, id: ValidatorId) -> bool {
        let name = property.name();
        let removed = {
            let mut validators = self.inner.validators.write();
            let Some(list) = validators.get_mut(name) else {
                return false;
            };
            let before = list.len();
            list.retain(|(existing, _)| *existing != id);
            let removed = list.len() != before;
            if list.is_empty() {
                validators.shift_remove(name);
            }
            removed
        };
        if removed {
            self.inner.drop_errors(name, |existing| existing == id);
        }
        removed
    }

    /// Remove every validator of `property` and its recorded errors.
    pub fn remove_validations<T>(&self, property: &Property<T>) -> bool {
        let name = property.name();
        let removed = self.inner.validators.write().shift_remove(name).is_some();
        if removed {
            self.inner.drop_errors(name, |_| true);
        }
        removed
    }

    /// Number of validators registered for `name`.
    pub fn validator_count(&self, name: &str) -> usize {
        self.inner
            .validators
            .read()
            .get(name)
            .map_or(0, Vec::len)
    }

    fn resolve(&self, name: &'static str) -> Result<&'static str> {
        check_name(name, "validated property name")?;
        let descriptor = self.inner.node.type_descriptor();
        descriptor
            .resolve_name(name)
            .ok_or_else(|| Error::UnknownProperty {
                type_name: descriptor.type_name(),
                property: name.to_string(),
            })
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    /// Errors of `name`, or of every property when `name` is `None` or blank.
    pub fn errors(&self, name: Option<&str>) -> Vec<String> {
        let errors = self.inner.errors.read();
        match name.filter(|name| !name.trim().is_empty()) {
            Some(name) => errors
                .get(name)
                .map(|list| list.iter().map(|(_, msg)| msg.clone()).collect())
                .unwrap_or_default(),
            None => errors
                .values()
                .flatten()
                .map(|(_, msg)| msg.clone())
                .collect(),
        }
    }

    /// Errors of `name` joined by newlines; empty when valid.
    pub fn error_text(&self, name: &str) -> String {
        self.errors(Some(name)).join("\n")
    }

    /// Whether any property has at least one error.
    pub fn has_errors(&self) -> bool {
        !self.inner.errors.read().is_empty()
    }

    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    /// The current errors, grouped by property.
    pub fn error_snapshot(&self) -> ErrorSnapshot {
        let errors: IndexMap<&'static str, Vec<String>> = self
            .inner
            .errors
            .read()
            .iter()
            .map(|(name, list)| (*name, list.iter().map(|(_, msg)| msg.clone()).collect()))
            .collect();
        ErrorSnapshot {
            has_errors: !errors.is_empty(),
            errors,
        }
    }

    // ------------------------------------------------------------------
    // Suspension
    // ------------------------------------------------------------------

    pub fn is_validation_suspended(&self) -> bool {
        *self.inner.suspended.lock() > 0
    }

    /// Stop validating until the returned guard is dropped.
    ///
    /// Suspensions nest. Dropping the outermost one re-validates every
    /// property that has validators.
    pub fn suspend_validation(&self) -> ValidationSuspension {
        let first = {
            let mut suspended = self.inner.suspended.lock();
            *suspended += 1;
            *suspended == 1
        };
        if first {
            tracing::debug!("validation suspended");
            self.inner.notify(Self::IS_VALIDATION_SUSPENDED);
        }
        ValidationSuspension {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Validate every property that has validators, even while suspended.
    pub fn validate_all(&self) {
        self.inner.validate_all();
    }
}

impl ValidationInner {
    fn is_suspended(&self) -> bool {
        *self.suspended.lock() > 0
    }

    /// Re-run the validators of the property a batch originated from.
    /// Dependents reached through the closure are left alone.
    fn validate_notified(&self, names: &[&'static str]) {
        if self.is_suspended() {
            return;
        }
        let Some(&origin) = names.first() else {
            return;
        };
        if self.validators.read().contains_key(origin) {
            self.validate(origin);
        }
    }

    fn validate_all(&self) {
        let names: Vec<&'static str> = self.validators.read().keys().copied().collect();
        for name in names {
            self.validate(name);
        }
    }

    /// Run the validators of `name` and replace its error list.
    fn validate(&self, name: &'static str) {
        let checks: Vec<(ValidatorId, Check)> = self
            .validators
            .read()
            .get(name)
            .cloned()
            .unwrap_or_default();

        let failures: Vec<(ValidatorId, String)> = checks
            .iter()
            .filter_map(|(id, check)| check().err().map(|msg| (*id, msg)))
            .collect();
        tracing::trace!(property = name, failures = failures.len(), "validated");

        self.store_errors(name, failures);
    }

    fn drop_errors(&self, name: &'static str, matches: impl Fn(ValidatorId) -> bool) {
        let remaining: Vec<(ValidatorId, String)> = match self.errors.read().get(name) {
            Some(list) => list
                .iter()
                .filter(|(id, _)| !matches(*id))
                .cloned()
                .collect(),
            None => return,
        };
        self.store_errors(name, remaining);
    }

    fn store_errors(&self, name: &'static str, list: Vec<(ValidatorId, String)>) {
        let (changed, had_errors, has_errors) = {
            let mut errors = self.errors.write();
            let had_errors = !errors.is_empty();
            let previous = if list.is_empty() {
                errors.shift_remove(name)
            } else {
                errors.insert(name, list.clone())
            };
            let changed = !same_messages(previous.as_deref().unwrap_or_default(), &list);
            (changed, had_errors, !errors.is_empty())
        };

        if changed {
            self.errors_changed.emit(name);
        }
        if had_errors != has_errors {
            self.notify(ValidationNode::HAS_ERRORS);
        }
    }

    fn notify(&self, name: &'static str) {
        if let Err(err) = self.node.notify_changed(name) {
            tracing::warn!(%err, property = name, "validation notification rejected");
        }
    }

    fn release_suspension(&self) {
        let last = {
            let mut suspended = self.suspended.lock();
            *suspended = suspended.saturating_sub(1);
            *suspended == 0
        };
        if last {
            tracing::debug!("validation resumed");
            self.notify(ValidationNode::IS_VALIDATION_SUSPENDED);
            self.validate_all();
        }
    }
}

fn same_messages(a: &[(ValidatorId, String)], b: &[(ValidatorId, String)]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|((_, x), (_, y))| x == y)
}

impl fmt::Debug for ValidationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationNode")
            .field("node", &self.inner.node)
            .field("errors", &self.error_snapshot().errors)
            .field("suspended", &self.is_validation_suspended())
            .finish()
    }
}

/// Keeps validation suspended while alive.
#[must_use = "validation resumes as soon as the suspension is dropped"]
pub struct ValidationSuspension {
    inner: Arc<ValidationInner>,
}

impl Drop for ValidationSuspension {
    fn drop(&mut self) {
        self.inner.release_suspension();
    }
}

impl fmt::Debug for ValidationSuspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationSuspension").finish_non_exhaustive()
    }
}

/// Serializable view of the current errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSnapshot {
    pub has_errors: bool,
    pub errors: IndexMap<&'static str, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewmodel::ViewModel;

    struct Signup {
        validation: ValidationNode,
        age: Property<u32>,
        name: Property<String>,
        label: Property<String>,
    }

    impl Signup {
        fn new() -> Arc<Self> {
            static SIGNUP: OnceLock<TypeDescriptor> = OnceLock::new();
            let descriptor = SIGNUP.get_or_init(|| {
                TypeDescriptor::builder("Signup")
                    .extends(ValidationNode::descriptor())
                    .property("Age", PropertyDecl::new())
                    .property("Name", PropertyDecl::new())
                    .property("Label", PropertyDecl::new().depends_on(["Name"]))
                    .build()
            });
            Arc::new(Self {
                validation: ValidationNode::new(descriptor),
                age: Property::new("Age", 0),
                name: Property::new("Name", String::new()),
                label: Property::new("Label", String::new()),
            })
        }

        fn set_age(&self, age: u32) -> bool {
            self.node().set_property(&self.age, age)
        }
    }

    impl ViewModel for Signup {
        fn node(&self) -> &ViewModelNode {
            self.validation.node()
        }
    }

    fn adult(age: &u32) -> std::result::Result<(), String> {
        if *age >= 5 {
            Ok(())
        } else {
            Err("too young".to_string())
        }
    }

    fn log(events: &EventHandlers<str>) -> Arc<Mutex<Vec<String>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let clone = Arc::clone(&log);
        events.subscribe(move |name: &str| clone.lock().push(name.to_string()));
        log
    }

    #[test]
    fn adding_a_validator_validates_immediately() {
        let signup = Signup::new();
        signup.validation.add_validation(&signup.age, adult).unwrap();

        assert!(signup.validation.has_errors());
        assert_eq!(signup.validation.errors(Some("Age")), vec!["too young"]);
        assert!(signup.validation.errors(Some("Name")).is_empty());

        assert!(signup.set_age(5));
        assert!(signup.validation.errors(Some("Age")).is_empty());
        assert!(signup.validation.is_valid());
    }

    #[test]
    fn errors_follow_validator_order() {
        let signup = Signup::new();
        signup
            .validation
            .add_validation(&signup.name, Required::new())
            .unwrap();
        signup
            .validation
            .add_validation(
                &signup.name,
                Predicate::new("must start with A", |n: &String| n.starts_with('A')),
            )
            .unwrap();

        assert_eq!(
            signup.validation.errors(Some("Name")),
            vec!["a value is required", "must start with A"]
        );
        assert_eq!(
            signup.validation.error_text("Name"),
            "a value is required\nmust start with A"
        );

        signup.node().set_property(&signup.name, "Bob".to_string());
        assert_eq!(signup.validation.errors(Some("Name")), vec!["must start with A"]);
    }

    #[test]
    fn errors_aggregate_across_properties() {
        let signup = Signup::new();
        signup.validation.add_validation(&signup.age, adult).unwrap();
        signup
            .validation
            .add_validation(&signup.name, Required::new())
            .unwrap();

        assert_eq!(signup.validation.errors(None).len(), 2);
        assert_eq!(signup.validation.errors(Some("")).len(), 2);

        let snapshot = signup.validation.error_snapshot();
        assert!(snapshot.has_errors);
        assert_eq!(snapshot.errors.keys().copied().collect::<Vec<_>>(), vec!["Age", "Name"]);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["errors"]["Age"][0], "too young");
    }

    #[test]
    fn has_errors_notifies_is_valid() {
        let signup = Signup::new();
        let changed = log(signup.node().property_changed());
        let errors = log(signup.validation.errors_changed());

        signup.validation.add_validation(&signup.age, adult).unwrap();
        assert_eq!(*changed.lock(), vec!["HasErrors", "IsValid"]);
        assert_eq!(*errors.lock(), vec!["Age"]);

        changed.lock().clear();
        signup.set_age(7);
        assert_eq!(*changed.lock(), vec!["Age", "HasErrors", "IsValid", "IsDirty"]);
        assert_eq!(errors.lock().len(), 2);
    }

    #[test]
    fn unchanged_errors_are_not_re_raised() {
        let signup = Signup::new();
        signup.validation.add_validation(&signup.age, adult).unwrap();
        let errors = log(signup.validation.errors_changed());

        signup.set_age(1);
        signup.set_age(2);
        assert!(errors.lock().is_empty());
    }

    #[test]
    fn suspension_defers_validation() {
        let signup = Signup::new();
        signup.validation.add_validation(&signup.age, adult).unwrap();
        signup.set_age(10);
        assert!(signup.validation.is_valid());

        let suspension = signup.validation.suspend_validation();
        assert!(signup.validation.is_validation_suspended());
        signup.set_age(1);
        assert!(!signup.validation.has_errors());

        drop(suspension);
        assert!(!signup.validation.is_validation_suspended());
        assert!(signup.validation.has_errors());
    }

    #[test]
    fn release_revalidates_unchanged_properties() {
        let signup = Signup::new();
        let outer = signup.validation.suspend_validation();
        signup.validation.add_validation(&signup.age, adult).unwrap();
        assert!(!signup.validation.has_errors());

        let inner = signup.validation.suspend_validation();
        drop(inner);
        assert!(signup.validation.is_validation_suspended());
        assert!(!signup.validation.has_errors());

        drop(outer);
        assert!(signup.validation.has_errors());
    }

    #[test]
    fn removing_validators_drops_their_errors() {
        let signup = Signup::new();
        let required = signup
            .validation
            .add_validation(&signup.name, Required::new())
            .unwrap();
        signup
            .validation
            .add_validation(&signup.name, MaxLength(0))
            .unwrap();
        signup.node().set_property(&signup.name, " ".to_string());
        assert_eq!(signup.validation.errors(Some("Name")).len(), 2);

        assert!(signup.validation.remove_validation(&signup.name, required));
        assert!(!signup.validation.remove_validation(&signup.name, required));
        assert_eq!(
            signup.validation.errors(Some("Name")),
            vec!["must be at most 0 characters"]
        );

        assert!(signup.validation.remove_validations(&signup.name));
        assert!(!signup.validation.remove_validations(&signup.name));
        assert!(signup.validation.is_valid());
        assert_eq!(signup.validation.validator_count("Name"), 0);
    }

    #[test]
    fn only_the_changed_property_is_revalidated() {
        let signup = Signup::new();
        let label = signup.label.clone();
        let name = signup.name.clone();
        // Label is derived from Name and validated against it.
        signup
            .validation
            .add_validation(&signup.label, move |_: &String| {
                if name.get() == label.get() {
                    Ok(())
                } else {
                    Err("label out of date".to_string())
                }
            })
            .unwrap();
        assert!(signup.validation.is_valid());

        signup.node().set_property(&signup.name, "Ada".to_string());
        assert!(signup.validation.is_valid());

        // An explicit notification for Label runs its validators.
        signup.node().notify_changed("Label").unwrap();
        assert_eq!(signup.validation.errors(Some("Label")), vec!["label out of date"]);
    }

    #[test]
    fn unknown_properties_are_rejected() {
        let signup = Signup::new();
        let stray = Property::new("Nickname", String::new());
        let unnamed = Property::new("", 0);

        assert!(matches!(
            signup.validation.add_validation(&stray, Required::new()),
            Err(Error::UnknownProperty { .. })
        ));
        assert!(matches!(
            signup.validation.add_validation(&unnamed, Range::at_least(1)),
            Err(Error::InvalidArgument(_))
        ));
    }
}
