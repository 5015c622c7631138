//! Type Descriptors
//!
//! A [`TypeDescriptor`] is the static declaration table of one view-model
//! type: which properties it has, which other properties each one is
//! computed from, and which are exempt from dirty tracking or read-only
//! blocking.
//!
//! Descriptors form a chain through [`TypeDescriptorBuilder::extends`]. All
//! lookups walk that chain from the most-derived level to the least-derived
//! one, which is how a derived type layers declarations onto its base.
//!
//! ```rust,ignore
//! static PERSON: OnceLock<TypeDescriptor> = OnceLock::new();
//!
//! fn person() -> &'static TypeDescriptor {
//!     PERSON.get_or_init(|| {
//!         TypeDescriptor::builder("Person")
//!             .extends(ViewModelNode::descriptor())
//!             .property("Age", PropertyDecl::new())
//!             .property("IsAdult", PropertyDecl::new().depends_on(["Age"]))
//!             .property("Notes", PropertyDecl::new().dirty_exempt())
//!             .build()
//!     })
//! }
//! ```

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

/// How an exemption marker applies to overrides of the property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exemption {
    /// Applies only while no derived level redeclares the property.
    Local,

    /// Also applies through derived redeclarations that carry no marker.
    Inherited,
}

/// Declarations attached to one property at one level of a hierarchy.
#[derive(Debug, Clone, Default)]
pub struct PropertyDecl {
    depends_on: SmallVec<[&'static str; 4]>,
    inherit_dependencies: bool,
    dirty_exempt: Option<Exemption>,
    read_only_exempt: Option<Exemption>,
}

impl PropertyDecl {
    /// A plain property with no declarations.
    pub fn new() -> Self {
        Self::default()
    }

    /// This property is computed from `sources`.
    pub fn depends_on<I>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        self.depends_on.extend(sources);
        self
    }

    /// Layer this level's dependencies onto the base declaration instead of
    /// replacing it.
    pub fn inherit_dependencies(mut self) -> Self {
        self.inherit_dependencies = true;
        self
    }

    /// Changing this property does not set the dirty flag.
    pub fn dirty_exempt(mut self) -> Self {
        self.dirty_exempt = Some(Exemption::Local);
        self
    }

    /// Like [`dirty_exempt`](Self::dirty_exempt), inherited by overrides.
    pub fn dirty_exempt_inherited(mut self) -> Self {
        self.dirty_exempt = Some(Exemption::Inherited);
        self
    }

    /// This property stays settable while the view-model is read-only.
    pub fn read_only_exempt(mut self) -> Self {
        self.read_only_exempt = Some(Exemption::Local);
        self
    }

    /// Like [`read_only_exempt`](Self::read_only_exempt), inherited by
    /// overrides.
    pub fn read_only_exempt_inherited(mut self) -> Self {
        self.read_only_exempt = Some(Exemption::Inherited);
        self
    }

    /// Sources declared at this level only.
    pub fn declared_sources(&self) -> &[&'static str] {
        &self.depends_on
    }
}

/// Static declaration table for one view-model type.
#[derive(Debug)]
pub struct TypeDescriptor {
    type_name: &'static str,
    base: Option<&'static TypeDescriptor>,
    properties: IndexMap<&'static str, PropertyDecl>,
}

impl TypeDescriptor {
    /// Start a descriptor for `type_name`.
    pub fn builder(type_name: &'static str) -> TypeDescriptorBuilder {
        TypeDescriptorBuilder {
            type_name,
            base: None,
            properties: IndexMap::new(),
        }
    }

    /// Name of the described type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The base level, if any.
    pub fn base(&self) -> Option<&'static TypeDescriptor> {
        self.base
    }

    /// This level followed by every base level, most-derived first.
    pub fn hierarchy(&self) -> impl Iterator<Item = &TypeDescriptor> {
        std::iter::successors(Some(self), |level| level.base)
    }

    /// Whether any level declares `name`.
    pub fn declares(&self, name: &str) -> bool {
        self.resolve_name(name).is_some()
    }

    /// The static name of a declared property.
    pub fn resolve_name(&self, name: &str) -> Option<&'static str> {
        self.hierarchy()
            .find_map(|level| level.properties.get_key_value(name).map(|(k, _)| *k))
    }

    /// All declared property names, base levels first.
    pub fn property_names(&self) -> IndexSet<&'static str> {
        let levels: Vec<&TypeDescriptor> = self.hierarchy().collect();
        levels
            .iter()
            .rev()
            .flat_map(|level| level.properties.keys().copied())
            .collect()
    }

    /// Resolved dependency sources of `name`.
    ///
    /// Each level that declares `name` contributes its sources. The walk
    /// stops at the first declaring level that did not ask to inherit.
    pub fn dependencies_of(&self, name: &str) -> SmallVec<[&'static str; 4]> {
        let mut sources: SmallVec<[&'static str; 4]> = SmallVec::new();
        for level in self.hierarchy() {
            let Some(decl) = level.properties.get(name) else {
                continue;
            };
            for &source in &decl.depends_on {
                if !sources.contains(&source) {
                    sources.push(source);
                }
            }
            if !decl.inherit_dependencies {
                break;
            }
        }
        sources
    }

    /// Whether changing `name` leaves the dirty flag alone.
    pub fn is_dirty_exempt(&self, name: &str) -> bool {
        self.resolve_exemption(name, |decl| decl.dirty_exempt)
    }

    /// Whether `name` stays settable on a read-only view-model.
    pub fn is_read_only_exempt(&self, name: &str) -> bool {
        self.resolve_exemption(name, |decl| decl.read_only_exempt)
    }

    fn resolve_exemption<F>(&self, name: &str, pick: F) -> bool
    where
        F: Fn(&PropertyDecl) -> Option<Exemption>,
    {
        let mut most_derived = true;
        for level in self.hierarchy() {
            let Some(decl) = level.properties.get(name) else {
                continue;
            };
            match pick(decl) {
                Some(_) if most_derived => return true,
                Some(Exemption::Inherited) => return true,
                _ => {}
            }
            most_derived = false;
        }
        false
    }
}

/// Builder returned by [`TypeDescriptor::builder`].
#[derive(Debug)]
pub struct TypeDescriptorBuilder {
    type_name: &'static str,
    base: Option<&'static TypeDescriptor>,
    properties: IndexMap<&'static str, PropertyDecl>,
}

impl TypeDescriptorBuilder {
    /// Layer this type onto `base`.
    pub fn extends(mut self, base: &'static TypeDescriptor) -> Self {
        self.base = Some(base);
        self
    }

    /// Declare (or override) a property at this level.
    pub fn property(mut self, name: &'static str, decl: PropertyDecl) -> Self {
        self.properties.insert(name, decl);
        self
    }

    /// Declare several plain properties.
    pub fn properties<I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = &'static str>,
    {
        for name in names {
            self.properties.entry(name).or_default();
        }
        self
    }

    /// Finish the descriptor.
    pub fn build(self) -> TypeDescriptor {
        TypeDescriptor {
            type_name: self.type_name,
            base: self.base,
            properties: self.properties,
        }
    }
}
