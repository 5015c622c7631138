//! Tree Nodes
//!
//! Tri-state checked propagation for hierarchical view-models. Checking a
//! node checks its whole subtree; changing a node asks its parent to
//! re-derive its own state from all of its children:
//!
//! - every child `Some(true)` gives `Some(true)`,
//! - every child `Some(false)` gives `Some(false)`,
//! - anything else gives `None` (indeterminate).
//!
//! Propagation runs through direct calls on [`TreeItem`], not through the
//! dependency graph. The parent is found through the view-model's weak
//! `Parent` and [`ViewModel::as_tree_item`](crate::viewmodel::ViewModel::as_tree_item).

use std::sync::{Arc, OnceLock};

use crate::graph::{PropertyDecl, TypeDescriptor};
use crate::notify::Property;
use crate::viewmodel::ViewModelNode;

/// Checked and expanded state of one tree item.
#[derive(Debug)]
pub struct TreeNode {
    node: ViewModelNode,
    is_checked: Property<Option<bool>>,
    is_expanded: Property<bool>,
}

impl TreeNode {
    pub const IS_CHECKED: &'static str = "IsChecked";
    pub const IS_EXPANDED: &'static str = "IsExpanded";

    /// Declarations shared by every tree item. Extends
    /// [`ViewModelNode::descriptor`].
    pub fn descriptor() -> &'static TypeDescriptor {
        static TREE_ITEM: OnceLock<TypeDescriptor> = OnceLock::new();
        TREE_ITEM.get_or_init(|| {
            TypeDescriptor::builder("TreeItem")
                .extends(ViewModelNode::descriptor())
                .property(Self::IS_CHECKED, PropertyDecl::new())
                .property(
                    Self::IS_EXPANDED,
                    PropertyDecl::new()
                        .dirty_exempt_inherited()
                        .read_only_exempt_inherited(),
                )
                .build()
        })
    }

    /// Create an unchecked, collapsed item.
    pub fn new(descriptor: &'static TypeDescriptor) -> Self {
        Self {
            node: ViewModelNode::new(descriptor),
            is_checked: Property::new(Self::IS_CHECKED, Some(false)),
            is_expanded: Property::new(Self::IS_EXPANDED, false),
        }
    }

    pub fn node(&self) -> &ViewModelNode {
        &self.node
    }
}

/// A view-model that takes part in checked propagation.
pub trait TreeItem: Send + Sync {
    fn tree(&self) -> &TreeNode;

    /// Child items. Leaves return nothing.
    fn tree_children(&self) -> Vec<Arc<dyn TreeItem>> {
        Vec::new()
    }

    fn is_checked(&self) -> Option<bool> {
        self.tree().is_checked.get()
    }

    /// The checkbox setter: `None` is stored as `Some(false)` and the change
    /// cascades both ways.
    fn set_is_checked(&self, value: Option<bool>) -> bool {
        self.set_is_checked_with(Some(value.unwrap_or(false)), true, true)
    }

    /// Store `value` and optionally cascade it.
    ///
    /// Nothing cascades when the value is unchanged. Children receive
    /// concrete values only and never cascade back up.
    fn set_is_checked_with(
        &self,
        value: Option<bool>,
        update_children: bool,
        update_parent: bool,
    ) -> bool {
        let tree = self.tree();
        if !tree.node.set_property(&tree.is_checked, value) {
            return false;
        }

        if let (true, Some(checked)) = (update_children, value) {
            for child in self.tree_children() {
                child.set_is_checked_with(Some(checked), true, false);
            }
        }

        if update_parent {
            if let Some(parent) = tree.node.parent() {
                match parent.as_tree_item() {
                    Some(item) => item.reevaluate_is_checked(),
                    None => tracing::trace!("parent is not a tree item"),
                }
            }
        }
        true
    }

    /// Derive the checked state from the children. Leaves keep their own.
    fn reevaluate_is_checked(&self) {
        let children = self.tree_children();
        if children.is_empty() {
            return;
        }

        let states: Vec<Option<bool>> = children.iter().map(|child| child.is_checked()).collect();
        let derived = if states.iter().all(|state| *state == Some(true)) {
            Some(true)
        } else if states.iter().all(|state| *state == Some(false)) {
            Some(false)
        } else {
            None
        };
        self.set_is_checked_with(derived, false, true);
    }

    fn is_expanded(&self) -> bool {
        self.tree().is_expanded.get()
    }

    fn set_is_expanded(&self, expanded: bool) -> bool {
        let tree = self.tree();
        tree.node.set_property(&tree.is_expanded, expanded)
    }
}
