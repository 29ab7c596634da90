use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::Access;
use crate::types::TypeId;

/// A declared variable with the backend-specific payload `P` (the runtime
/// value for the interpreter, a shared rendered-type cell for the
/// generator).
#[derive(Debug, Clone)]
pub struct VariableRecord<P> {
    pub name: String,
    pub type_id: TypeId,
    /// Set for function parameters, which keep their declared type. Every
    /// other declaration, annotated or not, may widen on later assignments.
    pub type_fixed: bool,
    pub is_static: bool,
    pub is_final: bool,
    pub access: Access,
    pub payload: P,
}

#[derive(Debug)]
struct ScopeFrame<P> {
    variables: FxHashMap<String, VariableRecord<P>>,
    parent: Option<Scope<P>>,
}

/// One frame of the lexical scope chain. Handles are cheap to clone and
/// share the underlying frame, so a closure capturing its declaration scope
/// sees later declarations in that scope.
///
/// Member access on dotted paths does not go through this chain; only the
/// root identifier of a path is resolved here.
#[derive(Debug)]
pub struct Scope<P>(Rc<RefCell<ScopeFrame<P>>>);

impl<P> Clone for Scope<P> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<P> Scope<P> {
    pub fn root() -> Self {
        Self(Rc::new(RefCell::new(ScopeFrame {
            variables: FxHashMap::default(),
            parent: None,
        })))
    }

    /// Opens a nested scope whose lookups fall back to `self`.
    pub fn child(&self) -> Self {
        Self(Rc::new(RefCell::new(ScopeFrame {
            variables: FxHashMap::default(),
            parent: Some(self.clone()),
        })))
    }

    /// Declares into this frame. Returns false when the name is already
    /// declared here; shadowing an outer declaration is allowed.
    pub fn declare(&self, record: VariableRecord<P>) -> bool {
        let mut frame = self.0.borrow_mut();
        if frame.variables.contains_key(&record.name) {
            return false;
        }
        frame.variables.insert(record.name.clone(), record);
        true
    }

    /// Applies `f` to the record for `name`, searching outward through the
    /// chain. Returns `None` when no frame declares it.
    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut VariableRecord<P>) -> R) -> Option<R> {
        let mut frame = self.0.borrow_mut();
        if let Some(record) = frame.variables.get_mut(name) {
            return Some(f(record));
        }
        let parent = frame.parent.clone()?;
        drop(frame);
        parent.update(name, f)
    }

    /// Visits every record declared directly in this frame, in no
    /// particular order.
    pub fn for_each_local(&self, mut f: impl FnMut(&VariableRecord<P>)) {
        for record in self.0.borrow().variables.values() {
            f(record);
        }
    }
}

impl<P: Clone> Scope<P> {
    /// Resolves `name` through the chain, innermost frame first.
    pub fn resolve(&self, name: &str) -> Option<VariableRecord<P>> {
        let frame = self.0.borrow();
        if let Some(record) = frame.variables.get(name) {
            return Some(record.clone());
        }
        frame.parent.as_ref()?.resolve(name)
    }
}
