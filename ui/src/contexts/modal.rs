use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Which dialogs are open, each with the data it was opened for.
#[derive(Clone, Default)]
pub struct ModalContext {
    open: Rc<RefCell<HashMap<String, Rc<dyn Any>>>>,
}

impl ModalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `id`, replacing the data of an already open dialog.
    pub fn open<T: 'static>(&self, id: &str, data: T) {
        self.open
            .borrow_mut()
            .insert(id.to_string(), Rc::new(data));
    }

    pub fn close(&self, id: &str) {
        self.open.borrow_mut().remove(id);
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.open.borrow().contains_key(id)
    }

    /// Data `id` was opened with, if it is open and holds a `T`.
    pub fn get_data<T: Clone + 'static>(&self, id: &str) -> Option<T> {
        self.open
            .borrow()
            .get(id)
            .and_then(|data| data.downcast_ref::<T>())
            .cloned()
    }
}

impl std::fmt::Debug for ModalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = self.open.borrow();
        let mut ids: Vec<&String> = open.keys().collect();
        ids.sort();
        f.debug_struct("ModalContext").field("open", &ids).finish()
    }
}
