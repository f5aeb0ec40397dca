//! In-memory model of the monitoring page.
//!
//! The feed controller and the static affordances only ever touch the page
//! through element ids and attributes, the same contract a page template
//! provides. Everything else about the page is owned by whoever renders it.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const EVENTS_LIST_ID: &str = "events-list";
pub const EVENT_IMAGE_ID: &str = "event-image";
pub const EXPORT_REPORT_ID: &str = "export-report";
pub const CAMERA_STATUS_ATTR: &str = "data-camera-status";

/// What happens when an element is activated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Full navigation of the page to `href`.
    Navigate { href: String },
    /// Retrieve `get` and replace the contents of the element `target`.
    Swap { get: String, target: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    #[allow(dead_code)]
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub title: Option<String>,
    pub text: String,
    /// Raw markup spliced in from elsewhere; rendered verbatim.
    pub inner_html: Option<String>,
    pub action: Option<Action>,
    pub children: VecDeque<Element>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push_back(child);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    /// Adds `class` unless it is already present, like `classList.add`.
    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_string());
        }
    }

    fn find(&self, id: &str) -> Option<&Element> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Element> {
        if self.id.as_deref() == Some(id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(id))
    }

    fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut Element)) {
        visit(self);
        for child in self.children.iter_mut() {
            child.walk_mut(visit);
        }
    }

    fn walk<'a>(&'a self, out: &mut Vec<&'a Element>) {
        out.push(self);
        for child in &self.children {
            child.walk(out);
        }
    }
}

/// The page body. `reload` restores it to what it was at load time.
#[derive(Debug)]
pub struct Document {
    template: Vec<Element>,
    body: Vec<Element>,
    loads: u64,
}

impl Document {
    pub fn new(body: Vec<Element>) -> Self {
        Self {
            template: body.clone(),
            body,
            loads: 1,
        }
    }

    /// Replaces the load-time template. Takes effect on the next reload.
    pub fn set_template(&mut self, body: Vec<Element>) {
        self.template = body;
    }

    pub fn reload(&mut self) {
        self.body = self.template.clone();
        self.loads += 1;
    }

    /// How many times the page has been loaded, counting the first load.
    pub fn loads(&self) -> u64 {
        self.loads
    }

    pub fn get(&self, id: &str) -> Option<&Element> {
        self.body.iter().find_map(|el| el.find(id))
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Element> {
        self.body.iter_mut().find_map(|el| el.find_mut(id))
    }

    pub fn has_element(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn child_count(&self, id: &str) -> usize {
        self.get(id).map_or(0, |el| el.children.len())
    }

    pub fn children(&self, id: &str) -> impl Iterator<Item = &Element> {
        self.get(id).into_iter().flat_map(|el| el.children.iter())
    }

    pub fn prepend_child(&mut self, id: &str, child: Element) -> bool {
        match self.get_mut(id) {
            Some(parent) => {
                parent.children.push_front(child);
                true
            }
            None => false,
        }
    }

    pub fn remove_last_child(&mut self, id: &str) -> Option<Element> {
        self.get_mut(id)?.children.pop_back()
    }

    /// Replaces everything inside `id` with raw markup.
    pub fn set_inner_html(&mut self, id: &str, html: String) -> bool {
        match self.get_mut(id) {
            Some(el) => {
                el.children.clear();
                el.text.clear();
                el.inner_html = Some(html);
                true
            }
            None => false,
        }
    }

    pub fn bind_action(&mut self, id: &str, action: Action) -> bool {
        match self.get_mut(id) {
            Some(el) => {
                el.action = Some(action);
                true
            }
            None => false,
        }
    }

    /// Action bound to the element `id`, if any.
    pub fn action_of(&self, id: &str) -> Option<Action> {
        self.get(id)?.action.clone()
    }

    /// Elements carrying attribute `name`, in document order.
    pub fn with_attribute(&self, name: &str) -> Vec<&Element> {
        let mut all = Vec::new();
        for el in &self.body {
            el.walk(&mut all);
        }
        all.retain(|el| el.attributes.contains_key(name));
        all
    }

    pub fn for_each_with_attribute(&mut self, name: &str, mut visit: impl FnMut(&mut Element)) {
        for el in self.body.iter_mut() {
            el.walk_mut(&mut |node: &mut Element| {
                if node.attributes.contains_key(name) {
                    visit(node);
                }
            });
        }
    }
}

/// Document handle shared by the feed task and the dashboard handlers.
#[derive(Clone, Debug)]
pub struct SharedDocument(Arc<RwLock<Document>>);

impl SharedDocument {
    pub fn new(document: Document) -> Self {
        Self(Arc::new(RwLock::new(document)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Document> {
        self.0.read().expect("document lock poisoned")
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Document> {
        self.0.write().expect("document lock poisoned")
    }
}
