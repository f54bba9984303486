//! Editable list of nested text items (acceptance criteria or subtasks).
//!
//! Entries typed in the current form session carry a local id until they are
//! saved; entries loaded from the server carry the server's id. The two id
//! spaces never mix, which decides how an entry is removed.

use crate::tui::input::InputField;

/// Identity of one list entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ItemKey {
    /// Added in this session, not yet saved. Wall-clock milliseconds, unique within the list.
    Pending(u64),
    /// Loaded from the server.
    Persisted(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct EditableItem {
    pub key: ItemKey,
    pub text: InputField,
}

impl EditableItem {
    pub fn is_pending(&self) -> bool {
        matches!(self.key, ItemKey::Pending(_))
    }
}

/// What removing an entry requires of the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Removal {
    /// A pending entry; it has already been dropped from the list.
    Local,
    /// A saved entry; the caller must delete it on the server, then call `forget`.
    Remote(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ItemList {
    pub items: Vec<EditableItem>,
    /// Focused entry index, if any.
    pub selected: Option<usize>,
    last_local_id: u64,
}

impl ItemList {
    pub fn new() -> Self {
        Self::default()
    }

    /// List pre-populated with saved entries as `(server_id, text)`.
    pub fn from_persisted<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let items: Vec<EditableItem> = entries
            .into_iter()
            .map(|(id, value)| EditableItem {
                key: ItemKey::Persisted(id),
                text: InputField::with_value(&value),
            })
            .collect();
        let selected = if items.is_empty() { None } else { Some(0) };
        ItemList { items, selected, last_local_id: 0 }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an empty pending entry keyed by `now_ms`, focus it and return its key.
    ///
    /// Two entries added within the same millisecond still get distinct keys.
    pub fn add_pending(&mut self, now_ms: u64) -> ItemKey {
        let id = now_ms.max(self.last_local_id + 1);
        self.last_local_id = id;
        let key = ItemKey::Pending(id);
        self.items.push(EditableItem {
            key: key.clone(),
            text: InputField::new(),
        });
        self.selected = Some(self.items.len() - 1);
        key
    }

    /// Remove the focused entry if it is pending, or report the server id to delete.
    pub fn remove_selected(&mut self) -> Option<Removal> {
        let idx = self.selected?;
        match &self.items.get(idx)?.key {
            ItemKey::Pending(_) => {
                self.items.remove(idx);
                self.clamp_selection();
                Some(Removal::Local)
            }
            ItemKey::Persisted(id) => Some(Removal::Remote(id.clone())),
        }
    }

    /// Drop a saved entry after the server confirmed its deletion.
    pub fn forget(&mut self, server_id: &str) {
        self.items
            .retain(|item| item.key != ItemKey::Persisted(server_id.to_string()));
        self.clamp_selection();
    }

    /// Drop every pending entry, keeping what came from the server.
    pub fn discard_pending(&mut self) {
        self.items.retain(|item| !item.is_pending());
        self.clamp_selection();
    }

    pub fn has_pending(&self) -> bool {
        self.items.iter().any(EditableItem::is_pending)
    }

    /// Trimmed-non-empty entries as `(server id if saved, text)`, in order.
    pub fn submitted_values(&self) -> Vec<(Option<String>, String)> {
        self.items
            .iter()
            .filter(|item| !item.text.value.trim().is_empty())
            .map(|item| {
                let id = match &item.key {
                    ItemKey::Persisted(id) => Some(id.clone()),
                    ItemKey::Pending(_) => None,
                };
                (id, item.text.value.clone())
            })
            .collect()
    }

    /// The focused entry's text, when it may be edited. Saved entries are read-only.
    pub fn selected_text_mut(&mut self) -> Option<&mut InputField> {
        let idx = self.selected?;
        self.items
            .get_mut(idx)
            .filter(|item| item.is_pending())
            .map(|item| &mut item.text)
    }

    pub fn select_next(&mut self) -> bool {
        match self.selected {
            Some(i) if i + 1 < self.items.len() => {
                self.selected = Some(i + 1);
                true
            }
            _ => false,
        }
    }

    pub fn select_prev(&mut self) -> bool {
        match self.selected {
            Some(i) if i > 0 => {
                self.selected = Some(i - 1);
                true
            }
            _ => false,
        }
    }

    fn clamp_selection(&mut self) {
        self.selected = match self.selected {
            _ if self.items.is_empty() => None,
            Some(i) if i >= self.items.len() => Some(self.items.len() - 1),
            other => other,
        };
    }
}
