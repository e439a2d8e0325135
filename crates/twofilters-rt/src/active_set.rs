//! Intrusive index list tracking the members of a dense array that currently
//! need per-block work.
//!
//! The links live inside the items themselves ([`Participant`]), so insert and
//! remove are O(1) and iteration only touches active members.

const NONE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveLink {
    prev: u32,
    next: u32,
    linked: bool,
}

impl Default for ActiveLink {
    fn default() -> Self {
        Self {
            prev: NONE,
            next: NONE,
            linked: false,
        }
    }
}

impl ActiveLink {
    pub fn is_linked(&self) -> bool {
        self.linked
    }
}

pub trait Participant {
    fn link(&self) -> &ActiveLink;
    fn link_mut(&mut self) -> &mut ActiveLink;
}

/// Head of the list. The set does not own the items; every call receives the
/// backing slice, which must be the same one across calls.
#[derive(Debug, Clone, Copy)]
pub struct ActiveSet {
    head: u32,
    len: usize,
}

impl Default for ActiveSet {
    fn default() -> Self {
        Self { head: NONE, len: 0 }
    }
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains<P: Participant>(&self, items: &[P], index: usize) -> bool {
        items.get(index).map_or(false, |item| item.link().linked)
    }

    /// Links `index` at the head. Returns `false` if it was already present.
    pub fn insert<P: Participant>(&mut self, items: &mut [P], index: usize) -> bool {
        if index >= items.len() || items[index].link().linked {
            return false;
        }
        let old_head = self.head;
        if old_head != NONE {
            items[old_head as usize].link_mut().prev = index as u32;
        }
        *items[index].link_mut() = ActiveLink {
            prev: NONE,
            next: old_head,
            linked: true,
        };
        self.head = index as u32;
        self.len += 1;
        true
    }

    /// Unlinks `index`. Returns `false` if it was not present.
    pub fn remove<P: Participant>(&mut self, items: &mut [P], index: usize) -> bool {
        if index >= items.len() || !items[index].link().linked {
            return false;
        }
        let ActiveLink { prev, next, .. } = *items[index].link();
        if prev == NONE {
            self.head = next;
        } else {
            items[prev as usize].link_mut().next = next;
        }
        if next != NONE {
            items[next as usize].link_mut().prev = prev;
        }
        *items[index].link_mut() = ActiveLink::default();
        self.len -= 1;
        true
    }

    /// Visits every member; members for which `keep` returns `false` are
    /// unlinked. Removal during the walk is safe.
    pub fn retain<P: Participant>(&mut self, items: &mut [P], mut keep: impl FnMut(usize, &mut P) -> bool) {
        let mut cursor = self.head;
        while cursor != NONE {
            let index = cursor as usize;
            cursor = items[index].link().next;
            if !keep(index, &mut items[index]) {
                self.remove(items, index);
            }
        }
    }

    pub fn for_each<P: Participant>(&self, items: &mut [P], mut f: impl FnMut(usize, &mut P)) {
        let mut cursor = self.head;
        while cursor != NONE {
            let index = cursor as usize;
            cursor = items[index].link().next;
            f(index, &mut items[index]);
        }
    }

    /// Unlinks every member.
    pub fn clear<P: Participant>(&mut self, items: &mut [P]) {
        let mut cursor = self.head;
        while cursor != NONE {
            let index = cursor as usize;
            cursor = items[index].link().next;
            *items[index].link_mut() = ActiveLink::default();
        }
        self.head = NONE;
        self.len = 0;
    }
}
