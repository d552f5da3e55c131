use super::column_definition::Column;

/// Stable handle to a column owned by a [`ColumnList`]
///
/// Handles of destroyed columns stay invalid even after their slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Node {
    column: Column,
    prev: Option<u32>,
    next: Option<u32>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Doubly-linked list of columns stored in a slot arena
///
/// New columns are linked at the head, so walking from the head yields reverse arrival
/// order.
#[derive(Debug, Default)]
pub struct ColumnList {
    slots: Vec<Slot>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl ColumnList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Link an empty column at the head
    pub fn create(&mut self) -> ColumnId {
        self.insert(Column::default())
    }

    /// Link `column` at the head
    pub fn insert(&mut self, column: Column) -> ColumnId {
        let node = Node {
            column,
            prev: None,
            next: self.head,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].node = Some(node);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                (self.slots.len() - 1) as u32
            }
        };

        if let Some(old_head) = self.head
            && let Some(old) = self.slots[old_head as usize].node.as_mut()
        {
            old.prev = Some(index);
        }
        self.head = Some(index);
        if self.tail.is_none() {
            self.tail = Some(index);
        }
        self.len += 1;

        ColumnId {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    fn node(&self, id: ColumnId) -> Option<&Node> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn id_of(&self, index: u32) -> ColumnId {
        ColumnId {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    pub fn get(&self, id: ColumnId) -> Option<&Column> {
        self.node(id).map(|node| &node.column)
    }

    pub fn get_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut().map(|node| &mut node.column)
    }

    pub fn contains(&self, id: ColumnId) -> bool {
        self.node(id).is_some()
    }

    /// Unlink and return a column; `None` for stale handles
    pub fn destroy(&mut self, id: ColumnId) -> Option<Column> {
        self.node(id)?;
        let slot = &mut self.slots[id.index as usize];
        let node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        match node.prev {
            Some(prev) => {
                if let Some(prev) = self.slots[prev as usize].node.as_mut() {
                    prev.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(next) = self.slots[next as usize].node.as_mut() {
                    next.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }
        self.len -= 1;

        Some(node.column)
    }

    /// Destroy every column
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.free = (0..self.slots.len() as u32).rev().collect();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Most recently created column
    pub fn head(&self) -> Option<ColumnId> {
        self.head.map(|index| self.id_of(index))
    }

    /// Oldest column
    pub fn tail(&self) -> Option<ColumnId> {
        self.tail.map(|index| self.id_of(index))
    }

    /// Column linked after `id` (older)
    pub fn next(&self, id: ColumnId) -> Option<ColumnId> {
        self.node(id)?.next.map(|index| self.id_of(index))
    }

    /// Column linked before `id` (newer)
    pub fn prev(&self, id: ColumnId) -> Option<ColumnId> {
        self.node(id)?.prev.map(|index| self.id_of(index))
    }

    /// Walk head to tail; `.rev()` walks tail to head
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            front: self.head,
            back: self.tail,
            remaining: self.len,
        }
    }
}

pub struct Iter<'a> {
    list: &'a ColumnList,
    front: Option<u32>,
    back: Option<u32>,
    remaining: usize,
}

impl<'a> Iter<'a> {
    fn entry(&self, index: u32) -> Option<(ColumnId, &'a Column, &'a Node)> {
        let list: &'a ColumnList = self.list;
        let node = list.slots.get(index as usize)?.node.as_ref()?;
        Some((list.id_of(index), &node.column, node))
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (ColumnId, &'a Column);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let (id, column, node) = self.entry(self.front?)?;
        self.front = node.next;
        self.remaining -= 1;
        Some((id, column))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl DoubleEndedIterator for Iter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let (id, column, node) = self.entry(self.back?)?;
        self.back = node.prev;
        self.remaining -= 1;
        Some((id, column))
    }
}

impl ExactSizeIterator for Iter<'_> {}

impl<'a> IntoIterator for &'a ColumnList {
    type Item = (ColumnId, &'a Column);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
