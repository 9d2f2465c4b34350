//! Chunked bump allocator
//!
//! Values are placed into fixed-size chunks. When no chunk has room left a new
//! chunk of the same capacity is linked after the last one. Nothing is freed
//! individually, the whole arena goes away at once when it is dropped.

/// One fixed-capacity block of the arena.
#[derive(Debug)]
struct Chunk<T> {
    items: Vec<T>,
}

impl<T> Chunk<T> {
    fn new(capacity: usize) -> Self {
        Chunk {
            items: Vec::with_capacity(capacity),
        }
    }

    fn room(&self, capacity: usize) -> usize {
        capacity - self.items.len()
    }
}

/// Append-only chunked storage
#[derive(Debug)]
pub struct Arena<T> {
    chunk_capacity: usize,
    chunks: Vec<Chunk<T>>,
}

impl<T> Arena<T> {
    /// Create an arena with a single empty chunk.
    ///
    /// * `chunk_capacity` number of values a chunk can hold. Must not be zero.
    pub fn new(chunk_capacity: usize) -> Self {
        assert!(chunk_capacity > 0, "arena chunk capacity must not be zero");

        Arena {
            chunk_capacity,
            chunks: vec![Chunk::new(chunk_capacity)],
        }
    }

    /// Store a value and return a reference to its new place.
    pub fn alloc(&mut self, value: T) -> &T {
        let chunk = self.chunk_with_room(1);
        let items = &mut self.chunks[chunk].items;
        items.push(value);
        &items[items.len() - 1]
    }

    /// Store a run of values contiguously inside a single chunk.
    ///
    /// Panics if the run is longer than a whole chunk.
    pub fn alloc_extend<I>(&mut self, values: I) -> &[T]
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator<Item = T>,
    {
        let values = values.into_iter();
        let len = values.len();
        assert!(
            len <= self.chunk_capacity,
            "arena request of {} values exceeds chunk capacity {}",
            len,
            self.chunk_capacity
        );

        let chunk = self.chunk_with_room(len);
        let items = &mut self.chunks[chunk].items;
        let index = items.len();
        items.extend(values);
        &items[index..]
    }

    /// Values of one chunk, in insertion order.
    pub fn chunk(&self, chunk: usize) -> Option<&[T]> {
        self.chunks.get(chunk).map(|c| c.items.as_slice())
    }

    /// Iterate all values chunk by chunk.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.chunks.iter().flat_map(|c| c.items.iter())
    }

    pub fn len(&self) -> usize {
        self.chunks.iter().map(|c| c.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk_capacity(&self) -> usize {
        self.chunk_capacity
    }

    /// First chunk that can take `size` more values, linking a fresh one if
    /// every existing chunk is too full.
    fn chunk_with_room(&mut self, size: usize) -> usize {
        let capacity = self.chunk_capacity;
        if let Some(found) = self.chunks.iter().position(|c| c.room(capacity) >= size) {
            return found;
        }

        self.chunks.push(Chunk::new(capacity));
        self.chunks.len() - 1
    }
}
