/// Accumulation state of a chunk being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    /// The chunk still has capacity and the reader has more input.
    Continuable,
    /// The chunk reached its configured size.
    Full,
    /// The reader signalled end of input while filling this chunk.
    Finished,
}

/// A fixed-capacity batch of items committed as one transaction.
pub struct Chunk<I> {
    items: Vec<I>,
    status: ChunkStatus,
    capacity: usize,
}

impl<I> Chunk<I> {
    pub fn new(capacity: usize) -> Chunk<I> {
        Chunk {
            items: Vec::with_capacity(capacity),
            status: ChunkStatus::Continuable,
            capacity,
        }
    }

    /// Adds an item read from the source. Marks the chunk full once the
    /// configured capacity is reached.
    pub fn push(&mut self, item: I) {
        self.items.push(item);
        if self.items.len() >= self.capacity {
            self.status = ChunkStatus::Full;
        }
    }

    /// Marks end of input. The chunk may still hold a partial batch that
    /// needs to be processed and committed.
    pub fn finish(&mut self) {
        self.status = ChunkStatus::Finished;
    }

    pub fn status(&self) -> ChunkStatus {
        self.status
    }

    pub fn items(&self) -> &[I] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
