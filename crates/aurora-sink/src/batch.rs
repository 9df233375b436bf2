/// Accumulates rows for a single table and hands them back in batches.
///
/// The builder never talks to the sink itself; the owning processor drains it
/// with [`take_batch_if_full`](Self::take_batch_if_full) mid-stream and
/// [`take_all`](Self::take_all) on commit, keeping the insert path a single
/// bulk operation per batch.
#[derive(Debug)]
pub struct BatchInsertBuilder<R> {
    rows: Vec<R>,
    max_batch_size: usize,
}

impl<R> BatchInsertBuilder<R> {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            rows: Vec::new(),
            max_batch_size,
        }
    }

    pub fn add(&mut self, row: R) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drains the accumulated rows if the batch limit has been reached.
    pub fn take_batch_if_full(&mut self) -> Option<Vec<R>> {
        if self.rows.len() >= self.max_batch_size {
            Some(std::mem::take(&mut self.rows))
        } else {
            None
        }
    }

    /// Drains every accumulated row.
    pub fn take_all(&mut self) -> Vec<R> {
        std::mem::take(&mut self.rows)
    }
}
