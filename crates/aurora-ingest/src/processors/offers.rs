use aurora_sink::{BatchInsertBuilder, IngestionSink, OfferRow};
use aurora_types::{Change, ChangeKind, LedgerEntry, LedgerEntryData, OfferEntry};
use tracing::info;

use crate::cache::ChangeCache;
use crate::error::IngestResult;
use crate::processors::{expect_one_row, is_kind, ChangeProcessor, MAX_BATCH_SIZE};

/// Removed offers stay as soft-deleted rows for this many ledgers before
/// they are physically deleted, bounding the graveyard the orderbook reads
/// have to skip.
const OFFER_COMPACTION_WINDOW: u32 = 100;

fn offer_entry(entry: &LedgerEntry) -> Option<&OfferEntry> {
    match &entry.data {
        LedgerEntryData::Offer(offer) => Some(offer),
        _ => None,
    }
}

/// Projects offer entries into the `offers` table and prunes old graves.
pub struct OffersProcessor {
    sequence: u32,
    cache: ChangeCache,
}

impl OffersProcessor {
    pub fn new(sequence: u32) -> Self {
        Self {
            sequence,
            cache: ChangeCache::new(),
        }
    }

    fn flush(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        let mut batch = BatchInsertBuilder::new(MAX_BATCH_SIZE);
        for change in self.cache.take_changes() {
            match (&change.pre, &change.post) {
                (None, Some(post)) => {
                    if let Some(offer) = offer_entry(post) {
                        batch.add(OfferRow::from_entry(offer, post.last_modified_ledger));
                    }
                }
                (Some(pre), None) => {
                    if let Some(offer) = offer_entry(pre) {
                        let affected = sink.remove_offer(offer.offer_id, self.sequence)?;
                        expect_one_row(affected, "removing", "offer", offer.offer_id)?;
                    }
                }
                (_, Some(post)) => {
                    if let Some(offer) = offer_entry(post) {
                        let row = OfferRow::from_entry(offer, post.last_modified_ledger);
                        let id = row.offer_id;
                        let affected = sink.update_offer(row)?;
                        expect_one_row(affected, "updating", "offer", id)?;
                    }
                }
                (None, None) => unreachable!("cache never yields empty changes"),
            }
        }
        if !batch.is_empty() {
            sink.insert_offers(batch.take_all())?;
        }
        Ok(())
    }
}

impl ChangeProcessor for OffersProcessor {
    fn process_change(
        &mut self,
        sink: &mut dyn IngestionSink,
        change: &Change,
    ) -> IngestResult<()> {
        if !is_kind(change, ChangeKind::Offer) {
            return Ok(());
        }
        self.cache.add_change(change.clone())?;
        if self.cache.len() > MAX_BATCH_SIZE {
            self.flush(sink)?;
        }
        Ok(())
    }

    fn commit(&mut self, sink: &mut dyn IngestionSink) -> IngestResult<()> {
        self.flush(sink)?;

        if self.sequence > OFFER_COMPACTION_WINDOW {
            let cutoff = self.sequence - OFFER_COMPACTION_WINDOW;
            let offer_rows_removed = sink.compact_offers(cutoff)?;
            sink.update_offer_compaction_sequence(cutoff)?;
            info!(offer_rows_removed, cutoff, "trimmed offers table");
        }
        Ok(())
    }
}
