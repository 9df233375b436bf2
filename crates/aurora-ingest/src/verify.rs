//! Periodic state verification.
//!
//! Streams the archive snapshot at a checkpoint and compares every entry
//! against the current projection, restricted to rows last modified at or
//! before that checkpoint. Any disagreement means the projection can no
//! longer be trusted; the caller marks the state invalid.

use std::collections::BTreeMap;
use std::fmt::Debug;

use aurora_archive::HistoryArchive;
use aurora_sink::{
    AccountDataRow, AccountRow, ClaimableBalanceRow, IngestionSink, OfferRow, TrustlineRow,
};
use aurora_types::{Asset, LedgerEntryData};

use crate::error::IngestResult;

/// Outcome of one verification pass.
#[derive(Clone, Debug)]
pub struct VerificationReport {
    pub checkpoint: u32,
    pub entries_compared: u64,
    pub mismatches: Vec<String>,
}

impl VerificationReport {
    pub fn consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

#[derive(Default)]
struct ExpectedState {
    accounts: BTreeMap<String, AccountRow>,
    account_data: BTreeMap<(String, String), AccountDataRow>,
    offers: BTreeMap<i64, OfferRow>,
    trustlines: BTreeMap<(String, Asset), TrustlineRow>,
    claimable_balances: BTreeMap<String, ClaimableBalanceRow>,
}

/// Compare the projection in `sink` against the archive snapshot at
/// `checkpoint`.
pub fn verify_state(
    sink: &dyn IngestionSink,
    archive: &dyn HistoryArchive,
    checkpoint: u32,
) -> IngestResult<VerificationReport> {
    let mut reader = archive.open_snapshot(checkpoint)?;
    let mut expected = ExpectedState::default();
    let mut entries_compared = 0u64;

    while let Some(change) = reader.next_change()? {
        let Some(entry) = change.post else { continue };
        entries_compared += 1;
        let last_modified = entry.last_modified_ledger;
        match &entry.data {
            LedgerEntryData::Account(account) => {
                expected.accounts.insert(
                    account.account_id.clone(),
                    AccountRow::from_entry(account, last_modified),
                );
            }
            LedgerEntryData::AccountData(data) => {
                expected.account_data.insert(
                    (data.account_id.clone(), data.name.clone()),
                    AccountDataRow::from_entry(data, last_modified),
                );
            }
            LedgerEntryData::Offer(offer) => {
                expected
                    .offers
                    .insert(offer.offer_id, OfferRow::from_entry(offer, last_modified));
            }
            LedgerEntryData::Trustline(trustline) => {
                expected.trustlines.insert(
                    (trustline.account_id.clone(), trustline.asset.clone()),
                    TrustlineRow::from_entry(trustline, last_modified),
                );
            }
            LedgerEntryData::ClaimableBalance(balance) => {
                expected.claimable_balances.insert(
                    balance.balance_id.clone(),
                    ClaimableBalanceRow::from_entry(balance, last_modified),
                );
            }
        }
    }

    let mut mismatches = Vec::new();

    compare_table(
        "account",
        &expected.accounts,
        sink.accounts()?
            .into_iter()
            .filter(|row| row.last_modified_ledger <= checkpoint)
            .map(|row| (row.account_id.clone(), row)),
        &mut mismatches,
    );
    compare_table(
        "account data",
        &expected.account_data,
        sink.account_data()?
            .into_iter()
            .filter(|row| row.last_modified_ledger <= checkpoint)
            .map(|row| ((row.account_id.clone(), row.name.clone()), row)),
        &mut mismatches,
    );
    compare_table(
        "offer",
        &expected.offers,
        sink.offers(false)?
            .into_iter()
            .filter(|row| row.last_modified_ledger <= checkpoint)
            .map(|row| (row.offer_id, row)),
        &mut mismatches,
    );
    compare_table(
        "trustline",
        &expected.trustlines,
        sink.trustlines()?
            .into_iter()
            .filter(|row| row.last_modified_ledger <= checkpoint)
            .map(|row| ((row.account_id.clone(), row.asset.clone()), row)),
        &mut mismatches,
    );
    compare_table(
        "claimable balance",
        &expected.claimable_balances,
        sink.claimable_balances()?
            .into_iter()
            .filter(|row| row.last_modified_ledger <= checkpoint)
            .map(|row| (row.balance_id.clone(), row)),
        &mut mismatches,
    );

    Ok(VerificationReport {
        checkpoint,
        entries_compared,
        mismatches,
    })
}

fn compare_table<K: Ord + Debug, R: PartialEq>(
    entity: &str,
    expected: &BTreeMap<K, R>,
    projected: impl Iterator<Item = (K, R)>,
    mismatches: &mut Vec<String>,
) {
    let projected: BTreeMap<K, R> = projected.collect();

    for (key, expected_row) in expected {
        match projected.get(key) {
            None => mismatches.push(format!("{entity} {key:?}: missing from projection")),
            Some(row) if row != expected_row => {
                mismatches.push(format!("{entity} {key:?}: projection differs from archive"))
            }
            Some(_) => {}
        }
    }
    for key in projected.keys() {
        if !expected.contains_key(key) {
            mismatches.push(format!("{entity} {key:?}: present in projection, not in archive"));
        }
    }
}
