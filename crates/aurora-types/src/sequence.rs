//! Ledger sequence and checkpoint arithmetic.
//!
//! The network closes a ledger roughly every five seconds and publishes a
//! full state snapshot to the history archive every 64th ledger. Checkpoint
//! ledgers are the ones satisfying `(seq + 1) % 64 == 0`: 63, 127, 191, …

/// Sequence of the genesis ledger. It is synthesized locally and never
/// streamed by the validator.
pub const GENESIS_SEQUENCE: u32 = 1;

/// Number of ledgers between two consecutive history-archive checkpoints.
pub const LEDGERS_PER_CHECKPOINT: u32 = 64;

/// Returns `true` if `sequence` is a checkpoint ledger.
pub fn is_checkpoint(sequence: u32) -> bool {
    (sequence + 1) % LEDGERS_PER_CHECKPOINT == 0
}

/// Returns the closest checkpoint ledger at or before `sequence`.
///
/// There is no checkpoint before 63; requesting one for an earlier sequence
/// returns the first checkpoint.
pub fn prev_checkpoint(sequence: u32) -> u32 {
    if sequence < LEDGERS_PER_CHECKPOINT {
        return LEDGERS_PER_CHECKPOINT - 1;
    }
    if is_checkpoint(sequence) {
        return sequence;
    }
    (sequence / LEDGERS_PER_CHECKPOINT) * LEDGERS_PER_CHECKPOINT - 1
}

/// Returns the closest checkpoint ledger at or after `sequence`.
pub fn next_checkpoint(sequence: u32) -> u32 {
    if is_checkpoint(sequence) {
        return sequence;
    }
    (sequence / LEDGERS_PER_CHECKPOINT + 1) * LEDGERS_PER_CHECKPOINT - 1
}

/// Returns the first ledger the validator replays when asked to catch up to
/// the checkpoint segment containing `sequence`.
///
/// The validator never streams ledger 1, so the floor is 2. All later
/// segments start at the multiple of 64 at or below `sequence`.
pub fn round_down_to_first_replay(sequence: u32) -> u32 {
    let v = (sequence / LEDGERS_PER_CHECKPOINT) * LEDGERS_PER_CHECKPOINT;
    if v < 2 {
        return 2;
    }
    v
}
