//! # Engine Journal
//!
//! **Append-only record of every engine state mutation**
//!
//! The engine writes a record before it applies the change it describes.
//! After a restart the records are replayed on top of the configured state to
//! rebuild the request ledger, the box counter, collected funds, the reward
//! pool (runtime additions, updates and unique exhaustion), the box price,
//! the pause flag and the owner.
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "LBJL"]
//! [4 bytes: version]
//!
//! Entry format:
//! [8 bytes: sequence number]
//! [1 byte: record type (OPENED/FULFILLED/WITHDRAWN/REWARD_ADDED/...)]
//! [4 bytes: payload length]
//! [N bytes: payload]
//! [4 bytes: CRC32 of above]
//! ```
//!
//! A write interrupted mid-record leaves a torn tail. On open, everything
//! after the last record with a valid CRC is cut off.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::{Address, U256};
use parking_lot::Mutex;

use crate::error::{LootError, LootResult};
use crate::pool::RewardKind;

/// Magic bytes identifying a journal file.
const JOURNAL_MAGIC: &[u8; 4] = b"LBJL";

/// Current journal format version.
const JOURNAL_VERSION: u32 = 1;

/// Header size: magic + version.
const HEADER_LEN: usize = 8;

/// Fixed part of a record: sequence + type + length.
const RECORD_PREFIX_LEN: usize = 8 + 1 + 4;

/// Journal record types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum RecordType {
    Opened = 1,
    Fulfilled = 2,
    Withdrawn = 3,
    RewardAdded = 4,
    RewardUpdated = 5,
    PriceUpdated = 6,
    PauseChanged = 7,
    OwnerChanged = 8,
}

impl RecordType {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Opened),
            2 => Some(Self::Fulfilled),
            3 => Some(Self::Withdrawn),
            4 => Some(Self::RewardAdded),
            5 => Some(Self::RewardUpdated),
            6 => Some(Self::PriceUpdated),
            7 => Some(Self::PauseChanged),
            8 => Some(Self::OwnerChanged),
            _ => None,
        }
    }
}

/// A state change worth replaying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JournalRecord {
    /// A box was paid for and randomness requested.
    BoxOpened {
        /// Randomness request handle.
        request_id: U256,
        /// Buyer.
        requester: Address,
        /// Payment in wei.
        paid: U256,
    },
    /// A request was resolved and paid out.
    BoxFulfilled {
        /// Randomness request handle.
        request_id: U256,
        /// Winning pool index.
        reward_index: u64,
        /// Random value used.
        random_value: U256,
    },
    /// Collected payments left the engine.
    FundsWithdrawn {
        /// Recipient.
        to: Address,
        /// Amount in wei.
        amount: U256,
    },
    /// The owner appended a reward to the pool.
    RewardAdded {
        /// Asset standard.
        kind: RewardKind,
        /// Asset contract.
        asset: Address,
        /// Token id.
        sub_id: U256,
        /// Quantity per win.
        amount: U256,
        /// Selection weight.
        weight: u32,
    },
    /// The owner changed weight or activation of a reward.
    RewardUpdated {
        /// Pool index.
        index: u64,
        /// New weight.
        weight: u32,
        /// New activation flag.
        active: bool,
    },
    /// The owner changed the box price.
    PriceUpdated {
        /// New price in wei.
        price: U256,
    },
    /// Purchases were suspended or resumed.
    PauseChanged {
        /// New pause flag.
        paused: bool,
    },
    /// Admin rights moved to another account.
    OwnerChanged {
        /// New owner.
        owner: Address,
    },
}

impl JournalRecord {
    fn record_type(&self) -> RecordType {
        match self {
            Self::BoxOpened { .. } => RecordType::Opened,
            Self::BoxFulfilled { .. } => RecordType::Fulfilled,
            Self::FundsWithdrawn { .. } => RecordType::Withdrawn,
            Self::RewardAdded { .. } => RecordType::RewardAdded,
            Self::RewardUpdated { .. } => RecordType::RewardUpdated,
            Self::PriceUpdated { .. } => RecordType::PriceUpdated,
            Self::PauseChanged { .. } => RecordType::PauseChanged,
            Self::OwnerChanged { .. } => RecordType::OwnerChanged,
        }
    }

    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(96);
        match self {
            Self::BoxOpened { request_id, requester, paid } => {
                buf.extend_from_slice(&request_id.to_be_bytes::<32>());
                buf.extend_from_slice(requester.as_slice());
                buf.extend_from_slice(&paid.to_be_bytes::<32>());
            }
            Self::BoxFulfilled { request_id, reward_index, random_value } => {
                buf.extend_from_slice(&request_id.to_be_bytes::<32>());
                buf.extend_from_slice(&reward_index.to_le_bytes());
                buf.extend_from_slice(&random_value.to_be_bytes::<32>());
            }
            Self::FundsWithdrawn { to, amount } => {
                buf.extend_from_slice(to.as_slice());
                buf.extend_from_slice(&amount.to_be_bytes::<32>());
            }
            Self::RewardAdded { kind, asset, sub_id, amount, weight } => {
                buf.push(*kind as u8);
                buf.extend_from_slice(asset.as_slice());
                buf.extend_from_slice(&sub_id.to_be_bytes::<32>());
                buf.extend_from_slice(&amount.to_be_bytes::<32>());
                buf.extend_from_slice(&weight.to_le_bytes());
            }
            Self::RewardUpdated { index, weight, active } => {
                buf.extend_from_slice(&index.to_le_bytes());
                buf.extend_from_slice(&weight.to_le_bytes());
                buf.push(u8::from(*active));
            }
            Self::PriceUpdated { price } => {
                buf.extend_from_slice(&price.to_be_bytes::<32>());
            }
            Self::PauseChanged { paused } => buf.push(u8::from(*paused)),
            Self::OwnerChanged { owner } => buf.extend_from_slice(owner.as_slice()),
        }
        buf
    }

    fn deserialize(record_type: RecordType, data: &[u8]) -> Option<Self> {
        let mut cursor = Cursor(data);
        let record = match record_type {
            RecordType::Opened => Self::BoxOpened {
                request_id: cursor.u256()?,
                requester: cursor.address()?,
                paid: cursor.u256()?,
            },
            RecordType::Fulfilled => Self::BoxFulfilled {
                request_id: cursor.u256()?,
                reward_index: u64::from_le_bytes(cursor.take::<8>()?),
                random_value: cursor.u256()?,
            },
            RecordType::Withdrawn => Self::FundsWithdrawn {
                to: cursor.address()?,
                amount: cursor.u256()?,
            },
            RecordType::RewardAdded => Self::RewardAdded {
                kind: RewardKind::from_u8(cursor.byte()?)?,
                asset: cursor.address()?,
                sub_id: cursor.u256()?,
                amount: cursor.u256()?,
                weight: u32::from_le_bytes(cursor.take::<4>()?),
            },
            RecordType::RewardUpdated => Self::RewardUpdated {
                index: u64::from_le_bytes(cursor.take::<8>()?),
                weight: u32::from_le_bytes(cursor.take::<4>()?),
                active: cursor.flag()?,
            },
            RecordType::PriceUpdated => Self::PriceUpdated {
                price: cursor.u256()?,
            },
            RecordType::PauseChanged => Self::PauseChanged {
                paused: cursor.flag()?,
            },
            RecordType::OwnerChanged => Self::OwnerChanged {
                owner: cursor.address()?,
            },
        };
        cursor.0.is_empty().then_some(record)
    }
}

/// Byte reader over a record payload.
struct Cursor<'a>(&'a [u8]);

impl Cursor<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        if self.0.len() < N {
            return None;
        }
        let (head, rest) = self.0.split_at(N);
        self.0 = rest;
        head.try_into().ok()
    }

    fn u256(&mut self) -> Option<U256> {
        self.take::<32>().map(U256::from_be_bytes)
    }

    fn address(&mut self) -> Option<Address> {
        self.take::<20>().map(Address::from)
    }

    fn byte(&mut self) -> Option<u8> {
        self.take::<1>().map(|[b]| b)
    }

    fn flag(&mut self) -> Option<bool> {
        match self.byte()? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }
}

/// Append-only, CRC-framed journal file.
pub struct EngineJournal {
    /// Path to the journal file.
    path: PathBuf,
    /// Sequence number of the next record.
    next_seq: AtomicU64,
    /// File handle (protected by mutex for writes).
    file: Mutex<BufWriter<File>>,
}

impl EngineJournal {
    /// Opens or creates a journal and returns the records it holds.
    ///
    /// A torn or corrupt tail is truncated away.
    ///
    /// # Errors
    ///
    /// `Journal` on I/O failure, a foreign magic or an unknown version.
    pub fn open(path: impl AsRef<Path>) -> LootResult<(Self, Vec<JournalRecord>)> {
        let path = path.as_ref().to_path_buf();

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(LootError::Journal(format!("Failed to read journal: {e}"))),
        };

        let (records, next_seq, valid_len) = if bytes.len() < HEADER_LEN {
            if !bytes.is_empty() {
                tracing::warn!("Journal {} has a torn header, starting fresh", path.display());
            }
            (Vec::new(), 0, 0)
        } else {
            Self::recover(&bytes)?
        };

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| LootError::Journal(format!("Failed to open journal: {e}")))?;

        if valid_len < bytes.len() && valid_len >= HEADER_LEN {
            tracing::warn!(
                "Journal recovery: dropped {} trailing bytes from {}",
                bytes.len() - valid_len,
                path.display()
            );
        }
        file.set_len(valid_len as u64)
            .map_err(|e| LootError::Journal(format!("Truncate failed: {e}")))?;
        drop(file);

        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| LootError::Journal(format!("Failed to open journal: {e}")))?;
        let mut writer = BufWriter::new(file);

        if valid_len == 0 {
            writer
                .write_all(JOURNAL_MAGIC)
                .map_err(|e| LootError::Journal(format!("Failed to write magic: {e}")))?;
            writer
                .write_all(&JOURNAL_VERSION.to_le_bytes())
                .map_err(|e| LootError::Journal(format!("Failed to write version: {e}")))?;
            writer
                .flush()
                .map_err(|e| LootError::Journal(format!("Failed to flush: {e}")))?;
        }

        let journal = Self {
            path,
            next_seq: AtomicU64::new(next_seq),
            file: Mutex::new(writer),
        };
        Ok((journal, records))
    }

    /// Appends a record and syncs it to disk.
    ///
    /// Returns its sequence number.
    ///
    /// # Errors
    ///
    /// `Journal` on I/O failure.
    pub fn append(&self, record: &JournalRecord) -> LootResult<u64> {
        let mut file = self.file.lock();
        let seq = self.next_seq.load(Ordering::SeqCst);

        let payload = record.serialize();
        let len = u32::try_from(payload.len()).map_err(|_| LootError::ArithmeticOverflow)?;

        let mut frame = Vec::with_capacity(RECORD_PREFIX_LEN + payload.len() + 4);
        frame.extend_from_slice(&seq.to_le_bytes());
        frame.push(record.record_type() as u8);
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);
        let crc = crc32fast::hash(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());

        file.write_all(&frame)
            .map_err(|e| LootError::Journal(format!("Journal write failed: {e}")))?;
        file.flush()
            .map_err(|e| LootError::Journal(format!("Journal flush failed: {e}")))?;
        file.get_ref()
            .sync_data()
            .map_err(|e| LootError::Journal(format!("Journal sync failed: {e}")))?;

        self.next_seq.store(seq + 1, Ordering::SeqCst);
        Ok(seq)
    }

    /// Path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records in the journal.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }

    /// Whether the journal holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Parses records after the header.
    ///
    /// Returns the records, the next sequence number and the length of the
    /// valid prefix of the file.
    fn recover(bytes: &[u8]) -> LootResult<(Vec<JournalRecord>, u64, usize)> {
        if &bytes[..4] != JOURNAL_MAGIC {
            return Err(LootError::Journal("Invalid journal magic".to_string()));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..HEADER_LEN]);
        let version = u32::from_le_bytes(version);
        if version != JOURNAL_VERSION {
            return Err(LootError::Journal(format!("Unsupported journal version: {version}")));
        }

        let mut records = Vec::new();
        let mut offset = HEADER_LEN;
        let mut next_seq = 0u64;

        while let Some((record, seq, consumed)) = Self::read_record(&bytes[offset..]) {
            // Sequence numbers are dense; a gap means the rest is garbage
            if seq != next_seq {
                break;
            }
            records.push(record);
            next_seq += 1;
            offset += consumed;
        }

        Ok((records, next_seq, offset))
    }

    /// Reads one record from the front of `data`.
    fn read_record(data: &[u8]) -> Option<(JournalRecord, u64, usize)> {
        let mut cursor = Cursor(data);
        let seq = u64::from_le_bytes(cursor.take::<8>()?);
        let [type_byte] = cursor.take::<1>()?;
        let len = u32::from_le_bytes(cursor.take::<4>()?) as usize;
        if cursor.0.len() < len + 4 {
            return None;
        }

        let framed_len = RECORD_PREFIX_LEN + len;
        let stored_crc = u32::from_le_bytes(data[framed_len..framed_len + 4].try_into().ok()?);
        if crc32fast::hash(&data[..framed_len]) != stored_crc {
            return None;
        }

        let record_type = RecordType::from_u8(type_byte)?;
        let record = JournalRecord::deserialize(record_type, &data[RECORD_PREFIX_LEN..framed_len])?;
        Some((record, seq, framed_len + 4))
    }
}
