//! Transaction handles
//!
//! A [`WriteTxn`] is the one handle a booking operation runs on. It holds
//! SQLite's reserved lock from `BEGIN IMMEDIATE` until it is committed,
//! rolled back, or dropped. Dropping rolls back.
//!
//! Beginning a handle mutably borrows the connection, so nothing else can
//! begin (and implicitly commit) a second transaction on that connection
//! while the handle is alive. Nested steps take `&mut WriteTxn` instead.
//!
//! A step that can fail after writing runs inside [`WriteTxn::savepoint`], so
//! its failure undoes only its own writes and the handle stays usable.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, instrument, warn};

use crate::error::Result;

use super::{BlockStore, FurnitureStore, ReservationStore, StateStore};

/// Any open transaction a read-only step can run on
pub trait TxnHandle {
    fn conn(&self) -> &Connection;
}

/// Exclusive write-lock transaction
pub struct WriteTxn<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> WriteTxn<'conn> {
    /// `BEGIN IMMEDIATE`. Blocks, up to the connection's busy timeout, while
    /// another writer holds the lock.
    #[instrument(skip(conn))]
    pub(crate) fn begin(conn: &'conn mut Connection) -> Result<Self> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        debug!("Write lock acquired");
        Ok(Self { tx })
    }

    /// Connection the transaction runs on, for queries
    pub fn conn(&self) -> &Connection {
        &self.tx
    }

    pub fn furniture(&self) -> FurnitureStore<'_> {
        FurnitureStore::new(&self.tx)
    }

    pub fn reservations(&self) -> ReservationStore<'_> {
        ReservationStore::new(&self.tx)
    }

    pub fn blocks(&self) -> BlockStore<'_> {
        BlockStore::new(&self.tx)
    }

    pub fn states(&self) -> StateStore<'_> {
        StateStore::new(&self.tx)
    }

    /// Run `step` inside a SQLite savepoint. On error everything `step`
    /// wrote is rolled back before the error is returned; the outer
    /// transaction and its earlier writes are untouched.
    pub fn savepoint<T>(
        &mut self,
        name: &str,
        step: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.tx.execute_batch(&format!("SAVEPOINT {}", name))?;
        match step(self) {
            Ok(value) => {
                self.tx.execute_batch(&format!("RELEASE {}", name))?;
                Ok(value)
            }
            Err(e) => {
                let undo = format!("ROLLBACK TO {name}; RELEASE {name}", name = name);
                if let Err(undo_err) = self.tx.execute_batch(&undo) {
                    warn!(savepoint = name, error = %undo_err, "Savepoint rollback failed");
                }
                debug!(savepoint = name, "Step rolled back");
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        debug!("Write transaction committed");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        debug!("Write transaction rolled back");
        Ok(())
    }
}

/// Short-lived read transaction for standalone queries.
///
/// Deferred: takes no lock until the first read, never blocks writers in
/// WAL mode. Reads see one consistent snapshot.
pub struct ReadTxn<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> ReadTxn<'conn> {
    pub(crate) fn begin(conn: &'conn mut Connection) -> Result<Self> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        Ok(Self { tx })
    }

    pub fn conn(&self) -> &Connection {
        &self.tx
    }

    /// End the snapshot. Nothing was written, so this is a plain COMMIT.
    pub fn finish(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }
}

impl TxnHandle for WriteTxn<'_> {
    fn conn(&self) -> &Connection {
        &self.tx
    }
}

impl TxnHandle for ReadTxn<'_> {
    fn conn(&self) -> &Connection {
        &self.tx
    }
}
