//! Public entry point. `Client` owns a [`Connection`] and exposes the
//! single-op API directly; batches borrow it only for the duration of
//! `execute_async`, which takes the connection out and hands it back
//! through [`Tracker::join`].

use crate::batch::Batch;
use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{RiocError, RiocResult};
use crate::result::RangeResult;
use crate::single_op;
use crate::tracker::{self, Tracker};

pub struct Client {
    conn: Option<Connection>,
}

impl Client {
    pub fn connect(config: &ClientConfig) -> RiocResult<Self> {
        Ok(Self {
            conn: Some(Connection::connect(config)?),
        })
    }

    fn conn_mut(&mut self) -> RiocResult<&mut Connection> {
        self.conn
            .as_mut()
            .ok_or_else(|| RiocError::Param("client has an outstanding batch in flight".to_string()))
    }

    pub fn get(&mut self, key: &[u8]) -> RiocResult<Option<Vec<u8>>> {
        single_op::get(self.conn_mut()?, key)
    }

    pub fn insert(&mut self, key: &[u8], value: &[u8], timestamp: u64) -> RiocResult<()> {
        single_op::insert(self.conn_mut()?, key, value, timestamp)
    }

    pub fn delete(&mut self, key: &[u8], timestamp: u64) -> RiocResult<()> {
        single_op::delete(self.conn_mut()?, key, timestamp)
    }

    pub fn atomic_inc_dec(&mut self, key: &[u8], delta: i64, timestamp: u64) -> RiocResult<i64> {
        single_op::atomic_inc_dec(self.conn_mut()?, key, delta, timestamp)
    }

    pub fn range_query(&mut self, start_key: &[u8], end_key: &[u8]) -> RiocResult<Vec<RangeResult>> {
        single_op::range_query(self.conn_mut()?, start_key, end_key)
    }

    /// Starts a new, empty batch. Call [`Client::execute_async`] to send
    /// it.
    pub fn batch(&self) -> Batch {
        Batch::create()
    }

    /// Sends `batch` and spawns the completer. While the returned
    /// [`Tracker`] is alive, this client cannot be used for anything
    /// else — calling any other method returns a parameter error — until
    /// the tracker is joined back with [`Client::reclaim`].
    pub fn execute_async(&mut self, batch: Batch) -> RiocResult<Tracker> {
        if batch.is_empty() {
            return Err(RiocError::Param("cannot execute an empty batch".to_string()));
        }
        let conn = self
            .conn
            .take()
            .ok_or_else(|| RiocError::Param("client has an outstanding batch in flight".to_string()))?;
        tracker::execute_async(batch, conn)
    }

    /// Joins `tracker` and returns its connection to this client so
    /// subsequent single-op or batch calls can proceed.
    pub fn reclaim(&mut self, tracker: Tracker) -> RiocResult<()> {
        self.conn = Some(tracker.join()?);
        Ok(())
    }
}
