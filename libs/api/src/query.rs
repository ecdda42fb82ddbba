//! Read/write options and blocking-query metadata.

use std::time::Duration;

/// Options applied to scheduler reads.
///
/// A read with a non-zero `wait_index` and a `wait_time` is a blocking
/// query: the server holds it until its index passes `wait_index` or the
/// wait time elapses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub namespace: Option<String>,
    pub region: Option<String>,
    /// Allow any server (not only the leader) to answer.
    pub allow_stale: bool,
    pub wait_index: u64,
    pub wait_time: Option<Duration>,
}

impl QueryOptions {
    /// Turn these options into a blocking query from `wait_index`.
    pub fn blocking(mut self, wait_index: u64, wait_time: Duration) -> Self {
        self.wait_index = wait_index;
        self.wait_time = Some(wait_time);
        self
    }

    /// Returns true if the server is asked to hold the request.
    pub fn is_blocking(&self) -> bool {
        self.wait_index > 0 && self.wait_time.is_some()
    }
}

impl From<&WriteOptions> for QueryOptions {
    fn from(write: &WriteOptions) -> Self {
        Self {
            namespace: write.namespace.clone(),
            region: write.region.clone(),
            ..Self::default()
        }
    }
}

/// Options applied to scheduler writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub namespace: Option<String>,
    pub region: Option<String>,
}

/// Metadata returned with every read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryMeta {
    /// Index of the last change the server applied to the resource.
    pub last_index: u64,
}

/// A decoded read plus its metadata.
#[derive(Debug, Clone)]
pub struct Response<T> {
    pub value: T,
    pub meta: QueryMeta,
}

impl<T> Response<T> {
    pub fn new(value: T, last_index: u64) -> Self {
        Self {
            value,
            meta: QueryMeta { last_index },
        }
    }
}
