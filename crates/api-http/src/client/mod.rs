// reqwest-based clients implementing the `Controller` and `KvStore`
// ports against a remote server speaking the REST contract in
// `crate::server`. Transient transport failures (timeouts, connection
// refused) are retried with the same `Backoff` policy the worker uses
// against its controller; semantic failures surfaced by
// the remote server are propagated unchanged.

mod http_controller;
mod http_kv;

pub use http_controller::HttpController;
pub use http_kv::HttpKvStore;
