//! View of the server-to-server link topology.

/// Reports how many servers this node currently knows about.
pub trait ServerList {
    /// Number of servers on the network, this one included.
    fn server_count(&self) -> usize;
}

/// Fixed server count, for standalone hosts and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticServerList(pub usize);

impl ServerList for StaticServerList {
    fn server_count(&self) -> usize {
        self.0
    }
}
