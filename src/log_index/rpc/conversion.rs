use alloy::{
    network::{Ethereum, Network},
    providers::RootProvider,
};

use crate::error::LogIndexError;

/// Types that can provide the [`RootProvider`] an [`RpcLogIndex`](crate::RpcLogIndex) talks to.
///
/// Lets [`RpcLogIndexBuilder`](crate::RpcLogIndexBuilder) accept connection strings as well as
/// providers built elsewhere in the application.
pub trait IntoRootProvider<N: Network = Ethereum> {
    /// Converts `self` into a [`RootProvider`], connecting if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    fn into_root_provider(
        self,
    ) -> impl Future<Output = Result<RootProvider<N>, LogIndexError>> + Send;
}

impl<N: Network> IntoRootProvider<N> for RootProvider<N> {
    async fn into_root_provider(self) -> Result<RootProvider<N>, LogIndexError> {
        Ok(self)
    }
}

/// Connects to an `http(s)://`, `ws(s)://` or IPC endpoint.
impl<N: Network> IntoRootProvider<N> for &str {
    async fn into_root_provider(self) -> Result<RootProvider<N>, LogIndexError> {
        Ok(RootProvider::connect(self).await?)
    }
}
