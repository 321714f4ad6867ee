//! Handler contract for reply-based routes.

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::reply::Reply;

/// Code run for a matched route. It mutates the reply; dispatch commits it.
#[async_trait]
pub trait ReplyHandler: Send + Sync + 'static {
    async fn handle(&self, reply: &mut Reply);
}

/// Plain functions of the shape
/// `fn(&mut Reply) -> BoxFuture<'_, ()>` are handlers.
#[async_trait]
impl<F> ReplyHandler for F
where
    F: for<'a> Fn(&'a mut Reply) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    async fn handle(&self, reply: &mut Reply) {
        (self)(reply).await
    }
}
