use std::{
    future::{poll_fn, Future},
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
    pin::Pin,
    task::Poll,
    time::Duration,
};

use tokio::task::JoinHandle;

/// An empty IPv4 [`SocketAddr`] with port 0
pub const UNSPECIFIED_SOCKADDR_V4: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));

/// An empty IPv6 [`SocketAddr`] with port, flowinfo, and scope_id all set to 0.
pub const UNSPECIFIED_SOCKADDR_V6: SocketAddr = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 0, 0, 0));

/// Runs `future` to completion, or until `limit` elapses if there is one. On timeout, returns the
/// limit that was exceeded.
pub async fn timeout_if_some<F: Future>(limit: Option<Duration>, future: F) -> Result<F::Output, Duration> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future).await.map_err(|_| limit),
        None => Ok(future.await),
    }
}

/// Waits until every handle's task has finished, ignoring their results.
pub async fn join_all<T>(mut handles: Vec<JoinHandle<T>>) {
    poll_fn(move |cx| {
        let mut i = 0;
        while i < handles.len() {
            match Pin::new(&mut handles[i]).poll(cx) {
                Poll::Ready(_) => {
                    handles.swap_remove(i);
                }
                Poll::Pending => i += 1,
            }
        }

        match handles.is_empty() {
            true => Poll::Ready(()),
            false => Poll::Pending,
        }
    })
    .await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{join_all, timeout_if_some};

    #[tokio::test]
    async fn timeout_reports_exceeded_limit() {
        let limit = Duration::from_millis(10);
        let result = timeout_if_some(Some(limit), std::future::pending::<()>()).await;
        assert_eq!(result, Err(limit));

        assert_eq!(timeout_if_some(None, async { 7 }).await, Ok(7));
        assert_eq!(timeout_if_some(Some(Duration::from_secs(5)), async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn join_all_waits_for_every_task() {
        let handles = (0..3u64)
            .map(|i| tokio::spawn(tokio::time::sleep(Duration::from_millis(i * 5))))
            .collect();

        join_all(handles).await;
        join_all(Vec::<tokio::task::JoinHandle<()>>::new()).await;
    }
}
