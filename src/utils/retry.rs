use std::future::Future;
use std::time::Duration;

use crate::config::Config;

/// 指数退避重试策略
///
/// `max_attempts` 包含首次调用，每次失败后等待时间翻倍
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        }
    }

    /// 不重试，只调用一次
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// 失败即重试，直到次数用完
    pub async fn run<F, Fut, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.run_if(|_| true, f).await
    }

    /// 只有 `should_retry` 返回 true 的错误才会重试
    pub async fn run_if<P, F, Fut, T, E>(&self, should_retry: P, mut f: F) -> Result<T, E>
    where
        P: Fn(&E) -> bool,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempts_left = self.max_attempts.max(1);
        let mut delay = self.base_delay;

        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    attempts_left = attempts_left.saturating_sub(1);
                    if attempts_left == 0 || !should_retry(&e) {
                        return Err(e);
                    }

                    tracing::warn!(
                        "请求失败，{}ms 后重试 (剩余 {} 次): {}",
                        delay.as_millis(),
                        attempts_left,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retry_succeeds_after_retries() {
        let counter = AtomicUsize::new(0);
        let policy = RetryPolicy::default();

        let res: Result<usize, &'static str> = policy
            .run(|| async {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("fail")
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(res, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_fails_after_max_attempts() {
        let counter = AtomicUsize::new(0);
        let policy = RetryPolicy::default();
        let start = tokio::time::Instant::now();

        let res: Result<(), &'static str> = policy
            .run(|| async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("always fail")
            })
            .await;

        assert!(res.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        // 2s + 4s + 8s
        assert!(start.elapsed() >= Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn once_policy_never_retries() {
        let counter = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();

        let res: Result<(), &'static str> = RetryPolicy::once()
            .run(|| async {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("down")
            })
            .await;

        assert_eq!(res, Err("down"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let counter = AtomicUsize::new(0);
        let policy = RetryPolicy::default();

        let res: Result<(), &'static str> = policy
            .run_if(
                |e| *e != "fatal",
                || async {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("fatal")
                },
            )
            .await;

        assert_eq!(res, Err("fatal"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
