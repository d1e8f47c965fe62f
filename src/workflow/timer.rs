use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};

/// 考试倒计时
#[derive(Debug, Clone)]
pub struct ExamTimer {
    duration: Duration,
}

impl ExamTimer {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// 每秒回调一次剩余秒数，时间到后返回
    ///
    /// 在 `select!` 中被丢弃时计时随之停止
    pub async fn expire<F: FnMut(u64)>(&self, mut on_tick: F) {
        let deadline = Instant::now() + self.duration;
        let mut ticker = interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let remaining = deadline.saturating_duration_since(Instant::now());
            let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
            on_tick(secs);
            if remaining.is_zero() {
                return;
            }
        }
    }
}

/// 剩余时间显示为 `MM:SS`
pub fn format_remaining(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_remaining(7200), "120:00");
        assert_eq!(format_remaining(65), "01:05");
        assert_eq!(format_remaining(0), "00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_down_to_zero() {
        let timer = ExamTimer::new(Duration::from_secs(3));
        let mut ticks = Vec::new();
        timer.expire(|s| ticks.push(s)).await;
        assert_eq!(ticks, vec![3, 2, 1, 0]);
    }
}
