//! 큐 유틸리티 -- 다중 소비자 수신기와 큐 깊이 측정
//!
//! tokio `mpsc`는 단일 소비자 채널이므로, 여러 워커가 같은 큐를 소비할 때는
//! [`SharedReceiver`]로 수신기를 공유합니다.
//! [`QueueProbe`]는 약한 송신자를 통해 큐 깊이를 읽으므로 채널 수명에 영향을 주지 않습니다.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

/// 여러 워커가 공유하는 mpsc 수신기
pub struct SharedReceiver<T> {
    inner: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> SharedReceiver<T> {
    /// 수신기를 감쌉니다.
    pub fn new(rx: mpsc::Receiver<T>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(rx)),
        }
    }

    /// 다음 항목을 수신합니다.
    ///
    /// 모든 송신자가 닫히고 큐가 비면 `None`을 반환합니다.
    pub async fn recv(&self) -> Option<T> {
        self.inner.lock().await.recv().await
    }
}

impl<T> Clone for SharedReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// 큐 깊이 측정기
#[derive(Clone)]
pub struct QueueProbe {
    depth: Arc<dyn Fn() -> usize + Send + Sync>,
    capacity: usize,
}

impl QueueProbe {
    /// 송신자로부터 측정기를 생성합니다.
    ///
    /// 모든 송신자가 drop된 뒤에는 0을 보고합니다.
    pub fn for_sender<T: Send + 'static>(tx: &mpsc::Sender<T>) -> Self {
        let weak = tx.downgrade();
        let capacity = tx.max_capacity();
        Self {
            depth: Arc::new(move || {
                weak.upgrade()
                    .map(|tx| capacity.saturating_sub(tx.capacity()))
                    .unwrap_or(0)
            }),
            capacity,
        }
    }

    /// 임의의 함수로 측정기를 생성합니다.
    pub fn from_fn(capacity: usize, depth: impl Fn() -> usize + Send + Sync + 'static) -> Self {
        Self {
            depth: Arc::new(depth),
            capacity,
        }
    }

    /// 현재 큐에 대기 중인 항목 수
    pub fn len(&self) -> usize {
        (self.depth)()
    }

    /// 큐가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 큐 최대 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 큐 사용률 (0.0~1.0)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        f64::from(u32::try_from(self.len()).unwrap_or(u32::MAX))
            / f64::from(u32::try_from(self.capacity).unwrap_or(u32::MAX))
    }
}

impl fmt::Debug for QueueProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueProbe")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
