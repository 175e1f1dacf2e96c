//! 배치 버퍼 -- 라이터 워커의 인메모리 배치 누적
//!
//! [`BatchBuffer`]는 싱크로 보내기 전의 항목을 모아두고,
//! 배치 크기에 도달했는지 알려줍니다. 시간 기반 플러시는 워커가 담당합니다.

/// 인메모리 배치 버퍼
#[derive(Debug)]
pub struct BatchBuffer<T> {
    /// 누적된 항목
    items: Vec<T>,
    /// 플러시 기준 크기
    batch_size: usize,
    /// 총 유입 항목 수
    total_received: u64,
    /// 총 플러시 횟수
    flush_count: u64,
}

impl<T> BatchBuffer<T> {
    /// 새 배치 버퍼를 생성합니다.
    ///
    /// `batch_size`가 0이면 1로 취급합니다.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            items: Vec::with_capacity(batch_size.min(10_000)),
            batch_size,
            total_received: 0,
            flush_count: 0,
        }
    }

    /// 항목을 추가합니다.
    ///
    /// 배치 크기에 도달하면 `true`를 반환합니다.
    pub fn push(&mut self, item: T) -> bool {
        self.total_received += 1;
        self.items.push(item);
        self.is_full()
    }

    /// 누적된 항목 전체를 꺼냅니다.
    pub fn take(&mut self) -> Vec<T> {
        if !self.items.is_empty() {
            self.flush_count += 1;
        }
        std::mem::replace(
            &mut self.items,
            Vec::with_capacity(self.batch_size.min(10_000)),
        )
    }

    /// 배치 크기에 도달했는지 확인합니다.
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.batch_size
    }

    /// 현재 누적된 항목 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 버퍼가 비어있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 배치 크기를 반환합니다.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 총 유입 항목 수를 반환합니다.
    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// 비어있지 않은 상태에서 꺼낸 횟수를 반환합니다.
    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_until_full() {
        let mut buf = BatchBuffer::new(3);
        assert!(!buf.push(1));
        assert!(!buf.push(2));
        assert!(buf.push(3));
        assert!(buf.is_full());
        assert_eq!(buf.take(), vec![1, 2, 3]);
        assert!(buf.is_empty());
        assert_eq!(buf.total_received(), 3);
        assert_eq!(buf.flush_count(), 1);
    }

    #[test]
    fn batch_size_one_flushes_every_push() {
        let mut buf = BatchBuffer::new(1);
        assert!(buf.push("a"));
        assert_eq!(buf.take(), vec!["a"]);
        assert!(buf.push("b"));
    }

    #[test]
    fn zero_batch_size_treated_as_one() {
        let buf: BatchBuffer<u8> = BatchBuffer::new(0);
        assert_eq!(buf.batch_size(), 1);
    }

    #[test]
    fn take_empty_does_not_count_flush() {
        let mut buf: BatchBuffer<u8> = BatchBuffer::new(4);
        assert!(buf.take().is_empty());
        assert_eq!(buf.flush_count(), 0);
    }

    #[test]
    fn partial_batch_can_be_taken() {
        let mut buf = BatchBuffer::new(10);
        buf.push(1);
        buf.push(2);
        assert_eq!(buf.len(), 2);
        assert!(!buf.is_full());
        assert_eq!(buf.take(), vec![1, 2]);
    }
}
